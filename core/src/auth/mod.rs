//! Login and registration forms.

mod form;
mod validation;


pub use form::{failure_message, AuthError, AuthFormController, AuthSettings, Navigator};
pub use validation::{
    is_valid_email, Field, FieldError, LoginForm, SignupForm, ValidationErrors, DEFAULT_ROLE,
    MIN_PASSWORD_LEN,
};
