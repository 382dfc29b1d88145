use std::{sync::Arc, time::Duration};

use crate::{
    api::{ApiError, AuthApi},
    model::Session,
    notify::{Notifier, Toast},
    session::{SessionError, SessionStore},
};

use super::validation::{LoginForm, SignupForm, ValidationErrors};

/// Page changes after a successful submission.
pub trait Navigator: Send + Sync {
    fn redirect(&self, target: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSettings {
    /// Pause before redirecting, so the success toast can be read.
    pub redirect_delay: Duration,
    pub login_redirect: String,
    pub signup_redirect: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        AuthSettings {
            redirect_delay: Duration::from_millis(1500),
            login_redirect: "/hierarchy".to_owned(),
            signup_redirect: "/login".to_owned(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Invalid(#[from] ValidationErrors),
    /// Shown to the user as is.
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// The user-facing text for a failed auth call.
pub fn failure_message(action: &str, err: &ApiError) -> String {
    match err {
        ApiError::Server { status, .. } => match err.body_message() {
            Some(message) => message.to_owned(),
            None => format!("{} failed with status {}", action, status),
        },
        _ => err.to_string(),
    }
}

pub struct AuthFormController<A> {
    api: A,
    session: Arc<dyn SessionStore>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    settings: AuthSettings,
}

impl<A: AuthApi> AuthFormController<A> {
    pub fn new(
        api: A,
        session: Arc<dyn SessionStore>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
        settings: AuthSettings,
    ) -> Self {
        AuthFormController {
            api,
            session,
            notifier,
            navigator,
            settings,
        }
    }

    pub fn current(&self) -> Option<Session> {
        self.session.load()
    }

    fn rejected(&self, action: &str, err: ApiError) -> AuthError {
        let message = failure_message(action, &err);
        tracing::warn!(action, %err, "auth request failed");
        self.notifier
            .notify(Toast::error(format!("{} failed", action), message.clone()));
        AuthError::Rejected(message)
    }

    async fn finish(&self, session: &Session, toast: Toast, target: &str) -> Result<(), AuthError> {
        self.session.save(session)?;
        self.notifier.notify(toast);
        tokio::time::sleep(self.settings.redirect_delay).await;
        self.navigator.redirect(target);
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    pub async fn login(&self, form: &LoginForm) -> Result<Session, AuthError> {
        let credentials = form.validate()?;
        let session = match self.api.login(&credentials).await {
            Ok(session) => session,
            Err(err) => return Err(self.rejected("Login", err)),
        };
        tracing::info!(email = %session.profile.email, role = %session.profile.role, "logged in");
        self.finish(
            &session,
            Toast::success(
                "Logged in",
                format!("Welcome back, {}.", session.profile.name),
            ),
            &self.settings.login_redirect,
        )
        .await?;
        Ok(session)
    }

    #[tracing::instrument(skip_all)]
    pub async fn signup(&self, form: &SignupForm) -> Result<Session, AuthError> {
        let registration = form.validate()?;
        let session = match self.api.register(&registration).await {
            Ok(session) => session,
            Err(err) => return Err(self.rejected("Registration", err)),
        };
        tracing::info!(email = %session.profile.email, "registered");
        self.finish(
            &session,
            Toast::success("Account created", "You can now log in."),
            &self.settings.signup_redirect,
        )
        .await?;
        Ok(session)
    }

    pub fn logout(&self) -> Result<(), AuthError> {
        self.session.clear()?;
        self.notifier
            .notify(Toast::info("Logged out", "Your session was cleared."));
        Ok(())
    }
}
