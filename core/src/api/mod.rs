//! Clients for the remote hierarchy and auth services.

mod auth;
mod error;
mod hierarchy;
mod response;
pub mod wire;

#[cfg(test)]
mod test;

pub use auth::*;
pub use error::ApiError;
pub use hierarchy::*;
pub(crate) use response::failure;
pub use response::{error_message, strip_quotes};
pub use wire::{AverageReply, MutationReply, RestoreOutcome};
