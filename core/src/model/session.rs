use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub email: String,
    pub name: String,
    pub role: String,
}

/// Authenticated session as kept in the local store.
///
/// Always replaced as a whole after login or registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Bearer token; registration responses may not carry one.
    pub token: Option<String>,
    pub profile: Profile,
    pub issued_at: DateTime<Utc>,
}
