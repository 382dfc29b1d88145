/// Failure of a call against the remote service.
///
/// `Display` is the human-readable message shown to the user.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// `from_body` is false when the body carried no message and `message`
    /// is the status line.
    #[error("{message}")]
    Server {
        status: u16,
        message: String,
        from_body: bool,
    },
    #[error("Network or server error")]
    Network(#[source] reqwest::Error),
    #[error("Unexpected response from server: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        ApiError::Server {
            status,
            message: message.into(),
            from_body: true,
        }
    }

    /// The message the server sent, if it sent one.
    pub fn body_message(&self) -> Option<&str> {
        match self {
            ApiError::Server {
                message,
                from_body: true,
                ..
            } => Some(message),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Server { status, .. } => Some(*status),
            ApiError::Network(err) => err.status().map(|s| s.as_u16()),
            ApiError::Decode(_) => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err)
        }
    }
}
