use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized - credentials rejected or token expired")]
    Unauthorized,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let cut = (0..=MAX_ERROR_BODY_LENGTH)
                .rev()
                .find(|&i| body.is_char_boundary(i))
                .unwrap_or(0);
            format!("{}... (truncated, {} total bytes)", &body[..cut], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            404 => ApiError::NotFound(truncated),
            409 => ApiError::Conflict(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// Transport failures (connect, timeout, dropped body) as opposed to a
    /// response we could not make sense of.
    fn is_transport(&self) -> bool {
        match self {
            ApiError::NetworkError(e) => !e.is_decode() && !e.is_builder(),
            _ => false,
        }
    }

    /// Classify a failed `POST /auth/login`.
    pub fn classify_login(self) -> AuthFailure {
        match self {
            ApiError::Unauthorized => AuthFailure::InvalidCredentials,
            ref e if e.is_transport() => AuthFailure::Network,
            e => AuthFailure::Unknown(e.to_string()),
        }
    }

    /// Classify a failed `POST /auth/create-password`.
    pub fn classify_registration(self) -> AuthFailure {
        match self {
            ApiError::Conflict(_) => AuthFailure::AlreadyRegistered,
            ref e if e.is_transport() => AuthFailure::Network,
            e => AuthFailure::Unknown(e.to_string()),
        }
    }

    /// Classify a failed `GET /home-feed`.
    pub fn classify_feed(self) -> FeedFailure {
        match self {
            ApiError::ServerError(body) => FeedFailure::Server(body),
            ApiError::RateLimited => FeedFailure::Server("rate limited".to_string()),
            ref e if e.is_transport() => FeedFailure::Network,
            e => FeedFailure::Unknown(e.to_string()),
        }
    }
}

/// Classified failure of an authenticate or register call.
///
/// The `Display` text is what the login and create-password screens show.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("Invalid credentials.")]
    InvalidCredentials,

    #[error("This CPF/e-mail is already registered.")]
    AlreadyRegistered,

    #[error("Unable to connect to server. Check your internet connection.")]
    Network,

    #[error("Something went wrong: {0}")]
    Unknown(String),
}

impl AuthFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthFailure::InvalidCredentials => "invalid_credentials",
            AuthFailure::AlreadyRegistered => "already_registered",
            AuthFailure::Network => "network",
            AuthFailure::Unknown(_) => "unknown",
        }
    }
}

/// Classified failure of a feed fetch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedFailure {
    #[error("Unable to reach the server. Check your connection.")]
    Network,

    #[error("The server failed to load the feed: {0}")]
    Server(String),

    #[error("Failed to load the feed: {0}")]
    Unknown(String),
}

impl FeedFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            FeedFailure::Network => "network",
            FeedFailure::Server(_) => "server",
            FeedFailure::Unknown(_) => "unknown",
        }
    }
}
