//! Error types shared across the workspace.

use thiserror::Error;

/// Crate-wide result alias.
pub type AppResult<T> = Result<T, AppError>;

/// Every error kind the engine, federation layer, queues and line-protocol
/// handler can produce. Client-facing variants map to a line-protocol status
/// line in `tootik-handler`; internal variants map to an HTTP status in
/// `tootik-federation`'s axum routes.
#[derive(Debug, Error)]
pub enum AppError {
    // === Client-facing ===
    #[error("bad input: {0}")]
    BadInput(String),

    #[error("not the author of this object")]
    NotAuthor,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("already following")]
    AlreadyFollowing,

    #[error("already registered")]
    AlreadyRegistered,

    #[error("already moved")]
    AlreadyMoved,

    #[error("throttled, try again later")]
    Throttled,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("a client certificate is required")]
    CertRequired,

    #[error("registration is pending approval")]
    CertPending,

    // === Internal ===
    #[error("transient network failure: {0}")]
    TransientNet(String),

    #[error("terminal HTTP failure: {0}")]
    TerminalHttp(String),

    #[error("signature invalid: {0}")]
    SignatureInvalid(String),

    #[error("schema invalid: {0}")]
    SchemaInvalid(String),

    #[error("authority mismatch: {0}")]
    AuthorityMismatch(String),

    #[error("stale activity ignored")]
    Stale,

    #[error("database error: {0}")]
    Database(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether this is a transient failure a caller should retry.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::TransientNet(_))
    }

    /// The Gemini-style status line code this error maps to (spec §6).
    #[must_use]
    pub const fn status_code(&self) -> u8 {
        match self {
            Self::CertRequired => 60,
            Self::CertPending => 61,
            Self::BadInput(_)
            | Self::NotAuthor
            | Self::NotFound(_)
            | Self::AlreadyExists(_)
            | Self::AlreadyFollowing
            | Self::AlreadyRegistered
            | Self::AlreadyMoved
            | Self::Throttled
            | Self::Forbidden(_) => 40,
            _ => 50,
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            Self::TransientNet(err.to_string())
        } else {
            Self::TerminalHttp(err.to_string())
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}
