use thiserror::Error;

/// Errors raised by the core library.
///
/// `Validation` carries the message meant for the user verbatim.
#[derive(Error, Debug)]
pub enum DeskError {
    #[error("{0}")]
    Validation(String),

    #[error("Username already exists.")]
    UsernameTaken,

    #[error("Invalid username or password.")]
    InvalidCredentials,

    #[error("{0}")]
    NotFound(String),

    #[error("AI service is not configured: {0}")]
    NotConfigured(String),

    #[error("Gemini API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

impl DeskError {
    pub fn validation(msg: impl Into<String>) -> Self {
        DeskError::Validation(msg.into())
    }
}

pub type DeskResult<T> = Result<T, DeskError>;
