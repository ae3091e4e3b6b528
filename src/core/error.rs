use thiserror::Error;

/// Error type for enumeration, construction and hand-off
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Enumeration error: {0}")]
    Enumeration(String),

    #[error("Chunk protocol error: {0}")]
    Protocol(String),

    #[error("Multiplexer error: {0}")]
    Multiplexer(String),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an enumeration error
    pub fn enumeration<S: Into<String>>(msg: S) -> Self {
        Self::Enumeration(msg.into())
    }

    /// Create a chunk protocol error
    pub fn protocol<S: Into<String>>(msg: S) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a multiplexer error
    pub fn multiplexer<S: Into<String>>(msg: S) -> Self {
        Self::Multiplexer(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
