use thiserror::Error;

/// Error type for the rxargs command line
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No command given")]
    NoCommand,

    #[error("Run aborted by user")]
    Aborted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{0}")]
    Core(#[from] crate::core::error::Error),
}

/// Process exit status for each class of failure
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
    pub const NO_COMMAND: i32 = 2;
    pub const ABORTED: i32 = 4;
    pub const INTERRUPTED: i32 = 130;
}

impl CliError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoCommand => exit_code::NO_COMMAND,
            Self::Aborted => exit_code::ABORTED,
            _ => exit_code::FAILURE,
        }
    }

    /// Get user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        use crate::core::error::Error as CoreError;
        match self {
            Self::NoCommand => "No command given. Usage: rxargs [OPTIONS] COMMAND [ARGS]...".to_string(),
            Self::Toml(err) => format!("Could not parse the config file: {}", err),
            Self::Core(CoreError::Multiplexer(msg)) => format!(
                "{}. Install tmux or byobu, or run the chunks locally with --no-mux.",
                msg
            ),
            Self::Core(CoreError::Regex(err)) => format!("Invalid regular expression: {}", err),
            Self::Core(CoreError::Enumeration(msg)) => format!("Could not read input: {}", msg),
            _ => self.to_string(),
        }
    }
}

/// Result type for the command line layer
pub type Result<T> = std::result::Result<T, CliError>;
