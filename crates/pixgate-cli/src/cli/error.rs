//! CLI errors and how they are shown

use pixgate_token::{BaseUrlError, KeyError, TokenError};

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CliError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid signing secret: {0}")]
    Key(#[from] KeyError),

    #[error("invalid base URL: {0}")]
    BaseUrl(#[from] BaseUrlError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("gateway error: {0}")]
    Gateway(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// Print `error` to stderr and return the process exit code
#[must_use]
pub fn display_error(error: &CliError) -> i32 {
    eprintln!("error: {error}");
    if let CliError::Token(TokenError::Validity(_)) = error {
        eprintln!("  the token is well-formed and signed, but not usable at the current time");
    }
    1
}
