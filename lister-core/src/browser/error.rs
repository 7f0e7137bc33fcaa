use thiserror::Error;

pub type AutomationResult<T> = Result<T, AutomationError>;

#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("chromium launch failed: {0}")]
    Launch(String),
    #[error("cdp error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("element not found: {0}")]
    NotFound(String),
    #[error("click on {0} was obstructed")]
    Obstructed(String),
    #[error("interaction with {locator} failed: {reason}")]
    Interaction { locator: String, reason: String },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("profile error: {0}")]
    Profile(String),
    #[error("automation session is closed")]
    Closed,
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AutomationError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AutomationError::NotFound(_))
    }
}

impl From<tokio::task::JoinError> for AutomationError {
    fn from(err: tokio::task::JoinError) -> Self {
        AutomationError::Unexpected(err.to_string())
    }
}
