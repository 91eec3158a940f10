use thiserror::Error;

/// Failures surfaced to the operator. The `Display` text is what ends up in
/// the error banner.
#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("{0} endpoint not configured: set {1} in the config file or on the command line and restart")]
    NotConfigured(&'static str, &'static str),

    #[error("{0}")]
    HttpError(#[from] reqwest::Error),

    #[error("HTTP error: status {0}")]
    StatusError(u16),

    #[error("{0}")]
    ApiError(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Invalid JSON format")]
    InvalidJson,

    #[error("A command is already being sent")]
    Busy,

    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Unknown input '{0}', type 'help' for a list of commands")]
    UnknownInput(String),
}

impl DashboardError {
    pub fn is_config(&self) -> bool {
        matches!(self, DashboardError::NotConfigured(..))
    }
}
