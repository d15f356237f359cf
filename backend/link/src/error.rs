use thiserror::Error;

/// Why a page could not be fetched.
///
/// Authorization failures are kept apart so that a view can prompt for a
/// sign-in instead of showing a retry banner.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Not authorized ({status}): {message}")]
    Authorization { status: u16, message: String },

    /// Datastore failures, timeouts, transport errors and undecodable bodies.
    #[error("Fetch failed: {0}")]
    Execution(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid {key} value `{value}`: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}
