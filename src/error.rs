//! Error taxonomy for the delivery core.
use thiserror::Error;

/// Failures surfaced by dispatch and broadcast.
///
/// `ChannelUnavailable` is the only transient kind and the only one the
/// retry executor sees; storage and directory failures are surfaced on the
/// first attempt.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("channel unavailable: {0}")]
    ChannelUnavailable(String),
    #[error("storage error: {0}")]
    Storage(anyhow::Error),
    #[error("directory error: {0}")]
    Directory(anyhow::Error),
    #[error("invalid payload: {0}")]
    Validation(&'static str),
}

impl NotifyError {
    pub fn is_transient(&self) -> bool {
        matches!(self, NotifyError::ChannelUnavailable(_))
    }
}
