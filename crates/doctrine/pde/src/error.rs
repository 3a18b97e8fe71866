use thiserror::Error;

/// Result type for detection and history access.
pub type PdeResult<T> = Result<T, PdeError>;

#[derive(Debug, Error)]
pub enum PdeError {
    /// An event carries values the detectors cannot use.
    #[error("invalid event {event_id}: {reason}")]
    InvalidEvent { event_id: String, reason: String },

    #[error("history unavailable for {user_id}: {reason}")]
    HistoryUnavailable { user_id: String, reason: String },

    #[error("invalid user id: {0}")]
    InvalidUser(String),

    #[error("user directory unavailable: {0}")]
    DirectoryUnavailable(String),
}
