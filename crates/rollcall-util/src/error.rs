//! Error types for rollcall

use thiserror::Error;

use crate::MeetingId;

/// Core error type for rollcall operations
#[derive(Debug, Error)]
pub enum RollcallError {
    /// Two catalog entries share an id. The catalog is left unchanged.
    #[error("Duplicate meeting ID: {0}")]
    DuplicateMeeting(MeetingId),
}

pub type Result<T> = std::result::Result<T, RollcallError>;
