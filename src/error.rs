// src/error.rs
use crate::time::Time;
use crate::timeline::{ClipId, TrackId};
use thiserror::Error;

/// Recoverable failures of an editing operation. The model is untouched when
/// one of these is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditError {
    #[error("Clip {0} not found")]
    ClipNotFound(ClipId),
    #[error("Track {0} not found")]
    TrackNotFound(TrackId),
    #[error("Clip would overlap clip {conflicting} on track {track}")]
    OverlapConflict { track: TrackId, conflicting: ClipId },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Track {0} is locked")]
    LockedTrack(TrackId),
}

impl EditError {
    /// True for both clip and track lookups that failed.
    pub fn is_not_found(&self) -> bool {
        matches!(self, EditError::ClipNotFound(_) | EditError::TrackNotFound(_))
    }
}

/// Internal consistency violations. Seeing one of these after an engine
/// operation means the engine itself is wrong, not the caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntegrityError {
    #[error("Clip {0} ends before it starts")]
    NegativeSpan(ClipId),
    #[error("Clip {0} has a non-positive duration")]
    EmptyClip(ClipId),
    #[error("Clip {0} has invalid source bounds")]
    SourceBounds(ClipId),
    #[error("Clips on track {0} are not sorted by start time")]
    Unsorted(TrackId),
    #[error("Clips {0} and {1} overlap")]
    Overlap(ClipId, ClipId),
    #[error("Id {0} appears more than once")]
    DuplicateId(String),
    #[error("Clip {0} speed is outside the supported range")]
    Speed(ClipId),
    #[error("Clip {0} fades are negative or longer than the clip")]
    Fades(ClipId),
    #[error("Track {0} opacity is outside 0..=1")]
    Opacity(TrackId),
    #[error("Grid interval {0} is not positive")]
    GridInterval(Time),
    #[error("The {0} markers are negative or inverted")]
    Markers(&'static str),
    #[error("Track order fields are not contiguous")]
    TrackOrder,
    #[error("Selection points at missing clip {0}")]
    DanglingSelection(ClipId),
    #[error("Clip {0} selected flag disagrees with the timeline selection")]
    SelectionMismatch(ClipId),
}

pub type EditResult<T> = Result<T, EditError>;

/// Rejects NaN and infinities with a uniform message.
pub(crate) fn finite(value: f64, what: &str) -> EditResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EditError::InvalidArgument(format!("{what} must be finite, got {value}")))
    }
}

/// Converts seconds from an outer surface into timeline time.
pub(crate) fn seconds(value: f64, what: &str) -> EditResult<Time> {
    Time::try_from_secs(value)
        .ok_or_else(|| EditError::InvalidArgument(format!("{what} must be finite, got {value}")))
}
