use ulid::Ulid;

use crate::model::{DayHours, Ms, Weekday};
use crate::store::StoreError;

#[derive(Debug)]
pub enum EngineError {
    /// Malformed input: time-of-day string, timezone name, local datetime,
    /// or an opening-hours table with close ≤ open.
    Validation(String),
    /// The snapped start already elapsed.
    PastBooking { start: Ms },
    /// Snapped end ≤ snapped start.
    InvalidRange { start: Ms, end: Ms },
    /// The range fails opening-hours validation. Carries the offending
    /// local weekday and its configured window (None = closed all day).
    OutsideHours {
        weekday: Weekday,
        hours: Option<DayHours>,
    },
    /// The atomic reservation found at least one already-owned slot.
    SlotConflict { slot: Ms },
    NotFound(Ulid),
    LimitExceeded(&'static str),
    /// Any persistence failure other than slot exclusivity.
    Store(StoreError),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(msg) => write!(f, "validation: {msg}"),
            EngineError::PastBooking { start } => {
                write!(f, "booking start already elapsed: {start}")
            }
            EngineError::InvalidRange { start, end } => {
                write!(f, "invalid range [{start}, {end})")
            }
            EngineError::OutsideHours { weekday, hours } => match hours {
                Some(h) => write!(
                    f,
                    "outside opening hours: {weekday} is open {}-{}",
                    h.open, h.close
                ),
                None => write!(f, "outside opening hours: closed on {weekday}"),
            },
            EngineError::SlotConflict { slot } => write!(f, "slot already booked: {slot}"),
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::SlotConflict { slot } => EngineError::SlotConflict { slot },
            StoreError::NotFound(id) => EngineError::NotFound(id),
            other => EngineError::Store(other),
        }
    }
}
