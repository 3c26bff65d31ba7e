//! Hard input limits. These are sanity ceilings, not business rules.

use crate::model::Ms;

/// 1970-01-01T00:00:00Z. Earlier instants are rejected.
pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;

/// 2100-01-01T00:00:00Z. Later instants are rejected.
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;

/// A single booking may not span more than one day's worth of slots.
pub const MAX_BOOKING_SPAN_MS: Ms = 24 * 60 * 60 * 1000;

/// Availability projection window ceiling (~3 months of days).
pub const MAX_PROJECTION_WINDOW_MS: Ms = 92 * 24 * 60 * 60 * 1000;

pub const MAX_NOTE_LEN: usize = 1024;

/// Above this many affected bookings, an hours-change analysis adds an
/// advance-notice warning.
pub const HOURS_CHANGE_WARN_THRESHOLD: usize = 5;
