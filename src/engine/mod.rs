mod availability;
mod booking;
mod error;
mod hours;
mod hours_change;
mod timegrid;

pub use availability::{
    apply_time_window_filter, build_slot_index, find_contiguous_available_runs,
    project_availability,
};
pub use booking::BookingRequest;
pub use error::EngineError;
pub use hours::{range_within_hours, slot_within_hours, slots_for_local_day, validate_hours};
pub use timegrid::{
    SnapDirection, combine_date_and_time, enumerate_slots, local_date_in_tz, local_to_utc,
    parse_local_datetime, parse_timezone, snap_to_slot, start_of_day_in_tz, start_of_local_date,
    utc_to_local, weekday_in_tz,
};

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::model::Ms;
use crate::store::BookingStore;

/// The write-path facade: booking creation, cancellation, and hours-change
/// resolution against an injected store and clock. All analysis functions
/// in this module tree are free functions and take no engine.
pub struct Engine<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: BookingStore> Engine<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn with_system_clock(store: Arc<S>) -> Self {
        Self::new(store, Arc::new(SystemClock))
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn now_ms(&self) -> Ms {
        self.clock.now_ms()
    }
}
