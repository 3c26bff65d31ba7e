mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;
use ulid::Ulid;

use crate::model::{AuditRecord, Booking, Ms};

#[derive(Debug)]
pub enum StoreError {
    /// A `(room, slot-start)` row already belongs to another active booking.
    /// Distinct from `Backend` so callers can say "already booked" instead
    /// of "internal error".
    SlotConflict { slot: Ms },
    NotFound(Ulid),
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::SlotConflict { slot } => write!(f, "slot already owned: {slot}"),
            StoreError::NotFound(id) => write!(f, "not found: {id}"),
            StoreError::Backend(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Result of a cancel/truncate unit of work. An already-cancelled booking
/// is reported, not raised — the caller decides whether that matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Applied,
    AlreadyCancelled,
}

/// Persistence port. Every method is one transactional unit of work:
/// an implementation backed by a SQL store wraps the method body in a
/// single transaction with rollback on every exit path.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Insert the booking row, one slot-ownership row per entry of `slots`,
    /// and the audit entry, all-or-nothing. Must fail with
    /// [`StoreError::SlotConflict`] if any `(room, slot-start)` row exists,
    /// leaving no partial state behind.
    async fn insert_booking(
        &self,
        booking: &Booking,
        slots: &[Ms],
        audit: AuditRecord,
    ) -> Result<(), StoreError>;

    async fn get_booking(&self, id: Ulid) -> Result<Option<Booking>, StoreError>;

    /// Non-cancelled bookings on the room whose end is after `from`,
    /// ordered by start.
    async fn active_bookings_ending_after(
        &self,
        room_id: Ulid,
        from: Ms,
    ) -> Result<Vec<Booking>, StoreError>;

    /// Set the cancellation timestamp and delete slot rows starting at or
    /// after `release_from`. Earlier rows are retained for audit history.
    async fn cancel_booking(
        &self,
        id: Ulid,
        cancelled_at: Ms,
        release_from: Ms,
        audit: AuditRecord,
    ) -> Result<MutationOutcome, StoreError>;

    /// Shorten the booking to `new_end` and delete slot rows from `new_end`
    /// onward.
    async fn truncate_booking(
        &self,
        id: Ulid,
        new_end: Ms,
        audit: AuditRecord,
    ) -> Result<MutationOutcome, StoreError>;
}
