use ulid::Ulid;

use crate::limits::*;
use crate::model::{AuditAction, AuditRecord, Booking, OpeningHours, Span};
use crate::observability;
use crate::store::{BookingStore, MutationOutcome, StoreError};

use super::error::EngineError;
use super::hours::{slot_within_hours, validate_hours};
use super::timegrid::{
    SnapDirection, enumerate_slots, local_to_utc, parse_local_datetime, parse_timezone,
    snap_to_slot, weekday_in_tz,
};
use super::Engine;

/// A proposed booking. Local endpoints arrive as `"YYYY-MM-DDTHH:mm"`
/// wall-clock strings in the room's timezone; the engine snaps them
/// outward onto the slot grid.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub room_id: Ulid,
    pub owner: Ulid,
    pub timezone: String,
    pub hours: OpeningHours,
    pub start_local: String,
    pub end_local: String,
    pub note: Option<String>,
    pub attendees: Vec<Ulid>,
}

fn validate_span(span: &Span) -> Result<(), EngineError> {
    if span.start < MIN_VALID_TIMESTAMP_MS || span.end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if span.duration_ms() > MAX_BOOKING_SPAN_MS {
        return Err(EngineError::LimitExceeded("booking span too wide"));
    }
    Ok(())
}

impl<S: BookingStore> Engine<S> {
    /// The atomic create path. The request is widened, never narrowed, to
    /// the enclosing slot grid (start floors, end ceils), validated against
    /// the clock and the opening hours, then every constituent slot is
    /// reserved in one all-or-nothing store operation. A lost race surfaces
    /// as [`EngineError::SlotConflict`], not a generic failure.
    pub async fn create_booking(&self, req: BookingRequest) -> Result<Booking, EngineError> {
        let started = std::time::Instant::now();

        validate_hours(&req.hours)?;
        if let Some(ref note) = req.note
            && note.len() > MAX_NOTE_LEN
        {
            return Err(EngineError::LimitExceeded("note too long"));
        }
        let tz = parse_timezone(&req.timezone)?;
        let start_utc = local_to_utc(parse_local_datetime(&req.start_local)?, tz)?;
        let end_utc = local_to_utc(parse_local_datetime(&req.end_local)?, tz)?;

        let start = snap_to_slot(start_utc, SnapDirection::Floor);
        let end = snap_to_slot(end_utc, SnapDirection::Ceil);

        let now = self.now_ms();
        if start < now {
            return Err(EngineError::PastBooking { start });
        }
        if end <= start {
            return Err(EngineError::InvalidRange { start, end });
        }
        let span = Span::new(start, end);
        validate_span(&span)?;

        let slots = enumerate_slots(start, end);
        if let Some(&outside) = slots.iter().find(|&&s| !slot_within_hours(s, &req.hours, tz)) {
            let weekday = weekday_in_tz(outside, tz);
            return Err(EngineError::OutsideHours {
                weekday,
                hours: req.hours.for_weekday(weekday),
            });
        }

        let booking = Booking {
            id: Ulid::new(),
            room_id: req.room_id,
            owner: req.owner,
            span,
            cancelled_at: None,
            note: req.note,
            attendees: req.attendees,
        };
        let audit = AuditRecord {
            id: Ulid::new(),
            actor: req.owner,
            action: AuditAction::BookingCreated,
            booking_id: booking.id,
            at: now,
            metadata: serde_json::json!({
                "room_id": booking.room_id.to_string(),
                "start": span.start,
                "end": span.end,
            }),
        };

        match self.store().insert_booking(&booking, &slots, audit).await {
            Ok(()) => {
                metrics::counter!(observability::BOOKINGS_CREATED_TOTAL).increment(1);
                metrics::histogram!(observability::BOOKING_CREATE_DURATION_SECONDS)
                    .record(started.elapsed().as_secs_f64());
                tracing::info!(
                    "booking {} confirmed on room {} [{}, {})",
                    booking.id,
                    booking.room_id,
                    span.start,
                    span.end
                );
                Ok(booking)
            }
            Err(StoreError::SlotConflict { slot }) => {
                metrics::counter!(observability::SLOT_CONFLICTS_TOTAL).increment(1);
                Err(EngineError::SlotConflict { slot })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Cancel a booking: stamps `cancelled_at = now` and releases only the
    /// not-yet-elapsed slots; elapsed slot rows stay for audit history.
    /// Cancelling an already-cancelled booking is a no-op.
    pub async fn cancel_booking(&self, booking_id: Ulid, actor: Ulid) -> Result<(), EngineError> {
        let now = self.now_ms();
        let booking = self
            .store()
            .get_booking(booking_id)
            .await?
            .ok_or(EngineError::NotFound(booking_id))?;

        let audit = AuditRecord {
            id: Ulid::new(),
            actor,
            action: AuditAction::BookingCancelled,
            booking_id,
            at: now,
            metadata: serde_json::json!({
                "start": booking.span.start,
                "end": booking.span.end,
            }),
        };

        match self
            .store()
            .cancel_booking(booking_id, now, now, audit)
            .await?
        {
            MutationOutcome::Applied => {
                metrics::counter!(observability::BOOKINGS_CANCELLED_TOTAL).increment(1);
                tracing::info!("booking {booking_id} cancelled");
                Ok(())
            }
            MutationOutcome::AlreadyCancelled => {
                tracing::debug!("booking {booking_id} already cancelled");
                Ok(())
            }
        }
    }
}
