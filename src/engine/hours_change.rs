use ulid::Ulid;

use crate::limits::HOURS_CHANGE_WARN_THRESHOLD;
use crate::model::{
    AuditAction, AuditRecord, BookingConflict, ConflictAction, HoursChangeOutcome,
    HoursChangeReport, OpeningHours,
};
use crate::observability;
use crate::store::{BookingStore, MutationOutcome};

use super::error::EngineError;
use super::hours::{range_within_hours, slot_within_hours, validate_hours};
use super::timegrid::{combine_date_and_time, parse_timezone, weekday_in_tz};
use super::Engine;

impl<S: BookingStore> Engine<S> {
    /// Phase 1 of an opening-hours change: classify every active
    /// future-or-ongoing booking of the room against the proposed table.
    /// Read-only and idempotent — call as often as needed to preview.
    ///
    /// A booking whose whole range still fits is unaffected. One whose
    /// first slot still fits is truncated to the new closing time of its
    /// start day. One whose start itself no longer fits is cancelled.
    pub async fn analyze_hours_change(
        &self,
        room_id: Ulid,
        new_hours: &OpeningHours,
        timezone: &str,
    ) -> Result<HoursChangeReport, EngineError> {
        validate_hours(new_hours)?;
        let tz = parse_timezone(timezone)?;
        let now = self.now_ms();

        let bookings = self.store().active_bookings_ending_after(room_id, now).await?;

        let mut conflicts = Vec::new();
        for booking in &bookings {
            if range_within_hours(booking.span.start, booking.span.end, new_hours, tz) {
                continue;
            }
            let weekday = weekday_in_tz(booking.span.start, tz);
            if slot_within_hours(booking.span.start, new_hours, tz) {
                let window = new_hours
                    .for_weekday(weekday)
                    .expect("day is open: first slot fits");
                let new_end = combine_date_and_time(booking.span.start, window.close, tz)?;
                conflicts.push(BookingConflict {
                    booking_id: booking.id,
                    owner: booking.owner,
                    span: booking.span,
                    action: ConflictAction::Truncate { new_end },
                    reason: format!(
                        "booking extends past the new {weekday} closing time {}",
                        window.close
                    ),
                });
            } else {
                let reason = match new_hours.for_weekday(weekday) {
                    Some(window) => format!(
                        "booking falls outside the new {weekday} hours {}-{}",
                        window.open, window.close
                    ),
                    None => format!("room is now closed on {weekday}"),
                };
                conflicts.push(BookingConflict {
                    booking_id: booking.id,
                    owner: booking.owner,
                    span: booking.span,
                    action: ConflictAction::Cancel,
                    reason,
                });
            }
        }

        let cancels = conflicts
            .iter()
            .filter(|c| c.action == ConflictAction::Cancel)
            .count();
        let truncates = conflicts.len() - cancels;

        let mut warnings = Vec::new();
        if cancels > 0 {
            warnings.push(format!("{cancels} booking(s) will be cancelled"));
        }
        if truncates > 0 {
            warnings.push(format!("{truncates} booking(s) will be shortened"));
        }
        if conflicts.len() > HOURS_CHANGE_WARN_THRESHOLD {
            warnings.push(format!(
                "{} bookings affected; consider giving owners advance notice",
                conflicts.len()
            ));
        }

        metrics::counter!(observability::HOURS_CHANGES_ANALYZED_TOTAL).increment(1);
        Ok(HoursChangeReport { conflicts, warnings })
    }

    /// Phase 2: apply a report's mutations, one store transaction per
    /// booking. Failures are collected, not propagated — one booking's
    /// failure must not block the rest. Already-cancelled bookings are
    /// counted as skipped, never raised. The room's own hours row is the
    /// caller's write, not ours.
    pub async fn apply_hours_change(
        &self,
        report: &HoursChangeReport,
        actor: Ulid,
    ) -> Result<HoursChangeOutcome, EngineError> {
        let now = self.now_ms();
        let mut outcome = HoursChangeOutcome::default();

        for conflict in &report.conflicts {
            let result = match conflict.action {
                ConflictAction::Cancel => {
                    let audit = AuditRecord {
                        id: Ulid::new(),
                        actor,
                        action: AuditAction::BookingCancelled,
                        booking_id: conflict.booking_id,
                        at: now,
                        metadata: serde_json::json!({
                            "start": conflict.span.start,
                            "end": conflict.span.end,
                            "reason": conflict.reason,
                        }),
                    };
                    self.store()
                        .cancel_booking(conflict.booking_id, now, now, audit)
                        .await
                }
                ConflictAction::Truncate { new_end } => {
                    let audit = AuditRecord {
                        id: Ulid::new(),
                        actor,
                        action: AuditAction::BookingTruncated,
                        booking_id: conflict.booking_id,
                        at: now,
                        metadata: serde_json::json!({
                            "old_end": conflict.span.end,
                            "new_end": new_end,
                            "reason": conflict.reason,
                        }),
                    };
                    self.store()
                        .truncate_booking(conflict.booking_id, new_end, audit)
                        .await
                }
            };

            match result {
                Ok(MutationOutcome::Applied) => match conflict.action {
                    ConflictAction::Cancel => {
                        metrics::counter!(observability::BOOKINGS_CANCELLED_TOTAL).increment(1);
                        tracing::info!(
                            "booking {} cancelled by hours change: {}",
                            conflict.booking_id,
                            conflict.reason
                        );
                        outcome.cancelled += 1;
                    }
                    ConflictAction::Truncate { new_end } => {
                        metrics::counter!(observability::BOOKINGS_TRUNCATED_TOTAL).increment(1);
                        tracing::info!(
                            "booking {} truncated to {} by hours change",
                            conflict.booking_id,
                            new_end
                        );
                        outcome.truncated += 1;
                    }
                },
                Ok(MutationOutcome::AlreadyCancelled) => {
                    tracing::debug!("booking {} already cancelled, skipping", conflict.booking_id);
                    outcome.skipped += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        "hours change could not update booking {}: {e}",
                        conflict.booking_id
                    );
                    outcome.failed.push((conflict.booking_id, e.to_string()));
                }
            }
        }

        Ok(outcome)
    }
}
