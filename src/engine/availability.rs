use std::collections::HashSet;

use chrono::Timelike;
use chrono_tz::Tz;

use crate::limits::MAX_PROJECTION_WINDOW_MS;
use crate::model::{
    Booking, BookedSlot, BookedSlotIndex, DayAvailability, Ms, OpeningHours, SLOT_MS,
    SlotAvailability, SlotRecord, Span, TimeOfDay,
};

use super::error::EngineError;
use super::hours::slots_for_local_day;
use super::timegrid;

/// Project bookable state over a date range: one entry per local calendar
/// day touched by `[range_start, range_end)`, each carrying that day's
/// full slot grid — closed slots are included and marked, not skipped.
///
/// Classification runs in fixed priority order: past, then outside-hours,
/// then booked, then available. Callers rely on reason stability — a slot
/// that is simultaneously past, closed, and booked reports "past".
pub fn project_availability(
    range_start: Ms,
    range_end: Ms,
    hours: &OpeningHours,
    tz: Tz,
    booked: &BookedSlotIndex,
    now: Ms,
) -> Result<Vec<DayAvailability>, EngineError> {
    if range_end <= range_start {
        return Ok(Vec::new());
    }
    if range_end - range_start > MAX_PROJECTION_WINDOW_MS {
        return Err(EngineError::LimitExceeded("projection window too wide"));
    }

    let mut days = Vec::new();
    let mut date = timegrid::local_date_in_tz(range_start, tz);
    loop {
        let day_start = timegrid::start_of_local_date(date, tz)?;
        if day_start >= range_end {
            break;
        }
        let next_date = date
            .succ_opt()
            .ok_or(EngineError::LimitExceeded("date out of range"))?;
        let day_end = timegrid::start_of_local_date(next_date, tz)?;

        let open_slots: HashSet<Ms> = slots_for_local_day(day_start, hours, tz)?
            .into_iter()
            .collect();

        let mut slots = Vec::new();
        for slot in timegrid::enumerate_slots(day_start, day_end) {
            let availability = if slot < now {
                SlotAvailability::Past
            } else if !open_slots.contains(&slot) {
                SlotAvailability::OutsideHours
            } else if let Some(flags) = booked.get(&slot) {
                SlotAvailability::Booked {
                    owned_by_viewer: flags.owned_by_viewer,
                    attended_by_viewer: flags.attended_by_viewer,
                }
            } else {
                SlotAvailability::Available
            };
            slots.push(SlotRecord {
                start: slot,
                end: slot + SLOT_MS,
                availability,
            });
        }

        days.push(DayAvailability { date, slots });
        date = next_date;
    }
    Ok(days)
}

/// Drop slots whose local time-of-day falls outside `[from, to)`.
/// Availability classifications are untouched.
pub fn apply_time_window_filter(
    days: Vec<DayAvailability>,
    from: TimeOfDay,
    to: TimeOfDay,
    tz: Tz,
) -> Vec<DayAvailability> {
    days.into_iter()
        .map(|mut day| {
            day.slots.retain(|slot| {
                let local = timegrid::utc_to_local(slot.start, tz);
                let minutes = (local.hour() * 60 + local.minute()) as u16;
                minutes >= from.minutes() && minutes < to.minutes()
            });
            day
        })
        .collect()
}

/// Merge adjacent available slots into maximal contiguous runs and keep
/// those meeting the minimum duration.
pub fn find_contiguous_available_runs(
    days: &[DayAvailability],
    min_duration_minutes: i64,
) -> Vec<Span> {
    let mut runs: Vec<Span> = Vec::new();
    for slot in days.iter().flat_map(|d| d.slots.iter()) {
        if !slot.availability.is_available() {
            continue;
        }
        if let Some(last) = runs.last_mut()
            && last.end == slot.start
        {
            last.end = slot.end;
            continue;
        }
        runs.push(Span::new(slot.start, slot.end));
    }
    runs.retain(|r| r.duration_ms() >= min_duration_minutes * 60_000);
    runs
}

/// Build the booked-slot index the projector consumes: every slot of every
/// active booking, flagged relative to `viewer`.
pub fn build_slot_index(bookings: &[Booking], viewer: ulid::Ulid) -> BookedSlotIndex {
    let mut index = BookedSlotIndex::new();
    for booking in bookings.iter().filter(|b| b.is_active()) {
        let flags = BookedSlot {
            owned_by_viewer: booking.owner == viewer,
            attended_by_viewer: booking.attendees.contains(&viewer),
        };
        for slot in timegrid::enumerate_slots(booking.span.start, booking.span.end) {
            index.insert(slot, flags);
        }
    }
    index
}
