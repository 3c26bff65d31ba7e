use chrono::{Datelike, Timelike};
use chrono_tz::Tz;

use crate::model::{Ms, OpeningHours, SLOT_MS, Weekday};

use super::error::EngineError;
use super::timegrid;

/// An opening-hours table is well-formed only if every present day closes
/// strictly after it opens.
pub fn validate_hours(hours: &OpeningHours) -> Result<(), EngineError> {
    for day in Weekday::ALL {
        if let Some(window) = hours.for_weekday(day)
            && window.close <= window.open
        {
            return Err(EngineError::Validation(format!(
                "{day} opening hours: close {} must be after open {}",
                window.close, window.open
            )));
        }
    }
    Ok(())
}

/// Whether one slot lies entirely inside its local weekday's window.
/// Both bounds are inclusive-equal: a slot starting exactly at open or
/// ending exactly at close is within hours. A closed day admits nothing.
pub fn slot_within_hours(slot_start: Ms, hours: &OpeningHours, tz: Tz) -> bool {
    let local = timegrid::utc_to_local(slot_start, tz);
    let day = Weekday::from(local.weekday());
    let Some(window) = hours.for_weekday(day) else {
        return false;
    };
    let start_min = local.hour() * 60 + local.minute();
    // A slot whose local end passes midnight can never satisfy close.
    let end_min = start_min + (SLOT_MS / 60_000) as u32;
    start_min >= window.open.minutes() as u32 && end_min <= window.close.minutes() as u32
}

/// Whether every constituent slot of `[start, end)` individually satisfies
/// its own local weekday's window. Each slot is judged against the day it
/// falls on, so a range crossing local midnight always fails — overnight
/// bookings are rejected here, not by a separate rule.
pub fn range_within_hours(start: Ms, end: Ms, hours: &OpeningHours, tz: Tz) -> bool {
    timegrid::enumerate_slots(start, end)
        .into_iter()
        .all(|slot| slot_within_hours(slot, hours, tz))
}

/// The open slot grid of the local calendar day containing `instant`:
/// every slot between that day's open and close, or empty when closed.
pub fn slots_for_local_day(
    instant: Ms,
    hours: &OpeningHours,
    tz: Tz,
) -> Result<Vec<Ms>, EngineError> {
    let day = timegrid::weekday_in_tz(instant, tz);
    let Some(window) = hours.for_weekday(day) else {
        return Ok(Vec::new());
    };
    let open = timegrid::combine_date_and_time(instant, window.open, tz)?;
    let close = timegrid::combine_date_and_time(instant, window.close, tz)?;
    Ok(timegrid::enumerate_slots(open, close))
}
