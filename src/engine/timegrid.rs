use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::model::{Ms, SLOT_MS, TimeOfDay, Weekday};

use super::error::EngineError;

/// Rounding mode for [`snap_to_slot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapDirection {
    Floor,
    Ceil,
    /// Nearest boundary; a tie (exactly half a slot) goes to floor.
    Round,
}

pub fn parse_timezone(name: &str) -> Result<Tz, EngineError> {
    name.parse::<Tz>()
        .map_err(|_| EngineError::Validation(format!("unknown timezone '{name}'")))
}

/// Parse a local datetime in `"YYYY-MM-DDTHH:mm"` form (seconds optional).
pub fn parse_local_datetime(s: &str) -> Result<NaiveDateTime, EngineError> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
        .map_err(|_| {
            EngineError::Validation(format!(
                "invalid local datetime '{s}', expected YYYY-MM-DDTHH:mm"
            ))
        })
}

/// Interpret a naive wall-clock time in `tz` and return the UTC instant.
/// Ambiguous and nonexistent local times (offset transitions) are rejected
/// rather than resolved by guessing.
pub fn local_to_utc(local: NaiveDateTime, tz: Tz) -> Result<Ms, EngineError> {
    use chrono::offset::LocalResult;
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Ok(dt.timestamp_millis()),
        LocalResult::Ambiguous(..) => Err(EngineError::Validation(format!(
            "ambiguous local time {local} in {tz}"
        ))),
        LocalResult::None => Err(EngineError::Validation(format!(
            "nonexistent local time {local} in {tz}"
        ))),
    }
}

pub fn utc_to_local(instant: Ms, tz: Tz) -> NaiveDateTime {
    utc_datetime(instant).with_timezone(&tz).naive_local()
}

fn utc_datetime(instant: Ms) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(instant).expect("instant within supported range")
}

/// Round an instant onto the 30-minute grid. Euclidean remainder, so
/// pre-epoch instants snap the same way as post-epoch ones.
pub fn snap_to_slot(instant: Ms, direction: SnapDirection) -> Ms {
    let rem = instant.rem_euclid(SLOT_MS);
    match direction {
        SnapDirection::Floor => instant - rem,
        SnapDirection::Ceil => {
            if rem == 0 {
                instant
            } else {
                instant - rem + SLOT_MS
            }
        }
        SnapDirection::Round => {
            if rem * 2 > SLOT_MS {
                instant - rem + SLOT_MS
            } else {
                instant - rem
            }
        }
    }
}

/// Every slot start in `[floor(start), end)`, stepping one slot at a time.
/// Empty when `end <= start`.
pub fn enumerate_slots(start: Ms, end: Ms) -> Vec<Ms> {
    if end <= start {
        return Vec::new();
    }
    let mut slots = Vec::new();
    let mut cur = snap_to_slot(start, SnapDirection::Floor);
    while cur < end {
        slots.push(cur);
        cur += SLOT_MS;
    }
    slots
}

/// The local calendar weekday containing `instant` — shifts across UTC day
/// boundaries near local midnight.
pub fn weekday_in_tz(instant: Ms, tz: Tz) -> Weekday {
    Weekday::from(utc_to_local(instant, tz).weekday())
}

pub fn local_date_in_tz(instant: Ms, tz: Tz) -> NaiveDate {
    utc_to_local(instant, tz).date()
}

/// The UTC instant of 00:00 local on `date`.
pub fn start_of_local_date(date: NaiveDate, tz: Tz) -> Result<Ms, EngineError> {
    local_to_utc(date.and_time(NaiveTime::MIN), tz)
}

/// The UTC instant of 00:00 local on the local calendar date containing
/// `instant`.
pub fn start_of_day_in_tz(instant: Ms, tz: Tz) -> Result<Ms, EngineError> {
    start_of_local_date(local_date_in_tz(instant, tz), tz)
}

/// Combine the local calendar date of `reference` with a time of day into
/// a UTC instant.
pub fn combine_date_and_time(reference: Ms, time: TimeOfDay, tz: Tz) -> Result<Ms, EngineError> {
    let date = local_date_in_tz(reference, tz);
    let naive = date
        .and_hms_opt(time.hour() as u32, time.minute() as u32, 0)
        .expect("time of day below 24:00");
    local_to_utc(naive, tz)
}
