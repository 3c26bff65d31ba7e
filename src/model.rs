use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — the only instant type.
pub type Ms = i64;

/// The fixed reservation grid: 30 minutes.
pub const SLOT_MS: Ms = 30 * 60 * 1000;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }
}

/// Calendar weekday — the key of an [`OpeningHours`] table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
            Weekday::Saturday => "Saturday",
            Weekday::Sunday => "Sunday",
        }
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => Weekday::Monday,
            chrono::Weekday::Tue => Weekday::Tuesday,
            chrono::Weekday::Wed => Weekday::Wednesday,
            chrono::Weekday::Thu => Weekday::Thursday,
            chrono::Weekday::Fri => Weekday::Friday,
            chrono::Weekday::Sat => Weekday::Saturday,
            chrono::Weekday::Sun => Weekday::Sunday,
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Local wall-clock time of day as minutes since midnight, `0..1440`.
/// Parses from and displays as 24-hour `"HH:mm"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub fn from_minutes(minutes: u16) -> Option<Self> {
        (minutes < 24 * 60).then_some(Self(minutes))
    }

    /// Parse a 24-hour `"HH:mm"` string. Out-of-range components are
    /// rejected, never clamped.
    pub fn parse(s: &str) -> Option<Self> {
        let (h, m) = s.split_once(':')?;
        if h.len() != 2 || m.len() != 2 {
            return None;
        }
        let hour: u16 = h.parse().ok()?;
        let minute: u16 = m.parse().ok()?;
        if hour >= 24 || minute >= 60 {
            return None;
        }
        Some(Self(hour * 60 + minute))
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    pub fn hour(self) -> u16 {
        self.0 / 60
    }

    pub fn minute(self) -> u16 {
        self.0 % 60
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        TimeOfDay::parse(&s).ok_or_else(|| format!("invalid time of day '{s}', expected HH:mm"))
    }
}

impl From<TimeOfDay> for String {
    fn from(t: TimeOfDay) -> Self {
        t.to_string()
    }
}

/// One weekday's operating window. Well-formed only when `close > open`;
/// checked by `engine::validate_hours`, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayHours {
    pub open: TimeOfDay,
    pub close: TimeOfDay,
}

/// Per-weekday operating windows. An absent day is closed all day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpeningHours {
    pub monday: Option<DayHours>,
    pub tuesday: Option<DayHours>,
    pub wednesday: Option<DayHours>,
    pub thursday: Option<DayHours>,
    pub friday: Option<DayHours>,
    pub saturday: Option<DayHours>,
    pub sunday: Option<DayHours>,
}

impl OpeningHours {
    pub fn for_weekday(&self, day: Weekday) -> Option<DayHours> {
        match day {
            Weekday::Monday => self.monday,
            Weekday::Tuesday => self.tuesday,
            Weekday::Wednesday => self.wednesday,
            Weekday::Thursday => self.thursday,
            Weekday::Friday => self.friday,
            Weekday::Saturday => self.saturday,
            Weekday::Sunday => self.sunday,
        }
    }

    pub fn with(mut self, day: Weekday, hours: DayHours) -> Self {
        let entry = match day {
            Weekday::Monday => &mut self.monday,
            Weekday::Tuesday => &mut self.tuesday,
            Weekday::Wednesday => &mut self.wednesday,
            Weekday::Thursday => &mut self.thursday,
            Weekday::Friday => &mut self.friday,
            Weekday::Saturday => &mut self.saturday,
            Weekday::Sunday => &mut self.sunday,
        };
        *entry = Some(hours);
        self
    }
}

/// A physical location. The timezone is a validated IANA name and is never
/// rewritten once rooms and bookings reference it — stored UTC instants
/// would silently change meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: Ulid,
    pub name: String,
    pub timezone: String,
}

/// A bookable room. Capacity is informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: Ulid,
    pub site_id: Ulid,
    pub name: String,
    pub capacity: u32,
    pub hours: OpeningHours,
}

/// A confirmed reservation of the contiguous slot run `[span.start, span.end)`.
/// Never physically deleted; cancellation sets `cancelled_at` and releases
/// only the not-yet-elapsed slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub room_id: Ulid,
    pub owner: Ulid,
    pub span: Span,
    pub cancelled_at: Option<Ms>,
    pub note: Option<String>,
    pub attendees: Vec<Ulid>,
}

impl Booking {
    pub fn is_active(&self) -> bool {
        self.cancelled_at.is_none()
    }
}

// ── Availability projection results ──────────────────────────────

/// Why an unavailable slot is unavailable. Precedence is fixed:
/// past beats outside-hours beats booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AvailabilityReason {
    Past,
    OutsideHours,
    Booked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "state")]
pub enum SlotAvailability {
    Available,
    Past,
    OutsideHours,
    Booked {
        owned_by_viewer: bool,
        attended_by_viewer: bool,
    },
}

impl SlotAvailability {
    pub fn is_available(&self) -> bool {
        matches!(self, SlotAvailability::Available)
    }

    pub fn reason(&self) -> Option<AvailabilityReason> {
        match self {
            SlotAvailability::Available => None,
            SlotAvailability::Past => Some(AvailabilityReason::Past),
            SlotAvailability::OutsideHours => Some(AvailabilityReason::OutsideHours),
            SlotAvailability::Booked { .. } => Some(AvailabilityReason::Booked),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotRecord {
    pub start: Ms,
    pub end: Ms,
    pub availability: SlotAvailability,
}

/// One local calendar day's full slot grid, closed slots included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub slots: Vec<SlotRecord>,
}

/// Viewer-relative flags for a booked slot, pre-computed by the caller
/// from the persistence layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BookedSlot {
    pub owned_by_viewer: bool,
    pub attended_by_viewer: bool,
}

/// Slot-start instant → viewer flags, for the rooms/date-range under query.
pub type BookedSlotIndex = HashMap<Ms, BookedSlot>;

// ── Hours-change resolution results ──────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "action")]
pub enum ConflictAction {
    Truncate { new_end: Ms },
    Cancel,
}

/// One affected booking from an hours-change analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingConflict {
    pub booking_id: Ulid,
    pub owner: Ulid,
    pub span: Span,
    pub action: ConflictAction,
    pub reason: String,
}

/// Transient preview of an hours change — not persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HoursChangeReport {
    pub conflicts: Vec<BookingConflict>,
    pub warnings: Vec<String>,
}

impl HoursChangeReport {
    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }
}

/// What the apply phase actually did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HoursChangeOutcome {
    pub cancelled: usize,
    pub truncated: usize,
    pub skipped: usize,
    pub failed: Vec<(Ulid, String)>,
}

// ── Audit trail ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    BookingCreated,
    BookingCancelled,
    BookingTruncated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Ulid,
    pub actor: Ulid,
    pub action: AuditAction,
    pub booking_id: Ulid,
    pub at: Ms,
    pub metadata: serde_json::Value,
}
