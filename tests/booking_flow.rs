//! End-to-end booking flow over the public API: a New York room with
//! Mon–Fri 08:00–20:00 hours, driven through snapping, rejection,
//! reservation, conflict, and availability projection.

use std::sync::Arc;

use ulid::Ulid;

use slotbook::clock::ManualClock;
use slotbook::engine::{
    self, BookingRequest, Engine, EngineError, build_slot_index, find_contiguous_available_runs,
    project_availability,
};
use slotbook::model::{
    DayHours, Ms, OpeningHours, SlotAvailability, TimeOfDay, Weekday,
};
use slotbook::store::{BookingStore, InMemoryStore};

const NY: &str = "America/New_York";

fn office_hours() -> OpeningHours {
    let window = DayHours {
        open: TimeOfDay::parse("08:00").unwrap(),
        close: TimeOfDay::parse("20:00").unwrap(),
    };
    let mut hours = OpeningHours::default();
    for day in [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
    ] {
        hours = hours.with(day, window);
    }
    hours
}

fn local_ms(s: &str) -> Ms {
    let tz = engine::parse_timezone(NY).unwrap();
    engine::local_to_utc(engine::parse_local_datetime(s).unwrap(), tz).unwrap()
}

fn request(room_id: Ulid, owner: Ulid, start: &str, end: &str) -> BookingRequest {
    BookingRequest {
        room_id,
        owner,
        timezone: NY.into(),
        hours: office_hours(),
        start_local: start.into(),
        end_local: end.into(),
        note: None,
        attendees: vec![],
    }
}

#[tokio::test]
async fn evening_booking_flow() {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::new(local_ms("2025-09-24T08:00")));
    let engine = Engine::new(store.clone(), clock);

    let room = Ulid::new();
    let alice = Ulid::new();
    let bob = Ulid::new();

    // 19:15–20:15 widens to 19:00–20:30; the 20:00 slot breaches closing.
    let err = engine
        .create_booking(request(room, alice, "2025-09-24T19:15", "2025-09-24T20:15"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::OutsideHours {
            weekday: Weekday::Wednesday,
            ..
        }
    ));

    // 19:00–20:00 fits exactly and reserves the 19:00 and 19:30 slots.
    let booking = engine
        .create_booking(request(room, alice, "2025-09-24T19:00", "2025-09-24T20:00"))
        .await
        .unwrap();
    assert_eq!(
        store.room_slots(room),
        vec![local_ms("2025-09-24T19:00"), local_ms("2025-09-24T19:30")]
    );

    // Bob's request shares the 19:30 slot and loses.
    let err = engine
        .create_booking(request(room, bob, "2025-09-24T19:30", "2025-09-24T20:00"))
        .await
        .unwrap_err();
    assert!(
        matches!(err, EngineError::SlotConflict { slot } if slot == local_ms("2025-09-24T19:30"))
    );

    // The room's slot rows are still exactly Alice's booking.
    assert_eq!(store.room_slots(room).len(), 2);
    assert_eq!(
        store.slot_owner(room, local_ms("2025-09-24T19:00")),
        Some(booking.id)
    );
}

#[tokio::test]
async fn availability_reflects_bookings_and_hours() {
    let store = Arc::new(InMemoryStore::new());
    let now = local_ms("2025-09-24T12:05");
    let clock = Arc::new(ManualClock::new(now));
    let engine = Engine::new(store.clone(), clock);
    let tz = engine::parse_timezone(NY).unwrap();

    let room = Ulid::new();
    let alice = Ulid::new();

    engine
        .create_booking(request(room, alice, "2025-09-24T14:00", "2025-09-24T15:00"))
        .await
        .unwrap();

    let bookings = store
        .active_bookings_ending_after(room, now)
        .await
        .unwrap();
    let index = build_slot_index(&bookings, alice);

    let days = project_availability(
        local_ms("2025-09-24T00:00"),
        local_ms("2025-09-25T00:00"),
        &office_hours(),
        tz,
        &index,
        now,
    )
    .unwrap();
    assert_eq!(days.len(), 1);
    let slots = &days[0].slots;

    let at = |s: &str| {
        slots
            .iter()
            .find(|r| r.start == local_ms(s))
            .expect("slot in grid")
            .availability
    };

    // Morning has elapsed, early hours are closed, the booked hour is
    // owner-flagged, and the evening is open.
    assert_eq!(at("2025-09-24T09:00"), SlotAvailability::Past);
    assert_eq!(at("2025-09-24T12:00"), SlotAvailability::Past); // started 12:00 < 12:05
    assert_eq!(
        at("2025-09-24T14:30"),
        SlotAvailability::Booked {
            owned_by_viewer: true,
            attended_by_viewer: false
        }
    );
    assert_eq!(at("2025-09-24T15:00"), SlotAvailability::Available);
    assert_eq!(at("2025-09-24T21:00"), SlotAvailability::OutsideHours);

    // The longest free run after the booking stretches to closing.
    let runs = find_contiguous_available_runs(&days, 60);
    assert_eq!(
        runs.last().map(|r| (r.start, r.end)),
        Some((local_ms("2025-09-24T15:00"), local_ms("2025-09-24T20:00")))
    );
}

#[tokio::test]
async fn shrinking_hours_truncates_and_cancels() {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::new(local_ms("2025-09-24T08:00")));
    let engine = Engine::new(store.clone(), clock);

    let room = Ulid::new();
    let admin = Ulid::new();

    let kept = engine
        .create_booking(request(room, Ulid::new(), "2025-09-24T09:00", "2025-09-24T10:00"))
        .await
        .unwrap();
    let shortened = engine
        .create_booking(request(room, Ulid::new(), "2025-09-24T17:30", "2025-09-24T18:30"))
        .await
        .unwrap();
    let doomed = engine
        .create_booking(request(room, Ulid::new(), "2025-09-24T19:00", "2025-09-24T20:00"))
        .await
        .unwrap();

    // Close at 18:00 instead of 20:00.
    let new_hours = {
        let window = DayHours {
            open: TimeOfDay::parse("08:00").unwrap(),
            close: TimeOfDay::parse("18:00").unwrap(),
        };
        let mut hours = OpeningHours::default();
        for day in [
            Weekday::Monday,
            Weekday::Tuesday,
            Weekday::Wednesday,
            Weekday::Thursday,
            Weekday::Friday,
        ] {
            hours = hours.with(day, window);
        }
        hours
    };

    let report = engine
        .analyze_hours_change(room, &new_hours, NY)
        .await
        .unwrap();
    assert_eq!(report.conflicts.len(), 2);

    let outcome = engine.apply_hours_change(&report, admin).await.unwrap();
    assert_eq!(outcome.truncated, 1);
    assert_eq!(outcome.cancelled, 1);
    assert!(outcome.failed.is_empty());

    let kept = store.get_booking(kept.id).await.unwrap().unwrap();
    assert!(kept.is_active());
    assert_eq!(kept.span.end, local_ms("2025-09-24T10:00"));

    let shortened = store.get_booking(shortened.id).await.unwrap().unwrap();
    assert!(shortened.is_active());
    assert_eq!(shortened.span.end, local_ms("2025-09-24T18:00"));

    let doomed = store.get_booking(doomed.id).await.unwrap().unwrap();
    assert!(!doomed.is_active());

    // Slot rows: kept booking intact, shortened keeps 17:30 only, doomed gone.
    assert_eq!(
        store.room_slots(room),
        vec![
            local_ms("2025-09-24T09:00"),
            local_ms("2025-09-24T09:30"),
            local_ms("2025-09-24T17:30"),
        ]
    );
}
