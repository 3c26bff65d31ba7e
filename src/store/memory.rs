use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use ulid::Ulid;

use crate::model::{AuditRecord, Booking, Ms, SLOT_MS};

use super::{BookingStore, MutationOutcome, StoreError};

/// Reference store. The `slots` map is the uniqueness constraint on
/// `(room, slot-start)`; `tx` scopes each trait method so the existence
/// check and the writes are observed as one atomic unit.
pub struct InMemoryStore {
    bookings: DashMap<Ulid, Booking>,
    slots: DashMap<(Ulid, Ms), Ulid>,
    room_bookings: DashMap<Ulid, Vec<Ulid>>,
    audit: Mutex<Vec<AuditRecord>>,
    tx: tokio::sync::Mutex<()>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            bookings: DashMap::new(),
            slots: DashMap::new(),
            room_bookings: DashMap::new(),
            audit: Mutex::new(Vec::new()),
            tx: tokio::sync::Mutex::new(()),
        }
    }

    fn push_audit(&self, record: AuditRecord) {
        self.audit
            .lock()
            .expect("audit mutex poisoned")
            .push(record);
    }

    // ── Inspection helpers for embedders and tests ───────────

    pub fn audit_entries(&self) -> Vec<AuditRecord> {
        self.audit.lock().expect("audit mutex poisoned").clone()
    }

    pub fn slot_owner(&self, room_id: Ulid, slot: Ms) -> Option<Ulid> {
        self.slots.get(&(room_id, slot)).map(|e| *e.value())
    }

    /// All slot-ownership rows for a room, sorted by slot start.
    pub fn room_slots(&self, room_id: Ulid) -> Vec<Ms> {
        let mut owned: Vec<Ms> = self
            .slots
            .iter()
            .filter(|e| e.key().0 == room_id)
            .map(|e| e.key().1)
            .collect();
        owned.sort_unstable();
        owned
    }

    pub fn bookings_for_room(&self, room_id: Ulid) -> Vec<Booking> {
        let ids = self
            .room_bookings
            .get(&room_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        let mut out: Vec<Booking> = ids
            .iter()
            .filter_map(|id| self.bookings.get(id).map(|b| b.clone()))
            .collect();
        out.sort_by_key(|b| b.span.start);
        out
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn insert_booking(
        &self,
        booking: &Booking,
        slots: &[Ms],
        audit: AuditRecord,
    ) -> Result<(), StoreError> {
        let _tx = self.tx.lock().await;

        // Check every row before writing any: failure leaves no partial state.
        for &slot in slots {
            if self.slots.contains_key(&(booking.room_id, slot)) {
                return Err(StoreError::SlotConflict { slot });
            }
        }

        self.bookings.insert(booking.id, booking.clone());
        for &slot in slots {
            self.slots.insert((booking.room_id, slot), booking.id);
        }
        self.room_bookings
            .entry(booking.room_id)
            .or_default()
            .push(booking.id);
        self.push_audit(audit);
        Ok(())
    }

    async fn get_booking(&self, id: Ulid) -> Result<Option<Booking>, StoreError> {
        Ok(self.bookings.get(&id).map(|b| b.clone()))
    }

    async fn active_bookings_ending_after(
        &self,
        room_id: Ulid,
        from: Ms,
    ) -> Result<Vec<Booking>, StoreError> {
        let ids = self
            .room_bookings
            .get(&room_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        let mut out: Vec<Booking> = ids
            .iter()
            .filter_map(|id| self.bookings.get(id).map(|b| b.clone()))
            .filter(|b| b.is_active() && b.span.end > from)
            .collect();
        out.sort_by_key(|b| b.span.start);
        Ok(out)
    }

    async fn cancel_booking(
        &self,
        id: Ulid,
        cancelled_at: Ms,
        release_from: Ms,
        audit: AuditRecord,
    ) -> Result<MutationOutcome, StoreError> {
        let _tx = self.tx.lock().await;

        let (room_id, span) = {
            let mut booking = self.bookings.get_mut(&id).ok_or(StoreError::NotFound(id))?;
            if booking.cancelled_at.is_some() {
                return Ok(MutationOutcome::AlreadyCancelled);
            }
            booking.cancelled_at = Some(cancelled_at);
            (booking.room_id, booking.span)
        };

        let mut slot = span.start;
        while slot < span.end {
            if slot >= release_from {
                self.slots.remove(&(room_id, slot));
            }
            slot += SLOT_MS;
        }
        self.push_audit(audit);
        Ok(MutationOutcome::Applied)
    }

    async fn truncate_booking(
        &self,
        id: Ulid,
        new_end: Ms,
        audit: AuditRecord,
    ) -> Result<MutationOutcome, StoreError> {
        let _tx = self.tx.lock().await;

        let (room_id, old_span) = {
            let mut booking = self.bookings.get_mut(&id).ok_or(StoreError::NotFound(id))?;
            if booking.cancelled_at.is_some() {
                return Ok(MutationOutcome::AlreadyCancelled);
            }
            let old = booking.span;
            if new_end < old.end {
                booking.span.end = new_end;
            }
            (booking.room_id, old)
        };

        let mut slot = old_span.start;
        while slot < old_span.end {
            if slot >= new_end {
                self.slots.remove(&(room_id, slot));
            }
            slot += SLOT_MS;
        }
        self.push_audit(audit);
        Ok(MutationOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AuditAction, Span};

    fn booking(room_id: Ulid, start: Ms, end: Ms) -> Booking {
        Booking {
            id: Ulid::new(),
            room_id,
            owner: Ulid::new(),
            span: Span::new(start, end),
            cancelled_at: None,
            note: None,
            attendees: vec![],
        }
    }

    fn audit(action: AuditAction, booking_id: Ulid) -> AuditRecord {
        AuditRecord {
            id: Ulid::new(),
            actor: Ulid::new(),
            action,
            booking_id,
            at: 0,
            metadata: serde_json::Value::Null,
        }
    }

    fn slot_run(start: Ms, end: Ms) -> Vec<Ms> {
        let mut out = Vec::new();
        let mut s = start;
        while s < end {
            out.push(s);
            s += SLOT_MS;
        }
        out
    }

    #[tokio::test]
    async fn insert_reserves_all_slots() {
        let store = InMemoryStore::new();
        let room = Ulid::new();
        let b = booking(room, 0, 2 * SLOT_MS);

        store
            .insert_booking(&b, &slot_run(0, 2 * SLOT_MS), audit(AuditAction::BookingCreated, b.id))
            .await
            .unwrap();

        assert_eq!(store.slot_owner(room, 0), Some(b.id));
        assert_eq!(store.slot_owner(room, SLOT_MS), Some(b.id));
        assert_eq!(store.room_slots(room).len(), 2);
        assert_eq!(store.audit_entries().len(), 1);
    }

    #[tokio::test]
    async fn conflicting_insert_leaves_no_partial_state() {
        let store = InMemoryStore::new();
        let room = Ulid::new();
        let first = booking(room, SLOT_MS, 2 * SLOT_MS);
        store
            .insert_booking(&first, &[SLOT_MS], audit(AuditAction::BookingCreated, first.id))
            .await
            .unwrap();

        // Second booking wants [0, 2 slots) — its second slot collides.
        let second = booking(room, 0, 2 * SLOT_MS);
        let err = store
            .insert_booking(
                &second,
                &slot_run(0, 2 * SLOT_MS),
                audit(AuditAction::BookingCreated, second.id),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::SlotConflict { slot } if slot == SLOT_MS));

        // No row from the failed attempt survives, including slot 0.
        assert_eq!(store.slot_owner(room, 0), None);
        assert!(store.get_booking(second.id).await.unwrap().is_none());
        assert_eq!(store.audit_entries().len(), 1);
    }

    #[tokio::test]
    async fn cancel_releases_only_future_slots() {
        let store = InMemoryStore::new();
        let room = Ulid::new();
        let b = booking(room, 0, 4 * SLOT_MS);
        store
            .insert_booking(&b, &slot_run(0, 4 * SLOT_MS), audit(AuditAction::BookingCreated, b.id))
            .await
            .unwrap();

        // "Now" is mid-booking: the first two slots have elapsed.
        let outcome = store
            .cancel_booking(b.id, 2 * SLOT_MS, 2 * SLOT_MS, audit(AuditAction::BookingCancelled, b.id))
            .await
            .unwrap();
        assert_eq!(outcome, MutationOutcome::Applied);
        assert_eq!(store.room_slots(room), vec![0, SLOT_MS]);

        let stored = store.get_booking(b.id).await.unwrap().unwrap();
        assert_eq!(stored.cancelled_at, Some(2 * SLOT_MS));
    }

    #[tokio::test]
    async fn cancel_twice_is_a_noop() {
        let store = InMemoryStore::new();
        let room = Ulid::new();
        let b = booking(room, 0, SLOT_MS);
        store
            .insert_booking(&b, &[0], audit(AuditAction::BookingCreated, b.id))
            .await
            .unwrap();

        store
            .cancel_booking(b.id, 0, 0, audit(AuditAction::BookingCancelled, b.id))
            .await
            .unwrap();
        let outcome = store
            .cancel_booking(b.id, 0, 0, audit(AuditAction::BookingCancelled, b.id))
            .await
            .unwrap();
        assert_eq!(outcome, MutationOutcome::AlreadyCancelled);
        // The no-op writes no second cancellation audit entry.
        assert_eq!(store.audit_entries().len(), 2);
    }

    #[tokio::test]
    async fn truncate_shortens_and_releases_tail() {
        let store = InMemoryStore::new();
        let room = Ulid::new();
        let b = booking(room, 0, 3 * SLOT_MS);
        store
            .insert_booking(&b, &slot_run(0, 3 * SLOT_MS), audit(AuditAction::BookingCreated, b.id))
            .await
            .unwrap();

        store
            .truncate_booking(b.id, 2 * SLOT_MS, audit(AuditAction::BookingTruncated, b.id))
            .await
            .unwrap();

        let stored = store.get_booking(b.id).await.unwrap().unwrap();
        assert_eq!(stored.span.end, 2 * SLOT_MS);
        assert_eq!(store.room_slots(room), vec![0, SLOT_MS]);
    }

    #[tokio::test]
    async fn active_bookings_filter_and_order() {
        let store = InMemoryStore::new();
        let room = Ulid::new();

        let late = booking(room, 10 * SLOT_MS, 11 * SLOT_MS);
        let early = booking(room, 2 * SLOT_MS, 3 * SLOT_MS);
        let elapsed = booking(room, 0, SLOT_MS);
        for b in [&late, &early, &elapsed] {
            store
                .insert_booking(
                    b,
                    &slot_run(b.span.start, b.span.end),
                    audit(AuditAction::BookingCreated, b.id),
                )
                .await
                .unwrap();
        }
        store
            .cancel_booking(early.id, 0, 0, audit(AuditAction::BookingCancelled, early.id))
            .await
            .unwrap();

        let active = store
            .active_bookings_ending_after(room, SLOT_MS)
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, late.id);
    }

    #[tokio::test]
    async fn mutations_on_unknown_booking_fail() {
        let store = InMemoryStore::new();
        let missing = Ulid::new();
        let err = store
            .cancel_booking(missing, 0, 0, audit(AuditAction::BookingCancelled, missing))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == missing));
    }
}
