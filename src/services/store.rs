use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveDate, Utc};

use super::cache::Cache;
use super::clock::Clock;
use super::commands::StoreOp;
use super::standardizer::filter_active;
use crate::models::Booking;

pub const BOOKINGS_KEY: &str = "bookings";

/// Short-lived markers that keep locally deleted bookings from being
/// resurrected by a resync that started before the delete landed.
pub struct Tombstones {
    clock: Arc<dyn Clock>,
    ttl: Duration,
    marked: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl Tombstones {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            clock,
            ttl,
            marked: Mutex::new(HashMap::new()),
        }
    }

    pub fn mark(&self, id: &str) {
        let now = self.clock.now();
        self.lock().insert(id.to_string(), now);
    }

    pub fn clear(&self, id: &str) {
        self.lock().remove(id);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.purge_expired();
        self.lock().contains_key(id)
    }

    /// Live tombstoned ids. Expired entries are dropped first.
    pub fn ids(&self) -> HashSet<String> {
        self.purge_expired();
        self.lock().keys().cloned().collect()
    }

    fn purge_expired(&self) {
        let now = self.clock.now();
        let ttl = self.ttl;
        self.lock().retain(|_, marked_at| now - *marked_at < ttl);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, DateTime<Utc>>> {
        self.marked.lock().unwrap_or_else(|e| e.into_inner())
    }
}

struct StoreInner {
    bookings: Vec<Booking>,
    period: Option<(NaiveDate, NaiveDate)>,
    last_updated: Option<DateTime<Utc>>,
}

/// Client-side bookings for the visible period. Only the mutation
/// coordinator, the swap orchestrator and the resync path write to it.
pub struct BookingStore {
    inner: Mutex<StoreInner>,
    cache: Cache<Vec<Booking>>,
    tombstones: Tombstones,
    clock: Arc<dyn Clock>,
}

impl BookingStore {
    pub fn new(cache: Cache<Vec<Booking>>, tombstones: Tombstones, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                bookings: Vec::new(),
                period: None,
                last_updated: None,
            }),
            cache,
            tombstones,
            clock,
        }
    }

    /// Active bookings in store order.
    pub fn list(&self) -> Vec<Booking> {
        self.lock().bookings.clone()
    }

    pub fn get(&self, id: &str) -> Option<Booking> {
        self.lock().bookings.iter().find(|b| b.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().bookings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn for_day(&self, date: NaiveDate) -> Vec<Booking> {
        let mut day: Vec<Booking> = self
            .lock()
            .bookings
            .iter()
            .filter(|b| b.date == date)
            .cloned()
            .collect();
        day.sort_by_key(|b| (b.start_time, b.instructor_id.clone()));
        day
    }

    pub fn replace(&self, bookings: Vec<Booking>) {
        let mut inner = self.lock();
        inner.bookings = filter_active(bookings);
        self.touch(&mut inner);
    }

    pub fn upsert(&self, booking: Booking) {
        self.apply(&[StoreOp::Upsert(booking)]);
    }

    pub fn remove(&self, id: &str) -> Option<Booking> {
        let mut inner = self.lock();
        let position = inner.bookings.iter().position(|b| b.id == id)?;
        let removed = inner.bookings.remove(position);
        self.touch(&mut inner);
        Some(removed)
    }

    /// Run a batch of transforms under one lock so observers never see half
    /// of a swap.
    pub fn apply(&self, ops: &[StoreOp]) {
        let mut inner = self.lock();
        let mut bookings = std::mem::take(&mut inner.bookings);
        for op in ops {
            op.apply_to(&mut bookings);
        }
        inner.bookings = filter_active(bookings);
        self.touch(&mut inner);
    }

    /// Merge an authoritative snapshot. Tombstoned ids are held back; a
    /// tombstone is cleared once the server stops returning its booking.
    pub fn reconcile(&self, snapshot: Vec<Booking>) -> usize {
        let tombstoned = self.tombstones.ids();
        let returned: HashSet<&str> = snapshot.iter().map(|b| b.id.as_str()).collect();
        for id in &tombstoned {
            if !returned.contains(id.as_str()) {
                self.tombstones.clear(id);
            }
        }

        let merged: Vec<Booking> = snapshot
            .into_iter()
            .filter(|b| {
                let suppressed = tombstoned.contains(&b.id);
                if suppressed {
                    tracing::debug!(
                        booking_id = %b.id,
                        "suppressing tombstoned booking from resync"
                    );

                }
                !suppressed
            })
            .collect();

        let mut inner = self.lock();
        inner.bookings = filter_active(merged);
        self.touch(&mut inner);
        inner.bookings.len()
    }

    pub fn tombstone(&self, id: &str) {
        self.tombstones.mark(id);
    }

    pub fn clear_tombstone(&self, id: &str) {
        self.tombstones.clear(id);
    }

    pub fn is_tombstoned(&self, id: &str) -> bool {
        self.tombstones.contains(id)
    }

    pub fn set_period(&self, start: NaiveDate, end: NaiveDate) {
        let mut inner = self.lock();
        if inner.period != Some((start, end)) {
            inner.period = Some((start, end));
            self.cache.invalidate(BOOKINGS_KEY);
        }
    }

    pub fn period(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.lock().period
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.lock().last_updated
    }

    /// Last snapshot still within its TTL, if any.
    pub fn cached_snapshot(&self) -> Option<Vec<Booking>> {
        self.cache.get(BOOKINGS_KEY)
    }

    pub fn invalidate_snapshot(&self) {
        self.cache.invalidate(BOOKINGS_KEY);
    }

    /// True when the cached snapshot has expired or was invalidated.
    pub fn is_refresh_due(&self) -> bool {
        self.cache.get(BOOKINGS_KEY).is_none()
    }

    fn touch(&self, inner: &mut StoreInner) {
        inner.last_updated = Some(self.clock.now());
        self.cache.set(BOOKINGS_KEY, inner.bookings.clone());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
