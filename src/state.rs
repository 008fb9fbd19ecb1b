use std::sync::Arc;

use crate::config::AppConfig;
use crate::models::InstructorDirectory;
use crate::services::backend::BookingBackend;
use crate::services::cache::{Cache, TtlPolicy};
use crate::services::clock::{to_chrono, Clock};
use crate::services::events::EventBus;
use crate::services::lock::{InFlightLocks, RequestGenerations};
use crate::services::resync::Resyncer;
use crate::services::store::{BookingStore, Tombstones};

pub struct AppState {
    pub config: AppConfig,
    pub clock: Arc<dyn Clock>,
    pub backend: Arc<dyn BookingBackend>,
    pub store: Arc<BookingStore>,
    pub events: EventBus,
    pub locks: Arc<InFlightLocks>,
    pub generations: RequestGenerations,
    pub directory: InstructorDirectory,
    pub resync: Resyncer,
}

impl AppState {
    /// Wires the store, locks and resync worker. Spawns a task, so it must
    /// run inside a tokio runtime.
    pub fn new(
        config: AppConfig,
        backend: Arc<dyn BookingBackend>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let cache = Cache::new(clock.clone(), TtlPolicy::new(to_chrono(config.cache_ttl)));
        let tombstones = Tombstones::new(clock.clone(), to_chrono(config.tombstone_ttl));
        let store = Arc::new(BookingStore::new(cache, tombstones, clock.clone()));
        let events = EventBus::default();
        let locks = Arc::new(InFlightLocks::new(clock.clone(), to_chrono(config.lock_timeout)));
        let resync = Resyncer::spawn(
            backend.clone(),
            store.clone(),
            events.clone(),
            config.resync_debounce,
        );


        Arc::new(AppState {
            config,
            clock,
            backend,
            store,
            events,
            locks,
            generations: RequestGenerations::default(),
            directory: InstructorDirectory::default(),
            resync,
        })
    }
}
