use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

use super::backend::BookingBackend;
use super::events::{BookingEvent, EventBus};
use super::standardizer::standardize_all;
use super::store::BookingStore;
use crate::errors::AppError;

/// Handle to the background resync worker. Requests that arrive while one is
/// pending push its deadline out instead of queueing another fetch.
#[derive(Clone)]
pub struct Resyncer {
    tx: mpsc::UnboundedSender<Duration>,
}

impl Resyncer {
    /// Must be called inside a tokio runtime.
    pub fn spawn(
        backend: Arc<dyn BookingBackend>,
        store: Arc<BookingStore>,
        events: EventBus,
        debounce: Duration,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Duration>();

        tokio::spawn(async move {
            while let Some(delay) = rx.recv().await {
                let mut deadline = Instant::now() + delay.max(debounce);
                let mut coalesced = 1;
                loop {
                    tokio::select! {
                        next = rx.recv() => match next {
                            Some(delay) => {
                                deadline = deadline.max(Instant::now() + delay.max(debounce));
                                coalesced += 1;
                            }
                            None => break,
                        },
                        _ = sleep_until(deadline) => break,
                    }
                }

                tracing::debug!(coalesced, "running background resync");
                if let Err(e) = resync_once(backend.as_ref(), &store, &events).await {
                    tracing::warn!(error = %e, "background resync failed");
                }
            }
            tracing::debug!("resync worker stopped");
        });

        Self { tx }
    }

    pub fn schedule(&self, delay: Duration) {
        if self.tx.send(delay).is_err() {
            tracing::warn!("resync worker is gone, dropping request");
        }
    }

    /// Resync after the debounce window.
    pub fn request(&self) {
        self.schedule(Duration::ZERO);
    }
}

/// Fetch the store's period from the backend and merge it. Without a period
/// there is nothing to fetch and the store is left alone.
pub async fn resync_once(
    backend: &dyn BookingBackend,
    store: &BookingStore,
    events: &EventBus,
) -> Result<usize, AppError> {
    let Some((start, end)) = store.period() else {
        tracing::debug!("no visible period, skipping resync");
        return Ok(store.len());
    };

    let raw = backend.list_bookings(start, end).await?;
    let snapshot = standardize_all(&raw);
    let count = store.reconcile(snapshot);

    tracing::info!(%start, %end, count, "bookings resynced");
    events.publish(BookingEvent::Resynced { count });
    Ok(count)
}
