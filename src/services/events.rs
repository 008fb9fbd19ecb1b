use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::models::Booking;

/// Change notifications for views that render the store.
#[derive(Debug, Clone, PartialEq)]
pub enum BookingEvent {
    Created(Booking),
    Updated(Booking),
    Moved(Booking),
    Deleted { id: String },
    Swapped { a: Booking, b: Booking },
    RolledBack { ids: Vec<String>, reason: String },
    Resynced { count: usize },
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BookingEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: BookingEvent) {
        // No subscribers is fine
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BookingEvent> {
        self.tx.subscribe()
    }

    /// Lagging subscribers see `Err(Lagged)` items and keep going.
    pub fn stream(&self) -> BroadcastStream<BookingEvent> {
        BroadcastStream::new(self.tx.subscribe())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.publish(BookingEvent::Deleted { id: "X".into() });
        assert_eq!(rx.recv().await.unwrap(), BookingEvent::Deleted { id: "X".into() });
    }

    #[tokio::test]
    async fn test_stream_adapter() {
        let bus = EventBus::default();
        let mut stream = bus.stream();
        bus.publish(BookingEvent::Resynced { count: 3 });
        let next = stream.next().await.unwrap().unwrap();
        assert_eq!(next, BookingEvent::Resynced { count: 3 });
    }

    #[test]
    fn test_publish_without_subscribers() {
        EventBus::new(4).publish(BookingEvent::Resynced { count: 0 });
    }
}
