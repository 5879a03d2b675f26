//! src/eventbus/mod.rs
//!
//! In-process fan-out of ledger events to any number of subscribers, each with its
//! own bounded MPSC queue. Publishing happens after a commit and never blocks it:
//! a subscriber whose queue is full misses the event.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::models::LedgerEvent;

/// Default size for each subscriber's buffer.
const DEFAULT_BUFFER_SIZE: usize = 1024;

#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::Sender<LedgerEvent>>>>,
    shutdown_tx: watch::Sender<bool>,
    pub shutdown_rx: watch::Receiver<bool>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            subscribers: Arc::new(Mutex::new(vec![])),
            shutdown_tx: tx,
            shutdown_rx: rx,
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Returns a receiver on which events will be delivered.
    pub fn subscribe(&self, buffer_size: Option<usize>) -> mpsc::Receiver<LedgerEvent> {
        let size = buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE);
        let (tx, rx) = mpsc::channel(size);
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Offers `event` to every subscriber without waiting. Closed subscribers are dropped.
    pub fn publish(&self, event: LedgerEvent) {
        if self.is_shutdown() {
            return;
        }
        let mut subs = self.subscribers.lock();
        subs.retain(|s| match s.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("event subscriber queue full; dropping {}", event.event_type());
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("removing closed event subscriber");
                false
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn earned(amount: i64) -> LedgerEvent {
        LedgerEvent::PointsEarned {
            user_id: Uuid::new_v4(),
            transaction_id: Uuid::new_v4(),
            amount,
            category: "attendance".into(),
            balance: amount,
        }
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe(Some(5));
        let mut rx2 = bus.subscribe(Some(5));

        bus.publish(earned(10));

        let evt1 = rx1.recv().await.expect("rx1 should get event");
        let evt2 = rx2.recv().await.expect("rx2 should get event");
        assert_eq!(evt1.event_type(), "points.earned");
        assert_eq!(evt2.event_type(), "points.earned");
    }

    #[tokio::test]
    async fn test_full_queue_does_not_block_publisher() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe(Some(1));

        bus.publish(earned(1));
        bus.publish(earned(2));

        match rx.recv().await.expect("first event kept") {
            LedgerEvent::PointsEarned { amount, .. } => assert_eq!(amount, 1),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_subscribers_are_pruned() {
        let bus = EventBus::new();
        let rx = bus.subscribe(Some(1));
        drop(rx);
        bus.publish(earned(1));
        assert_eq!(bus.subscriber_count(), 0);
    }
}
