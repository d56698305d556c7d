//! Per-event-kind queues and fan-out dispatch.
//!
//! Every publisher writes to a bounded `crossbeam_channel`; every subscriber
//! gets its own receiver. A full subscriber queue means that subscriber is
//! falling behind, not that publishing should block -- events are dropped
//! for that one subscriber and counted rather than letting one slow
//! listener stall every other subscriber or the publisher itself.

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError, bounded};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// A fan-out event bus: one publisher side, many independently-paced
/// subscribers.
pub struct EventBus<T: Clone + Send + 'static> {
    subscribers: RwLock<Vec<Sender<T>>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl<T: Clone + Send + 'static> EventBus<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    /// Register a new subscriber and return its receiver.
    pub fn subscribe(&self) -> Receiver<T> {
        let (tx, rx) = bounded(self.capacity);
        self.subscribers.write().push(tx);
        rx
    }

    /// Publish `event` to every subscriber. A subscriber whose queue is full
    /// has the event dropped for it (logged, counted); a subscriber that has
    /// been dropped is pruned from the list.
    pub fn publish(&self, event: T) {
        let mut subs = self.subscribers.write();
        subs.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(target: "finders::queue", "subscriber queue full, dropping event");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    /// Total events dropped across every subscriber since creation.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

/// Drain every event currently queued on `rx` without blocking.
pub fn drain_available<T>(rx: &Receiver<T>) -> Vec<T> {
    let mut out = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => out.push(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_receives_published_events() {
        let bus = EventBus::new(10);
        let a = bus.subscribe();
        let b = bus.subscribe();
        bus.publish(1u32);
        bus.publish(2u32);
        assert_eq!(drain_available(&a), vec![1, 2]);
        assert_eq!(drain_available(&b), vec![1, 2]);
    }

    #[test]
    fn full_subscriber_queue_drops_without_blocking_others() {
        let bus: EventBus<u32> = EventBus::new(1);
        let slow = bus.subscribe();
        let fast = bus.subscribe();
        bus.publish(1);
        bus.publish(2); // slow's queue (capacity 1) is now full, dropped
        assert_eq!(drain_available(&slow), vec![1]);
        assert_eq!(drain_available(&fast), vec![1, 2]);
        assert_eq!(bus.dropped_count(), 1);
    }

    #[test]
    fn dropped_subscriber_is_pruned() {
        let bus: EventBus<u32> = EventBus::new(4);
        {
            let _rx = bus.subscribe();
        } // dropped immediately
        assert_eq!(bus.subscriber_count(), 1);
        bus.publish(1);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
