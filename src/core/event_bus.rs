//! Pub/Sub event bus for player output.
//!
//! Architecture:
//! - Listeners subscribe per [`EventKind`] (the dispatch table key)
//! - emit() invokes listeners immediately AND queues for deferred processing
//! - poll() returns queued events for batch processing in a host loop
//!
//! Callback order: FIFO (first-subscribed, first-called) within same kind.
//! A panicking listener is caught and logged; the remaining listeners still run.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, RwLock};

use log::{error, warn};

use crate::core::player_events::{EventKind, PlaybackEvent};

/// Default maximum events in queue before oldest are evicted
pub const MAX_QUEUE_SIZE: usize = 1000;

/// Shared listener. Identity (for unsubscribe) is the `Arc` pointer.
pub type Listener = Arc<dyn Fn(&PlaybackEvent) + Send + Sync>;

/// Event bus with immediate dispatch and a bounded deferred queue.
///
/// Both modes work together: listeners fire on emit, and the same events
/// are available via poll(). A queue capacity of 0 disables queueing.
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<RwLock<HashMap<EventKind, Vec<Listener>>>>,
    queue: Arc<Mutex<Vec<PlaybackEvent>>>,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_kinds", &self.subscribers.read().map(|s| s.len()).unwrap_or(0))
            .field("queue_len", &self.queue_len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(MAX_QUEUE_SIZE)
    }

    /// Bus with a custom deferred queue size (0 = no queue).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            queue: Arc::new(Mutex::new(Vec::new())),
            capacity,
        }
    }

    // ========== Pub/Sub (immediate) ==========

    /// Subscribe a listener to one event kind.
    ///
    /// Returns false if this exact listener is already subscribed to `kind`.
    pub fn subscribe(&self, kind: EventKind, listener: &Listener) -> bool {
        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        let list = subs.entry(kind).or_default();
        if list.iter().any(|l| Arc::ptr_eq(l, listener)) {
            return false;
        }
        list.push(Arc::clone(listener));
        true
    }

    /// Wrap a closure, subscribe it, and return the handle for unsubscribe().
    ///
    /// # Example
    /// ```ignore
    /// let handle = bus.on(EventKind::TimeUpdate, |ev| println!("{:?}", ev));
    /// bus.unsubscribe(EventKind::TimeUpdate, &handle);
    /// ```
    pub fn on<F>(&self, kind: EventKind, callback: F) -> Listener
    where
        F: Fn(&PlaybackEvent) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(callback);
        self.subscribe(kind, &listener);
        listener
    }

    /// Remove a listener (matched by reference). Returns true if it was found.
    pub fn unsubscribe(&self, kind: EventKind, listener: &Listener) -> bool {
        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        let Some(list) = subs.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|l| !Arc::ptr_eq(l, listener));
        before != list.len()
    }

    /// Emit event: invoke listeners immediately AND queue for deferred processing.
    pub fn emit(&self, event: PlaybackEvent) {
        let kind = event.kind();

        // Snapshot so listeners may (un)subscribe while being called
        let listeners: Vec<Listener> = self
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        for listener in &listeners {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener(&event)));
            if let Err(payload) = outcome {
                error!("{} listener panicked: {}", kind, panic_message(&*payload));
            }
        }

        if self.capacity == 0 {
            return;
        }

        // Queue for deferred processing with eviction
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        if queue.len() >= self.capacity {
            let evict_count = (queue.len() / 2).max(1);
            warn!("EventBus queue full ({} events), evicting oldest {}", queue.len(), evict_count);
            queue.drain(0..evict_count);
        }
        queue.push(event);
    }

    // ========== Deferred Processing ==========

    /// Drain all queued events.
    pub fn poll(&self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut *self.queue.lock().unwrap_or_else(|e| e.into_inner()))
    }

    // ========== Utilities ==========

    /// Clear listeners for one kind
    pub fn unsubscribe_all(&self, kind: EventKind) {
        self.subscribers.write().unwrap_or_else(|e| e.into_inner()).remove(&kind);
    }

    /// Clear all listeners and queue
    pub fn clear(&self) {
        self.subscribers.write().unwrap_or_else(|e| e.into_inner()).clear();
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn has_subscribers(&self, kind: EventKind) -> bool {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&kind)
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(Vec::len)
            .sum()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn speed(v: f64) -> PlaybackEvent {
        PlaybackEvent::SpeedChange(v)
    }

    #[test]
    fn test_subscribe_emit_immediate() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);

        bus.on(EventKind::SpeedChange, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(speed(2.0));
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        // other kinds don't reach it
        bus.emit(PlaybackEvent::PlayStateChange(true));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_emit_queues_for_poll() {
        let bus = EventBus::new();
        bus.emit(speed(1.0));
        bus.emit(PlaybackEvent::PlayStateChange(false));

        let events = bus.poll();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], speed(1.0));
        assert_eq!(bus.poll().len(), 0);
    }

    #[test]
    fn test_zero_capacity_disables_queue() {
        let bus = EventBus::with_capacity(0);
        bus.emit(speed(1.0));
        assert_eq!(bus.queue_len(), 0);
    }

    #[test]
    fn test_queue_eviction() {
        let bus = EventBus::with_capacity(4);
        for i in 0..5 {
            bus.emit(speed(i as f64));
        }
        let events = bus.poll();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], speed(2.0));
    }

    #[test]
    fn test_unsubscribe_by_reference() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let c1 = Arc::clone(&counter);
        let first = bus.on(EventKind::SpeedChange, move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        let c2 = Arc::clone(&counter);
        let _second = bus.on(EventKind::SpeedChange, move |_| {
            c2.fetch_add(10, Ordering::SeqCst);
        });

        assert!(!bus.subscribe(EventKind::SpeedChange, &first));
        assert!(bus.unsubscribe(EventKind::SpeedChange, &first));
        assert!(!bus.unsubscribe(EventKind::SpeedChange, &first));

        bus.emit(speed(1.0));
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));

        bus.on(EventKind::SpeedChange, |_| panic!("listener bug"));
        let c = Arc::clone(&counter);
        bus.on(EventKind::SpeedChange, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(speed(1.0));
        bus.emit(speed(2.0));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_during_dispatch() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<Listener>>> = Arc::new(Mutex::new(None));

        let bus_inner = bus.clone();
        let slot_inner = Arc::clone(&slot);
        let c = Arc::clone(&counter);
        let once = bus.on(EventKind::SpeedChange, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            if let Some(me) = slot_inner.lock().unwrap().take() {
                bus_inner.unsubscribe(EventKind::SpeedChange, &me);
            }
        });
        *slot.lock().unwrap() = Some(once);

        bus.emit(speed(1.0));
        bus.emit(speed(2.0));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear() {
        let bus = EventBus::new();
        bus.on(EventKind::TimeUpdate, |_| {});
        bus.emit(speed(1.0));
        bus.clear();
        assert!(!bus.has_subscribers(EventKind::TimeUpdate));
        assert_eq!(bus.queue_len(), 0);
    }
}
