//! # Event Bus System
//!
//! Provides a typed broadcast channel built on `tokio::sync::broadcast`. Each
//! component that publishes notifications owns an [`EventBus`] over its own
//! event enum; hosts subscribe and consume an independent stream.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     emit      ┌───────────┐
//! │ Player state ├──────────────>│           │     subscribe    ┌────────────┐
//! └──────────────┘               │ EventBus  ├─────────────────>│ Subscriber │
//!                                │ (broadcast│                  └────────────┘
//! ┌──────────────┐     emit      │  channel) │     subscribe    ┌────────────┐
//! │ Load watchdog├──────────────>│           ├─────────────────>│ Subscriber │
//! └──────────────┘               └───────────┘                  └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::EventBus;
//!
//! # #[tokio::main]
//! # async fn main() {
//! #[derive(Debug, Clone, PartialEq)]
//! enum Notice { Ready }
//!
//! let bus: EventBus<Notice> = EventBus::new(16);
//! let mut stream = bus.subscribe();
//!
//! bus.emit(Notice::Ready).ok();
//! assert_eq!(stream.recv().await.unwrap(), Notice::Ready);
//! # }
//! ```
//!
//! ## Error Handling
//!
//! The event bus uses `tokio::sync::broadcast`, which can produce two types of errors:
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! Publishing never blocks. Events are delivered from whichever thread emits
//! them, so the bus is safe to use from plain OS threads without a runtime.

use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast channel for events of type `E`.
pub struct EventBus<E> {
    sender: broadcast::Sender<E>,
}

impl<E: Clone> EventBus<E> {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events to buffer per subscriber.
    ///   When a subscriber falls behind by more than this amount, it will
    ///   receive a `RecvError::Lagged` error. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    /// Returns an error if there are no active subscribers.
    pub fn emit(&self, event: E) -> Result<usize, SendError<E>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent receiver that will receive all future events.
    /// Past events are not replayed.
    pub fn subscribe(&self) -> EventStream<E> {
        EventStream::new(self.sender.subscribe())
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<E: Clone> Default for EventBus<E> {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<E> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.sender.receiver_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with additional filtering capabilities.
pub struct EventStream<E> {
    receiver: Receiver<E>,
    filter: Option<EventFilter<E>>,
}

impl<E: Clone> EventStream<E> {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<E>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Adds a filter function to this stream.
    ///
    /// Only events that match the filter will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &E) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<E, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<E, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }

    /// Drain every event currently buffered, skipping lag notifications.
    pub fn drain(&mut self) -> Vec<E> {
        let mut events = Vec::new();
        while let Some(result) = self.try_recv() {
            match result {
                Ok(event) => events.push(event),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        events
    }
}

impl<E> fmt::Debug for EventStream<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum TestEvent {
        Loaded(u32),
        Ended,
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus: EventBus<TestEvent> = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(TestEvent::Ended).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        assert_eq!(bus.emit(TestEvent::Loaded(1)).unwrap(), 2);
        assert_eq!(a.recv().await.unwrap(), TestEvent::Loaded(1));
        assert_eq!(b.recv().await.unwrap(), TestEvent::Loaded(1));
    }

    #[tokio::test]
    async fn test_filtered_stream_skips_events() {
        let bus = EventBus::new(10);
        let mut stream = bus
            .subscribe()
            .filter(|event| matches!(event, TestEvent::Ended));

        bus.emit(TestEvent::Loaded(1)).unwrap();
        bus.emit(TestEvent::Ended).unwrap();

        assert_eq!(stream.recv().await.unwrap(), TestEvent::Ended);
        assert!(stream.try_recv().is_none());
    }

    #[test]
    fn test_lagged_subscriber_reports_missed_events() {
        let bus = EventBus::new(2);
        let mut stream = bus.subscribe();
        for i in 0..5 {
            bus.emit(TestEvent::Loaded(i)).unwrap();
        }

        assert!(matches!(stream.try_recv(), Some(Err(RecvError::Lagged(3)))));
        assert_eq!(stream.try_recv(), Some(Ok(TestEvent::Loaded(3))));
    }

    #[test]
    fn test_drain_collects_buffered_events() {
        let bus = EventBus::new(4);
        let mut stream = bus.subscribe();
        bus.emit(TestEvent::Loaded(7)).unwrap();
        bus.emit(TestEvent::Ended).unwrap();

        assert_eq!(stream.drain(), vec![TestEvent::Loaded(7), TestEvent::Ended]);
        assert!(stream.drain().is_empty());
    }

    #[test]
    fn test_closed_when_bus_dropped() {
        let bus: EventBus<TestEvent> = EventBus::new(4);
        let mut stream = bus.subscribe();
        drop(bus);
        assert!(matches!(stream.try_recv(), Some(Err(RecvError::Closed))));
    }
}
