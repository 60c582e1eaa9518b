//! In-process event stream with filtered subscriptions.
//!
//! Delivery is synchronous on whichever thread calls [`EventBus::publish`]; the
//! dispatcher thread from [`EventBus::spawn_dispatcher`] gives producers a queue
//! so they never run listeners themselves.

use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::LayerError;

mod replay;

pub use replay::{load_events, parse_event_lines};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Integer(i64),
    /// Integers above `i64::MAX`.
    Unsigned(u64),
    Float(f64),
    Text(String),
}

impl AttributeValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Integer(_) | Self::Unsigned(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<u32> for AttributeValue {
    fn from(value: u32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<u64> for AttributeValue {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or(Self::Unsigned(value), Self::Integer)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl Event {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.to_owned(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    pub fn integer_attribute(&self, key: &str) -> Result<i64, LayerError> {
        match self.attribute(key) {
            Some(AttributeValue::Integer(value)) => Ok(*value),
            Some(AttributeValue::Unsigned(value)) => Err(self.malformed(format!(
                "attribute `{key}` ({value}) does not fit a signed integer"
            ))),
            Some(other) => Err(self.malformed(format!(
                "attribute `{key}` is {}, expected integer",
                other.type_name()
            ))),
            None => Err(self.malformed(format!("missing attribute `{key}`"))),
        }
    }

    /// Non-negative integer attribute over the full `u64` range.
    pub fn unsigned_attribute(&self, key: &str) -> Result<u64, LayerError> {
        match self.attribute(key) {
            Some(AttributeValue::Unsigned(value)) => Ok(*value),
            Some(AttributeValue::Integer(value)) => u64::try_from(*value)
                .map_err(|_| self.malformed(format!("attribute `{key}` is negative ({value})"))),
            Some(other) => Err(self.malformed(format!(
                "attribute `{key}` is {}, expected integer",
                other.type_name()
            ))),
            None => Err(self.malformed(format!("missing attribute `{key}`"))),
        }
    }

    pub fn malformed(&self, reason: impl Into<String>) -> LayerError {
        LayerError::MalformedEvent {
            kind: self.kind.clone(),
            reason: reason.into(),
        }
    }
}

pub trait EventFilter: Send + Sync {
    fn pass(&self, event: &Event) -> bool;
}

impl<F> EventFilter for F
where
    F: Fn(&Event) -> bool + Send + Sync,
{
    fn pass(&self, event: &Event) -> bool {
        self(event)
    }
}

/// Accepts events whose type starts with a fixed prefix.
#[derive(Clone, Debug)]
pub struct TypePrefixFilter(pub String);

impl EventFilter for TypePrefixFilter {
    fn pass(&self, event: &Event) -> bool {
        event.kind.starts_with(&self.0)
    }
}

pub trait EventListener: Send + Sync {
    /// Errors are reported by the bus and never stop delivery to other listeners.
    fn notify_of(&self, event: &Event) -> Result<(), LayerError>;
}

struct Slot {
    id: u64,
    filter: Box<dyn EventFilter>,
    listener: Mutex<Option<Arc<dyn EventListener>>>,
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    slots: Mutex<Vec<Arc<Slot>>>,
}

#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        filter: impl EventFilter + 'static,
        listener: Arc<dyn EventListener>,
    ) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(Slot {
            id,
            filter: Box::new(filter),
            listener: Mutex::new(Some(listener)),
        });
        self.inner
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&slot));
        debug!(subscription = id, "event listener registered");

        Subscription {
            bus: Arc::downgrade(&self.inner),
            slot: Some(slot),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Delivers `event` to every live subscriber whose filter passes it and returns
    /// how many listeners received it.
    pub fn publish(&self, event: &Event) -> usize {
        let slots = self
            .inner
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut delivered = 0usize;
        for slot in slots {
            if !slot.filter.pass(event) {
                continue;
            }

            // Held for the whole call so cancellation can wait for it.
            let guard = slot.listener.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(listener) = guard.as_ref() else {
                continue;
            };

            delivered += 1;
            if let Err(error) = listener.notify_of(event) {
                warn!(subscription = slot.id, %error, "event listener rejected event");
            }
        }

        delivered
    }

    /// Starts a thread that publishes every event sent on the returned channel.
    ///
    /// The thread exits once every sender has been dropped.
    pub fn spawn_dispatcher(&self) -> io::Result<(Sender<Event>, Dispatcher)> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let bus = self.clone();
        let handle = thread::Builder::new()
            .name("event-dispatch".to_owned())
            .spawn(move || dispatch_loop(&bus, &rx))?;

        Ok((tx, Dispatcher { handle }))
    }
}

fn dispatch_loop(bus: &EventBus, rx: &Receiver<Event>) -> u64 {
    info!("event dispatcher started");
    let mut published = 0u64;
    for event in rx.iter() {
        bus.publish(&event);
        published += 1;
    }
    info!(published, "event dispatcher stopped");
    published
}

pub struct Dispatcher {
    handle: JoinHandle<u64>,
}

impl Dispatcher {
    /// Waits for the queue to drain and returns how many events were published.
    pub fn join(self) -> u64 {
        self.handle.join().unwrap_or_else(|_| {
            warn!("event dispatcher panicked");
            0
        })
    }
}

/// Registration handle returned by [`EventBus::subscribe`].
///
/// Cancelling, explicitly or on drop, removes the listener from the bus and blocks
/// until a delivery already running for it has returned. No delivery starts after
/// cancellation. Must not be cancelled from inside its own listener.
pub struct Subscription {
    bus: Weak<BusInner>,
    slot: Option<Arc<Slot>>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.slot.as_ref().is_some_and(|slot| {
            slot.listener
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_some()
        })
    }

    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        let Some(slot) = self.slot.take() else {
            return;
        };

        if let Some(bus) = self.bus.upgrade() {
            bus.slots
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|other| other.id != slot.id);
        }

        let previous = slot
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if previous.is_some() {
            debug!(subscription = slot.id, "event listener cancelled");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;

    #[derive(Default)]
    struct Counter {
        seen: AtomicUsize,
    }

    impl EventListener for Counter {
        fn notify_of(&self, event: &Event) -> Result<(), LayerError> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            if event.kind == "bad" {
                return Err(event.malformed("always rejected"));
            }
            Ok(())
        }
    }

    #[test]
    fn filter_selects_events_by_prefix() {
        let bus = EventBus::new();
        let counter = Arc::new(Counter::default());
        let _subscription = bus.subscribe(
            TypePrefixFilter("infrastructure:".into()),
            counter.clone(),
        );

        assert_eq!(bus.publish(&Event::new("infrastructure:chargingstation:load")), 1);
        assert_eq!(bus.publish(&Event::new("vehicle:arrived")), 0);
        assert_eq!(counter.seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_errors_do_not_stop_delivery() {
        let bus = EventBus::new();
        let first = Arc::new(Counter::default());
        let second = Arc::new(Counter::default());
        let _a = bus.subscribe(|_: &Event| true, first.clone());
        let _b = bus.subscribe(|_: &Event| true, second.clone());

        assert_eq!(bus.publish(&Event::new("bad")), 2);
        assert_eq!(first.seen.load(Ordering::SeqCst), 1);
        assert_eq!(second.seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancelled_subscription_receives_nothing() {
        let bus = EventBus::new();
        let counter = Arc::new(Counter::default());
        let subscription = bus.subscribe(|_: &Event| true, counter.clone());
        assert!(subscription.is_active());

        subscription.cancel();
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.publish(&Event::new("anything")), 0);
        assert_eq!(counter.seen.load(Ordering::SeqCst), 0);
    }

    struct Gate {
        entered: Mutex<Option<mpsc::Sender<()>>>,
        release: Mutex<mpsc::Receiver<()>>,
        finished: AtomicUsize,
    }

    impl EventListener for Gate {
        fn notify_of(&self, _event: &Event) -> Result<(), LayerError> {
            if let Some(entered) = self.entered.lock().unwrap().take() {
                entered.send(()).unwrap();
            }
            self.release.lock().unwrap().recv().unwrap();
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn cancel_waits_for_in_flight_delivery() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let gate = Arc::new(Gate {
            entered: Mutex::new(Some(entered_tx)),
            release: Mutex::new(release_rx),
            finished: AtomicUsize::new(0),
        });

        let bus = EventBus::new();
        let subscription = bus.subscribe(|_: &Event| true, gate.clone());

        let publisher = {
            let bus = bus.clone();
            thread::spawn(move || bus.publish(&Event::new("slow")))
        };
        entered_rx.recv().unwrap();

        let canceller = {
            let gate = gate.clone();
            thread::spawn(move || {
                subscription.cancel();
                gate.finished.load(Ordering::SeqCst)
            })
        };

        thread::sleep(Duration::from_millis(50));
        release_tx.send(()).unwrap();

        assert_eq!(publisher.join().unwrap(), 1);
        assert_eq!(canceller.join().unwrap(), 1, "cancel returned before delivery finished");
        assert_eq!(bus.publish(&Event::new("late")), 0);
    }

    #[test]
    fn dispatcher_drains_queue_before_exiting() {
        let bus = EventBus::new();
        let counter = Arc::new(Counter::default());
        let _subscription = bus.subscribe(|_: &Event| true, counter.clone());

        let (tx, dispatcher) = bus.spawn_dispatcher().unwrap();
        for _ in 0..25 {
            tx.send(Event::new("tick")).unwrap();
        }
        drop(tx);

        assert_eq!(dispatcher.join(), 25);
        assert_eq!(counter.seen.load(Ordering::SeqCst), 25);
    }

    #[test]
    fn integer_attribute_reports_type_mismatch() {
        let event = Event::new("infrastructure:chargingstation:load")
            .with_attribute("station", 3_i64)
            .with_attribute("clients", "many");

        assert_eq!(event.integer_attribute("station"), Ok(3));
        assert!(matches!(
            event.integer_attribute("clients"),
            Err(LayerError::MalformedEvent { ref reason, .. }) if reason.contains("text")
        ));
        assert!(matches!(
            event.integer_attribute("missing"),
            Err(LayerError::MalformedEvent { ref reason, .. }) if reason.contains("missing")
        ));
    }

    #[test]
    fn unsigned_attribute_covers_the_full_u64_range() {
        let event = Event::new("infrastructure:chargingstation:load")
            .with_attribute("low", 7_u64)
            .with_attribute("high", u64::MAX - 1)
            .with_attribute("negative", -2_i64);

        assert_eq!(event.attribute("low"), Some(&AttributeValue::Integer(7)));
        assert_eq!(event.attribute("high"), Some(&AttributeValue::Unsigned(u64::MAX - 1)));
        assert_eq!(event.unsigned_attribute("low"), Ok(7));
        assert_eq!(event.unsigned_attribute("high"), Ok(u64::MAX - 1));
        assert!(matches!(
            event.unsigned_attribute("negative"),
            Err(LayerError::MalformedEvent { ref reason, .. }) if reason.contains("negative")
        ));
        assert!(event.integer_attribute("high").is_err());
    }
}
