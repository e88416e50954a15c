// ── Event bus ──
//
// Typed publish/subscribe for everything the engine observes. Each
// subscriber owns an unbounded queue, so a slow consumer never makes the
// engine drop events; delivery happens synchronously, in registration
// order, while the engine is handling the line that produced the event.

mod filter;

use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use futures_core::Stream;
use serde::Serialize;
use strum::{Display, EnumIter, EnumString};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

pub use filter::EventFilter;

use crate::model::{
    AdcSample, ConnectivityState, ErrorLogSection, IrqEvent, LoggingEvent, UsbPower,
};

/// Every event the engine publishes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "kebab-case")]
pub enum DeviceEvent {
    /// A device log line. `grouped` marks indented continuation lines that
    /// carry the module, timestamp and level of the line they follow.
    Log { event: LoggingEvent, grouped: bool },
    AdcSample(AdcSample),
    Irq(IrqEvent),
    Connectivity(ConnectivityState),
    UsbPower(UsbPower),
    UsbPowered(bool),
    ErrorLogs(ErrorLogSection),
}

/// Payload-free discriminant of [`DeviceEvent`], used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum EventKind {
    Log,
    AdcSample,
    Irq,
    Connectivity,
    UsbPower,
    UsbPowered,
    ErrorLogs,
}

impl DeviceEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Log { .. } => EventKind::Log,
            Self::AdcSample(_) => EventKind::AdcSample,
            Self::Irq(_) => EventKind::Irq,
            Self::Connectivity(_) => EventKind::Connectivity,
            Self::UsbPower(_) => EventKind::UsbPower,
            Self::UsbPowered(_) => EventKind::UsbPowered,
            Self::ErrorLogs(_) => EventKind::ErrorLogs,
        }
    }
}

// ── EventBus ─────────────────────────────────────────────────────────

struct Subscriber {
    tx: mpsc::UnboundedSender<Arc<DeviceEvent>>,
    filter: EventFilter,
}

#[derive(Default)]
struct BusState {
    subscribers: Vec<Subscriber>,
    closed: bool,
}

/// Cloneable handle to one engine's subscriber list.
#[derive(Clone, Default)]
pub struct EventBus {
    state: Arc<Mutex<BusState>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("EventBus")
            .field("subscribers", &state.subscribers.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        self.subscribe_filtered(EventFilter::All)
    }

    /// Subscribe to the events `filter` accepts.
    ///
    /// On a closed bus the subscription is already ended.
    pub fn subscribe_filtered(&self, filter: EventFilter) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        if !state.closed {
            state.subscribers.push(Subscriber { tx, filter });
        }
        Subscription { rx }
    }

    /// Deliver an event to every current subscriber in registration order.
    /// Subscribers whose receiving side is gone are pruned.
    pub fn publish(&self, event: DeviceEvent) {
        let event = Arc::new(event);
        let mut state = self.lock();
        state.subscribers.retain(|sub| {
            if !sub.filter.matches(&event) {
                return !sub.tx.is_closed();
            }
            sub.tx.send(Arc::clone(&event)).is_ok()
        });
    }

    /// End every subscription. Queued events are still delivered.
    pub fn close(&self) {
        let mut state = self.lock();
        if !state.closed {
            tracing::debug!(subscribers = state.subscribers.len(), "closing event bus");
        }
        state.closed = true;
        state.subscribers.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Subscription ─────────────────────────────────────────────────────

/// Receiving end of an [`EventBus`] subscription.
///
/// Yields `None` once the engine has been released and the queue drained.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Arc<DeviceEvent>>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<Arc<DeviceEvent>> {
        self.rx.recv().await
    }

    /// The next queued event, without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<DeviceEvent>> {
        self.rx.try_recv().ok()
    }

    /// Drain everything queued right now.
    pub fn drain(&mut self) -> Vec<Arc<DeviceEvent>> {
        let mut out = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            out.push(event);
        }
        out
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> EventStream {
        EventStream {
            inner: UnboundedReceiverStream::new(self.rx),
        }
    }
}

/// `Stream` adapter over a [`Subscription`].
#[derive(Debug)]
pub struct EventStream {
    inner: UnboundedReceiverStream<Arc<DeviceEvent>>,
}

impl Stream for EventStream {
    type Item = Arc<DeviceEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use futures_util::StreamExt;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn every_subscriber_sees_every_event() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(DeviceEvent::UsbPowered(true));
        bus.publish(DeviceEvent::Connectivity(ConnectivityState::Disconnected));

        for sub in [&mut a, &mut b] {
            let kinds: Vec<EventKind> = sub.drain().iter().map(|e| e.kind()).collect();
            assert_eq!(kinds, vec![EventKind::UsbPowered, EventKind::Connectivity]);
        }
    }

    #[test]
    fn filtered_subscription_only_sees_matching_kinds() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe_filtered(EventFilter::kinds([EventKind::UsbPowered]));

        bus.publish(DeviceEvent::Connectivity(ConnectivityState::PendingReboot));
        bus.publish(DeviceEvent::UsbPowered(false));

        assert_eq!(*sub.try_recv().unwrap(), DeviceEvent::UsbPowered(false));
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus = EventBus::new();
        let sub = bus.subscribe();
        let _keep = bus.subscribe();
        drop(sub);

        bus.publish(DeviceEvent::UsbPowered(true));
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn close_ends_subscriptions_after_draining() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        bus.publish(DeviceEvent::UsbPowered(true));

        bus.close();
        bus.close();

        assert!(sub.recv().await.is_some());
        assert!(sub.recv().await.is_none());

        let mut late = bus.subscribe();
        assert!(late.recv().await.is_none());
        assert!(bus.is_closed());
    }

    #[tokio::test]
    async fn subscription_as_stream() {
        let bus = EventBus::new();
        let stream = bus.subscribe().into_stream();
        bus.publish(DeviceEvent::UsbPowered(true));
        bus.close();

        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn event_kind_names() {
        assert_eq!(EventKind::AdcSample.to_string(), "adc-sample");
        assert_eq!("error-logs".parse::<EventKind>().unwrap(), EventKind::ErrorLogs);
        assert_eq!("USB-POWER".parse::<EventKind>().unwrap(), EventKind::UsbPower);
    }

    #[test]
    fn events_serialize_with_kind_tag() {
        let json = serde_json::to_value(DeviceEvent::UsbPowered(true)).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "usb-powered", "data": true }));
    }
}
