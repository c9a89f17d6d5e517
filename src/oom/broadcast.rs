/*!
 * OOM Broadcast
 * Fans one sandbox's OOM monitor out to any number of subscribers.
 *
 * Every subscriber receives every event. The monitor is opened lazily by
 * the first subscription and closed exactly once by `close`, at which
 * point every pending reader observes end-of-stream. A source that ends
 * on its own never ends the subscriptions.
 */

use super::monitor::OomMonitor;
use super::types::*;
use futures::Stream;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

/// Subscription identifier, unique per broadcaster
pub type SubscriptionId = u64;

struct BroadcastState {
    subscribers: HashMap<SubscriptionId, UnboundedSender<OomEvent>>,
    next_id: SubscriptionId,
    pump: Option<JoinHandle<()>>,
    closed: bool,
    delivered: u64,
}

/// Per-sandbox OOM fan-out
pub struct OomBroadcaster {
    label: String,
    state: Arc<Mutex<BroadcastState>>,
}

impl OomBroadcaster {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            state: Arc::new(Mutex::new(BroadcastState {
                subscribers: HashMap::new(),
                next_id: 1,
                pump: None,
                closed: false,
                delivered: 0,
            })),
        }
    }

    /// Add a subscriber, opening the monitor with `open` if none is running.
    ///
    /// `open` runs without the broadcaster lock held; if another caller
    /// started a pump meanwhile, the extra monitor is dropped.
    pub fn subscribe<F>(&self, open: F) -> OomResult<OomSubscription>
    where
        F: FnOnce() -> OomResult<OomMonitor>,
    {
        let needs_pump = {
            let state = self.state.lock();
            if state.closed {
                return Err(OomError::Closed(self.label.clone()));
            }
            state.pump.is_none()
        };

        let monitor = if needs_pump {
            let runtime = tokio::runtime::Handle::try_current()
                .map_err(|e| OomError::Runtime(e.to_string()))?;
            Some((runtime, open()?))
        } else {
            None
        };

        let mut state = self.state.lock();
        if state.closed {
            return Err(OomError::Closed(self.label.clone()));
        }

        if let Some((runtime, monitor)) = monitor {
            if state.pump.is_none() {
                state.pump = Some(runtime.spawn(Self::pump(
                    Arc::downgrade(&self.state),
                    monitor,
                    self.label.clone(),
                )));
                debug!(sandbox = %self.label, "OOM pump started");
            }
        }

        let id = state.next_id;
        state.next_id += 1;

        let (tx, rx) = mpsc::unbounded_channel();
        state.subscribers.insert(id, tx);

        Ok(OomSubscription {
            id,
            events: UnboundedReceiverStream::new(rx),
        })
    }

    /// Close one subscription; its reader observes end-of-stream
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.state.lock().subscribers.remove(&id).is_some()
    }

    /// Live subscribers; disconnected ones are dropped from the set
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.state.lock();
        state.subscribers.retain(|_, tx| !tx.is_closed());
        state.subscribers.len()
    }

    /// Events forwarded so far
    pub fn delivered(&self) -> u64 {
        self.state.lock().delivered
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Stop the monitor and end every subscription. Returns the number of
    /// subscribers that were closed; later calls return 0.
    pub fn close(&self) -> usize {
        let mut state = self.state.lock();
        if state.closed {
            return 0;
        }
        state.closed = true;

        if let Some(pump) = state.pump.take() {
            // Dropping the pump future drops the monitor, which stops its producer
            pump.abort();
        }

        let closed = state.subscribers.len();
        state.subscribers.clear();
        info!(sandbox = %self.label, subscribers = closed, "OOM stream closed");
        closed
    }

    async fn pump(state: Weak<Mutex<BroadcastState>>, mut monitor: OomMonitor, label: String) {
        while let Some(event) = monitor.recv().await {
            let Some(state) = state.upgrade() else {
                return;
            };
            let mut state = state.lock();
            state
                .subscribers
                .retain(|_, tx| tx.send(event).is_ok());
            state.delivered += 1;
        }

        // Subscriptions stay open until `close`; the next subscribe reopens
        // the source
        warn!(sandbox = %label, "OOM source ended while sandbox is live");
        if let Some(state) = state.upgrade() {
            state.lock().pump = None;
        }
    }
}

impl Drop for OomBroadcaster {
    fn drop(&mut self) {
        self.close();
    }
}

/// Lazy, non-restartable stream of OOM events for one subscriber
pub struct OomSubscription {
    id: SubscriptionId,
    events: UnboundedReceiverStream<OomEvent>,
}

impl OomSubscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next event; `None` once the stream is closed
    pub async fn recv(&mut self) -> Option<OomEvent> {
        futures::StreamExt::next(&mut self.events).await
    }
}

impl Stream for OomSubscription {
    type Item = OomEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events).poll_next(cx)
    }
}

impl std::fmt::Debug for OomSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("OomSubscription").field("id", &self.id).finish()
    }
}
