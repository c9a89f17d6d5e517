/*!
 * OOM Monitor
 * Consumer end of one opened OOM event source
 */

use super::types::OomEvent;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

/// Open monitor on one memory controller.
///
/// Events arrive in the order the controller reported them. After
/// [`OomMonitor::close`] (or once the producer goes away) `recv` drains
/// what was already buffered and then returns `None`.
pub struct OomMonitor {
    events: UnboundedReceiver<OomEvent>,
    producer: Option<JoinHandle<()>>,
}

impl OomMonitor {
    pub(crate) fn new(events: UnboundedReceiver<OomEvent>, producer: Option<JoinHandle<()>>) -> Self {
        Self { events, producer }
    }

    /// Wait for the next event, `None` once closed
    pub async fn recv(&mut self) -> Option<OomEvent> {
        self.events.recv().await
    }

    /// Stop the producer and refuse further events
    pub fn close(&mut self) {
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
        self.events.close();
    }
}

impl std::fmt::Debug for OomMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("OomMonitor")
            .field("producer", &self.producer.is_some())
            .finish()
    }
}

impl Drop for OomMonitor {
    fn drop(&mut self) {
        self.close();
    }
}
