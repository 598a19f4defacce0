use futures::SinkExt;
use futures::channel::mpsc::Sender;
use log::{debug, warn};
use tokio::spawn;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

use crate::discovery::types::DiscoveryEvent;

/// The single pending deadline of a scan phase.
///
/// When it fires, a `ScanTimeout` carrying the generation it was armed with is posted to the
/// controller's event channel. A timeout whose generation is no longer current is stale.
pub struct ScanTimer {
    events: Sender<DiscoveryEvent>,
    generation: u64,
    pending: Option<CancellationToken>,
}

impl ScanTimer {
    pub fn new(events: Sender<DiscoveryEvent>) -> Self {
        ScanTimer {
            events,
            generation: 0,
            pending: None,
        }
    }

    /// Disarms any pending deadline first, so at most one is ever pending.
    pub fn arm(&mut self, duration: Duration) {
        self.disarm();

        self.generation += 1;
        let generation = self.generation;
        let cancel = CancellationToken::new();
        let mut events = self.events.clone();
        self.pending = Some(cancel.clone());

        debug!("Scan timer {} armed for {}", generation, humantime::format_duration(duration));
        spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {},
                _ = sleep(duration) => {
                    if let Err(err) = events.send(DiscoveryEvent::ScanTimeout { generation }).await {
                        warn!("Failed to deliver scan timeout: {:?}", err);
                    }
                },
            }
        });
    }

    pub fn disarm(&mut self) {
        if let Some(cancel) = self.pending.take() {
            debug!("Scan timer {} disarmed", self.generation);
            cancel.cancel();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Number of times the timer has been armed.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Consumes a timeout. Returns true if it belongs to the currently pending deadline.
    pub fn fired(&mut self, generation: u64) -> bool {
        if self.pending.is_some() && generation == self.generation {
            self.pending = None;
            true
        } else {
            false
        }
    }
}

impl Drop for ScanTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}
