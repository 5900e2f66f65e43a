//! Platform radio primitives consumed by the session.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::address::Address;
use crate::{Advertisement, Result};

/// Something reported by the radio while a scan is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    /// An advertisement was received
    Observation {
        /// Source address
        address: Address,
        /// Advertised or OS-assigned name
        name: Option<String>,
        /// Received signal strength in dBm
        rssi: i16,
    },
    /// The platform aborted a running scan with this code
    ScanFailed(i32),
}

/// Delivers radio callbacks into the session's event loop.
///
/// Backends that receive callbacks on their own threads or tasks must go through this sender; the session is the
/// only owner of tracker and controller state. Each sender belongs to one scan session: once the session stops or
/// restarts scanning, events queued through an older sender are discarded.
#[derive(Debug, Clone)]
pub struct RadioEventSender {
    tx: mpsc::UnboundedSender<ScanEvent>,
    generation: u64,
}

/// A radio event tagged with the scan session that produced it.
#[derive(Debug)]
pub(crate) struct ScanEvent {
    pub generation: u64,
    pub event: RadioEvent,
}

impl RadioEventSender {
    pub(crate) fn new(tx: mpsc::UnboundedSender<ScanEvent>, generation: u64) -> Self {
        RadioEventSender { tx, generation }
    }

    /// Queues an event. Returns `false` once the session is gone.
    pub fn send(&self, event: RadioEvent) -> bool {
        self.tx
            .send(ScanEvent {
                generation: self.generation,
                event,
            })
            .is_ok()
    }

    /// Queues an [`RadioEvent::Observation`]
    pub fn observation(&self, address: Address, name: Option<String>, rssi: i16) -> bool {
        self.send(RadioEvent::Observation { address, name, rssi })
    }

    /// Returns `true` once the session is gone
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The platform scan and advertise primitives.
///
/// Every method completes once the platform has accepted or rejected the request.
#[async_trait]
pub trait Radio: Send {
    /// Starts scanning. Observations are delivered through `events` until [`stop_scan`][Self::stop_scan].
    async fn start_scan(&mut self, events: RadioEventSender) -> Result<()>;

    /// Stops a running scan
    async fn stop_scan(&mut self) -> Result<()>;

    /// Starts broadcasting `advertisement`
    async fn start_transmit(&mut self, advertisement: &Advertisement) -> Result<()>;

    /// Stops the current broadcast
    async fn stop_transmit(&mut self) -> Result<()>;
}

#[async_trait]
impl<R: Radio + ?Sized> Radio for Box<R> {
    async fn start_scan(&mut self, events: RadioEventSender) -> Result<()> {
        (**self).start_scan(events).await
    }

    async fn stop_scan(&mut self) -> Result<()> {
        (**self).stop_scan().await
    }

    async fn start_transmit(&mut self, advertisement: &Advertisement) -> Result<()> {
        (**self).start_transmit(advertisement).await
    }

    async fn stop_transmit(&mut self) -> Result<()> {
        (**self).stop_transmit().await
    }
}
