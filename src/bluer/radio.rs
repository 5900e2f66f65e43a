use std::collections::{BTreeMap, BTreeSet};
use std::pin::pin;

use async_trait::async_trait;
use bluer::adv::{AdvertisementHandle, Feature, Type};
use bluer::{AdapterEvent, Session};
use futures_lite::StreamExt;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::transmit_error;
use crate::address::Address;
use crate::error::ErrorKind;
use crate::radio::{RadioEvent, RadioEventSender};
use crate::{Advertisement, Error, Radio, Result};

/// Scan failure code reported when BlueZ ends a discovery session on its own.
pub const SCAN_FAILED_INTERNAL_ERROR: i32 = 3;

/// A [`Radio`] on top of the BlueZ default adapter.
///
/// Scanning runs discovery in a background task that forwards every added or changed device to the session.
/// Advertisements are registered with the BlueZ LE advertising manager and unregistered on stop or drop.
pub struct BluerRadio {
    _session: Session,
    adapter: bluer::Adapter,
    scan: Option<JoinHandle<()>>,
    advertisement: Option<AdvertisementHandle>,
}

impl std::fmt::Debug for BluerRadio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BluerRadio")
            .field("adapter", &self.adapter.name())
            .field("scanning", &self.scan.is_some())
            .field("advertising", &self.advertisement.is_some())
            .finish()
    }
}

impl BluerRadio {
    /// Opens the default adapter.
    ///
    /// Fails with [`ErrorKind::AdapterUnavailable`] if the adapter is powered off.
    pub async fn new() -> Result<Self> {
        let session = Session::new().await?;
        let adapter = session.default_adapter().await?;
        if !adapter.is_powered().await? {
            return Err(Error::new(
                ErrorKind::AdapterUnavailable,
                None,
                format!("adapter {} is powered off", adapter.name()),
            ));
        }

        info!("using adapter {} ({})", adapter.name(), adapter.address().await?);
        Ok(BluerRadio {
            _session: session,
            adapter,
            scan: None,
            advertisement: None,
        })
    }
}

/// Reads the current name and RSSI of `addr`. Devices without an RSSI are cached by BlueZ but not in range.
async fn observe(adapter: &bluer::Adapter, addr: bluer::Address) -> bluer::Result<Option<RadioEvent>> {
    let device = adapter.device(addr)?;
    let Some(rssi) = device.rssi().await? else {
        return Ok(None);
    };
    let name = device.name().await?;
    Ok(Some(RadioEvent::Observation {
        address: Address(addr.0),
        name,
        rssi,
    }))
}

#[async_trait]
impl Radio for BluerRadio {
    async fn start_scan(&mut self, events: RadioEventSender) -> Result<()> {
        if let Some(task) = self.scan.take() {
            task.abort();
        }

        let adapter = self.adapter.clone();
        let (started_tx, started_rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            let stream = match adapter.discover_devices_with_changes().await {
                Ok(stream) => {
                    let _ = started_tx.send(Ok(()));
                    stream
                }
                Err(err) => {
                    let _ = started_tx.send(Err(err));
                    return;
                }
            };

            let mut stream = pin!(stream);
            while let Some(event) = stream.next().await {
                let AdapterEvent::DeviceAdded(addr) = event else {
                    continue;
                };
                match observe(&adapter, addr).await {
                    Ok(Some(event)) => {
                        if !events.send(event) {
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(err) => debug!("skipping {}: {}", addr, err),
                }
            }

            warn!("discovery stream ended");
            events.send(RadioEvent::ScanFailed(SCAN_FAILED_INTERNAL_ERROR));
        });

        match started_rx.await {
            Ok(Ok(())) => {
                self.scan = Some(task);
                Ok(())
            }
            Ok(Err(err)) => Err(err.into()),
            Err(_) => Err(Error::new(
                ErrorKind::ScanFailed(SCAN_FAILED_INTERNAL_ERROR),
                None,
                "discovery task exited before starting".to_string(),
            )),
        }
    }

    async fn stop_scan(&mut self) -> Result<()> {
        // Dropping the discovery stream ends the discovery session.
        if let Some(task) = self.scan.take() {
            task.abort();
        }
        Ok(())
    }

    async fn start_transmit(&mut self, advertisement: &Advertisement) -> Result<()> {
        if self.advertisement.is_some() {
            return Err(crate::error::AdvertiseFailureCode::AlreadyStarted.into());
        }

        let mut system_includes = BTreeSet::new();
        if advertisement.include_tx_power {
            system_includes.insert(Feature::TxPower);
        }

        let adv = bluer::adv::Advertisement {
            advertisement_type: if advertisement.connectable {
                Type::Peripheral
            } else {
                Type::Broadcast
            },
            service_data: BTreeMap::from([(advertisement.service_uuid, advertisement.service_data.clone())]),
            discoverable: Some(true),
            system_includes,
            ..Default::default()
        };

        let handle = self.adapter.advertise(adv).await.map_err(transmit_error)?;
        self.advertisement = Some(handle);
        Ok(())
    }

    async fn stop_transmit(&mut self) -> Result<()> {
        // The advertisement is unregistered when its handle is dropped.
        self.advertisement = None;
        Ok(())
    }
}

impl Drop for BluerRadio {
    fn drop(&mut self) {
        if let Some(task) = self.scan.take() {
            task.abort();
        }
    }
}
