#![warn(missing_docs)]

//! Bluefuzz drives a [Bluetooth Low Energy] beacon from [Rust]: it scans for advertisers from one vendor address
//! range and broadcasts a service-data advertisement whose payload can be mutated on a fixed cycle.
//!
//! [Rust]: https://www.rust-lang.org/
//! [Bluetooth Low Energy]: https://www.bluetooth.com/specifications/specs/
//!
//! # Usage
//!
//! ```rust,no_run
//!# use bluefuzz::{BluerRadio, Config, Session, SessionEvent};
//!# #[tokio::main]
//!# async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!let radio = BluerRadio::new().await?;
//!let (session, handle, mut events) = Session::new(Config::default(), radio)?;
//!tokio::spawn(session.run());
//!
//!handle.start_scan().await?;
//!handle.start_advertising().await?;
//!handle.toggle_fuzzing().await?;
//!
//!while let Some(event) = events.recv().await {
//!    match event {
//!        SessionEvent::State(state) => println!("{}", state.status_line()),
//!        SessionEvent::Device { record, .. } => println!("{record}"),
//!        other => println!("{other:?}"),
//!    }
//!}
//!#
//!#    Ok(())
//!# }
//! ```
//!
//! # Overview
//!
//! - [`payload`]: the base template and the pure [`mutate`][payload::mutate] function that patches a 16-bit counter
//!   into bytes 10, 11, 20 and 21.
//! - [`AdvertisementController`]: the idle/advertising state machine with its fuzz flag. While fuzzing, every
//!   interval it stops the broadcast, advances the counter and restarts with the next payload.
//! - [`ScanTracker`]: the devices seen in the current scan session whose address starts with the target vendor
//!   prefix, deduplicated by address and kept in first-seen order.
//! - [`Session`]: the single owner of both, fed by a [`SessionHandle`] and by the [`Radio`] backend, and reporting
//!   [`SessionEvent`]s for display.
//!
//! # Platform specifics
//!
//! Platform scan and advertise primitives sit behind the [`Radio`] trait. On Linux, [`BluerRadio`] implements it on
//! top of BlueZ through the `bluer` crate, which requires the Tokio runtime. Other platforms can plug in their own
//! implementation; radio callbacks must be funnelled through the supplied [`RadioEventSender`].
//!
//! # Feature flags
//!
//! The `serde` feature is available to enable serializing/deserializing configuration, addresses, device records
//! and controller snapshots.

pub mod address;
pub mod btuuid;
pub mod config;
pub mod controller;
pub mod error;
pub mod payload;
pub mod radio;
pub mod tracker;

mod advertisement;
mod session;

#[cfg(target_os = "linux")]
mod bluer;

pub use address::{Address, AddressPrefix};
pub use advertisement::Advertisement;
#[cfg(target_os = "linux")]
pub use crate::bluer::radio::BluerRadio;
pub use btuuid::BluetoothUuidExt;
pub use config::Config;
pub use controller::{AdvertisementController, ControllerState, StopOutcome};
pub use error::Error;
pub use radio::{Radio, RadioEvent, RadioEventSender};
pub use session::{Intent, Session, SessionEvent, SessionEvents, SessionHandle};
pub use tracker::{DeviceRecord, ObservationDelta, ScanTracker};
pub use uuid::Uuid;

/// Convenience alias for a result with [`Error`]
pub type Result<T, E = Error> = core::result::Result<T, E>;
