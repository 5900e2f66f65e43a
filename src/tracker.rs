//! Deduplicating tracker for scan observations

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, info};

use crate::address::{Address, AddressPrefix};

/// A device seen during the current scan session
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceRecord {
    /// Hardware address of the advertiser
    pub address: Address,
    /// Advertised name, if any
    pub name: Option<String>,
    /// Signal strength of the most recent observation, in dBm
    pub rssi: i16,
}

impl DeviceRecord {
    /// The advertised name, or `UNKNOWN`
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("UNKNOWN")
    }
}

impl fmt::Display for DeviceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} RSSI: {}", self.display_name(), self.address, self.rssi)
    }
}

/// Change applied to the tracker by one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObservationDelta {
    /// A new record was appended at this index
    Inserted(usize),
    /// The record at this index was overwritten
    Updated(usize),
    /// The address is outside the target prefix
    Ignored,
}

/// The set of matching devices seen in the current scan session, in first-seen order.
#[derive(Debug, Clone)]
pub struct ScanTracker {
    prefix: AddressPrefix,
    records: Vec<DeviceRecord>,
    index: HashMap<Address, usize>,
}

impl ScanTracker {
    /// Creates an empty tracker reporting devices under `prefix`
    pub fn new(prefix: AddressPrefix) -> Self {
        ScanTracker {
            prefix,
            records: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// The vendor prefix this tracker filters on
    pub fn prefix(&self) -> AddressPrefix {
        self.prefix
    }

    /// Records an advertisement from `address`.
    ///
    /// Observations from an address already tracked overwrite that record in place.
    pub fn observe(&mut self, address: Address, name: Option<String>, rssi: i16) -> ObservationDelta {
        if !address.has_prefix(&self.prefix) {
            return ObservationDelta::Ignored;
        }

        let record = DeviceRecord { address, name, rssi };
        match self.index.get(&address) {
            Some(&i) => {
                self.records[i] = record;
                ObservationDelta::Updated(i)
            }
            None => {
                info!("target acquired: {} ({})", address, record.display_name());
                let i = self.records.len();
                self.records.push(record);
                self.index.insert(address, i);
                ObservationDelta::Inserted(i)
            }
        }
    }

    /// Like [`observe`][Self::observe], for an address not yet parsed.
    ///
    /// Unparseable addresses are ignored.
    pub fn observe_str(&mut self, address: &str, name: Option<String>, rssi: i16) -> ObservationDelta {
        match address.parse() {
            Ok(address) => self.observe(address, name, rssi),
            Err(err) => {
                debug!("ignoring observation: {}", err);
                ObservationDelta::Ignored
            }
        }
    }

    /// Forgets every record. Called at the start of each scan session.
    pub fn reset(&mut self) {
        self.records.clear();
        self.index.clear();
    }

    /// The tracked records in first-seen order
    pub fn records(&self) -> &[DeviceRecord] {
        &self.records
    }

    /// The record for `address`, if tracked
    pub fn get(&self, address: &Address) -> Option<&DeviceRecord> {
        self.index.get(address).map(|&i| &self.records[i])
    }

    /// Number of tracked devices
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no devices are tracked
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
