//! Controller configuration

use std::time::Duration;

use tracing::debug;

use crate::address::AddressPrefix;
use crate::btuuid::{services, BluetoothUuidExt};
use crate::payload::{parse_hex, BaseTemplate, REFERENCE_TEMPLATE};
use crate::{Error, Result, Uuid};

/// Vendor prefix of the devices the scanner reports
pub const DEFAULT_TARGET_PREFIX: AddressPrefix = AddressPrefix([0x00, 0x25, 0xDF]);

/// Delay between fuzz ticks
pub const DEFAULT_FUZZ_INTERVAL: Duration = Duration::from_millis(500);

/// Static settings for a [`Session`][crate::Session].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Only devices whose address starts with this prefix are tracked
    pub target_prefix: AddressPrefix,
    /// 16-bit service UUID the payload is advertised under
    pub service_uuid: Uuid,
    /// Unmutated service-data payload
    pub base_template: Vec<u8>,
    /// Delay between fuzz ticks
    pub fuzz_interval: Duration,
    /// Advertise as connectable
    pub connectable: bool,
    /// Include the TX power level in the scan response
    pub include_tx_power: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            target_prefix: DEFAULT_TARGET_PREFIX,
            service_uuid: services::BEACON_SERVICE,
            base_template: REFERENCE_TEMPLATE.to_vec(),
            fuzz_interval: DEFAULT_FUZZ_INTERVAL,
            connectable: true,
            include_tx_power: true,
        }
    }
}

impl Config {
    /// The default configuration with overrides from `BLUEFUZZ_TARGET_PREFIX`, `BLUEFUZZ_INTERVAL_MS` and
    /// `BLUEFUZZ_TEMPLATE` (hex, spaces allowed).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(prefix) = lookup("BLUEFUZZ_TARGET_PREFIX") {
            config.target_prefix = prefix
                .parse()
                .map_err(|_| Error::configuration(format!("BLUEFUZZ_TARGET_PREFIX: invalid prefix {prefix:?}")))?;
        }
        if let Some(ms) = lookup("BLUEFUZZ_INTERVAL_MS") {
            let ms: u64 = ms
                .trim()
                .parse()
                .map_err(|_| Error::configuration(format!("BLUEFUZZ_INTERVAL_MS: not a number: {ms:?}")))?;
            config.fuzz_interval = Duration::from_millis(ms);
        }
        if let Some(hex) = lookup("BLUEFUZZ_TEMPLATE") {
            config.base_template = parse_hex(&hex)?;
        }

        debug!(?config, "loaded configuration");
        Ok(config)
    }

    /// Checks the configuration and returns the validated payload template.
    ///
    /// All failures have kind [`ErrorKind::Configuration`][crate::error::ErrorKind::Configuration].
    pub fn validate(&self) -> Result<BaseTemplate> {
        if self.fuzz_interval.is_zero() {
            return Err(Error::configuration("fuzz interval must be non-zero"));
        }
        if !self.service_uuid.is_u16_uuid() {
            return Err(Error::configuration(format!(
                "service UUID {} is not a 16-bit Bluetooth UUID",
                self.service_uuid
            )));
        }
        BaseTemplate::new(self.base_template.clone())
    }
}
