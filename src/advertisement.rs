use crate::Uuid;

/// A service-data advertisement ready to hand to a [`Radio`][crate::Radio].
///
/// The advertisement carries no device name and has no timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    /// Service UUID the payload is associated with
    pub service_uuid: Uuid,
    /// Service data payload
    pub service_data: Vec<u8>,
    /// Set to true for connectable advertising packets
    pub connectable: bool,
    /// Include the TX power level in the scan response
    pub include_tx_power: bool,
}
