use log::warn;

use super::InstrumentTransport;

/// Placeholder entry returned when enumeration fails or finds nothing.
pub const NO_DEVICES: &str = "No devices found!";

/// List instrument addresses for a device-selection control.
///
/// Never fails: a transport error or an empty bus yields `[NO_DEVICES]`.
pub async fn list_devices(transport: &dyn InstrumentTransport) -> Vec<String> {
    match transport.list_resources().await {
        Ok(resources) if !resources.is_empty() => resources,
        Ok(_) => vec![NO_DEVICES.to_string()],
        Err(e) => {
            warn!("{}: device enumeration failed: {}", transport.transport_id(), e);
            vec![NO_DEVICES.to_string()]
        }
    }
}

/// True when `devices` is the enumeration sentinel rather than real addresses.
pub fn is_sentinel(devices: &[String]) -> bool {
    devices.len() == 1 && devices[0] == NO_DEVICES
}
