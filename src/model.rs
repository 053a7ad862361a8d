use serde::Deserialize;
use std::collections::HashSet;

type Percent = f64;
type Minutes = f64;
type Watts = f64;

/// One monitored device as read from the device file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Human readable name, exported as the `description` label.
    #[serde(default, alias = "description")]
    pub label: String,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub app_key: String,
    #[serde(default)]
    pub secret_key: String,
}

impl Device {
    /// Falls back to the serial number when no label was configured.
    pub fn apply_defaults(&mut self) {
        if self.label.is_empty() {
            self.label = self.serial_number.clone();
        }
    }
}

/// Build the working set of devices keyed by serial number.
///
/// The first occurrence of a serial number wins and later ones are dropped. Defaults are
/// applied to retained entries only. Input order is preserved.
pub fn dedup(devices: Vec<Device>) -> Vec<Device> {
    let mut seen = HashSet::new();

    devices
        .into_iter()
        .filter_map(|mut device| {
            if device.serial_number.is_empty() {
                log::warn!("device entry without serialNumber (label: {:?})", device.label);
            }

            if seen.insert(device.serial_number.clone()) {
                device.apply_defaults();
                Some(device)
            } else {
                log::warn!(
                    "ignoring duplicate device with serialNumber {:?}",
                    device.serial_number
                );
                None
            }
        })
        .collect()
}

/// Latest readings for a single device, as returned by one upstream query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryReading {
    /// Upstream result code, `"0"` on success.
    pub code: String,
    pub message: String,
    pub state_of_charge: Percent,
    pub remaining_runtime: Minutes,
    pub watts_out_sum: Watts,
    pub watts_in_sum: Watts,
}

impl TelemetryReading {
    pub const SUCCESS_CODE: &'static str = "0";

    pub fn is_success(&self) -> bool {
        self.code == Self::SUCCESS_CODE
    }
}
