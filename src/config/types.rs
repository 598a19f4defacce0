use std::time::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::discovery::constants::{CLASSIC_INQUIRY_SECS, SCAN_DURATION_SECS};

/// Describes one family of supported devices and how to recognize it in a sighting.
/// Every matcher that is set must match; a rule without any matcher never matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRule {
    pub family: String,
    pub pairing_entry: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub scan_duration_secs: u64,
    pub classic_inquiry_secs: u64,
    pub low_energy: bool,
    pub devices: Vec<DeviceRule>,
}

impl Config {
    pub fn scan_duration(&self) -> Duration {
        Duration::from_secs(self.scan_duration_secs.max(1))
    }

    pub fn classic_inquiry_window(&self) -> Duration {
        Duration::from_secs(self.classic_inquiry_secs.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            scan_duration_secs: SCAN_DURATION_SECS,
            classic_inquiry_secs: CLASSIC_INQUIRY_SECS,
            low_energy: true,
            devices: vec![
                DeviceRule {
                    family: "Pebble".to_string(),
                    pairing_entry: "pebble-pairing".to_string(),
                    name_prefix: Some("Pebble".to_string()),
                    address_prefix: None,
                    service: None,
                },
                DeviceRule {
                    family: "Mi Band".to_string(),
                    pairing_entry: "miband-pairing".to_string(),
                    name_prefix: None,
                    address_prefix: Some("88:0F:10".to_string()),
                    service: None,
                },
            ],
        }
    }
}
