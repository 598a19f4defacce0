use std::hash::{Hash, Hasher};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::discovery::constants::{LABEL_START_SCANNING, LABEL_STOP_SCANNING, NOTICE_ENABLE_BLUETOOTH};

/// A discovered device that passed the support check but is not paired yet.
///
/// Two candidates are equal when they share an address, so a rediscovered device
/// replaces its earlier entry instead of being listed twice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCandidate {
    pub address: String,
    pub name: Option<String>,
    pub rssi: i16,
    #[serde(default)]
    pub services: Vec<Uuid>,
}

impl DeviceCandidate {
    pub fn new(address: &str, name: Option<String>, rssi: i16) -> Self {
        DeviceCandidate {
            address: normalize_address(address),
            name: name.filter(|name| !name.trim().is_empty()),
            rssi,
            services: Vec::new(),
        }
    }

    pub fn with_services(mut self, services: Vec<Uuid>) -> Self {
        self.services = services;
        self
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("(unknown)")
    }
}

impl PartialEq for DeviceCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for DeviceCandidate {}

impl Hash for DeviceCandidate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

pub fn normalize_address(address: &str) -> String {
    address.trim().to_uppercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanState {
    #[default]
    Off,
    ScanningClassic,
    ScanningLowEnergy,
}

impl ScanState {
    pub fn is_scanning(&self) -> bool {
        *self != ScanState::Off
    }

    pub fn start_label(&self) -> &'static str {
        if self.is_scanning() { LABEL_STOP_SCANNING } else { LABEL_START_SCANNING }
    }
}

impl std::fmt::Display for ScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let result = match self {
            ScanState::Off => "Off",
            ScanState::ScanningClassic => "Scanning (Classic)",
            ScanState::ScanningLowEnergy => "Scanning (Low Energy)",
        };

        write!(f, "{}", result)
    }
}

/// Everything the controller reacts to. Platform notifications and timer callbacks are both
/// delivered through this one type, in order, on the thread that owns the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryEvent {
    DiscoveryStarted,
    DiscoveryFinished,
    AdapterStateChanged { powered_on: bool },
    DeviceFound {
        address: String,
        name: Option<String>,
        rssi: i16,
        services: Vec<Uuid>,
    },
    ScanTimeout { generation: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    EnableBluetooth,
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::EnableBluetooth => write!(f, "{}", NOTICE_ENABLE_BLUETOOTH),
        }
    }
}

/// Screen transition to the pairing entry point of a device family. The address is the only
/// parameter handed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingRequest {
    pub family: String,
    pub pairing_entry: String,
    pub address: String,
}

/// State that survives the screen being torn down and entered again.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedScreen {
    pub candidates: Vec<DeviceCandidate>,
}
