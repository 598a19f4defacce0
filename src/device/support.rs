use log::debug;

use crate::config::types::DeviceRule;
use crate::discovery::types::{normalize_address, DeviceCandidate};

/// Family-specific pairing behaviour for a supported device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorHandle {
    pub family: String,
    pub pairing_entry: String,
}

impl CoordinatorHandle {
    pub fn pairing_entry(&self) -> &str {
        &self.pairing_entry
    }
}

/// Decides whether a discovered device is one this application knows how to pair with.
pub trait SupportCheck {
    fn classify(&self, candidate: &DeviceCandidate) -> Option<CoordinatorHandle>;

    fn is_supported(&self, candidate: &DeviceCandidate) -> bool {
        self.classify(candidate).is_some()
    }
}

/// Rule based support check; the first matching rule wins.
#[derive(Debug, Clone, Default)]
pub struct KnownDevices {
    rules: Vec<DeviceRule>,
}

impl KnownDevices {
    pub fn new(rules: Vec<DeviceRule>) -> Self {
        KnownDevices { rules }
    }

    fn matches(rule: &DeviceRule, candidate: &DeviceCandidate) -> bool {
        if rule.name_prefix.is_none() && rule.address_prefix.is_none() && rule.service.is_none() {
            return false;
        }

        if let Some(prefix) = &rule.name_prefix {
            let name = match &candidate.name {
                Some(name) => name.to_lowercase(),
                None => return false,
            };
            if !name.starts_with(&prefix.to_lowercase()) {
                return false;
            }
        }

        if let Some(prefix) = &rule.address_prefix {
            if !candidate.address.starts_with(&normalize_address(prefix)) {
                return false;
            }
        }

        if let Some(service) = &rule.service {
            if !candidate.services.contains(service) {
                return false;
            }
        }

        true
    }
}

impl SupportCheck for KnownDevices {
    fn classify(&self, candidate: &DeviceCandidate) -> Option<CoordinatorHandle> {
        let rule = self.rules.iter().find(|rule| KnownDevices::matches(rule, candidate))?;
        debug!("{} {} recognized as {}", candidate.address, candidate.display_name(), rule.family);

        Some(CoordinatorHandle {
            family: rule.family.clone(),
            pairing_entry: rule.pairing_entry.clone(),
        })
    }
}
