use indexmap::IndexMap;

use crate::discovery::types::{normalize_address, DeviceCandidate};

/// Discovered candidates in first-seen order, at most one per address.
#[derive(Debug, Clone, Default)]
pub struct CandidateList {
    entries: IndexMap<String, DeviceCandidate>,
}

impl CandidateList {
    pub fn new() -> Self {
        CandidateList::default()
    }

    /// Inserts the candidate, or replaces the entry with the same address in place.
    /// Returns true if the candidate was not listed before.
    pub fn upsert(&mut self, candidate: DeviceCandidate) -> bool {
        self.entries.insert(candidate.address.clone(), candidate).is_none()
    }

    pub fn get(&self, index: usize) -> Option<&DeviceCandidate> {
        self.entries.get_index(index).map(|(_, candidate)| candidate)
    }

    pub fn find(&self, address: &str) -> Option<&DeviceCandidate> {
        self.entries.get(address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceCandidate> {
        self.entries.values()
    }

    pub fn to_vec(&self) -> Vec<DeviceCandidate> {
        self.entries.values().cloned().collect()
    }

    /// Replaces the whole list. Order is kept; a later duplicate replaces the earlier one.
    pub fn restore(&mut self, candidates: Vec<DeviceCandidate>) {
        self.entries.clear();
        for mut candidate in candidates {
            // saved screens are plain json and may have been edited by hand
            candidate.address = normalize_address(&candidate.address);
            self.upsert(candidate);
        }
    }
}
