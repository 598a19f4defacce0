use log::{debug, info, warn};

use crate::discovery::candidates::CandidateList;
use crate::discovery::types::{DeviceCandidate, Notice, PairingRequest, ScanState};

/// Read-only projection of the controller handed to the host on every refresh.
pub struct ScreenModel<'a> {
    pub scan: ScanState,
    pub start_enabled: bool,
    pub candidates: &'a CandidateList,
}

/// Whatever shows the discovery screen to the user.
pub trait DiscoveryHost {
    fn render(&mut self, screen: &ScreenModel<'_>);

    /// A transient message, such as a toast.
    fn notify(&mut self, notice: Notice);

    /// Leave the discovery screen for a pairing entry point.
    fn open_pairing(&mut self, request: PairingRequest);
}

/// Owned copy of the last rendered [`ScreenModel`].
#[derive(Debug, Clone, Default)]
pub struct ScreenSnapshot {
    pub scan: ScanState,
    pub start_enabled: bool,
    pub candidates: Vec<DeviceCandidate>,
}

impl ScreenSnapshot {
    pub fn capture(screen: &ScreenModel<'_>) -> Self {
        ScreenSnapshot {
            scan: screen.scan,
            start_enabled: screen.start_enabled,
            candidates: screen.candidates.to_vec(),
        }
    }

    pub fn progress_visible(&self) -> bool {
        self.scan.is_scanning()
    }

    pub fn start_label(&self) -> &'static str {
        self.scan.start_label()
    }
}

/// Host without a user interface. Everything goes to the log.
#[derive(Debug, Default)]
pub struct LogHost {
    pub snapshot: ScreenSnapshot,
    pub notices: Vec<Notice>,
}

impl DiscoveryHost for LogHost {
    fn render(&mut self, screen: &ScreenModel<'_>) {
        if screen.candidates.len() != self.snapshot.candidates.len() || screen.scan != self.snapshot.scan {
            info!("{}; {} candidate(s)", screen.scan, screen.candidates.len());
        }
        self.snapshot = ScreenSnapshot::capture(screen);
    }

    fn notify(&mut self, notice: Notice) {
        warn!("{}", notice);
        self.notices.push(notice);
    }

    fn open_pairing(&mut self, request: PairingRequest) {
        debug!("No pairing screen available for {} ({})", request.address, request.pairing_entry);
    }
}
