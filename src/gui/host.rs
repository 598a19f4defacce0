use crate::discovery::host::{DiscoveryHost, ScreenModel, ScreenSnapshot};
use crate::discovery::types::{Notice, PairingRequest};

/// Collects what the controller wants shown; the iced view reads it back on every frame.
#[derive(Debug, Default)]
pub struct ScreenHost {
    pub snapshot: ScreenSnapshot,
    // messages that the user must click away
    pub notices: Vec<String>,
    pub pairing: Option<PairingRequest>,
}

impl DiscoveryHost for ScreenHost {
    fn render(&mut self, screen: &ScreenModel<'_>) {
        self.snapshot = ScreenSnapshot::capture(screen);
    }

    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice.to_string());
    }

    fn open_pairing(&mut self, request: PairingRequest) {
        self.pairing = Some(request);
    }
}
