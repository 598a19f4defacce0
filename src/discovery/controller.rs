use futures::channel::mpsc::Sender;
use log::{debug, error, info, warn};
use tokio::time::Duration;

use crate::device::support::SupportCheck;
use crate::discovery::candidates::CandidateList;
use crate::discovery::constants::scan_duration;
use crate::discovery::host::{DiscoveryHost, ScreenModel};
use crate::discovery::machine::{self, DiscoveryState, Effect};
use crate::discovery::timer::ScanTimer;
use crate::discovery::types::{DeviceCandidate, DiscoveryEvent, PairingRequest, SavedScreen, ScanState};
use crate::error::DiscoveryError;
use crate::platform::BluetoothPlatform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSettings {
    pub scan_duration: Duration,
    pub low_energy: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        ScanSettings {
            scan_duration: scan_duration(),
            low_energy: true,
        }
    }
}

/// Drives the discovery screen: scan phases, the scan timer, the candidate list and the
/// hand-off to pairing. All events must be delivered from one thread, in order.
pub struct DiscoveryController<P: BluetoothPlatform, H: DiscoveryHost> {
    platform: P,
    host: H,
    support: Box<dyn SupportCheck>,
    settings: ScanSettings,
    state: DiscoveryState,
    candidates: CandidateList,
    timer: ScanTimer,
    registered: bool,
}

impl<P: BluetoothPlatform, H: DiscoveryHost> DiscoveryController<P, H> {
    /// `events` is the sending half of the channel this controller's events are read from; the
    /// scan timer posts its timeouts there.
    pub fn new(
        platform: P,
        host: H,
        support: Box<dyn SupportCheck>,
        settings: ScanSettings,
        events: Sender<DiscoveryEvent>,
    ) -> Self {
        DiscoveryController {
            platform,
            host,
            support,
            settings,
            state: DiscoveryState::default(),
            candidates: CandidateList::new(),
            timer: ScanTimer::new(events),
            registered: false,
        }
    }

    pub fn scan_state(&self) -> ScanState {
        self.state.scan
    }

    pub fn start_enabled(&self) -> bool {
        self.state.start_enabled
    }

    pub fn candidates(&self) -> &CandidateList {
        &self.candidates
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn timer(&self) -> &ScanTimer {
        &self.timer
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Screen entry. Scanning always starts out off; only the candidate list is restored.
    pub fn enter(&mut self, saved: Option<SavedScreen>) {
        if self.registered {
            warn!("Discovery screen entered twice");
            return;
        }

        self.platform.register();
        self.registered = true;
        self.state = DiscoveryState::default();

        if let Some(saved) = saved {
            info!("Restoring {} candidate(s)", saved.candidates.len());
            self.candidates.restore(saved.candidates);
        }

        self.render();
    }

    /// Screen exit. Stops any scan and unregisters from the platform.
    pub fn exit(&mut self) -> SavedScreen {
        self.stop_discovery();
        self.timer.disarm();

        if self.registered {
            self.platform.unregister();
            self.registered = false;
        }

        SavedScreen { candidates: self.candidates.to_vec() }
    }

    pub fn start_discovery(&mut self) -> Result<(), DiscoveryError> {
        let ready = self.state.scan.is_scanning() || self.platform.is_available();
        let effects = machine::start(&mut self.state, ready);
        self.apply(effects);

        if ready { Ok(()) } else { Err(DiscoveryError::BluetoothUnavailable) }
    }

    pub fn stop_discovery(&mut self) {
        let effects = machine::stop(&mut self.state);
        self.apply(effects);
    }

    /// The start/stop control.
    pub fn toggle_discovery(&mut self) {
        debug!("Start button clicked");
        if self.state.scan.is_scanning() {
            self.stop_discovery();
        } else if let Err(err) = self.start_discovery() {
            debug!("Discovery not started: {}", err);
        }
    }

    pub fn handle(&mut self, event: DiscoveryEvent) {
        let effects = match event {
            DiscoveryEvent::DiscoveryStarted => machine::classic_started(&mut self.state),
            DiscoveryEvent::DiscoveryFinished => {
                let low_energy = self.settings.low_energy && self.platform.supports_low_energy();
                machine::classic_finished(&mut self.state, low_energy)
            },
            DiscoveryEvent::AdapterStateChanged { powered_on } => {
                machine::adapter_state_changed(&mut self.state, powered_on)
            },
            DiscoveryEvent::DeviceFound { address, name, rssi, services } => {
                let candidate = DeviceCandidate::new(&address, name, rssi).with_services(services);
                self.device_found(candidate);
                vec![]
            },
            DiscoveryEvent::ScanTimeout { generation } => {
                if self.timer.fired(generation) {
                    machine::timed_out(&mut self.state)
                } else {
                    debug!("Ignoring stale scan timeout {}", generation);
                    vec![]
                }
            },
        };

        self.apply(effects);
    }

    /// The user picked the candidate at `index` in the rendered list.
    pub fn select(&mut self, index: usize) -> Result<(), DiscoveryError> {
        let candidate = match self.candidates.get(index) {
            Some(candidate) => candidate,
            None => {
                error!("Device candidate {} clicked, but item not found", index);
                return Err(DiscoveryError::StaleSelection { index, len: self.candidates.len() });
            },
        };

        let coordinator = match self.support.classify(candidate) {
            Some(coordinator) => coordinator,
            None => {
                error!("Device candidate {} clicked, but it is not supported", candidate.address);
                return Err(DiscoveryError::Unsupported { address: candidate.address.clone() });
            },
        };

        info!("Opening {} for {}", coordinator.pairing_entry(), candidate.address);
        let request = PairingRequest {
            family: coordinator.family,
            pairing_entry: coordinator.pairing_entry,
            address: candidate.address.clone(),
        };
        self.host.open_pairing(request);
        Ok(())
    }

    fn device_found(&mut self, candidate: DeviceCandidate) {
        if !self.support.is_supported(&candidate) {
            return;
        }

        if self.candidates.upsert(candidate) {
            debug!("{} candidate(s) found", self.candidates.len());
        }
        self.render();
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::CancelDiscovery => self.platform.cancel_discovery(),
                Effect::StartClassicDiscovery => self.platform.start_classic_discovery(),
                Effect::StartLowEnergyScan => self.platform.start_low_energy_scan(),
                Effect::StopLowEnergyScan => self.platform.stop_low_energy_scan(),
                Effect::ArmTimer => self.timer.arm(self.settings.scan_duration),
                Effect::DisarmTimer => self.timer.disarm(),
                Effect::Notify(notice) => self.host.notify(notice),
                Effect::Render => self.render(),
            }
        }
    }

    fn render(&mut self) {
        let screen = ScreenModel {
            scan: self.state.scan,
            start_enabled: self.state.start_enabled,
            candidates: &self.candidates,
        };
        self.host.render(&screen);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc::{channel, Receiver};
    use futures::StreamExt;
    use crate::device::support::CoordinatorHandle;
    use crate::discovery::host::ScreenSnapshot;
    use crate::discovery::types::Notice;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum PlatformCall {
        Register,
        Unregister,
        CancelDiscovery,
        StartClassic,
        StartLowEnergy,
        StopLowEnergy,
    }

    #[derive(Debug, Default)]
    pub struct FakePlatform {
        pub available: bool,
        pub low_energy: bool,
        pub calls: Vec<PlatformCall>,
    }

    impl FakePlatform {
        pub fn ready() -> Self {
            FakePlatform { available: true, low_energy: true, calls: vec![] }
        }

        pub fn count(&self, call: PlatformCall) -> usize {
            self.calls.iter().filter(|c| **c == call).count()
        }
    }

    impl BluetoothPlatform for FakePlatform {
        fn is_available(&self) -> bool { self.available }
        fn supports_low_energy(&self) -> bool { self.low_energy }
        fn register(&mut self) { self.calls.push(PlatformCall::Register) }
        fn unregister(&mut self) { self.calls.push(PlatformCall::Unregister) }
        fn cancel_discovery(&mut self) { self.calls.push(PlatformCall::CancelDiscovery) }
        fn start_classic_discovery(&mut self) { self.calls.push(PlatformCall::StartClassic) }
        fn start_low_energy_scan(&mut self) { self.calls.push(PlatformCall::StartLowEnergy) }
        fn stop_low_energy_scan(&mut self) { self.calls.push(PlatformCall::StopLowEnergy) }
    }

    #[derive(Debug, Default)]
    pub struct RecordingHost {
        pub renders: usize,
        pub snapshot: ScreenSnapshot,
        pub notices: Vec<Notice>,
        pub pairings: Vec<PairingRequest>,
    }

    impl DiscoveryHost for RecordingHost {
        fn render(&mut self, screen: &ScreenModel<'_>) {
            self.renders += 1;
            self.snapshot = ScreenSnapshot::capture(screen);
        }

        fn notify(&mut self, notice: Notice) {
            self.notices.push(notice);
        }

        fn open_pairing(&mut self, request: PairingRequest) {
            self.pairings.push(request);
        }
    }

    /// Accepts every device whose address does not start with "00".
    pub struct RejectZeroPrefix;

    impl SupportCheck for RejectZeroPrefix {
        fn classify(&self, candidate: &DeviceCandidate) -> Option<CoordinatorHandle> {
            if candidate.address.starts_with("00") {
                return None;
            }
            Some(CoordinatorHandle { family: "Test".into(), pairing_entry: "test-pairing".into() })
        }
    }

    type TestController = DiscoveryController<FakePlatform, RecordingHost>;

    pub fn controller(platform: FakePlatform) -> (TestController, Receiver<DiscoveryEvent>) {
        let (tx, rx) = channel(16);
        let controller = DiscoveryController::new(
            platform,
            RecordingHost::default(),
            Box::new(RejectZeroPrefix),
            ScanSettings::default(),
            tx,
        );
        (controller, rx)
    }

    fn found(address: &str, name: Option<&str>, rssi: i16) -> DiscoveryEvent {
        DiscoveryEvent::DeviceFound {
            address: address.to_string(),
            name: name.map(str::to_string),
            rssi,
            services: vec![],
        }
    }

    #[tokio::test]
    async fn start_scans_classic_and_arms_timer() {
        let (mut controller, _rx) = controller(FakePlatform::ready());
        controller.enter(None);
        controller.start_discovery().unwrap();

        assert_eq!(controller.scan_state(), ScanState::ScanningClassic);
        assert!(controller.timer().is_armed());
        assert_eq!(controller.platform().calls, vec![
            PlatformCall::Register,
            PlatformCall::CancelDiscovery,
            PlatformCall::StartClassic,
        ]);
        assert!(controller.host().snapshot.scan.is_scanning());
    }

    #[tokio::test]
    async fn start_without_bluetooth_notifies_once() {
        let (mut controller, _rx) = controller(FakePlatform::default());
        controller.enter(None);

        assert_eq!(controller.start_discovery(), Err(DiscoveryError::BluetoothUnavailable));
        assert_eq!(controller.scan_state(), ScanState::Off);
        assert_eq!(controller.host().notices, vec![Notice::EnableBluetooth]);
        assert!(!controller.start_enabled());
        assert!(!controller.timer().is_armed());
    }

    #[tokio::test]
    async fn stop_when_off_is_noop() {
        let (mut controller, _rx) = controller(FakePlatform::ready());
        controller.enter(None);
        let renders = controller.host().renders;

        controller.stop_discovery();

        assert_eq!(controller.scan_state(), ScanState::Off);
        assert_eq!(controller.platform().calls, vec![PlatformCall::Register]);
        assert_eq!(controller.host().renders, renders);
    }

    #[tokio::test]
    async fn classic_finish_continues_with_low_energy() {
        let (mut controller, _rx) = controller(FakePlatform::ready());
        controller.enter(None);
        controller.start_discovery().unwrap();
        let generation = controller.timer().generation();

        controller.handle(DiscoveryEvent::DiscoveryStarted);
        controller.handle(DiscoveryEvent::DiscoveryFinished);

        assert_eq!(controller.scan_state(), ScanState::ScanningLowEnergy);
        assert_eq!(controller.timer().generation(), generation + 1);
        assert!(controller.timer().is_armed());
        assert_eq!(controller.platform().count(PlatformCall::StartLowEnergy), 1);
    }

    #[tokio::test]
    async fn classic_finish_without_low_energy_stops() {
        let platform = FakePlatform { low_energy: false, ..FakePlatform::ready() };
        let (mut controller, _rx) = controller(platform);
        controller.enter(None);
        controller.start_discovery().unwrap();
        controller.handle(DiscoveryEvent::DiscoveryStarted);

        controller.handle(DiscoveryEvent::DiscoveryFinished);

        assert_eq!(controller.scan_state(), ScanState::Off);
        assert!(!controller.timer().is_armed());
        assert_eq!(controller.platform().count(PlatformCall::StartLowEnergy), 0);
    }

    #[tokio::test]
    async fn earlier_classic_finish_does_not_end_a_restarted_scan() {
        let (mut controller, _rx) = controller(FakePlatform::ready());
        controller.enter(None);
        controller.start_discovery().unwrap();
        controller.handle(DiscoveryEvent::DiscoveryStarted);
        controller.stop_discovery();
        controller.start_discovery().unwrap();

        // queued by the platform before it saw the restart
        controller.handle(DiscoveryEvent::DiscoveryFinished);
        assert_eq!(controller.scan_state(), ScanState::ScanningClassic);
        assert_eq!(controller.platform().count(PlatformCall::StartLowEnergy), 0);

        controller.handle(DiscoveryEvent::DiscoveryStarted);
        controller.handle(DiscoveryEvent::DiscoveryFinished);
        assert_eq!(controller.scan_state(), ScanState::ScanningLowEnergy);
    }

    #[tokio::test]
    async fn start_refused_while_probing_is_enabled_once_adapter_reports() {
        let (mut controller, _rx) = controller(FakePlatform::default());
        controller.enter(None);

        assert_eq!(controller.start_discovery(), Err(DiscoveryError::BluetoothUnavailable));
        assert!(!controller.host().snapshot.start_enabled);

        // the adapter worker answers the registration with the adapter state
        controller.platform_mut().available = true;
        controller.handle(DiscoveryEvent::AdapterStateChanged { powered_on: true });

        assert!(controller.start_enabled());
        assert!(controller.host().snapshot.start_enabled);
        assert_eq!(controller.scan_state(), ScanState::Off);
        controller.toggle_discovery();
        assert_eq!(controller.scan_state(), ScanState::ScanningClassic);
        assert_eq!(controller.host().notices.len(), 1);
    }

    #[tokio::test]
    async fn adapter_change_forces_off() {
        let (mut controller, _rx) = controller(FakePlatform::ready());
        controller.enter(None);
        controller.start_discovery().unwrap();
        controller.handle(DiscoveryEvent::DiscoveryStarted);
        controller.handle(DiscoveryEvent::DiscoveryFinished);

        controller.handle(DiscoveryEvent::AdapterStateChanged { powered_on: false });

        assert_eq!(controller.scan_state(), ScanState::Off);
        assert!(!controller.start_enabled());
        assert!(!controller.timer().is_armed());
        assert_eq!(controller.platform().count(PlatformCall::StopLowEnergy), 1);

        controller.handle(DiscoveryEvent::AdapterStateChanged { powered_on: true });
        assert!(controller.start_enabled());
        assert_eq!(controller.platform().count(PlatformCall::StopLowEnergy), 1);
    }

    #[tokio::test]
    async fn device_found_deduplicates_and_filters() {
        let (mut controller, _rx) = controller(FakePlatform::ready());
        controller.enter(None);

        controller.handle(found("AA:BB:CC:DD:EE:01", Some("One"), -70));
        controller.handle(found("00:11:22:33:44:55", Some("Rejected"), -20));
        controller.handle(found("AA:BB:CC:DD:EE:02", None, -90));
        controller.handle(found("aa:bb:cc:dd:ee:01", Some("One again"), -50));

        let candidates = &controller.host().snapshot.candidates;
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].address, "AA:BB:CC:DD:EE:01");
        assert_eq!(candidates[0].name.as_deref(), Some("One again"));
        assert_eq!(candidates[0].rssi, -50);
        assert_eq!(candidates[1].address, "AA:BB:CC:DD:EE:02");
    }

    #[tokio::test]
    async fn selecting_navigates_with_address() {
        let (mut controller, _rx) = controller(FakePlatform::ready());
        controller.enter(None);
        controller.handle(found("AA:BB:CC:DD:EE:FF", Some("Watch"), -60));

        controller.select(0).unwrap();

        assert_eq!(controller.host().pairings, vec![PairingRequest {
            family: "Test".into(),
            pairing_entry: "test-pairing".into(),
            address: "AA:BB:CC:DD:EE:FF".into(),
        }]);
    }

    #[tokio::test]
    async fn stale_selection_is_ignored() {
        let (mut controller, _rx) = controller(FakePlatform::ready());
        controller.enter(None);

        assert_eq!(controller.select(3), Err(DiscoveryError::StaleSelection { index: 3, len: 0 }));
        assert!(controller.host().pairings.is_empty());
    }

    #[tokio::test]
    async fn unsupported_restored_candidate_is_not_opened() {
        let (mut controller, _rx) = controller(FakePlatform::ready());
        controller.enter(Some(SavedScreen {
            candidates: vec![DeviceCandidate::new("00:00:00:00:00:01", None, 0)],
        }));

        assert!(matches!(controller.select(0), Err(DiscoveryError::Unsupported { .. })));
        assert!(controller.host().pairings.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_stops_the_scan() {
        let (mut controller, mut rx) = controller(FakePlatform::ready());
        controller.enter(None);
        controller.start_discovery().unwrap();
        controller.handle(DiscoveryEvent::DiscoveryStarted);
        controller.handle(DiscoveryEvent::DiscoveryFinished);

        let event = rx.next().await.unwrap();
        assert_eq!(event, DiscoveryEvent::ScanTimeout { generation: 2 });
        controller.handle(event);

        assert_eq!(controller.scan_state(), ScanState::Off);
        assert_eq!(controller.platform().count(PlatformCall::StopLowEnergy), 1);
    }

    #[tokio::test]
    async fn stale_timeout_is_ignored() {
        let (mut controller, _rx) = controller(FakePlatform::ready());
        controller.enter(None);
        controller.start_discovery().unwrap();
        controller.handle(DiscoveryEvent::DiscoveryStarted);
        controller.handle(DiscoveryEvent::DiscoveryFinished);

        controller.handle(DiscoveryEvent::ScanTimeout { generation: 1 });

        assert_eq!(controller.scan_state(), ScanState::ScanningLowEnergy);
    }

    #[tokio::test]
    async fn exit_restores_only_candidates() {
        let (mut controller, _rx) = controller(FakePlatform::ready());
        controller.enter(None);
        controller.start_discovery().unwrap();
        controller.handle(found("AA:BB:CC:DD:EE:FF", Some("Watch"), -60));

        let saved = controller.exit();
        assert_eq!(controller.scan_state(), ScanState::Off);
        assert_eq!(controller.platform().count(PlatformCall::Register), 1);
        assert_eq!(controller.platform().count(PlatformCall::Unregister), 1);
        assert!(!controller.is_registered());

        let (mut restored, _rx) = self::controller(FakePlatform::ready());
        restored.enter(Some(saved));
        assert_eq!(restored.scan_state(), ScanState::Off);
        assert!(!restored.timer().is_armed());
        assert_eq!(restored.candidates().len(), 1);
        assert_eq!(restored.candidates().get(0).unwrap().name.as_deref(), Some("Watch"));
    }

    #[tokio::test]
    async fn toggle_starts_and_stops() {
        let (mut controller, _rx) = controller(FakePlatform::ready());
        controller.enter(None);

        controller.toggle_discovery();
        assert_eq!(controller.scan_state(), ScanState::ScanningClassic);
        assert_eq!(controller.host().snapshot.scan.start_label(), "Stop discovery");

        controller.toggle_discovery();
        assert_eq!(controller.scan_state(), ScanState::Off);
        assert_eq!(controller.host().snapshot.scan.start_label(), "Start discovery");
    }
}
