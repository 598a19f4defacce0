use futures::StreamExt;
use futures::channel::mpsc::channel;
use tokio::time::Duration;

use device_discovery::config::types::DeviceRule;
use device_discovery::device::support::KnownDevices;
use device_discovery::discovery::controller::{DiscoveryController, ScanSettings};
use device_discovery::discovery::host::{DiscoveryHost, ScreenModel, ScreenSnapshot};
use device_discovery::discovery::types::{DiscoveryEvent, Notice, PairingRequest, ScanState};
use device_discovery::platform::BluetoothPlatform;

#[derive(Default)]
struct Adapter {
    powered: bool,
    registrations: i32,
    classic_runs: usize,
    low_energy_runs: usize,
}

impl BluetoothPlatform for Adapter {
    fn is_available(&self) -> bool { self.powered }
    fn supports_low_energy(&self) -> bool { true }
    fn register(&mut self) { self.registrations += 1 }
    fn unregister(&mut self) { self.registrations -= 1 }
    fn cancel_discovery(&mut self) {}
    fn start_classic_discovery(&mut self) { self.classic_runs += 1 }
    fn start_low_energy_scan(&mut self) { self.low_energy_runs += 1 }
    fn stop_low_energy_scan(&mut self) {}
}

#[derive(Default)]
struct Screen {
    snapshot: ScreenSnapshot,
    notices: Vec<Notice>,
    opened: Vec<PairingRequest>,
}

impl DiscoveryHost for Screen {
    fn render(&mut self, screen: &ScreenModel<'_>) {
        self.snapshot = ScreenSnapshot::capture(screen);
    }

    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    fn open_pairing(&mut self, request: PairingRequest) {
        self.opened.push(request);
    }
}

fn watches() -> KnownDevices {
    KnownDevices::new(vec![DeviceRule {
        family: "Watch".to_string(),
        pairing_entry: "watch-pairing".to_string(),
        name_prefix: None,
        address_prefix: Some("aa:bb".to_string()),
        service: None,
    }])
}

fn found(address: &str, name: &str, rssi: i16) -> DiscoveryEvent {
    DiscoveryEvent::DeviceFound {
        address: address.to_string(),
        name: Some(name.to_string()),
        rssi,
        services: vec![],
    }
}

#[tokio::test(start_paused = true)]
async fn full_discovery_and_selection() {
    let (sender, mut receiver) = channel(16);
    let settings = ScanSettings { scan_duration: Duration::from_secs(60), low_energy: true };
    let adapter = Adapter { powered: true, ..Adapter::default() };
    let mut controller = DiscoveryController::new(adapter, Screen::default(), Box::new(watches()), settings, sender);

    controller.enter(None);
    controller.start_discovery().unwrap();
    controller.handle(DiscoveryEvent::DiscoveryStarted);
    controller.handle(found("AA:BB:CC:DD:EE:FF", "Watch", -80));
    controller.handle(found("11:22:33:44:55:66", "Speaker", -30));
    controller.handle(DiscoveryEvent::DiscoveryFinished);
    assert_eq!(controller.scan_state(), ScanState::ScanningLowEnergy);

    controller.handle(found("AA:BB:CC:DD:EE:FF", "Watch", -55));
    controller.handle(found("AA:BB:00:00:00:01", "Watch 2", -70));

    // the low energy phase runs until the scan timer fires
    let timeout = receiver.next().await.unwrap();
    controller.handle(timeout);
    assert_eq!(controller.scan_state(), ScanState::Off);

    let candidates = &controller.host().snapshot.candidates;
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].address, "AA:BB:CC:DD:EE:FF");
    assert_eq!(candidates[0].rssi, -55);

    controller.select(0).unwrap();
    assert_eq!(controller.host().opened, vec![PairingRequest {
        family: "Watch".to_string(),
        pairing_entry: "watch-pairing".to_string(),
        address: "AA:BB:CC:DD:EE:FF".to_string(),
    }]);

    let saved = controller.exit();
    assert_eq!(saved.candidates.len(), 2);
    assert_eq!(controller.platform().registrations, 0);
    assert_eq!(controller.platform().classic_runs, 1);
    assert_eq!(controller.platform().low_energy_runs, 1);
}

#[tokio::test]
async fn bluetooth_off_then_on() {
    let (sender, _receiver) = channel(16);
    let mut controller = DiscoveryController::new(
        Adapter::default(),
        Screen::default(),
        Box::new(watches()),
        ScanSettings::default(),
        sender,
    );

    controller.enter(None);
    assert!(controller.start_discovery().is_err());
    assert_eq!(controller.host().notices, vec![Notice::EnableBluetooth]);
    assert!(!controller.host().snapshot.start_enabled);

    controller.handle(DiscoveryEvent::AdapterStateChanged { powered_on: true });
    assert!(controller.host().snapshot.start_enabled);
    assert_eq!(controller.scan_state(), ScanState::Off);
}
