use std::fmt::Debug;
use std::pin::Pin;
use btleplug::api::{BDAddr, Central, CentralEvent, CentralState, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, PeripheralId};
use futures::channel::mpsc::{channel, Receiver, Sender};
use futures::future::pending;
use futures::{SinkExt, Stream, StreamExt};
use log::{debug, info, warn};
use tokio::spawn;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::discovery::constants::{COMMAND_CHANNEL_SIZE, RSSI_UNKNOWN};
use crate::discovery::types::DiscoveryEvent;
use crate::error::PlatformError;
use crate::platform::BluetoothPlatform;

type CentralEvents = Pin<Box<dyn Stream<Item = CentralEvent> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterStatus {
    Probing,
    Missing,
    PoweredOff,
    Ready,
}

impl AdapterStatus {
    pub fn is_available(&self) -> bool {
        *self == AdapterStatus::Ready
    }

    fn from_central_state(state: CentralState) -> Self {
        match state {
            CentralState::PoweredOff => AdapterStatus::PoweredOff,
            // some platforms only report unknown until the first scan
            _ => AdapterStatus::Ready,
        }
    }

    fn changed_event(&self) -> DiscoveryEvent {
        DiscoveryEvent::AdapterStateChanged { powered_on: self.is_available() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlatformCommand {
    Register,
    Unregister,
    CancelDiscovery,
    StartClassic,
    StartLowEnergy,
    StopLowEnergy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActiveScan {
    Idle,
    Classic { until: Instant },
    LowEnergy,
}

impl ActiveScan {
    fn inquiry_deadline(&self) -> Option<Instant> {
        match self {
            ActiveScan::Classic { until } => Some(*until),
            _ => None,
        }
    }
}

enum Input {
    Command(PlatformCommand),
    Central(CentralEvent),
    InquiryElapsed,
}

/// [`BluetoothPlatform`] on top of btleplug. The adapter is owned by a worker task; calls on this
/// handle are queued to it and never block.
pub struct BtlePlatform {
    commands: Sender<PlatformCommand>,
    status: watch::Receiver<AdapterStatus>,
}

impl BtlePlatform {
    fn send(&mut self, command: PlatformCommand) {
        if let Err(err) = self.commands.try_send(command) {
            warn!("Failed to queue {:?} for bluetooth adapter: {:?}", command, err);
        }
    }

    pub fn status(&self) -> AdapterStatus {
        *self.status.borrow()
    }

    /// Waits until the worker has looked for an adapter.
    pub async fn probed(&mut self) -> AdapterStatus {
        match self.status.wait_for(|status| *status != AdapterStatus::Probing).await {
            Ok(status) => *status,
            Err(_) => AdapterStatus::Missing,
        }
    }
}

impl BluetoothPlatform for BtlePlatform {
    fn is_available(&self) -> bool {
        self.status().is_available()
    }

    fn supports_low_energy(&self) -> bool {
        true
    }

    fn register(&mut self) {
        self.send(PlatformCommand::Register);
    }

    fn unregister(&mut self) {
        self.send(PlatformCommand::Unregister);
    }

    fn cancel_discovery(&mut self) {
        self.send(PlatformCommand::CancelDiscovery);
    }

    fn start_classic_discovery(&mut self) {
        self.send(PlatformCommand::StartClassic);
    }

    fn start_low_energy_scan(&mut self) {
        self.send(PlatformCommand::StartLowEnergy);
    }

    fn stop_low_energy_scan(&mut self) {
        self.send(PlatformCommand::StopLowEnergy);
    }
}

async fn find_adapter() -> Result<(Manager, Adapter), PlatformError> {
    let manager = Manager::new().await?;
    let adapter = manager.adapters().await?
        .into_iter()
        .next()
        .ok_or(PlatformError::NoAdapter)?;

    info!("Using adapter {}", adapter.adapter_info().await.unwrap_or("UNKNOWN".to_string()));
    Ok((manager, adapter))
}

// macOS hides the MAC address of peripherals; the peripheral id is stable enough to stand in
fn sighting_address(address: BDAddr, fallback: &impl Debug) -> String {
    if address.into_inner() == [0u8; 6] {
        format!("{:?}", fallback)
    } else {
        address.to_string()
    }
}

fn forwards_sightings(registered: bool, scan: ActiveScan) -> bool {
    registered && scan != ActiveScan::Idle
}

async fn next_central_event(stream: &mut Option<CentralEvents>) -> Option<CentralEvent> {
    match stream {
        Some(stream) => stream.next().await,
        None => pending().await,
    }
}

async fn inquiry_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

async fn sighting(adapter: &Adapter, id: &PeripheralId) -> Option<DiscoveryEvent> {
    let peripheral = match adapter.peripheral(id).await {
        Ok(peripheral) => peripheral,
        Err(err) => {
            warn!("Could not look up peripheral: {:?}", err);
            return None;
        },
    };

    match peripheral.properties().await {
        Err(err) => {
            warn!("Could not query peripheral for properties: {:?}", err);
            None
        },
        Ok(None) => {
            debug!("Peripheral has no properties");
            None
        },
        Ok(Some(properties)) => Some(DiscoveryEvent::DeviceFound {
            address: sighting_address(properties.address, id),
            name: properties.local_name,
            rssi: properties.rssi.unwrap_or(RSSI_UNKNOWN),
            services: properties.services,
        }),
    }
}

struct Worker {
    events: Sender<DiscoveryEvent>,
    status: watch::Sender<AdapterStatus>,
    classic_window: Duration,
    // the adapter is only usable while its manager is alive
    _manager: Option<Manager>,
    adapter: Option<Adapter>,
    central_events: Option<CentralEvents>,
    registered: bool,
    scan: ActiveScan,
}

impl Worker {
    fn new(events: Sender<DiscoveryEvent>, status: watch::Sender<AdapterStatus>, classic_window: Duration) -> Self {
        Worker {
            events,
            status,
            classic_window,
            _manager: None,
            adapter: None,
            central_events: None,
            registered: false,
            scan: ActiveScan::Idle,
        }
    }

    async fn emit(&mut self, event: DiscoveryEvent) {
        if let Err(err) = self.events.send(event).await {
            warn!("Failed to deliver discovery event: {:?}", err);
        }
    }

    fn publish(&mut self, status: AdapterStatus) {
        if *self.status.borrow() != status {
            info!("Bluetooth adapter status: {:?}", status);
        }
        self.status.send_replace(status);
    }

    async fn probe(&mut self) {
        let (manager, adapter) = match find_adapter().await {
            Ok(found) => found,
            Err(err) => {
                warn!("No usable bluetooth adapter: {}", err);
                self.publish(AdapterStatus::Missing);
                return;
            },
        };

        let status = match adapter.adapter_state().await {
            Ok(state) => AdapterStatus::from_central_state(state),
            Err(err) => {
                warn!("Could not query adapter state: {:?}", err);
                AdapterStatus::Ready
            },
        };

        self._manager = Some(manager);
        self.adapter = Some(adapter);
        self.publish(status);
    }

    async fn start_scan(&mut self) -> bool {
        let adapter = match &self.adapter {
            Some(adapter) => adapter,
            None => {
                warn!("Not scanning, no bluetooth adapter");
                return false;
            },
        };

        match adapter.start_scan(ScanFilter::default()).await {
            Ok(_) => true,
            Err(err) => {
                warn!("Scanning failed {:?}", err);
                false
            },
        }
    }

    async fn stop_scan(&mut self) {
        if self.scan == ActiveScan::Idle {
            return;
        }
        self.scan = ActiveScan::Idle;

        if let Some(adapter) = &self.adapter {
            // also fails when the platform already stopped on its own
            if let Err(err) = adapter.stop_scan().await {
                debug!("Stopping scan failed {:?}", err);
            }
        }
    }

    async fn register(&mut self) {
        if let Some(adapter) = &self.adapter {
            match adapter.events().await {
                Ok(stream) => self.central_events = Some(stream),
                Err(err) => warn!("Could not subscribe to adapter events: {:?}", err),
            }
        }
        self.registered = true;

        // a start refused while probing is only re-enabled by this
        let event = self.status.borrow().changed_event();
        self.emit(event).await;
    }

    async fn execute(&mut self, command: PlatformCommand) {
        debug!("Bluetooth adapter command {:?}", command);

        match command {
            PlatformCommand::Register => {
                if self.registered {
                    return;
                }
                if self.adapter.is_none() {
                    self.probe().await;
                }
                self.register().await;
            },
            PlatformCommand::Unregister => {
                self.stop_scan().await;
                self.central_events = None;
                self.registered = false;
            },
            PlatformCommand::CancelDiscovery => {
                if let ActiveScan::Classic { .. } = self.scan {
                    self.stop_scan().await;
                }
            },
            PlatformCommand::StartClassic => {
                self.stop_scan().await;
                if self.start_scan().await {
                    self.scan = ActiveScan::Classic { until: Instant::now() + self.classic_window };
                    self.emit(DiscoveryEvent::DiscoveryStarted).await;
                } else {
                    self.scan_failed().await;
                }
            },
            PlatformCommand::StartLowEnergy => {
                self.stop_scan().await;
                if self.start_scan().await {
                    self.scan = ActiveScan::LowEnergy;
                } else {
                    self.scan_failed().await;
                }
            },
            PlatformCommand::StopLowEnergy => {
                if self.scan == ActiveScan::LowEnergy {
                    self.stop_scan().await;
                }
            },
        }
    }

    async fn central_event(&mut self, event: CentralEvent) {
        match event {
            CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                if !forwards_sightings(self.registered, self.scan) {
                    return;
                }
                let found = match &self.adapter {
                    Some(adapter) => sighting(adapter, &id).await,
                    None => None,
                };
                if let Some(event) = found {
                    self.emit(event).await;
                }
            },
            CentralEvent::StateUpdate(state) => {
                let status = AdapterStatus::from_central_state(state);
                if !status.is_available() {
                    // the stack drops running scans when powered off
                    self.scan = ActiveScan::Idle;
                }
                self.publish(status);

                if self.registered {
                    self.emit(status.changed_event()).await;
                }
            },
            _ => {},
        }
    }

    // there is no scan to report on, so the screen is sent back to off
    async fn scan_failed(&mut self) {
        self.scan = ActiveScan::Idle;
        let event = self.status.borrow().changed_event();
        self.emit(event).await;
    }

    async fn finish_classic(&mut self) {
        info!("Classic inquiry window elapsed");
        self.stop_scan().await;
        self.emit(DiscoveryEvent::DiscoveryFinished).await;
    }

    async fn next_input(
        &mut self,
        cancel: &CancellationToken,
        commands: &mut Receiver<PlatformCommand>,
    ) -> Option<Input> {
        tokio::select! {
            _ = cancel.cancelled() => None,
            command = commands.next() => command.map(Input::Command),
            Some(event) = next_central_event(&mut self.central_events) => Some(Input::Central(event)),
            _ = inquiry_elapsed(self.scan.inquiry_deadline()) => Some(Input::InquiryElapsed),
        }
    }

    async fn run(mut self, cancel: CancellationToken, mut commands: Receiver<PlatformCommand>) {
        self.probe().await;

        while let Some(input) = self.next_input(&cancel, &mut commands).await {
            match input {
                Input::Command(command) => self.execute(command).await,
                Input::Central(event) => self.central_event(event).await,
                Input::InquiryElapsed => self.finish_classic().await,
            }
        }

        self.stop_scan().await;
        info!("Bluetooth adapter worker stopped");
    }
}

/// Spawns the worker that owns the bluetooth adapter. Discovery notifications are sent to
/// `events` while registered.
pub fn btle_platform(
    cancel: CancellationToken,
    events: Sender<DiscoveryEvent>,
    classic_window: Duration,
) -> (BtlePlatform, JoinHandle<()>) {
    let (command_sender, command_receiver) = channel::<PlatformCommand>(COMMAND_CHANNEL_SIZE);
    let (status_sender, status_receiver) = watch::channel(AdapterStatus::Probing);

    let worker = Worker::new(events, status_sender, classic_window);
    let handle = spawn(worker.run(cancel, command_receiver));

    let platform = BtlePlatform {
        commands: command_sender,
        status: status_receiver,
    };
    (platform, handle)
}
