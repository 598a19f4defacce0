use futures::StreamExt;
use futures::channel::mpsc::channel;
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::cli::Args;
use crate::config::io::{load_startup_state, ConfigIO, ScreenIO};
use crate::device::support::KnownDevices;
use crate::discovery::constants::EVENT_CHANNEL_SIZE;
use crate::discovery::controller::{DiscoveryController, ScanSettings};
use crate::discovery::host::LogHost;
use crate::discovery::types::{DeviceCandidate, DiscoveryEvent};
use crate::error::AppRunError;
use crate::platform::btle::btle_platform;

async fn discover(args: Args, config_io: ConfigIO, screen_io: ScreenIO) -> Vec<DeviceCandidate> {
    let startup = load_startup_state(&config_io, &screen_io, !args.fresh).await;
    let config = args.apply(startup.config);

    let cancel = CancellationToken::new();
    let (events_sender, mut events_receiver) = channel::<DiscoveryEvent>(EVENT_CHANNEL_SIZE);
    let (mut platform, worker) = btle_platform(
        cancel.clone(),
        events_sender.clone(),
        config.classic_inquiry_window(),
    );
    info!("Bluetooth adapter: {:?}", platform.probed().await);

    let settings = ScanSettings {
        scan_duration: config.scan_duration(),
        low_energy: config.low_energy,
    };
    let mut controller = DiscoveryController::new(
        platform,
        LogHost::default(),
        Box::new(KnownDevices::new(config.devices)),
        settings,
        events_sender,
    );

    controller.enter(startup.saved);
    // the worker answers the registration with the adapter state, which would stop a scan
    // started before it arrives
    while let Some(event) = events_receiver.next().await {
        let registered = matches!(event, DiscoveryEvent::AdapterStateChanged { .. });
        controller.handle(event);
        if registered {
            break;
        }
    }

    if controller.start_discovery().is_ok() {
        while controller.scan_state().is_scanning() {
            match events_receiver.next().await {
                Some(event) => controller.handle(event),
                None => break,
            }
        }
    }

    let saved = controller.exit();
    if let Err(err) = screen_io.save(&saved).await {
        warn!("Failed to save discovery screen: {}", err);
    }

    cancel.cancel();
    if let Err(err) = worker.await {
        warn!("Failed to join bluetooth adapter worker: {:?}", err);
    }

    saved.candidates
}

/// Runs one discovery to completion and prints the candidates to stdout.
pub fn run_headless(args: Args) -> Result<(), AppRunError> {
    let mut config_io = ConfigIO::new_sync()?;
    let mut config_locker = config_io.locker()?;
    let _lock_guard = config_locker.lock()?;
    let screen_io = ScreenIO::new()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let candidates = runtime.block_on(discover(args, config_io.clone(), screen_io));

    println!("{}", serde_json::to_string_pretty(&candidates)?);
    Ok(())
}
