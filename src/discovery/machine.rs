//! Scan state transitions.
//!
//! Every function takes the current [`DiscoveryState`], updates it and returns the side effects
//! the controller has to perform, in order. Nothing in here touches the platform or the timer.

use log::{debug, info, warn};

use crate::discovery::types::{Notice, ScanState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryState {
    pub scan: ScanState,
    pub start_enabled: bool,
    /// The platform reported the start of the current classic phase.
    pub classic_confirmed: bool,
}

impl Default for DiscoveryState {
    fn default() -> Self {
        DiscoveryState {
            scan: ScanState::Off,
            start_enabled: true,
            classic_confirmed: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Best-effort; the outcome is never inspected.
    CancelDiscovery,
    StartClassicDiscovery,
    StartLowEnergyScan,
    StopLowEnergyScan,
    ArmTimer,
    DisarmTimer,
    Notify(Notice),
    Render,
}

pub fn start(state: &mut DiscoveryState, bluetooth_ready: bool) -> Vec<Effect> {
    if state.scan.is_scanning() {
        warn!("Not starting discovery, because already {}", state.scan);
        return vec![];
    }

    if !bluetooth_ready {
        warn!("Not starting discovery, bluetooth is not available");
        state.start_enabled = false;
        return vec![Effect::Notify(Notice::EnableBluetooth), Effect::Render];
    }

    info!("Starting discovery...");
    state.start_enabled = true;
    state.scan = ScanState::ScanningClassic;
    state.classic_confirmed = false;
    vec![
        Effect::CancelDiscovery,
        Effect::DisarmTimer,
        Effect::ArmTimer,
        Effect::StartClassicDiscovery,
        Effect::Render,
    ]
}

pub fn stop(state: &mut DiscoveryState) -> Vec<Effect> {
    let mut effects = match state.scan {
        ScanState::Off => return vec![],
        ScanState::ScanningClassic => vec![Effect::CancelDiscovery],
        ScanState::ScanningLowEnergy => vec![Effect::StopLowEnergyScan],
    };

    info!("Stopping discovery");
    // the platform never confirms that a scan stopped, so the state is forced here
    state.scan = ScanState::Off;
    state.classic_confirmed = false;
    effects.push(Effect::DisarmTimer);
    effects.push(Effect::Render);
    effects
}

pub fn classic_started(state: &mut DiscoveryState) -> Vec<Effect> {
    // a start we did not ask for belongs to someone else's discovery
    if state.scan == ScanState::ScanningClassic {
        debug!("Classic discovery confirmed");
        state.classic_confirmed = true;
    } else {
        debug!("Ignoring classic discovery start while {}", state.scan);
    }
    vec![]
}

pub fn classic_finished(state: &mut DiscoveryState, low_energy_supported: bool) -> Vec<Effect> {
    if state.scan != ScanState::ScanningClassic {
        debug!("Ignoring classic discovery finish while {}", state.scan);
        return vec![];
    }
    // notifications arrive in order, so an unconfirmed phase can only see the finish of an
    // earlier one
    if !state.classic_confirmed {
        debug!("Ignoring finish of an earlier classic discovery");
        return vec![];
    }
    state.classic_confirmed = false;

    if low_energy_supported {
        info!("Classic discovery finished, continuing with low energy scan");
        state.scan = ScanState::ScanningLowEnergy;
        vec![
            Effect::DisarmTimer,
            Effect::ArmTimer,
            Effect::StartLowEnergyScan,
            Effect::Render,
        ]
    } else {
        info!("Classic discovery finished");
        state.scan = ScanState::Off;
        vec![Effect::DisarmTimer, Effect::Render]
    }
}

pub fn adapter_state_changed(state: &mut DiscoveryState, powered_on: bool) -> Vec<Effect> {
    info!("Bluetooth adapter is now {}", if powered_on { "on" } else { "off" });

    let mut effects = stop(state);
    state.start_enabled = powered_on;
    if effects.is_empty() {
        effects.push(Effect::Render);
    }
    effects
}

pub fn timed_out(state: &mut DiscoveryState) -> Vec<Effect> {
    if state.scan.is_scanning() {
        info!("Scan duration elapsed");
    }
    stop(state)
}
