use std::time::Duration;

/**
 * How long (seconds) a single scan phase may run before it is forcibly stopped.
 */
pub const SCAN_DURATION_SECS: u64 = 60;

/**
 * How long (seconds) the classic inquiry window lasts before the platform reports it finished.
 * Matches the inquiry length of typical Bluetooth stacks.
 */
pub const CLASSIC_INQUIRY_SECS: u64 = 12;

/**
 * Signal strength reported for a sighting that carried none.
 */
pub const RSSI_UNKNOWN: i16 = 0;

/**
 * Size of the channel that carries platform and timer events to the controller.
 */
pub const EVENT_CHANNEL_SIZE: usize = 128;

/**
 * Size of the channel that carries commands to the platform worker.
 */
pub const COMMAND_CHANNEL_SIZE: usize = 32;

pub const NOTICE_ENABLE_BLUETOOTH: &str = "Enable Bluetooth to discover devices.";

pub const LABEL_START_SCANNING: &str = "Start discovery";
pub const LABEL_STOP_SCANNING: &str = "Stop discovery";

pub fn scan_duration() -> Duration {
    Duration::from_secs(SCAN_DURATION_SECS)
}
