use std::time::Duration;
use clap::Parser;

use crate::config::types::Config;

// the config stores whole seconds
fn parse_whole_seconds(value: &str) -> Result<Duration, String> {
    let duration = humantime::parse_duration(value).map_err(|err| err.to_string())?;
    if duration.subsec_nanos() != 0 || duration.is_zero() {
        return Err(format!("{} is not a whole number of seconds", value));
    }
    Ok(duration)
}

#[derive(Parser, Debug, Clone, Default)]
#[command(author, version)]
#[command(about = "Discovers nearby Bluetooth devices and hands a selected one over to its pairing screen.", long_about = None)]
pub struct Args {
    /// Run a single discovery without a window and print the candidates as JSON.
    #[arg(long)]
    pub headless: bool,

    /// How long a scan phase may run, for example "30s" or "2m".
    #[arg(long, value_parser = parse_whole_seconds)]
    pub scan_duration: Option<Duration>,

    /// How long the classic inquiry window lasts before continuing with a low energy scan.
    #[arg(long, value_parser = parse_whole_seconds)]
    pub classic_window: Option<Duration>,

    /// Skip the low energy scan phase.
    #[arg(long)]
    pub no_low_energy: bool,

    /// Do not restore the candidates of the previous run.
    #[arg(long)]
    pub fresh: bool,
}

impl Args {
    /// Command line flags take precedence over the config file.
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(duration) = self.scan_duration {
            config.scan_duration_secs = duration.as_secs();
        }
        if let Some(duration) = self.classic_window {
            config.classic_inquiry_secs = duration.as_secs();
        }
        if self.no_low_energy {
            config.low_energy = false;
        }
        config
    }
}
