use clap::Parser;
use log::info;
use msgbox::IconType;
use device_discovery::{init_logging, run};
use device_discovery::cli::Args;
use device_discovery::error::{error_msgbox, AppRunError, ConfigError};

fn main() -> Result<(), AppRunError> {
    init_logging();
    info!(concat!("Device Discovery ", env!("CARGO_PKG_VERSION")));

    let args = Args::parse();
    let headless = args.headless;

    match run(args) {
        Err(AppRunError::ConfigError { source: ConfigError::CanNotLock { .. } }) => {
            let message = "This application has already been started";
            if headless {
                eprintln!("{}", message);
            } else if let Err(err) = msgbox::create(
                concat!("Device Discovery ", env!("CARGO_PKG_VERSION")),
                message,
                IconType::Error,
            ) {
                eprintln!("Failed to create msgbox: {:?}", err);
            }
            Ok(())
        },
        Err(err) => {
            if headless {
                eprintln!("Unexpected error: {}", err);
            } else {
                error_msgbox("Unexpected error", &err);
            }
            Err(err)
        }
        Ok(_) => Ok(())
    }
}
