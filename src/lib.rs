use std::env;
use crate::cli::Args;
use crate::error::AppRunError;
use crate::gui::application::run_application;
use crate::headless::run_headless;

pub mod cli;
pub mod config;
pub mod device;
pub mod discovery;
pub mod error;
pub mod gui;
pub mod headless;
pub mod platform;

pub fn init_logging() {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::Info)
        .chain(std::io::stderr());

    if let Ok(log_file) = env::var("LOG_FILE") {
        dispatch = dispatch.chain(
            fern::log_file(log_file).expect("Failed to open LOG_FILE")
        );
    }

    dispatch.apply().expect("Failed to initialize logger");
}

pub fn run(args: Args) -> Result<(), AppRunError> {
    if args.headless {
        run_headless(args)?;
    } else {
        run_application(args)?;
    }
    Ok(())
}
