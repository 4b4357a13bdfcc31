//! Logger setup for the `clockify` binary.
//!
//! Runs write `./clockify.log` in the current working directory; `--verbose`
//! mirrors the log to the terminal as well.

use std::fs::File;
use std::path::PathBuf;

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

const LOG_FILE: &str = "./clockify.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDestination {
    File,
    Both,
}

pub fn initialize(destination: LogDestination, level: LevelFilter) {
    let config = build_config();

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    if destination == LogDestination::Both {
        loggers.push(TermLogger::new(
            level,
            config.clone(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ));
    }
    if let Some(file_logger) = create_file_logger(level, config) {
        loggers.push(file_logger);
    }
    if loggers.is_empty() {
        return;
    }

    let _ = CombinedLogger::init(loggers);
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        // reqwest and its stack are chatty at debug level.
        .add_filter_ignore_str("hyper")
        .add_filter_ignore_str("reqwest")
        .add_filter_ignore_str("rustls")
        .build()
}

fn create_file_logger(level: LevelFilter, config: Config) -> Option<Box<WriteLogger<File>>> {
    let log_path = PathBuf::from(LOG_FILE);
    match File::create(&log_path) {
        Ok(file) => Some(WriteLogger::new(level, config, file)),
        Err(err) => {
            eprintln!("Warning: Could not create log file at {:?}: {}", log_path, err);
            None
        }
    }
}
