//! logging setup: terminal + file, enabled explicitly by the caller
use chrono::Local;
use simplelog::{
    ColorChoice, CombinedLogger, Config, LevelFilter, TermLogger, TerminalMode, WriteLogger,
};
use std::fs::File;

/// Initialize a combined terminal + file logger. `loglevel` is one of
/// "debug", "info", "warn", "error"; None means info. The file is named with
/// a timestamp so repeated runs do not clobber each other. Returns Err when
/// a logger was already installed (subsequent calls are harmless no-ops for
/// the caller).
pub fn init_logging(loglevel: Option<&str>) -> Result<(), String> {
    let log_option = if let Some(level) = loglevel {
        match level {
            "debug" => LevelFilter::Debug,
            "info" => LevelFilter::Info,
            "warn" => LevelFilter::Warn,
            "error" => LevelFilter::Error,
            _ => panic!("loglevel must be debug, info, warn or error"),
        }
    } else {
        LevelFilter::Info
    };
    let date_and_time = Local::now().format("%Y-%m-%d_%H-%M-%S");
    let name = format!("log_{}.txt", date_and_time);
    let file = File::create(&name).map_err(|e| format!("failed to create log file {}: {}", name, e))?;
    CombinedLogger::init(vec![
        TermLogger::new(
            log_option,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(log_option, Config::default(), file),
    ])
    .map_err(|e| format!("logger already initialized: {}", e))
}
