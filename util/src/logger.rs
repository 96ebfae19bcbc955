//! Generic logger utility functions
//!
//! Logs are written both to stdout and to the session's log file, stamped with the number of
//! seconds since the session epoch.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use log::{self, info};
use colored::{ColoredString, Colorize};
use thiserror::Error;

// Internal imports
use crate::session;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("Expected a log level less than `INFO`, found `{0}`")]
    InvalidMinLogLevel(log::LevelFilter),

    #[error("Error initialising the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("An error occured while setting up the logger: {0}")]
    FernInitError(log::SetLoggerError)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution.
/// 
/// # Notes
/// 
/// - `min_level` must be greater than `log::Level::Info`.
/// 
/// # Safety
/// 
/// - This function must only be called once to prevent corrupting logs.
pub fn logger_init(
    min_level: self::LevelFilter,
    session: &session::Session
) -> Result<(), LoggerInitError> {

    if min_level < log::Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level))
    }

    let log_file = fern::log_file(session.log_file_path.clone())
        .map_err(LoggerInitError::LogFileInitError)?;

    // Terminal output is coloured, the log file is kept plain so it can be grepped
    fern::Dispatch::new()
        .level(min_level)
        .level_for("rayon_core", LevelFilter::Info)
        .chain(
            fern::Dispatch::new()
                .format(|out, message, record| {
                    out.finish(format_args!("{}", format_record(record, message, true)))
                })
                .chain(std::io::stdout())
        )
        .chain(
            fern::Dispatch::new()
                .format(|out, message, record| {
                    out.finish(format_args!("{}", format_record(record, message, false)))
                })
                .chain(log_file)
        )
        .apply()
        .map_err(LoggerInitError::FernInitError)?;
    
    info!("Logging initialised");
    info!("    Session epoch: {}", session::get_epoch());
    info!("    Log level: {:?}", min_level);
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Build a single log line.
///
/// Debug and trace lines include the target, and lines logged from any thread other than main
/// (for example the localisation worker) are tagged with the thread's name.
fn format_record(
    record: &log::Record,
    message: &std::fmt::Arguments,
    colour: bool
) -> String {
    let level = match colour {
        true => level_to_str(record.level()).to_string(),
        false => level_to_plain_str(record.level()).to_string()
    };

    let mut line = format!("[{:10.6} {}]", session::get_elapsed_seconds(), level);

    if let Some(tag) = thread_tag(std::thread::current().name()) {
        line.push_str(&format!(" <{}>", tag));
    }

    if record.level() > log::Level::Info {
        line.push_str(&format!(" {}: {}", record.target(), message));
    }
    else {
        line.push_str(&format!(" {}", message));
    }

    line
}

/// Name to tag a line with, `None` for the main thread.
fn thread_tag(name: Option<&str>) -> Option<&str> {
    match name {
        Some("main") => None,
        Some(n) => Some(n),
        None => Some("unnamed")
    }
}

/// Get the string representation of a log level
fn level_to_str(level: log::Level) -> ColoredString {
    let s = level_to_plain_str(level);

    match level {
        log::Level::Trace => s.dimmed().italic(),
        log::Level::Debug => s.dimmed(),
        log::Level::Info  => s.normal(),
        log::Level::Warn  => s.yellow(),
        log::Level::Error => s.red().bold()
    }
}

/// Get the uncoloured representation of a log level
fn level_to_plain_str(level: log::Level) -> &'static str {
    match level {
        log::Level::Trace => "TRC",
        log::Level::Debug => "DBG",
        log::Level::Info  => "INF",
        log::Level::Warn  => "WRN",
        log::Level::Error => "ERR"
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_level_to_str() {
        colored::control::set_override(false);
        assert_eq!(level_to_str(log::Level::Trace).to_string(), "TRC");
        assert_eq!(level_to_str(log::Level::Info).to_string(), "INF");
        assert_eq!(level_to_str(log::Level::Error).to_string(), "ERR");
        assert_eq!(level_to_plain_str(log::Level::Warn), "WRN");
    }

    #[test]
    fn test_thread_tag() {
        assert_eq!(thread_tag(Some("main")), None);
        assert_eq!(thread_tag(Some("loc_mgr::worker")), Some("loc_mgr::worker"));
        assert_eq!(thread_tag(None), Some("unnamed"));
    }
}
