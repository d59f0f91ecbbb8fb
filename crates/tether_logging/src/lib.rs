#![deny(missing_docs)]
//! Shared logging utilities for the tether workspace.
//!
//! This crate provides the `tether_*` logging macros used across the codebase,
//! a per-thread "current operation" ticket that the macros stamp onto every
//! line, and initializers for the global logger.

use std::cell::Cell;
use std::fs::File;
use std::path::PathBuf;

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

#[doc(hidden)]
pub use log;

thread_local! {
    /// Ticket of the board operation currently being dispatched on this thread.
    static OP_TICKET: Cell<Option<u64>> = const { Cell::new(None) };
}

/// Marks `ticket` as the operation being dispatched on the current thread.
/// Pass `None` once dispatching is over.
pub fn set_op_ticket(ticket: Option<u64>) {
    OP_TICKET.with(|v| v.set(ticket));
}

/// Returns the ticket set by [`set_op_ticket`], if any.
pub fn current_op_ticket() -> Option<u64> {
    OP_TICKET.with(|v| v.get())
}

/// Logs a trace-level message, prefixed with the current operation ticket.
#[macro_export]
macro_rules! tether_trace {
    ($($arg:tt)*) => {{
        match $crate::current_op_ticket() {
            Some(ticket) => $crate::log::trace!("[op {}] {}", ticket, format_args!($($arg)*)),
            None => $crate::log::trace!($($arg)*),
        }
    }};
}

/// Logs a debug-level message, prefixed with the current operation ticket.
#[macro_export]
macro_rules! tether_debug {
    ($($arg:tt)*) => {{
        match $crate::current_op_ticket() {
            Some(ticket) => $crate::log::debug!("[op {}] {}", ticket, format_args!($($arg)*)),
            None => $crate::log::debug!($($arg)*),
        }
    }};
}

/// Logs an info-level message, prefixed with the current operation ticket.
#[macro_export]
macro_rules! tether_info {
    ($($arg:tt)*) => {{
        match $crate::current_op_ticket() {
            Some(ticket) => $crate::log::info!("[op {}] {}", ticket, format_args!($($arg)*)),
            None => $crate::log::info!($($arg)*),
        }
    }};
}

/// Logs a warn-level message, prefixed with the current operation ticket.
#[macro_export]
macro_rules! tether_warn {
    ($($arg:tt)*) => {{
        match $crate::current_op_ticket() {
            Some(ticket) => $crate::log::warn!("[op {}] {}", ticket, format_args!($($arg)*)),
            None => $crate::log::warn!($($arg)*),
        }
    }};
}

/// Logs an error-level message, prefixed with the current operation ticket.
#[macro_export]
macro_rules! tether_error {
    ($($arg:tt)*) => {{
        match $crate::current_op_ticket() {
            Some(ticket) => $crate::log::error!("[op {}] {}", ticket, format_args!($($arg)*)),
            None => $crate::log::error!($($arg)*),
        }
    }};
}

/// Destination for application log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogDestination {
    /// Write to `./tether.log` in the current directory.
    #[default]
    File,
    /// Write to the terminal (stderr for warnings and errors).
    Terminal,
    /// Write to both file and terminal.
    Both,
}

/// Initializes the application logger for the given destination.
///
/// A log file that cannot be created is reported on stderr and skipped.
/// Calling this twice keeps the first logger.
pub fn initialize(destination: LogDestination, level: LevelFilter) {
    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    if matches!(destination, LogDestination::Terminal | LogDestination::Both) {
        loggers.push(TermLogger::new(
            level,
            config.clone(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ));
    }
    if matches!(destination, LogDestination::File | LogDestination::Both) {
        if let Some(file_logger) = create_file_logger(level, config) {
            loggers.push(file_logger);
        }
    }
    if loggers.is_empty() {
        return;
    }

    let _ = CombinedLogger::init(loggers);
}

fn create_file_logger(level: LevelFilter, config: Config) -> Option<Box<WriteLogger<File>>> {
    let log_path = PathBuf::from("./tether.log");
    match File::create(&log_path) {
        Ok(file) => Some(WriteLogger::new(level, config, file)),
        Err(err) => {
            eprintln!("Warning: could not create log file at {:?}: {}", log_path, err);
            None
        }
    }
}

/// Initializes a simple terminal logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    let level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    // Another test may have won the race.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_ticket_is_per_thread() {
        set_op_ticket(Some(7));
        assert_eq!(current_op_ticket(), Some(7));

        let other = std::thread::spawn(current_op_ticket).join().unwrap();
        assert_eq!(other, None);

        set_op_ticket(None);
        assert_eq!(current_op_ticket(), None);
    }

    #[test]
    fn macros_expand_with_and_without_ticket() {
        initialize_for_tests();
        tether_info!("no ticket {}", 1);
        set_op_ticket(Some(3));
        tether_debug!("with ticket {}", "x");
        tether_warn!("plain");
        set_op_ticket(None);
    }
}
