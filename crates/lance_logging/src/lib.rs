#![deny(missing_docs)]
//! Shared logging utilities for the AgentLance client workspace.
//!
//! This crate provides the `lance_*` logging macros used by the core, engine
//! and app crates, a per-thread layout frame counter for correlating log lines
//! with simulation ticks, and a minimal test initializer for the global logger.

use std::cell::Cell;

thread_local! {
    /// Thread-local storage for the most recent layout frame tick.
    static FRAME_TICK: Cell<u64> = const { Cell::new(0) };
}

/// Records the layout frame tick for the current thread.
/// The force simulation calls this once per tick.
pub fn set_frame_tick(tick: u64) {
    FRAME_TICK.with(|v| v.set(tick));
}

/// Returns the last layout frame tick recorded on this thread, or 0.
pub fn frame_tick() -> u64 {
    FRAME_TICK.with(|v| v.get())
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! lance_trace {
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! lance_debug {
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! lance_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! lance_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! lance_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// Initializes a simple terminal logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
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
    fn frame_tick_is_per_thread() {
        set_frame_tick(42);
        assert_eq!(frame_tick(), 42);

        let other = std::thread::spawn(frame_tick).join().unwrap();
        assert_eq!(other, 0);
    }
}
