//! FILENAME: pivot-aggregation/src/logging.rs
// PURPOSE: Category logging on top of the `log` facade.
// CONTEXT: Lines are formatted `seq|category|message` under the
//          `pivot_aggregation` target. The crate never installs a logger itself.

use std::sync::atomic::{AtomicU64, Ordering};

pub use log::Level;

/// Global sequence counter shared by every log line of this crate.
static LOG_SEQ: AtomicU64 = AtomicU64::new(0);

/// Get next sequence number
pub fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst) + 1
}

/// Write a log line in unified format
pub fn write_log(level: Level, category: &str, message: &str) {
    if !log::log_enabled!(target: "pivot_aggregation", level) {
        return;
    }
    let seq = next_seq();
    log::log!(target: "pivot_aggregation", level, "{}|{}|{}", seq, category, message);
}

// ============================================================================
// MACRO DEFINITIONS & EXPORTS
// ============================================================================

#[macro_export]
macro_rules! log_debug {
    ($cat:expr, $($arg:tt)*) => {
        $crate::logging::write_log($crate::logging::Level::Debug, $cat, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($cat:expr, $($arg:tt)*) => {
        $crate::logging::write_log($crate::logging::Level::Info, $cat, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($cat:expr, $($arg:tt)*) => {
        $crate::logging::write_log($crate::logging::Level::Warn, $cat, &format!($($arg)*))
    };
}

pub use log_debug;
pub use log_info;
pub use log_warn;
