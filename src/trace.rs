//! Zero-cost tracing hooks.
//!
//! With the `tracing` feature enabled these macros forward to the
//! `tracing` crate; without it (the default) they compile to nothing, so
//! hot paths carry no logging overhead.
//!
//! ```bash
//! # Debug build with structured events
//! cargo test --features tracing
//! ```

#![allow(unused_macros, unused_imports)]

/// Debug-level event. No-op without the `tracing` feature.
#[cfg(feature = "tracing")]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

/// Trace-level event (most verbose). No-op without the `tracing` feature.
#[cfg(feature = "tracing")]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

pub(crate) use {debug_log, trace_log};
