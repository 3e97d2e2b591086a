//! Crate-internal logging facade.
//!
//! Records go to `tracing` when that feature is enabled, otherwise to `log`
//! when the `logging` feature is enabled (the default). With neither, the
//! macros compile to nothing but still type-check their format arguments.

macro_rules! emit {
    ($level:ident, $($arg:tt)*) => {{
        #[cfg(feature = "tracing")]
        { tracing::$level!($($arg)*); }

        #[cfg(all(not(feature = "tracing"), feature = "logging"))]
        { log::$level!($($arg)*); }

        #[cfg(all(not(feature = "tracing"), not(feature = "logging")))]
        { let _ = format_args!($($arg)*); }
    }};
}

#[allow(unused_macros)]
macro_rules! log_debug {
    ($($arg:tt)*) => { $crate::observability::emit!(debug, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! log_info {
    ($($arg:tt)*) => { $crate::observability::emit!(info, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! log_warn {
    ($($arg:tt)*) => { $crate::observability::emit!(warn, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! log_error {
    ($($arg:tt)*) => { $crate::observability::emit!(error, $($arg)*) };
}

pub(crate) use emit;
pub(crate) use log_debug;
pub(crate) use log_error;
pub(crate) use log_info;
pub(crate) use log_warn;
