//! Logging interface for the HAL.
//!
//! The HAL never owns an output device. Whoever boots it (the kernel, a
//! board crate, or a host test) registers a print function with
//! [`set_print_fn`] and a leveled log function with [`set_log_fn`]. Until
//! then every message is silently discarded, which keeps the trap path and
//! early boot free of any output dependency.
//!
//! Leveled messages above [`MAX_LOG_LEVEL`](crate::config::MAX_LOG_LEVEL)
//! are dropped before the registered function is called.

use core::fmt;
use core::sync::atomic::{AtomicPtr, Ordering};

use crate::config::MAX_LOG_LEVEL;

// ---------------------------------------------------------------------------
// Log levels, lower is more severe
// ---------------------------------------------------------------------------

/// HAL log severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    /// The system cannot continue.
    Fatal = 0,
    /// An operation failed; the system may continue.
    Error = 1,
    /// Unexpected condition, e.g. a stuck fence or a spurious interrupt storm.
    Warn = 2,
    /// Progress messages (HAL init, barrier setup).
    Info = 3,
    /// Per-operation diagnostics.
    Debug = 4,
    /// Very verbose tracing of state transitions.
    Trace = 5,
}

impl LogLevel {
    /// Returns the fixed-width display name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Fatal => "FATAL",
            Self::Error => "ERROR",
            Self::Warn => "WARN ",
            Self::Info => "INFO ",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }

    /// Parses a lowercase level name, as used by build-time configuration.
    pub const fn from_name(name: &str) -> Option<Self> {
        match name.as_bytes() {
            b"fatal" => Some(Self::Fatal),
            b"error" => Some(Self::Error),
            b"warn" => Some(Self::Warn),
            b"info" => Some(Self::Info),
            b"debug" => Some(Self::Debug),
            b"trace" => Some(Self::Trace),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name().trim_end())
    }
}

// ---------------------------------------------------------------------------
// Raw print function (kprint! / kprintln!)
// ---------------------------------------------------------------------------

/// The signature of the global print function.
pub type PrintFn = fn(fmt::Arguments<'_>);

fn null_print(_args: fmt::Arguments<'_>) {}

static PRINT_FN: AtomicPtr<()> = AtomicPtr::new(null_print as *mut ());

/// Registers the global print function.
///
/// # Safety
///
/// `f` must be callable from any context, including interrupt dispatch
/// with interrupts disabled, and must not take a lock that the HAL may be
/// holding (the fence and core-descriptor locks in particular).
pub unsafe fn set_print_fn(f: PrintFn) {
    PRINT_FN.store(f as *mut (), Ordering::Release);
}

#[inline]
fn load_print_fn() -> PrintFn {
    let ptr = PRINT_FN.load(Ordering::Acquire);
    // SAFETY: Only `PrintFn` pointers are ever stored into PRINT_FN.
    unsafe { core::mem::transmute::<*mut (), PrintFn>(ptr) }
}

/// Implementation detail for [`kprint!`]. Not public API.
#[doc(hidden)]
pub fn _print(args: fmt::Arguments<'_>) {
    load_print_fn()(args);
}

/// Prints to the registered sink without a level.
#[macro_export]
macro_rules! kprint {
    ($($arg:tt)*) => { $crate::log::_print(format_args!($($arg)*)) };
}

/// Prints to the registered sink with a trailing newline.
#[macro_export]
macro_rules! kprintln {
    () => { $crate::kprint!("\n") };
    ($($arg:tt)*) => { $crate::kprint!("{}\n", format_args!($($arg)*)) };
}

// ---------------------------------------------------------------------------
// Leveled log function (klog! and convenience macros)
// ---------------------------------------------------------------------------

/// The signature of the global leveled log function.
pub type LogFn = fn(LogLevel, fmt::Arguments<'_>);

fn null_log(_level: LogLevel, _args: fmt::Arguments<'_>) {}

static LOG_FN: AtomicPtr<()> = AtomicPtr::new(null_log as *mut ());

/// Registers the global leveled log function.
///
/// # Safety
///
/// Same requirements as [`set_print_fn`].
pub unsafe fn set_log_fn(f: LogFn) {
    LOG_FN.store(f as *mut (), Ordering::Release);
}

#[inline]
fn load_log_fn() -> LogFn {
    let ptr = LOG_FN.load(Ordering::Acquire);
    // SAFETY: Only `LogFn` pointers are ever stored into LOG_FN.
    unsafe { core::mem::transmute::<*mut (), LogFn>(ptr) }
}

/// Returns whether messages at `level` pass the compile-time filter.
#[inline]
pub const fn enabled(level: LogLevel) -> bool {
    level as u8 <= MAX_LOG_LEVEL as u8
}

/// Implementation detail for [`klog!`]. Not public API.
#[doc(hidden)]
pub fn _log(level: LogLevel, args: fmt::Arguments<'_>) {
    if enabled(level) {
        load_log_fn()(level, args);
    }
}

/// Logs a message at the given level.
#[macro_export]
macro_rules! klog {
    ($level:expr, $($arg:tt)*) => {
        $crate::log::_log($level, format_args!($($arg)*))
    };
}

/// Logs a fatal-level message.
#[macro_export]
macro_rules! kfatal {
    ($($arg:tt)*) => { $crate::klog!($crate::log::LogLevel::Fatal, $($arg)*) };
}

/// Logs an error-level message.
#[macro_export]
macro_rules! kerr {
    ($($arg:tt)*) => { $crate::klog!($crate::log::LogLevel::Error, $($arg)*) };
}

/// Logs a warning-level message.
#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => { $crate::klog!($crate::log::LogLevel::Warn, $($arg)*) };
}

/// Logs an info-level message.
#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)*) => { $crate::klog!($crate::log::LogLevel::Info, $($arg)*) };
}

/// Logs a debug-level message.
#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => { $crate::klog!($crate::log::LogLevel::Debug, $($arg)*) };
}

/// Logs a trace-level message.
#[macro_export]
macro_rules! ktrace {
    ($($arg:tt)*) => { $crate::klog!($crate::log::LogLevel::Trace, $($arg)*) };
}
