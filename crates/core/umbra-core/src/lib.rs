//! Core types and synchronization primitives for the Umbra HAL.
//!
//! This crate holds everything the hardware abstraction layer needs that
//! does not depend on a particular target: the logging interface, the error
//! taxonomy, typed identifiers, compile-time configuration, and the
//! spin-based synchronization primitives (spin locks, the core fence, and
//! the stall watchdog used by every busy-wait).
//!
//! Nothing here touches hardware, so the whole crate is tested with
//! `cargo test` on the host, and its spin primitives with loom.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod id;
pub mod log;
pub mod static_assert;
pub mod sync;

pub use error::{HalError, Result};
