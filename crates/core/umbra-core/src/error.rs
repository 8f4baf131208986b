//! HAL error type.
//!
//! Every fallible HAL operation returns [`Result`]. Callers that speak a
//! C-style ABI can map an error to its negative errno with
//! [`HalError::errno`].

use core::fmt;

/// Errors reported by HAL operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HalError {
    /// An argument was out of range or malformed.
    InvalidArgument,
    /// The resource is already claimed or in a conflicting state.
    Busy,
    /// Nothing is registered for the requested resource.
    NotFound,
    /// The resource is not available yet, or was shut down.
    Unavailable,
    /// A bounded wait elapsed before completion.
    TimedOut,
}

impl HalError {
    /// Returns the negative errno code for this error.
    #[must_use]
    pub const fn errno(self) -> i32 {
        match self {
            Self::InvalidArgument => -22, // EINVAL
            Self::Busy => -16,            // EBUSY
            Self::NotFound => -2,         // ENOENT
            Self::Unavailable => -11,     // EAGAIN
            Self::TimedOut => -110,       // ETIMEDOUT
        }
    }
}

impl fmt::Display for HalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::Busy => write!(f, "resource busy"),
            Self::NotFound => write!(f, "not found"),
            Self::Unavailable => write!(f, "resource unavailable"),
            Self::TimedOut => write!(f, "timed out"),
        }
    }
}

impl core::error::Error for HalError {}

/// Result alias used throughout the HAL.
pub type Result<T> = core::result::Result<T, HalError>;
