//! Typed identifiers for HAL resources.
//!
//! These newtypes keep interrupt lines, cores and cluster nodes from being
//! mixed up. Range checks against a concrete target happen where the
//! identifier is used, since the limits are per-architecture.

use core::fmt;

use crate::error::HalError;

/// Interrupt line number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct IrqNumber(u32);

impl IrqNumber {
    /// Creates a new `IrqNumber`.
    pub const fn new(val: u32) -> Self {
        Self(val)
    }

    /// Returns the raw `u32` value.
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the value as `usize` for table indexing.
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl TryFrom<i32> for IrqNumber {
    type Error = HalError;

    /// Rejects negative line numbers coming from a C-style caller.
    fn try_from(val: i32) -> Result<Self, HalError> {
        u32::try_from(val)
            .map(Self)
            .map_err(|_| HalError::InvalidArgument)
    }
}

impl fmt::Display for IrqNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "irq{}", self.0)
    }
}

/// Core identifier within the local cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct CoreId(u32);

impl CoreId {
    /// The boot core.
    pub const MASTER: Self = Self(0);

    /// Creates a new `CoreId`.
    pub const fn new(val: u32) -> Self {
        Self(val)
    }

    /// Returns the raw `u32` value.
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the value as `usize` for table indexing.
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Returns whether this is the boot core.
    pub const fn is_master(self) -> bool {
        self.0 == Self::MASTER.0
    }
}

impl fmt::Display for CoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "core{}", self.0)
    }
}

/// Node (cluster) identifier in a multi-cluster system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// Creates a new `NodeId`.
    pub const fn new(val: u32) -> Self {
        Self(val)
    }

    /// Returns the raw `u32` value.
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl TryFrom<i32> for NodeId {
    type Error = HalError;

    fn try_from(val: i32) -> Result<Self, HalError> {
        u32::try_from(val)
            .map(Self)
            .map_err(|_| HalError::InvalidArgument)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node{}", self.0)
    }
}
