//! Barriers: cores of one cluster over shared memory, and nodes of a
//! multi-cluster system over a sync device.

mod cores;
mod device;
mod nodes;

#[cfg(test)]
pub(crate) mod mock;

pub use cores::{CoreBarrier, barrier_cores, barrier_cores_cleanup, barrier_cores_setup};
pub use device::{SyncDevice, SyncTopology};
pub use nodes::{MAX_NODES, NodeBarrier, NodeBarrierConfig};
