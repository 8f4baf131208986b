//! Synchronization device contract.
//!
//! A sync device connects the nodes of a multi-cluster system without
//! shared memory. An endpoint is described by a node list and a topology;
//! the first node of the list is the single side of the connection.

use core::time::Duration;

use umbra_core::Result;
use umbra_core::id::NodeId;

/// Shape of a sync connection over `nodes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncTopology {
    /// `nodes[1..]` signal, `nodes[0]` waits.
    AllToOne,
    /// `nodes[0]` signals, `nodes[1..]` wait.
    OneToAll,
}

/// A hardware synchronization device as seen by one node.
pub trait SyncDevice {
    /// Handle to a created or opened connection.
    type Endpoint;

    /// The node this device belongs to.
    fn local_node(&self) -> NodeId;

    /// Creates the receiving end of a connection.
    ///
    /// # Errors
    ///
    /// Device-specific; [`HalError::Unavailable`](umbra_core::HalError::Unavailable)
    /// when the hardware resource cannot be allocated.
    fn create(&self, nodes: &[NodeId], topology: SyncTopology) -> Result<Self::Endpoint>;

    /// Opens the sending end of a connection.
    ///
    /// # Errors
    ///
    /// Device-specific, as for [`create`](Self::create).
    fn open(&self, nodes: &[NodeId], topology: SyncTopology) -> Result<Self::Endpoint>;

    /// Blocks until the connection's senders have all signalled.
    ///
    /// # Errors
    ///
    /// Device-specific.
    fn wait(&self, endpoint: &Self::Endpoint) -> Result<()>;

    /// Like [`wait`](Self::wait) but gives up after `timeout`.
    ///
    /// Devices without deadline support block like `wait`.
    ///
    /// # Errors
    ///
    /// [`HalError::TimedOut`](umbra_core::HalError::TimedOut) if the
    /// deadline passes, otherwise as for `wait`.
    fn wait_timeout(&self, endpoint: &Self::Endpoint, timeout: Duration) -> Result<()> {
        let _ = timeout;
        self.wait(endpoint)
    }

    /// Signals the receivers of the connection.
    ///
    /// # Errors
    ///
    /// Device-specific.
    fn signal(&self, endpoint: &Self::Endpoint) -> Result<()>;

    /// Destroys a created endpoint.
    ///
    /// # Errors
    ///
    /// Device-specific.
    fn unlink(&self, endpoint: Self::Endpoint) -> Result<()>;

    /// Releases an opened endpoint.
    ///
    /// # Errors
    ///
    /// Device-specific.
    fn close(&self, endpoint: Self::Endpoint) -> Result<()>;
}
