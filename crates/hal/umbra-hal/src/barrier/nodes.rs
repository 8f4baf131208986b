//! Barrier across the nodes of a multi-cluster system.
//!
//! Built on two sync connections over the participant list, whose first
//! entry is the master:
//!
//! | node   | `syncin`                 | `syncout`              |
//! |--------|--------------------------|------------------------|
//! | master | creates all-to-one       | opens one-to-all       |
//! | worker | creates one-to-all       | opens all-to-one       |
//!
//! A round on the master waits for every worker's arrival and then
//! releases them; a worker announces its arrival and then waits for the
//! release. Swapping either order deadlocks the round.

use core::time::Duration;

use planck_noalloc::vec::ArrayVec;
use umbra_core::id::NodeId;
use umbra_core::{HalError, Result, kdebug, kwarn};

use super::device::{SyncDevice, SyncTopology};

/// Most nodes a barrier can span.
pub const MAX_NODES: usize = 32;

/// Tunables of a node barrier session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeBarrierConfig {
    /// Bound on each wait of a round. `None` blocks indefinitely.
    pub wait_timeout: Option<Duration>,
}

/// An established node barrier session.
///
/// Only [`setup`](Self::setup) creates one, so holding a session means both
/// endpoints exist. Dropping it without [`cleanup`](Self::cleanup) tears it
/// down anyway and logs any device error.
pub struct NodeBarrier<'d, D: SyncDevice> {
    device: &'d D,
    syncin: Option<D::Endpoint>,
    syncout: Option<D::Endpoint>,
    is_master: bool,
    nodes: ArrayVec<NodeId, MAX_NODES>,
    config: NodeBarrierConfig,
}

impl<'d, D: SyncDevice> NodeBarrier<'d, D> {
    /// Establishes the calling node's side of a barrier over `nodes`.
    ///
    /// # Errors
    ///
    /// - [`HalError::InvalidArgument`] if `nodes` is empty, longer than
    ///   [`MAX_NODES`], has duplicates, does not contain the local node, or
    ///   `is_master` disagrees with the local node being `nodes[0]`.
    /// - Any error of the device's `create`/`open`. Endpoints acquired
    ///   before the failure are released.
    pub fn setup(device: &'d D, nodes: &[NodeId], is_master: bool, config: NodeBarrierConfig) -> Result<Self> {
        let list = validate(nodes)?;
        let local = device.local_node();
        if !nodes.contains(&local) || (nodes[0] == local) != is_master {
            return Err(HalError::InvalidArgument);
        }

        let (syncin, syncout) = if is_master {
            let syncin = device.create(nodes, SyncTopology::AllToOne)?;
            match device.open(nodes, SyncTopology::OneToAll) {
                Ok(syncout) => (syncin, syncout),
                Err(e) => {
                    release(device.unlink(syncin));
                    return Err(e);
                }
            }
        } else {
            let syncout = device.open(nodes, SyncTopology::AllToOne)?;
            match device.create(nodes, SyncTopology::OneToAll) {
                Ok(syncin) => (syncin, syncout),
                Err(e) => {
                    release(device.close(syncout));
                    return Err(e);
                }
            }
        };

        kdebug!(
            "node barrier: {} joined {} nodes as {}",
            local,
            nodes.len(),
            if is_master { "master" } else { "worker" }
        );

        Ok(Self {
            device,
            syncin: Some(syncin),
            syncout: Some(syncout),
            is_master,
            nodes: list,
            config,
        })
    }

    /// Blocks until every node has reached the barrier.
    ///
    /// # Errors
    ///
    /// Any device error, or [`HalError::TimedOut`] if a wait deadline is
    /// configured and passes.
    pub fn wait(&self) -> Result<()> {
        let (Some(syncin), Some(syncout)) = (&self.syncin, &self.syncout) else {
            return Err(HalError::Unavailable);
        };
        if self.is_master {
            self.wait_in(syncin)?;
            self.device.signal(syncout)
        } else {
            self.device.signal(syncout)?;
            self.wait_in(syncin)
        }
    }

    fn wait_in(&self, syncin: &D::Endpoint) -> Result<()> {
        match self.config.wait_timeout {
            Some(timeout) => self.device.wait_timeout(syncin, timeout),
            None => self.device.wait(syncin),
        }
    }

    /// Tears the session down: unlinks the created endpoint and closes the
    /// opened one.
    ///
    /// # Errors
    ///
    /// The first device error; both endpoints are released regardless.
    pub fn cleanup(mut self) -> Result<()> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<()> {
        let unlinked = self.syncin.take().map_or(Ok(()), |ep| self.device.unlink(ep));
        let closed = self.syncout.take().map_or(Ok(()), |ep| self.device.close(ep));
        kdebug!("node barrier: {} left", self.device.local_node());
        unlinked.and(closed)
    }

    /// Whether this node is the master.
    pub fn is_master(&self) -> bool {
        self.is_master
    }

    /// The participant list, master first.
    pub fn nodes(&self) -> &[NodeId] {
        self.nodes.as_slice()
    }
}

impl<D: SyncDevice> Drop for NodeBarrier<'_, D> {
    fn drop(&mut self) {
        if self.syncin.is_some() || self.syncout.is_some() {
            if let Err(e) = self.teardown() {
                kwarn!("node barrier: teardown on drop failed: {}", e);
            }
        }
    }
}

fn validate(nodes: &[NodeId]) -> Result<ArrayVec<NodeId, MAX_NODES>> {
    if nodes.is_empty() || nodes.len() > MAX_NODES {
        return Err(HalError::InvalidArgument);
    }
    let mut list = ArrayVec::new();
    for &node in nodes {
        if list.as_slice().contains(&node) {
            return Err(HalError::InvalidArgument);
        }
        list.try_push(node).map_err(|_| HalError::InvalidArgument)?;
    }
    Ok(list)
}

fn release(res: Result<()>) {
    if let Err(e) = res {
        kwarn!("node barrier: releasing endpoint after failed setup: {}", e);
    }
}
