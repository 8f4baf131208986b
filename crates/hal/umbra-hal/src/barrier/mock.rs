//! In-memory sync device for tests.
//!
//! All nodes of a test share one [`Fabric`]; each node talks to it through
//! its own [`MockSyncDevice`]. Connections are unbuffered rendezvous: a
//! round completes only when every receiver is waiting and every sender has
//! signalled, and both sides block until then. That makes a wrong
//! wait/signal order deadlock here the way it does on hardware.
//!
//! Under `--cfg shuttle` the lock, condition variable and threads come from
//! shuttle so schedules can be explored and deadlocks detected.

use std::sync::Arc;
#[cfg(not(shuttle))]
use std::sync::{Condvar, Mutex, MutexGuard};
#[cfg(not(shuttle))]
use std::time::{Duration, Instant};

#[cfg(shuttle)]
use shuttle::sync::{Condvar, Mutex, MutexGuard};

use umbra_core::id::NodeId;
use umbra_core::{HalError, Result};

use super::device::{SyncDevice, SyncTopology};

struct Channel {
    topology: SyncTopology,
    nodes: Vec<NodeId>,
    attached: Vec<NodeId>,
    waiting: usize,
    signalled: usize,
    generation: u64,
}

impl Channel {
    fn receivers(&self) -> usize {
        match self.topology {
            SyncTopology::AllToOne => 1,
            SyncTopology::OneToAll => self.nodes.len() - 1,
        }
    }

    fn senders(&self) -> usize {
        match self.topology {
            SyncTopology::AllToOne => self.nodes.len() - 1,
            SyncTopology::OneToAll => 1,
        }
    }

    fn is_receiver(&self, node: NodeId) -> bool {
        let first = self.nodes[0] == node;
        match self.topology {
            SyncTopology::AllToOne => first,
            SyncTopology::OneToAll => !first && self.nodes.contains(&node),
        }
    }

    fn try_complete(&mut self) -> bool {
        if self.waiting == self.receivers() && self.signalled == self.senders() {
            self.waiting = 0;
            self.signalled = 0;
            self.generation += 1;
            true
        } else {
            false
        }
    }
}

#[derive(Default)]
struct FabricState {
    channels: Vec<Channel>,
    shutdown: bool,
}

/// The interconnect shared by all nodes of a test.
pub(crate) struct Fabric {
    state: Mutex<FabricState>,
    cond: Condvar,
}

impl Fabric {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FabricState::default()),
            cond: Condvar::new(),
        })
    }

    /// The device as seen from `node`.
    pub(crate) fn device(self: &Arc<Self>, node: u32) -> MockSyncDevice {
        MockSyncDevice {
            fabric: Arc::clone(self),
            local: NodeId::new(node),
        }
    }

    /// Fails every blocked and future wait or signal with
    /// [`HalError::Unavailable`].
    pub(crate) fn shutdown(&self) {
        self.state.lock().unwrap().shutdown = true;
        self.cond.notify_all();
    }

    fn lock(&self) -> MutexGuard<'_, FabricState> {
        self.state.lock().unwrap()
    }
}

/// Endpoint handle: a channel index and which side this node holds.
#[derive(Debug)]
pub(crate) struct MockEndpoint {
    channel: usize,
    receiver: bool,
}

/// One node's view of the [`Fabric`].
pub(crate) struct MockSyncDevice {
    fabric: Arc<Fabric>,
    local: NodeId,
}

impl MockSyncDevice {
    fn attach(&self, nodes: &[NodeId], topology: SyncTopology, receiver: bool) -> Result<MockEndpoint> {
        if nodes.len() < 2 || !nodes.contains(&self.local) {
            return Err(HalError::InvalidArgument);
        }
        let mut state = self.fabric.lock();
        let channel = match state
            .channels
            .iter()
            .position(|c| c.topology == topology && c.nodes == nodes)
        {
            Some(idx) => idx,
            None => {
                state.channels.push(Channel {
                    topology,
                    nodes: nodes.to_vec(),
                    attached: Vec::new(),
                    waiting: 0,
                    signalled: 0,
                    generation: 0,
                });
                state.channels.len() - 1
            }
        };
        let ch = &mut state.channels[channel];
        if ch.is_receiver(self.local) != receiver {
            return Err(HalError::InvalidArgument);
        }
        if ch.attached.contains(&self.local) {
            return Err(HalError::Busy);
        }
        ch.attached.push(self.local);
        Ok(MockEndpoint { channel, receiver })
    }

    fn detach(&self, endpoint: &MockEndpoint) -> Result<()> {
        let mut state = self.fabric.lock();
        let ch = &mut state.channels[endpoint.channel];
        let pos = ch
            .attached
            .iter()
            .position(|&n| n == self.local)
            .ok_or(HalError::NotFound)?;
        ch.attached.swap_remove(pos);
        Ok(())
    }

    /// Joins the current round on `endpoint` and blocks until it completes.
    fn rendezvous(&self, endpoint: &MockEndpoint) -> Result<()> {
        let mut state = self.fabric.lock();
        if state.shutdown {
            return Err(HalError::Unavailable);
        }
        let ch = &mut state.channels[endpoint.channel];
        let generation = ch.generation;
        if endpoint.receiver {
            ch.waiting += 1;
        } else {
            ch.signalled += 1;
        }
        if ch.try_complete() {
            self.fabric.cond.notify_all();
            return Ok(());
        }
        loop {
            state = self.fabric.cond.wait(state).unwrap();
            if state.channels[endpoint.channel].generation != generation {
                return Ok(());
            }
            if state.shutdown {
                return Err(HalError::Unavailable);
            }
        }
    }
}

impl SyncDevice for MockSyncDevice {
    type Endpoint = MockEndpoint;

    fn local_node(&self) -> NodeId {
        self.local
    }

    fn create(&self, nodes: &[NodeId], topology: SyncTopology) -> Result<MockEndpoint> {
        self.attach(nodes, topology, true)
    }

    fn open(&self, nodes: &[NodeId], topology: SyncTopology) -> Result<MockEndpoint> {
        self.attach(nodes, topology, false)
    }

    fn wait(&self, endpoint: &MockEndpoint) -> Result<()> {
        if !endpoint.receiver {
            return Err(HalError::InvalidArgument);
        }
        self.rendezvous(endpoint)
    }

    #[cfg(not(shuttle))]
    fn wait_timeout(&self, endpoint: &MockEndpoint, timeout: Duration) -> Result<()> {
        if !endpoint.receiver {
            return Err(HalError::InvalidArgument);
        }
        let deadline = Instant::now() + timeout;
        let mut state = self.fabric.lock();
        if state.shutdown {
            return Err(HalError::Unavailable);
        }
        let ch = &mut state.channels[endpoint.channel];
        let generation = ch.generation;
        ch.waiting += 1;
        if ch.try_complete() {
            self.fabric.cond.notify_all();
            return Ok(());
        }
        loop {
            let now = Instant::now();
            if now >= deadline {
                let ch = &mut state.channels[endpoint.channel];
                ch.waiting -= 1;
                return Err(HalError::TimedOut);
            }
            state = self.fabric.cond.wait_timeout(state, deadline - now).unwrap().0;
            if state.channels[endpoint.channel].generation != generation {
                return Ok(());
            }
            if state.shutdown {
                return Err(HalError::Unavailable);
            }
        }
    }

    fn signal(&self, endpoint: &MockEndpoint) -> Result<()> {
        if endpoint.receiver {
            return Err(HalError::InvalidArgument);
        }
        self.rendezvous(endpoint)
    }

    fn unlink(&self, endpoint: MockEndpoint) -> Result<()> {
        if !endpoint.receiver {
            return Err(HalError::InvalidArgument);
        }
        self.detach(&endpoint)
    }

    fn close(&self, endpoint: MockEndpoint) -> Result<()> {
        if endpoint.receiver {
            return Err(HalError::InvalidArgument);
        }
        self.detach(&endpoint)
    }
}
