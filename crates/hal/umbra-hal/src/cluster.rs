//! Core descriptors and lifecycle.
//!
//! Every core of the cluster has a descriptor guarded by its own spinlock:
//! whether it has run its start routine, its lifecycle state, the number of
//! pending wakeups and the routine to run once started. Core 0 is the
//! master and is running from boot; every other core starts idle and waits
//! for [`Cluster::core_start`].
//!
//! ```text
//!          core_start           core_sleep (no wakeups)
//!   Idle ------------> Running ----------------------> Sleeping
//!    ^                  |  ^                               |
//!    |     core_reset   |  +---------- core_wakeup --------+
//!    +--- Resetting <---+
//!                       |  core_shutdown
//!                       +---------------> Offline
//! ```
//!
//! How a sleeping core is woken is left to a [`CoreSignal`]: an interrupt
//! on the IPI line with [`IpiSignal`], or a flag in shared memory with
//! [`SpinSignal`]. Both invalidate the data cache around their flags so
//! they also work on clusters without coherent caches.

use core::sync::atomic::{AtomicBool, Ordering};

use umbra_core::id::CoreId;
use umbra_core::sync::SpinLock;
use umbra_core::{HalError, Result, kdebug, ktrace, kwarn};

use crate::arch::{self, CORES_NUM, IPI_LINE};
use crate::interrupt::InterruptController;

/// Lifecycle state of a core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreState {
    /// Waiting for a start routine.
    Idle,
    /// Suspended until woken.
    Sleeping,
    /// Executing.
    Running,
    /// Tearing down its execution before going idle again.
    Resetting,
    /// Powered off; cannot be woken.
    Offline,
}

/// Wakeup mechanism between cores.
pub trait CoreSignal: Sync {
    /// Wakes `core` if it is waiting in [`wait`](Self::wait), or makes its
    /// next `wait` return immediately.
    fn notify(&self, core: CoreId);

    /// Blocks the calling core, `core`, until notified.
    fn wait(&self, core: CoreId);
}

/// Shared-memory [`CoreSignal`]: one event flag per core.
pub struct SpinSignal {
    events: [AtomicBool; CORES_NUM],
}

impl SpinSignal {
    /// Creates a signal with no pending events.
    pub const fn new() -> Self {
        Self {
            events: [const { AtomicBool::new(false) }; CORES_NUM],
        }
    }
}

impl Default for SpinSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreSignal for SpinSignal {
    fn notify(&self, core: CoreId) {
        if let Some(event) = self.events.get(core.as_usize()) {
            event.store(true, Ordering::Release);
            arch::dcache_invalidate();
        }
    }

    fn wait(&self, core: CoreId) {
        let Some(event) = self.events.get(core.as_usize()) else {
            return;
        };
        loop {
            arch::dcache_invalidate();
            if event.swap(false, Ordering::Acquire) {
                return;
            }
            core::hint::spin_loop();
        }
    }
}

/// [`CoreSignal`] that interrupts the target core on [`IPI_LINE`].
///
/// The line is shared by the cluster, so a per-core pending flag says
/// which core is meant. A woken core consumes its flag and acknowledges
/// the line.
pub struct IpiSignal<'c> {
    controller: &'c dyn InterruptController,
    pending: [AtomicBool; CORES_NUM],
}

impl<'c> IpiSignal<'c> {
    /// Creates a signal raising IPIs through `controller`.
    pub const fn new(controller: &'c dyn InterruptController) -> Self {
        Self {
            controller,
            pending: [const { AtomicBool::new(false) }; CORES_NUM],
        }
    }
}

impl CoreSignal for IpiSignal<'_> {
    fn notify(&self, core: CoreId) {
        let Some(pending) = self.pending.get(core.as_usize()) else {
            return;
        };
        // The waiter acks once it sees the flag, so the raise goes first.
        if let Err(e) = self.controller.raise(IPI_LINE) {
            kwarn!("{}: IPI to {} failed: {}", IPI_LINE, core, e);
        }
        pending.store(true, Ordering::Release);
        arch::dcache_invalidate();
    }

    fn wait(&self, core: CoreId) {
        let Some(pending) = self.pending.get(core.as_usize()) else {
            return;
        };
        loop {
            arch::dcache_invalidate();
            if pending.swap(false, Ordering::Acquire) {
                break;
            }
            core::hint::spin_loop();
        }
        self.controller.ack(IPI_LINE);
    }
}

#[derive(Debug)]
struct CoreInner {
    initialized: bool,
    state: CoreState,
    wakeups: u32,
    start: Option<fn()>,
}

impl CoreInner {
    const fn boot(core: usize) -> Self {
        if core == CoreId::MASTER.as_usize() {
            Self {
                initialized: true,
                state: CoreState::Running,
                wakeups: 0,
                start: None,
            }
        } else {
            Self {
                initialized: false,
                state: CoreState::Idle,
                wakeups: 0,
                start: None,
            }
        }
    }
}

type CoreDescriptor = SpinLock<CoreInner>;

/// The cores of one cluster.
pub struct Cluster<S: CoreSignal> {
    cores: [CoreDescriptor; CORES_NUM],
    signal: S,
}

impl<S: CoreSignal> Cluster<S> {
    /// Creates a cluster in its boot state.
    pub const fn new(signal: S) -> Self {
        let mut cores = [const { SpinLock::named("core", CoreInner::boot(1)) }; CORES_NUM];
        cores[0] = SpinLock::named("core", CoreInner::boot(0));
        Self { cores, signal }
    }

    fn descriptor(&self, core: CoreId) -> Result<&CoreDescriptor> {
        self.cores.get(core.as_usize()).ok_or(HalError::InvalidArgument)
    }

    /// Number of cores in the cluster.
    pub const fn ncores(&self) -> usize {
        CORES_NUM
    }

    /// Current state of `core`.
    ///
    /// # Errors
    ///
    /// [`HalError::InvalidArgument`] if `core` is out of range.
    pub fn core_state(&self, core: CoreId) -> Result<CoreState> {
        Ok(self.descriptor(core)?.lock().state)
    }

    /// Whether `core` has picked up its start routine since it last went
    /// idle.
    ///
    /// # Errors
    ///
    /// [`HalError::InvalidArgument`] if `core` is out of range.
    pub fn core_initialized(&self, core: CoreId) -> Result<bool> {
        Ok(self.descriptor(core)?.lock().initialized)
    }

    /// Wakeups delivered to `core` and not yet consumed.
    ///
    /// # Errors
    ///
    /// [`HalError::InvalidArgument`] if `core` is out of range.
    pub fn core_wakeups(&self, core: CoreId) -> Result<u32> {
        Ok(self.descriptor(core)?.lock().wakeups)
    }

    /// Parks the calling core, `me`, until another core starts it.
    ///
    /// Returns once `me` is running with a start routine; the caller then
    /// enters it with [`core_run`](Self::core_run).
    ///
    /// # Errors
    ///
    /// [`HalError::InvalidArgument`] if `me` is out of range.
    pub fn core_idle(&self, me: CoreId) -> Result<()> {
        let desc = self.descriptor(me)?;
        {
            let mut core = desc.lock();
            core.state = CoreState::Idle;
            core.initialized = false;
            core.start = None;
        }
        ktrace!("{}: idle", me);

        loop {
            {
                let core = desc.lock();
                if core.state == CoreState::Running && core.start.is_some() {
                    return Ok(());
                }
            }
            self.signal.wait(me);
        }
    }

    /// Hands `start` to the idle core `core` and wakes it.
    ///
    /// # Errors
    ///
    /// - [`HalError::InvalidArgument`] if `core` is out of range.
    /// - [`HalError::Busy`] if `core` is not idle.
    pub fn core_start(&self, core: CoreId, start: fn()) -> Result<()> {
        {
            let mut desc = self.descriptor(core)?.lock();
            if desc.state != CoreState::Idle {
                return Err(HalError::Busy);
            }
            desc.start = Some(start);
            desc.wakeups = 0;
            desc.state = CoreState::Running;
        }
        kdebug!("{}: started", core);
        self.signal.notify(core);
        Ok(())
    }

    /// Runs the start routine handed to the calling core, `me`.
    ///
    /// # Errors
    ///
    /// - [`HalError::InvalidArgument`] if `me` is out of range.
    /// - [`HalError::Unavailable`] if `me` is not running with a start
    ///   routine.
    pub fn core_run(&self, me: CoreId) -> Result<()> {
        let start = {
            let mut core = self.descriptor(me)?.lock();
            match (core.state, core.start) {
                (CoreState::Running, Some(start)) => {
                    core.initialized = true;
                    start
                }
                _ => return Err(HalError::Unavailable),
            }
        };
        ktrace!("{}: running start routine", me);
        start();
        Ok(())
    }

    /// Suspends the calling core, `me`, until it has a wakeup to consume.
    ///
    /// A wakeup delivered before the call is consumed immediately.
    ///
    /// # Errors
    ///
    /// [`HalError::InvalidArgument`] if `me` is out of range.
    pub fn core_sleep(&self, me: CoreId) -> Result<()> {
        let desc = self.descriptor(me)?;
        loop {
            {
                let mut core = desc.lock();
                if core.wakeups > 0 {
                    core.wakeups -= 1;
                    core.state = CoreState::Running;
                    return Ok(());
                }
                core.state = CoreState::Sleeping;
            }
            ktrace!("{}: sleeping", me);
            self.signal.wait(me);
        }
    }

    /// Delivers one wakeup to `core`.
    ///
    /// # Errors
    ///
    /// - [`HalError::InvalidArgument`] if `core` is out of range.
    /// - [`HalError::Unavailable`] if `core` is offline.
    pub fn core_wakeup(&self, core: CoreId) -> Result<()> {
        {
            let mut desc = self.descriptor(core)?.lock();
            if desc.state == CoreState::Offline {
                return Err(HalError::Unavailable);
            }
            desc.wakeups = desc.wakeups.saturating_add(1);
        }
        self.signal.notify(core);
        Ok(())
    }

    /// Marks the calling core, `me`, as resetting and forgets its start
    /// routine and wakeups. The core then goes back through
    /// [`core_idle`](Self::core_idle).
    ///
    /// # Errors
    ///
    /// [`HalError::InvalidArgument`] if `me` is out of range.
    pub fn core_reset(&self, me: CoreId) -> Result<()> {
        let mut core = self.descriptor(me)?.lock();
        core.state = CoreState::Resetting;
        core.initialized = false;
        core.start = None;
        core.wakeups = 0;
        drop(core);
        kdebug!("{}: reset", me);
        Ok(())
    }

    /// Takes the calling core, `me`, offline.
    ///
    /// # Errors
    ///
    /// [`HalError::InvalidArgument`] if `me` is out of range.
    pub fn core_shutdown(&self, me: CoreId) -> Result<()> {
        let mut core = self.descriptor(me)?.lock();
        core.state = CoreState::Offline;
        core.initialized = false;
        core.start = None;
        drop(core);
        kdebug!("{}: offline", me);
        Ok(())
    }

    /// Returns every descriptor to its boot state. Only for full cluster
    /// teardown, with no other core active.
    pub fn clear(&self) {
        for (idx, desc) in self.cores.iter().enumerate() {
            *desc.lock() = CoreInner::boot(idx);
        }
    }
}
