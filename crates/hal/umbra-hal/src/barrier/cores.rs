//! Barrier across the cores of one cluster.
//!
//! Setup is lazy and asymmetric: the master core (index 0) arms the shared
//! fence and raises a ready flag, the other cores spin on that flag, and
//! then every core passes the fence once so nobody returns from setup
//! before all cores have joined. Cleanup mirrors it, and the master does
//! not arm a new session until every core of the old one has left.

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use umbra_core::id::CoreId;
use umbra_core::sync::{Fence, SpinWatch, StallPolicy};
use umbra_core::{HalError, Result, kdebug};

use crate::arch::CORES_NUM;

/// A fence plus the lazy-setup handshake around it.
pub struct CoreBarrier {
    fence: Fence,
    ready: AtomicBool,
    inside: AtomicUsize,
    policy: StallPolicy,
}

impl CoreBarrier {
    /// Creates an unarmed barrier with the default stall policy.
    pub const fn new() -> Self {
        Self::with_policy(StallPolicy::DEFAULT)
    }

    /// Creates an unarmed barrier reporting long waits to `policy`.
    pub const fn with_policy(policy: StallPolicy) -> Self {
        Self {
            fence: Fence::new(0),
            ready: AtomicBool::new(false),
            inside: AtomicUsize::new(0),
            policy,
        }
    }

    /// Joins the barrier as `core` out of `ncores` participants.
    ///
    /// Returns once all `ncores` cores have joined.
    ///
    /// # Errors
    ///
    /// - [`HalError::InvalidArgument`] if `ncores` is zero or exceeds the
    ///   cluster, or `core` is not below `ncores`.
    /// - [`HalError::Busy`] if the master sets up an already armed barrier.
    pub fn setup(&self, core: CoreId, ncores: usize) -> Result<()> {
        if ncores == 0 || ncores > CORES_NUM || core.as_usize() >= ncores {
            return Err(HalError::InvalidArgument);
        }

        if core.is_master() {
            if self.ready.load(Ordering::Acquire) {
                return Err(HalError::Busy);
            }
            let mut watch = SpinWatch::new(&self.policy, "core barrier rearm");
            while self.inside.load(Ordering::Acquire) != 0 {
                watch.tick();
                core::hint::spin_loop();
            }
            self.fence.reset(ncores)?;
            self.inside.store(ncores, Ordering::Relaxed);
            self.ready.store(true, Ordering::Release);
            kdebug!("core barrier: armed for {} cores", ncores);
        } else {
            let mut watch = SpinWatch::new(&self.policy, "core barrier setup");
            while !self.ready.load(Ordering::Acquire) {
                watch.tick();
                core::hint::spin_loop();
            }
        }

        self.fence.wait(&self.policy);
        Ok(())
    }

    /// Waits until every participant reaches the barrier.
    ///
    /// # Errors
    ///
    /// [`HalError::Unavailable`] if the barrier is not set up.
    pub fn wait(&self) -> Result<()> {
        if !self.ready.load(Ordering::Acquire) {
            return Err(HalError::Unavailable);
        }
        self.fence.wait(&self.policy);
        Ok(())
    }

    /// Leaves the barrier. Every participant must call this once; the last
    /// fence round guarantees nobody is still inside when it is disarmed.
    /// The master may set up again right away; that setup waits for the
    /// other cores to leave this one.
    ///
    /// # Errors
    ///
    /// [`HalError::InvalidArgument`] if `core` is beyond the armed
    /// participant count.
    pub fn cleanup(&self, core: CoreId) -> Result<()> {
        if core.as_usize() >= self.fence.ncores() {
            return Err(HalError::InvalidArgument);
        }
        if core.is_master() {
            self.ready.store(false, Ordering::Release);
        }
        self.fence.wait(&self.policy);
        self.inside.fetch_sub(1, Ordering::Release);
        if core.is_master() {
            kdebug!("core barrier: disarmed");
        }
        Ok(())
    }

    /// Whether the master has armed the barrier.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

impl Default for CoreBarrier {
    fn default() -> Self {
        Self::new()
    }
}

static CORE_BARRIER: CoreBarrier = CoreBarrier::new();

/// Joins the cluster-wide barrier as core `core_index` of `ncores`.
///
/// # Errors
///
/// See [`CoreBarrier::setup`]; a negative index is
/// [`HalError::InvalidArgument`].
pub fn barrier_cores_setup(core_index: i32, ncores: usize) -> Result<()> {
    let core = u32::try_from(core_index).map_err(|_| HalError::InvalidArgument)?;
    CORE_BARRIER.setup(CoreId::new(core), ncores)
}

/// Waits on the cluster-wide barrier.
///
/// # Errors
///
/// See [`CoreBarrier::wait`].
pub fn barrier_cores() -> Result<()> {
    CORE_BARRIER.wait()
}

/// Leaves the cluster-wide barrier.
///
/// # Errors
///
/// See [`CoreBarrier::cleanup`]; a negative index is
/// [`HalError::InvalidArgument`].
pub fn barrier_cores_cleanup(core_index: i32) -> Result<()> {
    let core = u32::try_from(core_index).map_err(|_| HalError::InvalidArgument)?;
    CORE_BARRIER.cleanup(CoreId::new(core))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    fn run_session(barrier: &Arc<CoreBarrier>, n: usize, rounds: usize) {
        let counter = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..n)
            .map(|me| {
                let barrier = Arc::clone(barrier);
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || {
                    let me = CoreId::new(me as u32);
                    barrier.setup(me, n).unwrap();
                    for round in 1..=rounds {
                        counter.fetch_add(1, Ordering::SeqCst);
                        barrier.wait().unwrap();
                        assert!(counter.load(Ordering::SeqCst) >= round * n);
                        barrier.wait().unwrap();
                    }
                    barrier.cleanup(me).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), n * rounds);
    }

    #[test]
    fn setup_rounds_cleanup() {
        let barrier = Arc::new(CoreBarrier::with_policy(StallPolicy::DISABLED));
        run_session(&barrier, 4, 200);
        assert!(!barrier.is_ready());
    }

    #[test]
    fn barrier_is_reusable_after_cleanup() {
        let barrier = Arc::new(CoreBarrier::with_policy(StallPolicy::DISABLED));
        run_session(&barrier, 2, 50);
        run_session(&barrier, 3, 50);
    }

    #[test]
    fn rearm_right_after_cleanup() {
        for _ in 0..200 {
            let barrier = Arc::new(CoreBarrier::with_policy(StallPolicy::DISABLED));
            let worker = {
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.setup(CoreId::new(1), 2).unwrap();
                    barrier.cleanup(CoreId::new(1)).unwrap();
                })
            };
            barrier.setup(CoreId::MASTER, 2).unwrap();
            barrier.cleanup(CoreId::MASTER).unwrap();
            barrier.setup(CoreId::MASTER, 1).unwrap();
            barrier.wait().unwrap();
            barrier.cleanup(CoreId::MASTER).unwrap();
            worker.join().unwrap();
        }
    }

    #[test]
    fn argument_checks() {
        let barrier = CoreBarrier::new();
        assert_eq!(barrier.setup(CoreId::new(0), 0), Err(HalError::InvalidArgument));
        assert_eq!(
            barrier.setup(CoreId::new(0), CORES_NUM + 1),
            Err(HalError::InvalidArgument)
        );
        assert_eq!(barrier.setup(CoreId::new(2), 2), Err(HalError::InvalidArgument));
        assert_eq!(barrier.wait(), Err(HalError::Unavailable));
    }

    #[test]
    fn single_core_session() {
        let barrier = CoreBarrier::new();
        barrier.setup(CoreId::MASTER, 1).unwrap();
        assert_eq!(barrier.setup(CoreId::MASTER, 1), Err(HalError::Busy));
        barrier.wait().unwrap();
        barrier.cleanup(CoreId::MASTER).unwrap();
        assert!(!barrier.is_ready());
    }

    #[test]
    fn global_free_functions() {
        assert_eq!(barrier_cores_setup(-1, 2), Err(HalError::InvalidArgument));
        let worker = std::thread::spawn(|| {
            barrier_cores_setup(1, 2).unwrap();
            barrier_cores().unwrap();
            barrier_cores_cleanup(1).unwrap();
        });
        barrier_cores_setup(0, 2).unwrap();
        barrier_cores().unwrap();
        barrier_cores_cleanup(0).unwrap();
        worker.join().unwrap();
    }
}
