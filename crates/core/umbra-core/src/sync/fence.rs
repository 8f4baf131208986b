//! Reusable barrier for cores sharing memory.
//!
//! Each round every participant flips its view of the `release` flag and
//! bumps `nreached`; the last one to arrive resets the counter and
//! publishes the flipped flag, which releases everyone spinning on it.
//! Comparing against the complement of the flag (rather than a round
//! counter) lets a fast core re-enter the next round while slow ones are
//! still leaving the previous one.

use super::loom_compat::spin_hint;
use super::spinlock::SpinLock;
use super::stall::{SpinWatch, StallPolicy};
use crate::error::{HalError, Result};

#[derive(Debug)]
struct FenceState {
    ncores: usize,
    nreached: usize,
    release: bool,
}

/// A reentrant spinning barrier for a fixed number of participants.
pub struct Fence {
    state: SpinLock<FenceState>,
}

impl Fence {
    /// Creates a fence for `ncores` participants.
    #[cfg(not(loom))]
    pub const fn new(ncores: usize) -> Self {
        Self {
            state: SpinLock::named(
                "fence",
                FenceState {
                    ncores,
                    nreached: 0,
                    release: false,
                },
            ),
        }
    }

    /// Creates a fence for `ncores` participants.
    #[cfg(loom)]
    pub fn new(ncores: usize) -> Self {
        Self {
            state: SpinLock::named(
                "fence",
                FenceState {
                    ncores,
                    nreached: 0,
                    release: false,
                },
            ),
        }
    }

    /// Re-arms the fence for `ncores` participants.
    ///
    /// The release flag keeps its parity, so a participant still spinning
    /// on the last completed round sees that round as released. Nobody may
    /// be inside an unfinished round.
    ///
    /// # Errors
    ///
    /// [`HalError::InvalidArgument`] if `ncores` is zero.
    pub fn reset(&self, ncores: usize) -> Result<()> {
        if ncores == 0 {
            return Err(HalError::InvalidArgument);
        }
        let mut state = self.state.lock();
        state.ncores = ncores;
        state.nreached = 0;
        Ok(())
    }

    /// Blocks until all participants have reached the fence in this round.
    ///
    /// Long waits are reported to `policy` but never abandoned.
    pub fn wait(&self, policy: &StallPolicy) {
        let local_release = {
            let mut state = self.state.lock();
            let local_release = !state.release;
            state.nreached += 1;
            if state.nreached >= state.ncores {
                state.nreached = 0;
                state.release = local_release;
            }
            local_release
        };

        let mut watch = SpinWatch::new(policy, "fence");
        while self.state.lock().release != local_release {
            watch.tick();
            spin_hint();
        }
    }

    /// Expected participants per round.
    pub fn ncores(&self) -> usize {
        self.state.lock().ncores
    }

    /// Participants that have arrived in the current round.
    pub fn nreached(&self) -> usize {
        self.state.lock().nreached
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use crate::sync::StallReport;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};

    #[test]
    fn single_participant_passes() {
        let fence = Fence::new(1);
        for _ in 0..10 {
            fence.wait(&StallPolicy::DISABLED);
        }
        assert_eq!(fence.nreached(), 0);
    }

    #[test]
    fn reset_rejects_zero() {
        let fence = Fence::new(2);
        assert_eq!(fence.reset(0), Err(HalError::InvalidArgument));
        assert_eq!(fence.ncores(), 2);
        fence.reset(3).unwrap();
        assert_eq!(fence.ncores(), 3);
    }

    fn rounds(n: usize, rounds: usize) {
        let fence = Arc::new(Fence::new(n));
        let entered: Arc<Vec<AtomicUsize>> = Arc::new((0..n).map(|_| AtomicUsize::new(0)).collect());
        // Holds everyone between rounds so the counter can be inspected.
        let quiesce = Arc::new(Barrier::new(n));

        let handles: Vec<_> = (0..n)
            .map(|me| {
                let fence = Arc::clone(&fence);
                let entered = Arc::clone(&entered);
                let quiesce = Arc::clone(&quiesce);
                std::thread::spawn(move || {
                    for round in 1..=rounds {
                        entered[me].store(round, Ordering::SeqCst);
                        fence.wait(&StallPolicy::DISABLED);
                        for other in entered.iter() {
                            assert!(
                                other.load(Ordering::SeqCst) >= round,
                                "left round {round} before everyone entered it"
                            );
                        }
                        if quiesce.wait().is_leader() {
                            assert_eq!(fence.nreached(), 0, "round {round}");
                        }
                        quiesce.wait();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(fence.nreached(), 0);
    }

    #[test]
    fn thousand_rounds_two_cores() {
        rounds(2, 1000);
    }

    #[test]
    fn thousand_rounds_four_cores() {
        rounds(4, 1000);
    }

    #[test]
    fn reset_keeps_release_parity() {
        let fence = Arc::new(Fence::new(2));
        let slow = {
            let fence = Arc::clone(&fence);
            std::thread::spawn(move || fence.wait(&StallPolicy::DISABLED))
        };
        while fence.nreached() == 0 {
            std::thread::yield_now();
        }
        // Completes the round; the other participant may not have seen the
        // flip yet when the fence is re-armed below.
        fence.wait(&StallPolicy::DISABLED);
        fence.reset(2).unwrap();
        slow.join().unwrap();
        assert_eq!(fence.nreached(), 0);
    }

    static STALLS: AtomicU64 = AtomicU64::new(0);

    fn count_stall(report: &StallReport) {
        assert_eq!(report.site, "fence");
        STALLS.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn stall_hook_fires_and_wait_continues() {
        let fence = Arc::new(Fence::new(2));
        let early = {
            let fence = Arc::clone(&fence);
            std::thread::spawn(move || {
                fence.wait(&StallPolicy::new(1, count_stall));
            })
        };
        while STALLS.load(Ordering::SeqCst) < 3 {
            std::thread::yield_now();
        }
        fence.wait(&StallPolicy::DISABLED);
        early.join().unwrap();
        assert_eq!(fence.nreached(), 0);
    }
}

#[cfg(all(test, loom))]
mod loom_tests {
    use super::*;
    use loom::sync::Arc;
    use loom::thread;

    #[test]
    fn two_cores_two_rounds() {
        loom::model(|| {
            let fence = Arc::new(Fence::new(2));
            let other = {
                let fence = Arc::clone(&fence);
                thread::spawn(move || {
                    fence.wait(&StallPolicy::DISABLED);
                    fence.wait(&StallPolicy::DISABLED);
                })
            };
            fence.wait(&StallPolicy::DISABLED);
            fence.wait(&StallPolicy::DISABLED);
            other.join().unwrap();
            assert_eq!(fence.nreached(), 0);
        });
    }
}
