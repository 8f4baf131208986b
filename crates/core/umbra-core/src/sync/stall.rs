//! Stall diagnostics for busy-wait loops.
//!
//! A spin loop that never returns is indistinguishable from a slow one, so
//! waits in the HAL count their iterations through a [`SpinWatch`] and
//! report to a [`StallPolicy`] every time another `threshold` iterations
//! pass. Reporting never changes the blocking behaviour of the wait.

use crate::config::FENCE_STALL_THRESHOLD;

/// Details handed to the stall hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StallReport {
    /// The wait site, e.g. `"fence"` or a lock name.
    pub site: &'static str,
    /// Iterations spun so far.
    pub spins: u64,
}

/// When and how to report a stalled wait.
#[derive(Debug, Clone, Copy)]
pub struct StallPolicy {
    /// Iterations between reports. Zero disables reporting.
    pub threshold: u64,
    /// Called each time the threshold is crossed.
    pub on_stall: fn(&StallReport),
}

impl StallPolicy {
    /// Build-time threshold with a warning log.
    pub const DEFAULT: Self = Self::new(FENCE_STALL_THRESHOLD, log_stall);

    /// Never reports.
    pub const DISABLED: Self = Self::new(0, log_stall);

    /// Creates a policy from a threshold and a hook.
    pub const fn new(threshold: u64, on_stall: fn(&StallReport)) -> Self {
        Self {
            threshold,
            on_stall,
        }
    }

    /// Returns a copy with a different threshold.
    #[must_use]
    pub const fn with_threshold(self, threshold: u64) -> Self {
        Self { threshold, ..self }
    }
}

impl Default for StallPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

fn log_stall(report: &StallReport) {
    crate::kwarn!("{}: stuck after {} spins", report.site, report.spins);
}

/// Iteration counter for one wait.
pub struct SpinWatch<'p> {
    policy: &'p StallPolicy,
    site: &'static str,
    spins: u64,
}

impl<'p> SpinWatch<'p> {
    /// Starts watching a wait at `site`.
    pub fn new(policy: &'p StallPolicy, site: &'static str) -> Self {
        Self {
            policy,
            site,
            spins: 0,
        }
    }

    /// Counts one iteration, reporting if a threshold multiple was reached.
    #[inline]
    pub fn tick(&mut self) {
        self.spins = self.spins.wrapping_add(1);
        let threshold = self.policy.threshold;
        if threshold != 0 && self.spins % threshold == 0 {
            (self.policy.on_stall)(&StallReport {
                site: self.site,
                spins: self.spins,
            });
        }
    }

    /// Iterations counted so far.
    pub fn spins(&self) -> u64 {
        self.spins
    }
}
