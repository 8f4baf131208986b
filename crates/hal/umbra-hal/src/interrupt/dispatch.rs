//! Interrupt dispatch.
//!
//! [`InterruptTable`] maps each line to at most one handler. Handler slots
//! are atomic function pointers, so the trap path reads them without a
//! lock; registration and removal are serialized by a spinlock so they can
//! safely run on several cores while interrupts are being delivered.
//!
//! A delivered line with no handler is spurious. It is acknowledged and
//! counted; once a line's count passes the [`SpuriousPolicy`] threshold,
//! every further spurious delivery is escalated. Spurious interrupts are
//! never fatal.

use core::sync::atomic::{AtomicPtr, AtomicU32, Ordering};

use umbra_core::config::SPURIOUS_THRESHOLD;
use umbra_core::id::IrqNumber;
use umbra_core::sync::SpinLock;
use umbra_core::{HalError, Result, kdebug, kwarn};

use super::InterruptController;

/// Handler function signature: receives the line number.
pub type InterruptHandler = fn(IrqNumber);

/// How spurious interrupts are escalated.
#[derive(Debug, Clone, Copy)]
pub struct SpuriousPolicy {
    /// Spurious deliveries on one line tolerated quietly.
    pub threshold: u32,
    /// Called with the line and its count for every delivery past the
    /// threshold.
    pub on_escalate: fn(IrqNumber, u32),
}

impl SpuriousPolicy {
    /// Build-time threshold with a warning log.
    pub const DEFAULT: Self = Self {
        threshold: SPURIOUS_THRESHOLD,
        on_escalate: log_spurious_storm,
    };
}

impl Default for SpuriousPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

fn log_spurious_storm(irq: IrqNumber, count: u32) {
    kwarn!("{}: {} spurious interrupts, no handler registered", irq, count);
}

/// Handler table and spurious counters for `N` lines.
pub struct InterruptTable<const N: usize> {
    handlers: [AtomicPtr<()>; N],
    // Bumped on every registration; identifies who owns a slot.
    generations: [AtomicU32; N],
    spurious: [AtomicU32; N],
    registration: SpinLock<()>,
    policy: SpuriousPolicy,
}

impl<const N: usize> InterruptTable<N> {
    /// Creates an empty table with the default spurious policy.
    pub const fn new() -> Self {
        Self::with_policy(SpuriousPolicy::DEFAULT)
    }

    /// Creates an empty table with the given spurious policy.
    pub const fn with_policy(policy: SpuriousPolicy) -> Self {
        Self {
            handlers: [const { AtomicPtr::new(core::ptr::null_mut()) }; N],
            generations: [const { AtomicU32::new(0) }; N],
            spurious: [const { AtomicU32::new(0) }; N],
            registration: SpinLock::named("interrupt_table", ()),
            policy,
        }
    }

    fn slot(num: IrqNumber) -> Result<usize> {
        let idx = num.as_usize();
        if idx < N {
            Ok(idx)
        } else {
            Err(HalError::InvalidArgument)
        }
    }

    /// Installs `handler` for `num`.
    ///
    /// Unmasking the line is left to the caller. The line's spurious count
    /// restarts from zero.
    ///
    /// # Errors
    ///
    /// - [`HalError::InvalidArgument`] if `num` is out of range.
    /// - [`HalError::Busy`] if a handler is already installed.
    pub fn register(&self, num: IrqNumber, handler: InterruptHandler) -> Result<()> {
        self.install(num, handler).map(|_| ())
    }

    fn install(&self, num: IrqNumber, handler: InterruptHandler) -> Result<u32> {
        let idx = Self::slot(num)?;
        let _guard = self.registration.lock();

        self.handlers[idx]
            .compare_exchange(
                core::ptr::null_mut(),
                handler as *mut (),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|_| HalError::Busy)?;
        self.spurious[idx].store(0, Ordering::Relaxed);
        let generation = self.generations[idx].fetch_add(1, Ordering::Relaxed).wrapping_add(1);

        kdebug!("{}: handler registered", num);
        Ok(generation)
    }

    /// Removes the handler for `num`.
    ///
    /// # Errors
    ///
    /// - [`HalError::InvalidArgument`] if `num` is out of range.
    /// - [`HalError::NotFound`] if no handler is installed.
    pub fn unregister(&self, num: IrqNumber) -> Result<()> {
        let idx = Self::slot(num)?;
        let _guard = self.registration.lock();

        let old = self.handlers[idx].swap(core::ptr::null_mut(), Ordering::AcqRel);
        if old.is_null() {
            return Err(HalError::NotFound);
        }

        kdebug!("{}: handler unregistered", num);
        Ok(())
    }

    /// Removes the handler for `num` only if it is still the one installed
    /// as `generation`.
    fn release(&self, num: IrqNumber, generation: u32) -> Result<()> {
        let idx = Self::slot(num)?;
        let _guard = self.registration.lock();

        if self.generations[idx].load(Ordering::Relaxed) != generation
            || self.handlers[idx].load(Ordering::Acquire).is_null()
        {
            return Err(HalError::NotFound);
        }
        self.handlers[idx].store(core::ptr::null_mut(), Ordering::Release);

        kdebug!("{}: handler released", num);
        Ok(())
    }

    /// Installs `handler` for `num` and returns a registration that removes
    /// it again when dropped.
    ///
    /// # Errors
    ///
    /// Same as [`register`](Self::register).
    pub fn claim(&self, num: IrqNumber, handler: InterruptHandler) -> Result<InterruptRegistration<'_, N>> {
        let generation = self.install(num, handler)?;
        Ok(InterruptRegistration {
            table: self,
            num,
            generation,
        })
    }

    /// Returns the handler installed for `num`, if any.
    pub fn handler(&self, num: IrqNumber) -> Option<InterruptHandler> {
        let idx = Self::slot(num).ok()?;
        let ptr = self.handlers[idx].load(Ordering::Acquire);
        if ptr.is_null() {
            None
        } else {
            // SAFETY: Only `InterruptHandler` pointers are stored in the table.
            Some(unsafe { core::mem::transmute::<*mut (), InterruptHandler>(ptr) })
        }
    }

    /// Services one delivered line.
    ///
    /// Called from the trap path with interrupts disabled; the handler runs
    /// the same way unless it re-enables them itself.
    pub fn dispatch(&self, controller: &dyn InterruptController, num: IrqNumber) {
        let Ok(idx) = Self::slot(num) else {
            kwarn!("{}: delivered line outside the numbering space", num);
            return;
        };

        // Acknowledge first so pending lower-priority lines are not held
        // back behind a long handler.
        controller.ack(num);

        match self.handler(num) {
            Some(handler) => handler(num),
            None => {
                let count = self.spurious[idx].fetch_add(1, Ordering::Relaxed).saturating_add(1);
                if count > self.policy.threshold {
                    (self.policy.on_escalate)(num, count);
                } else {
                    kdebug!("{}: spurious interrupt ({})", num, count);
                }
            }
        }
    }

    /// Services every pending line reported by `controller`.
    ///
    /// Returns the number of lines dispatched.
    pub fn dispatch_pending(&self, controller: &dyn InterruptController) -> usize {
        let mut serviced = 0;
        while let Some(num) = controller.next() {
            self.dispatch(controller, num);
            serviced += 1;
        }
        serviced
    }

    /// Spurious deliveries counted on `num` since its last registration.
    pub fn spurious_count(&self, num: IrqNumber) -> u32 {
        Self::slot(num).map_or(0, |idx| self.spurious[idx].load(Ordering::Relaxed))
    }
}

impl<const N: usize> Default for InterruptTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Owning handle for an installed handler. Dropping it unregisters the
/// handler.
#[must_use = "dropping the registration unregisters the handler"]
pub struct InterruptRegistration<'t, const N: usize> {
    table: &'t InterruptTable<N>,
    num: IrqNumber,
    generation: u32,
}

impl<const N: usize> InterruptRegistration<'_, N> {
    /// The registered line.
    pub fn irq(&self) -> IrqNumber {
        self.num
    }

    /// Keeps the handler installed for good.
    pub fn leak(self) -> IrqNumber {
        let num = self.num;
        core::mem::forget(self);
        num
    }
}

impl<const N: usize> Drop for InterruptRegistration<'_, N> {
    fn drop(&mut self) {
        if self.table.release(self.num, self.generation).is_err() {
            kwarn!("{}: registration already replaced, handler left in place", self.num);
        }
    }
}
