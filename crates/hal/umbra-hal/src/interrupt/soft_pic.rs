//! Software interrupt controller.
//!
//! Keeps mask and pending state in atomics. Lines are raised with
//! [`raise`](InterruptController::raise), which is also how the dummy IPI
//! line of targets without hardware IPIs is driven. Lower line numbers have
//! higher priority. Lines start masked, like a freshly reset 8259.

use core::sync::atomic::{AtomicBool, Ordering};

use umbra_core::id::IrqNumber;
use umbra_core::{HalError, Result};

use super::InterruptController;

/// A software controller with `N` lines.
pub struct SoftPic<const N: usize> {
    masked: [AtomicBool; N],
    pending: [AtomicBool; N],
    enabled: AtomicBool,
}

impl<const N: usize> SoftPic<N> {
    /// Creates a controller with every line masked and delivery disabled.
    pub const fn new() -> Self {
        Self {
            masked: [const { AtomicBool::new(true) }; N],
            pending: [const { AtomicBool::new(false) }; N],
            enabled: AtomicBool::new(false),
        }
    }

    fn line(irq: IrqNumber) -> Result<usize> {
        let idx = irq.as_usize();
        if idx < N {
            Ok(idx)
        } else {
            Err(HalError::InvalidArgument)
        }
    }

    /// Returns whether `irq` is pending, masked or not.
    pub fn is_pending(&self, irq: IrqNumber) -> bool {
        Self::line(irq).is_ok_and(|idx| self.pending[idx].load(Ordering::Acquire))
    }

    /// Returns whether `irq` is masked. Out-of-range lines read as masked.
    pub fn is_masked(&self, irq: IrqNumber) -> bool {
        Self::line(irq).map_or(true, |idx| self.masked[idx].load(Ordering::Acquire))
    }

    /// Returns whether delivery is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}

impl<const N: usize> Default for SoftPic<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> InterruptController for SoftPic<N> {
    fn mask(&self, irq: IrqNumber) -> Result<()> {
        self.masked[Self::line(irq)?].store(true, Ordering::Release);
        Ok(())
    }

    fn unmask(&self, irq: IrqNumber) -> Result<()> {
        self.masked[Self::line(irq)?].store(false, Ordering::Release);
        Ok(())
    }

    fn raise(&self, irq: IrqNumber) -> Result<()> {
        self.pending[Self::line(irq)?].store(true, Ordering::Release);
        Ok(())
    }

    fn ack(&self, irq: IrqNumber) {
        if let Ok(idx) = Self::line(irq) {
            self.pending[idx].store(false, Ordering::Release);
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn next(&self) -> Option<IrqNumber> {
        (0..N)
            .find(|&idx| {
                self.pending[idx].load(Ordering::Acquire) && !self.masked[idx].load(Ordering::Acquire)
            })
            .map(|idx| IrqNumber::new(idx as u32))
    }

    fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masked_lines_are_not_reported() {
        let pic = SoftPic::<8>::new();
        pic.raise(IrqNumber::new(3)).unwrap();
        assert!(pic.is_pending(IrqNumber::new(3)));
        assert_eq!(pic.next(), None);
        pic.unmask(IrqNumber::new(3)).unwrap();
        assert_eq!(pic.next(), Some(IrqNumber::new(3)));
    }

    #[test]
    fn lowest_line_wins() {
        let pic = SoftPic::<8>::new();
        for line in [5, 2, 7] {
            pic.unmask(IrqNumber::new(line)).unwrap();
            pic.raise(IrqNumber::new(line)).unwrap();
        }
        assert_eq!(pic.next(), Some(IrqNumber::new(2)));
        pic.ack(IrqNumber::new(2));
        pic.ack(IrqNumber::new(2));
        assert_eq!(pic.next(), Some(IrqNumber::new(5)));
    }

    #[test]
    fn out_of_range_is_rejected() {
        let pic = SoftPic::<4>::new();
        assert_eq!(pic.mask(IrqNumber::new(4)), Err(HalError::InvalidArgument));
        assert_eq!(pic.unmask(IrqNumber::new(9)), Err(HalError::InvalidArgument));
        assert_eq!(pic.raise(IrqNumber::new(4)), Err(HalError::InvalidArgument));
        assert!(pic.is_masked(IrqNumber::new(4)));
        pic.ack(IrqNumber::new(4));
    }

    #[test]
    fn enable_disable() {
        let pic = SoftPic::<1>::new();
        assert!(!pic.is_enabled());
        pic.enable();
        assert!(pic.is_enabled());
        pic.disable();
        assert!(!pic.is_enabled());
    }
}
