//! Interrupt controller contract.

use umbra_core::Result;
use umbra_core::id::IrqNumber;

/// Operations every interrupt controller backend provides.
///
/// Line numbers span `0..INTERRUPTS_NUM` of the target, including the IPI
/// line even where it is emulated in software.
pub trait InterruptController: Sync {
    /// Masks `irq` at the controller.
    ///
    /// # Errors
    ///
    /// [`HalError::InvalidArgument`](umbra_core::HalError::InvalidArgument)
    /// if `irq` is not a line of this controller.
    fn mask(&self, irq: IrqNumber) -> Result<()>;

    /// Unmasks `irq` at the controller.
    ///
    /// # Errors
    ///
    /// [`HalError::InvalidArgument`](umbra_core::HalError::InvalidArgument)
    /// if `irq` is not a line of this controller.
    fn unmask(&self, irq: IrqNumber) -> Result<()>;

    /// Marks `irq` pending from software. On the IPI line this is how one
    /// core interrupts another, including on the dummy line of targets
    /// without hardware IPIs.
    ///
    /// # Errors
    ///
    /// [`HalError::InvalidArgument`](umbra_core::HalError::InvalidArgument)
    /// if `irq` is not a line of this controller.
    fn raise(&self, irq: IrqNumber) -> Result<()>;

    /// Clears the pending state of `irq` (end of interrupt). Idempotent.
    fn ack(&self, irq: IrqNumber);

    /// Returns the highest-priority pending unmasked line, if any.
    fn next(&self) -> Option<IrqNumber>;

    /// Enables interrupt delivery on the calling core.
    fn enable(&self);

    /// Disables interrupt delivery on the calling core.
    fn disable(&self);
}
