//! Umbra hardware abstraction layer.
//!
//! The portable part of the HAL: interrupt dispatch over a pluggable
//! controller, execution contexts and upcall forging, the core lifecycle of
//! a cluster, and barriers across cores and across nodes. Target specifics
//! live in [`arch`]; the active target is chosen with an `arch-*` feature.
//!
//! The interrupt subsystem is a process-wide singleton: call [`init`] once
//! with the platform controller, then use the free functions below.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

pub mod arch;
pub mod barrier;
pub mod cluster;
pub mod context;
pub mod interrupt;
pub mod upcall;

pub use umbra_core::{HalError, Result};

use umbra_core::id::IrqNumber;
use umbra_core::sync::OnceLock;
use umbra_core::{kerr, kinfo};

use interrupt::{InterruptController, InterruptHandler, InterruptRegistration, InterruptTable};

static CONTROLLER: OnceLock<&'static dyn InterruptController> = OnceLock::new();
static INTERRUPTS: InterruptTable<{ arch::INTERRUPTS_NUM }> = InterruptTable::new();

/// Installs the platform interrupt controller.
///
/// # Errors
///
/// [`HalError::Busy`] if a controller is already installed.
pub fn init(controller: &'static dyn InterruptController) -> Result<()> {
    CONTROLLER.set(controller).map_err(|_| HalError::Busy)?;
    kinfo!(
        "hal: {} target, {} interrupt lines, {} cores",
        <arch::Active as arch::Architecture>::NAME,
        arch::INTERRUPTS_NUM,
        arch::CORES_NUM
    );
    Ok(())
}

fn controller() -> Result<&'static dyn InterruptController> {
    CONTROLLER.get().copied().ok_or(HalError::Unavailable)
}

/// The global interrupt table.
pub fn interrupt_table() -> &'static InterruptTable<{ arch::INTERRUPTS_NUM }> {
    &INTERRUPTS
}

/// Registers `handler` for line `num`.
///
/// # Errors
///
/// [`HalError::InvalidArgument`] if `num` is negative or out of range,
/// [`HalError::Busy`] if the line already has a handler.
pub fn interrupt_register(num: i32, handler: InterruptHandler) -> Result<()> {
    INTERRUPTS.register(IrqNumber::try_from(num)?, handler)
}

/// Removes the handler of line `num`.
///
/// # Errors
///
/// [`HalError::InvalidArgument`] if `num` is negative or out of range,
/// [`HalError::NotFound`] if the line has no handler.
pub fn interrupt_unregister(num: i32) -> Result<()> {
    INTERRUPTS.unregister(IrqNumber::try_from(num)?)
}

/// Registers `handler` for `num` until the returned guard is dropped.
///
/// # Errors
///
/// As for [`interrupt_register`].
pub fn interrupt_claim(
    num: IrqNumber,
    handler: InterruptHandler,
) -> Result<InterruptRegistration<'static, { arch::INTERRUPTS_NUM }>> {
    INTERRUPTS.claim(num, handler)
}

/// Masks line `num` at the controller.
///
/// # Errors
///
/// [`HalError::Unavailable`] before [`init`], [`HalError::InvalidArgument`]
/// for a bad line.
pub fn interrupt_mask(num: i32) -> Result<()> {
    let irq = IrqNumber::try_from(num)?;
    controller()?.mask(irq)
}

/// Unmasks line `num` at the controller.
///
/// # Errors
///
/// [`HalError::Unavailable`] before [`init`], [`HalError::InvalidArgument`]
/// for a bad line.
pub fn interrupt_unmask(num: i32) -> Result<()> {
    let irq = IrqNumber::try_from(num)?;
    controller()?.unmask(irq)
}

/// Enables interrupt delivery on the calling core.
///
/// # Errors
///
/// [`HalError::Unavailable`] before [`init`].
pub fn interrupts_enable() -> Result<()> {
    controller()?.enable();
    Ok(())
}

/// Disables interrupt delivery on the calling core.
///
/// # Errors
///
/// [`HalError::Unavailable`] before [`init`].
pub fn interrupts_disable() -> Result<()> {
    controller()?.disable();
    Ok(())
}

/// Trap-path entry: services line `num`.
pub fn do_interrupt(num: IrqNumber) {
    match controller() {
        Ok(c) => INTERRUPTS.dispatch(c, num),
        Err(_) => kerr!("hal: {} raised before init", num),
    }
}

/// Trap-path entry: services every pending line. Returns how many were
/// dispatched.
pub fn do_pending() -> usize {
    match controller() {
        Ok(c) => INTERRUPTS.dispatch_pending(c),
        Err(_) => {
            kerr!("hal: pending interrupts polled before init");
            0
        }
    }
}
