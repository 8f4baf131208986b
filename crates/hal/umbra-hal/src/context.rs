//! Execution contexts.
//!
//! A context is the register block saved by the trap entry path of the
//! active architecture. Portable code never builds one and only touches two
//! logical fields, the stack pointer and the program counter; everything
//! else is private to the architecture module that defines the layout.

use core::fmt;

/// Accessors for a saved register block.
pub trait ExecutionContext: fmt::Debug {
    /// Saved stack pointer.
    fn sp(&self) -> usize;

    /// Saved program counter.
    fn pc(&self) -> usize;

    /// Replaces the saved stack pointer.
    fn set_sp(&mut self, sp: usize);

    /// Replaces the saved program counter.
    fn set_pc(&mut self, pc: usize);
}

/// Returns the saved stack pointer of `ctx`.
#[inline]
pub fn context_get_sp<C: ExecutionContext>(ctx: &C) -> usize {
    ctx.sp()
}

/// Returns the saved program counter of `ctx`.
#[inline]
pub fn context_get_pc<C: ExecutionContext>(ctx: &C) -> usize {
    ctx.pc()
}

/// Sets the saved stack pointer of `ctx`.
#[inline]
pub fn context_set_sp<C: ExecutionContext>(ctx: &mut C, sp: usize) {
    ctx.set_sp(sp);
}

/// Sets the saved program counter of `ctx`.
#[inline]
pub fn context_set_pc<C: ExecutionContext>(ctx: &mut C, pc: usize) {
    ctx.set_pc(pc);
}

/// Logs the full register block at debug level.
pub fn context_dump<C: ExecutionContext>(ctx: &C) {
    umbra_core::kdebug!("context: {:#x?}", ctx);
}
