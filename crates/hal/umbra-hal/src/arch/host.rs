//! Host target.
//!
//! Runs the HAL as an ordinary process: cores are threads, the interrupt
//! controller is a [`SoftPic`](crate::interrupt::SoftPic), and the context
//! holds the callee-saved registers of a 64-bit System V frame.

use umbra_core::id::IrqNumber;
use umbra_core::static_assert;

use super::{ArchFeatures, Architecture};
use crate::context::ExecutionContext;

/// The host target.
pub struct Host;

impl Architecture for Host {
    const NAME: &'static str = "host";
    const INTERRUPTS_NUM: usize = 33;
    const IPI_LINE: IrqNumber = IrqNumber::new(32);
    const CORES_NUM: usize = 16;
    const DWORD_SIZE: usize = 16;
    const FEATURES: ArchFeatures = ArchFeatures::SHARED_MEMORY;

    type Context = HostContext;

    fn dcache_invalidate() {
        core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
    }

    fn tlb_flush() {}
}

/// Saved registers of a host thread.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostContext {
    rbx: usize,
    rbp: usize,
    r12: usize,
    r13: usize,
    r14: usize,
    r15: usize,
    rflags: usize,
    rsp: usize,
    rip: usize,
}

static_assert!(core::mem::size_of::<HostContext>() == 9 * core::mem::size_of::<usize>());

impl ExecutionContext for HostContext {
    fn sp(&self) -> usize {
        self.rsp
    }

    fn pc(&self) -> usize {
        self.rip
    }

    fn set_sp(&mut self, sp: usize) {
        self.rsp = sp;
    }

    fn set_pc(&mut self, pc: usize) {
        self.rip = pc;
    }
}
