//! i486 target.
//!
//! Sixteen lines behind the cascaded 8259 pair. The PIC has no IPI
//! support, so line 16 is a software-only dummy IPI line.

use umbra_core::id::IrqNumber;
use umbra_core::static_assert;

use super::{ArchFeatures, Architecture};
use crate::context::ExecutionContext;

/// The i486 target.
pub struct X86;

impl Architecture for X86 {
    const NAME: &'static str = "i486";
    const INTERRUPTS_NUM: usize = 17;
    const IPI_LINE: IrqNumber = IrqNumber::new(16);
    const CORES_NUM: usize = 1;
    const DWORD_SIZE: usize = 8;
    const FEATURES: ArchFeatures = ArchFeatures::SHARED_MEMORY;

    type Context = X86Context;

    fn dcache_invalidate() {
        // Caches are coherent; only order the accesses.
        core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
    }

    fn tlb_flush() {
        super::board_tlb_flush();
    }
}

/// Register block pushed by the i486 trap stubs, lowest address first.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct X86Context {
    gs: u32,
    fs: u32,
    es: u32,
    ds: u32,
    edi: u32,
    esi: u32,
    ebp: u32,
    ebx: u32,
    edx: u32,
    ecx: u32,
    eax: u32,
    err: u32,
    eip: u32,
    cs: u32,
    eflags: u32,
    useresp: u32,
    ss: u32,
}

static_assert!(core::mem::size_of::<X86Context>() == 68);

// Registers are 32 bits wide; on the target `usize` is too.
#[allow(clippy::cast_possible_truncation)]
impl ExecutionContext for X86Context {
    fn sp(&self) -> usize {
        self.useresp as usize
    }

    fn pc(&self) -> usize {
        self.eip as usize
    }

    fn set_sp(&mut self, sp: usize) {
        self.useresp = sp as u32;
    }

    fn set_pc(&mut self, pc: usize) {
        self.eip = pc as u32;
    }
}
