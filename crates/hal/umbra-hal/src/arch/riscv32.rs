//! RISC-V 32-bit, machine mode.
//!
//! Interrupt numbers are `mcause` codes; the machine software interrupt
//! (code 3) carries IPIs.

use umbra_core::id::IrqNumber;
use umbra_core::static_assert;

use super::{ArchFeatures, Architecture};
use crate::context::ExecutionContext;

/// The RV32 target.
pub struct Riscv32;

impl Architecture for Riscv32 {
    const NAME: &'static str = "riscv32";
    const INTERRUPTS_NUM: usize = 16;
    const IPI_LINE: IrqNumber = IrqNumber::new(3);
    const CORES_NUM: usize = 5;
    const DWORD_SIZE: usize = 8;
    const FEATURES: ArchFeatures = ArchFeatures::HW_IPI.union(ArchFeatures::SHARED_MEMORY);

    type Context = Riscv32Context;

    fn dcache_invalidate() {
        super::board_dcache_invalidate();
    }

    fn tlb_flush() {
        super::board_tlb_flush();
    }
}

/// Index of `x2` (sp) in `x`, which starts at `x1`.
const SP_REG: usize = 1;

/// Register block saved by the trap vector.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Riscv32Context {
    x: [u32; 31],
    mepc: u32,
    mstatus: u32,
    mcause: u32,
    mtval: u32,
}

static_assert!(core::mem::size_of::<Riscv32Context>() == 35 * 4);

#[allow(clippy::cast_possible_truncation)]
impl ExecutionContext for Riscv32Context {
    fn sp(&self) -> usize {
        self.x[SP_REG] as usize
    }

    fn pc(&self) -> usize {
        self.mepc as usize
    }

    fn set_sp(&mut self, sp: usize) {
        self.x[SP_REG] = sp as u32;
    }

    fn set_pc(&mut self, pc: usize) {
        self.mepc = pc as u32;
    }
}
