//! OpenRISC 1000.
//!
//! The PIC exposes 32 lines; inter-processor interrupts arrive through the
//! OMPIC on line 1.

use umbra_core::id::IrqNumber;
use umbra_core::static_assert;

use super::{ArchFeatures, Architecture};
use crate::context::ExecutionContext;

/// The OpenRISC target.
pub struct Or1k;

impl Architecture for Or1k {
    const NAME: &'static str = "or1k";
    const INTERRUPTS_NUM: usize = 32;
    const IPI_LINE: IrqNumber = IrqNumber::new(1);
    const CORES_NUM: usize = 2;
    const DWORD_SIZE: usize = 8;
    const FEATURES: ArchFeatures = ArchFeatures::HW_IPI.union(ArchFeatures::SHARED_MEMORY);

    type Context = Or1kContext;

    fn dcache_invalidate() {
        super::board_dcache_invalidate();
    }

    fn tlb_flush() {
        super::board_tlb_flush();
    }
}

const SP_REG: usize = 1;

/// Register block saved by the OpenRISC exception entry.
///
/// `r0` is hard-wired to zero but keeps its slot so register numbers index
/// the array directly.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Or1kContext {
    gpr: [u32; 32],
    epcr: u32,
    eear: u32,
    esr: u32,
}

static_assert!(core::mem::size_of::<Or1kContext>() == 35 * 4);

#[allow(clippy::cast_possible_truncation)]
impl ExecutionContext for Or1kContext {
    fn sp(&self) -> usize {
        self.gpr[SP_REG] as usize
    }

    fn pc(&self) -> usize {
        self.epcr as usize
    }

    fn set_sp(&mut self, sp: usize) {
        self.gpr[SP_REG] = sp as u32;
    }

    fn set_pc(&mut self, pc: usize) {
        self.epcr = pc as u32;
    }
}
