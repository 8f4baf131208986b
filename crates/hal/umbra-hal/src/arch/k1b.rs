//! Kalray K1B compute cluster.
//!
//! Sixteen processing engines plus the resource manager share the cluster
//! memory. Clusters talk over the NoC, whose sync connectors back the node
//! barrier.

use umbra_core::id::IrqNumber;
use umbra_core::static_assert;

use super::{ArchFeatures, Architecture};
use crate::context::ExecutionContext;

/// The K1B target.
pub struct K1b;

impl Architecture for K1b {
    const NAME: &'static str = "k1b";
    const INTERRUPTS_NUM: usize = 26;
    const IPI_LINE: IrqNumber = IrqNumber::new(24);
    const CORES_NUM: usize = 17;
    const DWORD_SIZE: usize = 8;
    const FEATURES: ArchFeatures = ArchFeatures::HW_IPI
        .union(ArchFeatures::SHARED_MEMORY)
        .union(ArchFeatures::NOC);

    type Context = K1bContext;

    fn dcache_invalidate() {
        super::board_dcache_invalidate();
    }

    fn tlb_flush() {
        super::board_tlb_flush();
    }
}

const SP_REG: usize = 12;

/// Register block saved by the K1B trap entry.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct K1bContext {
    gpr: [u32; 64],
    spc: u32,
    ps: u32,
    sps: u32,
    ra: u32,
    cs: u32,
    lc: u32,
    ls: u32,
    le: u32,
}

impl Default for K1bContext {
    fn default() -> Self {
        Self {
            gpr: [0; 64],
            spc: 0,
            ps: 0,
            sps: 0,
            ra: 0,
            cs: 0,
            lc: 0,
            ls: 0,
            le: 0,
        }
    }
}

static_assert!(core::mem::size_of::<K1bContext>() == 72 * 4);

#[allow(clippy::cast_possible_truncation)]
impl ExecutionContext for K1bContext {
    fn sp(&self) -> usize {
        self.gpr[SP_REG] as usize
    }

    fn pc(&self) -> usize {
        self.spc as usize
    }

    fn set_sp(&mut self, sp: usize) {
        self.gpr[SP_REG] = sp as u32;
    }

    fn set_pc(&mut self, pc: usize) {
        self.spc = pc as u32;
    }
}
