//! OpTiMSoC tiles.
//!
//! OpenRISC compute tiles on a NoC. The tile PIC cannot interrupt another
//! core, so the last line is a dummy IPI line driven in software. Contexts
//! use the plain OpenRISC layout.

use umbra_core::id::IrqNumber;

use super::or1k::Or1kContext;
use super::{ArchFeatures, Architecture};

/// The OpTiMSoC target.
pub struct Optimsoc;

impl Architecture for Optimsoc {
    const NAME: &'static str = "optimsoc";
    const INTERRUPTS_NUM: usize = 33;
    const IPI_LINE: IrqNumber = IrqNumber::new(32);
    const CORES_NUM: usize = 4;
    const DWORD_SIZE: usize = 8;
    const FEATURES: ArchFeatures = ArchFeatures::SHARED_MEMORY.union(ArchFeatures::NOC);

    type Context = Or1kContext;

    fn dcache_invalidate() {
        super::board_dcache_invalidate();
    }

    fn tlb_flush() {
        super::board_tlb_flush();
    }
}
