//! Target descriptions and the active-architecture facade.
//!
//! Every supported target implements [`Architecture`]: its interrupt
//! numbering, core count, alignment, feature set and saved-register layout.
//! All targets are compiled on every build (they are plain data), and the
//! `arch-*` Cargo feature picks which one is [`Active`]. With no feature the
//! host target is active, which is what the test suite runs against.

pub mod host;
pub mod k1b;
pub mod optimsoc;
pub mod or1k;
pub mod riscv32;
pub mod x86;

use umbra_core::id::IrqNumber;
use umbra_core::static_assert;

use crate::context::ExecutionContext;

#[cfg(any(
    all(
        feature = "arch-x86",
        any(
            feature = "arch-k1b",
            feature = "arch-or1k",
            feature = "arch-optimsoc",
            feature = "arch-riscv32"
        )
    ),
    all(
        feature = "arch-k1b",
        any(feature = "arch-or1k", feature = "arch-optimsoc", feature = "arch-riscv32")
    ),
    all(feature = "arch-or1k", any(feature = "arch-optimsoc", feature = "arch-riscv32")),
    all(feature = "arch-optimsoc", feature = "arch-riscv32"),
))]
compile_error!("at most one `arch-*` feature of umbra-hal may be enabled");

bitflags::bitflags! {
    /// Hardware capabilities that change how the HAL synchronizes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ArchFeatures: u32 {
        /// The interrupt controller can raise inter-processor interrupts.
        /// Without it the IPI line is a software-only dummy line.
        const HW_IPI        = 1 << 0;
        /// Cores of a cluster share coherent memory.
        const SHARED_MEMORY = 1 << 1;
        /// Clusters are connected by a network-on-chip with sync devices.
        const NOC           = 1 << 2;
    }
}

/// Static description of a hardware target.
pub trait Architecture {
    /// Short target name used in logs.
    const NAME: &'static str;
    /// Size of the interrupt numbering space, including the IPI line.
    const INTERRUPTS_NUM: usize;
    /// Line used for inter-processor interrupts.
    const IPI_LINE: IrqNumber;
    /// Cores per cluster.
    const CORES_NUM: usize;
    /// Double-word size; stack frames are aligned to it.
    const DWORD_SIZE: usize;
    /// Capabilities of the target.
    const FEATURES: ArchFeatures;

    /// Register block saved by the trap entry path.
    type Context: ExecutionContext + Copy;

    /// Invalidates the local data cache.
    fn dcache_invalidate();

    /// Flushes the local TLB.
    fn tlb_flush();
}

/// Checks the numbering and alignment invariants of a target.
const fn well_formed<A: Architecture>() -> bool {
    A::IPI_LINE.as_usize() < A::INTERRUPTS_NUM
        && A::DWORD_SIZE.is_power_of_two()
        && A::DWORD_SIZE >= core::mem::size_of::<u32>()
        && A::CORES_NUM > 0
}

static_assert!(well_formed::<host::Host>());
static_assert!(well_formed::<x86::X86>());
static_assert!(well_formed::<k1b::K1b>());
static_assert!(well_formed::<or1k::Or1k>());
static_assert!(well_formed::<optimsoc::Optimsoc>());
static_assert!(well_formed::<riscv32::Riscv32>());

/// The target selected for this build.
#[cfg(feature = "arch-x86")]
pub type Active = x86::X86;
/// The target selected for this build.
#[cfg(feature = "arch-k1b")]
pub type Active = k1b::K1b;
/// The target selected for this build.
#[cfg(feature = "arch-or1k")]
pub type Active = or1k::Or1k;
/// The target selected for this build.
#[cfg(feature = "arch-optimsoc")]
pub type Active = optimsoc::Optimsoc;
/// The target selected for this build.
#[cfg(feature = "arch-riscv32")]
pub type Active = riscv32::Riscv32;
/// The target selected for this build.
#[cfg(not(any(
    feature = "arch-x86",
    feature = "arch-k1b",
    feature = "arch-or1k",
    feature = "arch-optimsoc",
    feature = "arch-riscv32"
)))]
pub type Active = host::Host;

/// Saved-register block of the active target.
pub type Context = <Active as Architecture>::Context;

/// Interrupt lines of the active target.
pub const INTERRUPTS_NUM: usize = Active::INTERRUPTS_NUM;
/// IPI line of the active target.
pub const IPI_LINE: IrqNumber = Active::IPI_LINE;
/// Cores per cluster on the active target.
pub const CORES_NUM: usize = Active::CORES_NUM;
/// Double-word size of the active target.
pub const DWORD_SIZE: usize = Active::DWORD_SIZE;
/// Capabilities of the active target.
pub const FEATURES: ArchFeatures = Active::FEATURES;

/// Invalidates the data cache of the calling core.
#[inline]
pub fn dcache_invalidate() {
    Active::dcache_invalidate();
}

/// Flushes the TLB of the calling core.
#[inline]
pub fn tlb_flush() {
    Active::tlb_flush();
}

// Cache and TLB maintenance opcodes live in the board support package.
#[cfg(target_os = "none")]
unsafe extern "C" {
    fn __umbra_dcache_invalidate();
    fn __umbra_tlb_flush();
}

/// Data-cache invalidation for targets without hardware coherence.
#[inline]
pub(crate) fn board_dcache_invalidate() {
    #[cfg(target_os = "none")]
    // SAFETY: Provided by the board support package; no arguments, no state.
    unsafe {
        __umbra_dcache_invalidate();
    }
    #[cfg(not(target_os = "none"))]
    core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
}

/// TLB flush for targets with a software-visible TLB.
#[inline]
pub(crate) fn board_tlb_flush() {
    #[cfg(target_os = "none")]
    // SAFETY: Provided by the board support package; no arguments, no state.
    unsafe {
        __umbra_tlb_flush();
    }
    #[cfg(not(target_os = "none"))]
    core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_without_hw_ipi_append_dummy_line() {
        fn check<A: Architecture>() {
            if !A::FEATURES.contains(ArchFeatures::HW_IPI) {
                assert_eq!(A::IPI_LINE.as_usize(), A::INTERRUPTS_NUM - 1, "{}", A::NAME);
            }
        }
        check::<host::Host>();
        check::<x86::X86>();
        check::<k1b::K1b>();
        check::<or1k::Or1k>();
        check::<optimsoc::Optimsoc>();
        check::<riscv32::Riscv32>();
    }

    #[test]
    fn noc_targets() {
        assert!(k1b::K1b::FEATURES.contains(ArchFeatures::NOC));
        assert!(optimsoc::Optimsoc::FEATURES.contains(ArchFeatures::NOC));
        assert!(!x86::X86::FEATURES.contains(ArchFeatures::NOC));
    }

    #[test]
    fn active_constants_match_active_target() {
        assert_eq!(INTERRUPTS_NUM, Active::INTERRUPTS_NUM);
        assert_eq!(CORES_NUM, Active::CORES_NUM);
        dcache_invalidate();
        tlb_flush();
    }
}
