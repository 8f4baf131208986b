//! Upcall forging.
//!
//! An upcall redirects a suspended context into a function running on top
//! of the same stack. [`upcall_forge`] carves a frame below the context's
//! stack pointer and points the context at the trampoline; when the
//! context resumes, the trampoline calls the function with a pointer to
//! its copy of the argument and then [`upcall_ret`] restores the context
//! exactly as it was before forging.
//!
//! Frame layout, from the new stack pointer upward:
//!
//! ```text
//! +---------------------+ <- original sp
//! | (alignment slack)   |
//! | saved context       |
//! | argument payload    |  argsize rounded up to DWORD_SIZE
//! | function pointer    |  one word
//! | argsize             |  one word
//! +---------------------+ <- forged sp, DWORD_SIZE aligned
//! ```
//!
//! Bare-metal targets link the trampoline as the assembly symbol
//! `_upcall_trampoline`, which does what [`upcall_trampoline`] does here.

use core::mem::size_of;
use core::ptr;

use umbra_core::{HalError, Result};

use crate::arch;
use crate::context::ExecutionContext;

/// Signature of an upcall target. Receives a pointer to the frame's copy
/// of the argument.
pub type UpcallFn = extern "C" fn(arg: *mut u8);

const WORD: usize = size_of::<usize>();

/// Addresses of the pieces of an upcall frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpcallLayout {
    /// Forged stack pointer; the `argsize` word lives here.
    pub sp: usize,
    /// Address of the function-pointer word.
    pub fn_at: usize,
    /// Address of the argument payload.
    pub payload_at: usize,
    /// Payload size rounded up to the double-word size.
    pub payload_len: usize,
    /// Address of the saved context.
    pub context_at: usize,
}

impl UpcallLayout {
    /// Computes the frame for an argument of `argsize` bytes below `sp`.
    ///
    /// # Errors
    ///
    /// [`HalError::InvalidArgument`] if `dword` is not a power of two or
    /// the frame does not fit below `sp`.
    pub fn compute(sp: usize, argsize: usize, context_size: usize, dword: usize) -> Result<Self> {
        if !dword.is_power_of_two() {
            return Err(HalError::InvalidArgument);
        }
        let payload_len = argsize
            .checked_next_multiple_of(dword)
            .ok_or(HalError::InvalidArgument)?;
        let frame_len = (2 * WORD)
            .checked_add(payload_len)
            .and_then(|n| n.checked_add(context_size))
            .ok_or(HalError::InvalidArgument)?;
        let new_sp = sp.checked_sub(frame_len).ok_or(HalError::InvalidArgument)? & !(dword - 1);

        let payload_at = new_sp + 2 * WORD;
        Ok(Self {
            sp: new_sp,
            fn_at: new_sp + WORD,
            payload_at,
            payload_len,
            context_at: payload_at + payload_len,
        })
    }

    /// Recomputes the layout of a frame already built at `sp`, from the
    /// `argsize` stored there.
    fn at(sp: usize, argsize: usize, dword: usize) -> Self {
        let payload_len = argsize.next_multiple_of(dword);
        let payload_at = sp + 2 * WORD;
        Self {
            sp,
            fn_at: sp + WORD,
            payload_at,
            payload_len,
            context_at: payload_at + payload_len,
        }
    }
}

#[inline]
fn addr(at: usize) -> *mut u8 {
    ptr::with_exposed_provenance_mut(at)
}

/// Address the forged program counter points to.
pub fn trampoline_address() -> usize {
    #[cfg(target_os = "none")]
    {
        unsafe extern "C" {
            fn _upcall_trampoline();
        }
        _upcall_trampoline as usize
    }
    #[cfg(not(target_os = "none"))]
    {
        upcall_trampoline::<arch::Context> as usize
    }
}

/// Redirects `ctx` into `f(arg)`.
///
/// `arg` is copied into the frame; the caller's buffer is not retained.
///
/// # Errors
///
/// [`HalError::InvalidArgument`] if the frame cannot be placed below the
/// context's stack pointer. `ctx` is left untouched in that case.
///
/// # Safety
///
/// The memory below `ctx.sp()` must be writable stack belonging to the
/// suspended flow, with room for the whole frame, and not in use by
/// anything else.
pub unsafe fn upcall_forge<C: ExecutionContext + Copy>(ctx: &mut C, f: UpcallFn, arg: &[u8]) -> Result<()> {
    let layout = UpcallLayout::compute(ctx.sp(), arg.len(), size_of::<C>(), arch::DWORD_SIZE)?;

    // SAFETY: The caller guarantees the frame range is writable and unused;
    // the regions do not overlap `arg`, which lives outside that stack.
    unsafe {
        ptr::write_unaligned(addr(layout.context_at).cast::<C>(), *ctx);
        ptr::copy_nonoverlapping(arg.as_ptr(), addr(layout.payload_at), arg.len());
        ptr::write_bytes(
            addr(layout.payload_at + arg.len()),
            0,
            layout.payload_len - arg.len(),
        );
        ptr::write_unaligned(addr(layout.fn_at).cast::<usize>(), f as usize);
        ptr::write_unaligned(addr(layout.sp).cast::<usize>(), arg.len());
    }

    ctx.set_pc(trampoline_address());
    ctx.set_sp(layout.sp);
    Ok(())
}

/// Discards the upcall frame at `ctx.sp()` and restores the context saved
/// by [`upcall_forge`].
///
/// # Safety
///
/// `ctx.sp()` must point at a frame built by [`upcall_forge`] for a
/// context of type `C`.
pub unsafe fn upcall_ret<C: ExecutionContext + Copy>(ctx: &mut C) {
    let sp = ctx.sp();
    // SAFETY: Frame built by `upcall_forge` per the caller's contract.
    unsafe {
        let argsize = ptr::read_unaligned(addr(sp).cast::<usize>());
        let layout = UpcallLayout::at(sp, argsize, arch::DWORD_SIZE);
        *ctx = ptr::read_unaligned(addr(layout.context_at).cast::<C>());
    }
}

/// Runs the trampoline: calls the forged function with its argument, then
/// returns through [`upcall_ret`].
///
/// # Safety
///
/// Same as [`upcall_ret`].
pub unsafe fn upcall_trampoline<C: ExecutionContext + Copy>(ctx: &mut C) {
    let sp = ctx.sp();
    // SAFETY: Frame built by `upcall_forge` per the caller's contract; the
    // function word was written from a valid `UpcallFn`.
    unsafe {
        let argsize = ptr::read_unaligned(addr(sp).cast::<usize>());
        let raw = ptr::read_unaligned(addr(sp + WORD).cast::<usize>());
        let f = core::mem::transmute::<usize, UpcallFn>(raw);
        let layout = UpcallLayout::at(sp, argsize, arch::DWORD_SIZE);
        f(addr(layout.payload_at));
        upcall_ret(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::host::HostContext;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn layout_orders_frame_pieces() {
        let l = UpcallLayout::compute(0x1000, 8, 72, 16).unwrap();
        assert_eq!(l.sp % 16, 0);
        assert_eq!(l.fn_at, l.sp + WORD);
        assert_eq!(l.payload_at, l.sp + 2 * WORD);
        assert_eq!(l.payload_len, 16);
        assert_eq!(l.context_at, l.payload_at + 16);
        assert!(l.context_at + 72 <= 0x1000);
    }

    #[test]
    fn layout_rejects_bad_input() {
        assert_eq!(UpcallLayout::compute(0x1000, 8, 72, 12), Err(HalError::InvalidArgument));
        assert_eq!(UpcallLayout::compute(32, 8, 72, 16), Err(HalError::InvalidArgument));
        assert_eq!(
            UpcallLayout::compute(0x1000, usize::MAX, 72, 16),
            Err(HalError::InvalidArgument)
        );
    }

    #[test]
    fn empty_argument_still_reserves_words() {
        let l = UpcallLayout::compute(0x1000, 0, 72, 16).unwrap();
        assert_eq!(l.payload_len, 0);
        assert!(0x1000 - l.sp >= 72 + 2 * WORD);
    }

    static SEEN: AtomicU64 = AtomicU64::new(0);

    extern "C" fn record(arg: *mut u8) {
        // SAFETY: The trampoline passes the frame's 8-byte payload.
        let value = unsafe { ptr::read_unaligned(arg.cast::<u64>()) };
        SEEN.store(value, Ordering::SeqCst);
    }

    #[test]
    fn forge_then_trampoline_round_trip() {
        let mut stack = vec![0u8; 4096];
        let top = (stack.as_mut_ptr().expose_provenance() + stack.len()) & !15;

        let mut ctx = HostContext::default();
        ctx.set_sp(top);
        ctx.set_pc(0x4000_1000);
        let original = ctx;

        let payload = 0x0123_4567_89ab_cdef_u64.to_ne_bytes();
        // SAFETY: `stack` is a private buffer large enough for the frame.
        unsafe { upcall_forge(&mut ctx, record, &payload) }.unwrap();

        assert_eq!(ctx.pc(), trampoline_address());
        assert!(ctx.sp() < top);
        assert!(top - ctx.sp() >= size_of::<HostContext>() + 16);
        assert_eq!(ctx.sp() % arch::DWORD_SIZE, 0);

        // SAFETY: `ctx` was just forged onto `stack`.
        unsafe { upcall_trampoline(&mut ctx) };

        assert_eq!(SEEN.load(Ordering::SeqCst), 0x0123_4567_89ab_cdef);
        assert_eq!(ctx.sp(), top);
        assert_eq!(ctx.pc(), 0x4000_1000);
        assert_eq!(ctx, original);
        drop(stack);
    }

    #[test]
    fn forge_failure_leaves_context() {
        let mut ctx = HostContext::default();
        ctx.set_sp(8);
        ctx.set_pc(0x10);
        let before = ctx;
        // SAFETY: Fails before touching memory.
        let res = unsafe { upcall_forge(&mut ctx, record, &[1, 2, 3]) };
        assert_eq!(res, Err(HalError::InvalidArgument));
        assert_eq!(ctx, before);
    }

    #[test]
    fn nested_upcalls_unwind_in_order() {
        let mut stack = vec![0u8; 8192];
        let top = (stack.as_mut_ptr().expose_provenance() + stack.len()) & !15;
        let mut ctx = HostContext::default();
        ctx.set_sp(top);
        ctx.set_pc(0x1111);

        // SAFETY: Private buffer with room for two frames.
        unsafe {
            upcall_forge(&mut ctx, record, &1u64.to_ne_bytes()).unwrap();
            let first = ctx;
            upcall_forge(&mut ctx, record, &2u64.to_ne_bytes()).unwrap();
            upcall_ret(&mut ctx);
            assert_eq!(ctx, first);
            upcall_ret(&mut ctx);
        }
        assert_eq!(ctx.sp(), top);
        assert_eq!(ctx.pc(), 0x1111);
        drop(stack);
    }
}
