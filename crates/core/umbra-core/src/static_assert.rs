//! Compile-time assertions for layout invariants.
//!
//! Architecture modules use [`static_assert!`] to pin the size of their
//! saved-register blocks, since trampolines written in assembly hard-code
//! the same offsets.

/// Fails the build if `$cond` is false.
///
/// ```ignore
/// umbra_core::static_assert!(core::mem::size_of::<Context>() == 72);
/// umbra_core::static_assert!(DWORD_SIZE.is_power_of_two(), "bad alignment");
/// ```
#[macro_export]
macro_rules! static_assert {
    ($cond:expr $(,)?) => {
        const _: () = assert!($cond);
    };
    ($cond:expr, $msg:expr $(,)?) => {
        const _: () = assert!($cond, $msg);
    };
}
