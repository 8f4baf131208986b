//! Build-time configuration.
//!
//! Values are read from the environment of the build with `option_env!`
//! and resolved in const context, so a bad value fails compilation
//! instead of surfacing at boot.
//!
//! | Variable                      | Default    |
//! |-------------------------------|------------|
//! | `UMBRA_LOG_LEVEL`             | `debug`    |
//! | `UMBRA_SPURIOUS_THRESHOLD`    | `100`      |
//! | `UMBRA_FENCE_STALL_THRESHOLD` | `16777216` |

use crate::log::LogLevel;

/// Maximum HAL log level (compile-time). Messages with a higher verbosity
/// are dropped before reaching the registered sink.
pub const MAX_LOG_LEVEL: LogLevel = match option_env!("UMBRA_LOG_LEVEL") {
    Some(name) => match LogLevel::from_name(name) {
        Some(level) => level,
        None => panic!("UMBRA_LOG_LEVEL must be one of fatal, error, warn, info, debug, trace"),
    },
    None => LogLevel::Debug,
};

/// Number of spurious interrupts on one line before the dispatcher
/// escalates.
pub const SPURIOUS_THRESHOLD: u32 = match option_env!("UMBRA_SPURIOUS_THRESHOLD") {
    Some(s) => narrow_u32(parse_u64(s)),
    None => 100,
};

/// Number of spin iterations a core may wait in a fence before the stall
/// hook runs. Zero disables the check.
pub const FENCE_STALL_THRESHOLD: u64 = match option_env!("UMBRA_FENCE_STALL_THRESHOLD") {
    Some(s) => parse_u64(s),
    None => 1 << 24,
};

/// Parses an unsigned decimal number in const context.
///
/// # Panics
///
/// Panics (at compile time when used in a const) on an empty string, a
/// non-digit byte, or overflow.
pub const fn parse_u64(s: &str) -> u64 {
    let bytes = s.as_bytes();
    assert!(!bytes.is_empty(), "empty numeric configuration value");

    let mut value: u64 = 0;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        assert!(b.is_ascii_digit(), "non-digit in numeric configuration value");
        value = match value.checked_mul(10) {
            Some(v) => match v.checked_add((b - b'0') as u64) {
                Some(v) => v,
                None => panic!("numeric configuration value overflows"),
            },
            None => panic!("numeric configuration value overflows"),
        };
        i += 1;
    }
    value
}

/// Narrows a parsed value to `u32` in const context.
///
/// # Panics
///
/// Panics (at compile time when used in a const) if `value` does not fit.
#[allow(clippy::cast_possible_truncation)]
pub const fn narrow_u32(value: u64) -> u32 {
    assert!(value <= u32::MAX as u64, "numeric configuration value does not fit in 32 bits");
    value as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_decimal() {
        assert_eq!(parse_u64("0"), 0);
        assert_eq!(parse_u64("100"), 100);
        assert_eq!(parse_u64("16777216"), 1 << 24);
    }

    #[test]
    #[should_panic(expected = "non-digit")]
    fn parse_rejects_sign() {
        let _ = parse_u64("-1");
    }

    #[test]
    fn narrow_keeps_fitting_values() {
        assert_eq!(narrow_u32(100), 100);
        assert_eq!(narrow_u32(u64::from(u32::MAX)), u32::MAX);
    }

    #[test]
    #[should_panic(expected = "does not fit in 32 bits")]
    fn narrow_rejects_oversized_threshold() {
        let _ = narrow_u32(parse_u64("4294967296"));
    }

    #[test]
    #[should_panic(expected = "empty")]
    fn parse_rejects_empty() {
        let _ = parse_u64("");
    }
}
