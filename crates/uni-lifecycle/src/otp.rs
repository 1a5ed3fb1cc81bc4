//! Delivery-code generation.
//!
//! The code is a fixed-width numeric string, uniformly random over
//! 1000..=9999. Scope is per-order: collisions across orders are not
//! checked, and re-generation overwrites (invalidates) the previous code.
//! The small value space with unbounded verify retries is a known
//! hardening gap; any lockout/backoff policy belongs to the caller.

use rand::Rng;

/// Fixed width of the delivery code in digits.
pub const CODE_WIDTH: usize = 4;

const CODE_MIN: u32 = 1_000;
const CODE_MAX: u32 = 9_999;

/// Generate a fresh delivery code.
pub fn generate_delivery_code() -> String {
    rand::thread_rng().gen_range(CODE_MIN..=CODE_MAX).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_fixed_width_numeric() {
        for _ in 0..1_000 {
            let code = generate_delivery_code();
            assert_eq!(code.len(), CODE_WIDTH, "got: {code}");
            assert!(code.chars().all(|c| c.is_ascii_digit()), "got: {code}");
            assert_ne!(code.as_bytes()[0], b'0', "no leading zero in 1000..=9999");
        }
    }

    #[test]
    fn codes_vary() {
        // Not a uniformity proof; just catches a constant generator.
        let first = generate_delivery_code();
        let differs = (0..64).any(|_| generate_delivery_code() != first);
        assert!(differs, "64 consecutive identical codes");
    }
}
