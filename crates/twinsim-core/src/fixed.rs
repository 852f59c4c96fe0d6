use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
pub type Fixed64 = I32F32;

/// Ticks are the atomic unit of simulation time.
pub type Ticks = u64;

/// Host wall-clock time in milliseconds, as reported by the tick driver.
pub type Millis = u64;

/// Convert an f64 to Fixed64. Use only for initialization, never in sim loop.
///
/// Out-of-range values saturate; NaN maps to zero.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    if v.is_nan() {
        return Fixed64::ZERO;
    }
    Fixed64::saturating_from_num(v)
}

/// Convert Fixed64 to f64. Use only for display, never in sim loop.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Raise `base` to a non-negative integer power by repeated multiplication.
///
/// Saturates instead of overflowing.
pub fn pow_fixed(base: Fixed64, exp: u32) -> Fixed64 {
    let mut acc = Fixed64::from_num(1);
    for _ in 0..exp {
        acc = acc.saturating_mul(base);
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed64_basic_arithmetic() {
        let a = f64_to_fixed64(1.5);
        let b = f64_to_fixed64(2.0);
        assert_eq!(fixed64_to_f64(a + b), 3.5);
    }

    #[test]
    fn conversion_saturates_out_of_range() {
        assert_eq!(f64_to_fixed64(1e30), Fixed64::MAX);
        assert_eq!(f64_to_fixed64(-1e30), Fixed64::MIN);
    }

    #[test]
    fn pow_zero_is_one() {
        assert_eq!(pow_fixed(f64_to_fixed64(0.3), 0), Fixed64::from_num(1));
    }

    #[test]
    fn pow_matches_float_within_precision() {
        let p = fixed64_to_f64(pow_fixed(f64_to_fixed64(0.3), 3));
        assert!((p - 0.027).abs() < 1e-8, "got {p}");
    }

    #[test]
    fn pow_saturates() {
        assert_eq!(pow_fixed(f64_to_fixed64(1000.0), 10), Fixed64::MAX);
    }
}
