//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Clamp a value into the range `[min, max]`.
///
/// NaN values are passed through unchanged.
pub fn clamp<T>(value: T, min: T, max: T) -> T 
where
    T: Float
{
    let mut ret = value;

    if ret > max {
        ret = max
    }
    if ret < min {
        ret = min
    }

    ret
}

/// Clamp a value into the symmetric range `[-limit, +limit]`.
///
/// The sign of `limit` is ignored.
pub fn clamp_abs<T>(value: T, limit: T) -> T
where
    T: Float
{
    let limit = limit.abs();
    clamp(value, -limit, limit)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(5f64, 0f64, 10f64), 5f64);
        assert_eq!(clamp(-5f64, 0f64, 10f64), 0f64);
        assert_eq!(clamp(15f64, 0f64, 10f64), 10f64);
        assert!(clamp(f64::NAN, 0f64, 10f64).is_nan());
    }

    #[test]
    fn test_clamp_abs() {
        assert_eq!(clamp_abs(100f64, 50f64), 50f64);
        assert_eq!(clamp_abs(-100f64, 50f64), -50f64);
        assert_eq!(clamp_abs(-100f64, -50f64), -50f64);
        assert_eq!(clamp_abs(0f64, 50f64), 0f64);
    }
}
