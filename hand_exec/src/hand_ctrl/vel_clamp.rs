//! Velocity clamping against the hand's maximum axis velocities

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use util::maths::clamp_abs;

use crate::unit_map::AxisVector;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Clamp each value into `[-max, +max]` for the matching entry of `envelope`.
///
/// Values with no matching envelope entry are passed through unchanged.
pub fn clamp(values: &[f64], envelope: &[f64]) -> Vec<f64> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| match envelope.get(i) {
            Some(max) => clamp_abs(*v, *max),
            None => *v,
        })
        .collect()
}

/// Clamp axis velocities, or pass them through if the envelope isn't known yet.
pub fn clamp_axes(velocities: &AxisVector, envelope: Option<&AxisVector>) -> AxisVector {
    match envelope {
        Some(env) => {
            let mut clamped = *velocities;
            clamped.0.copy_from_slice(&clamp(&velocities.0, &env.0));
            clamped
        }
        None => *velocities,
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(&[100.0, -100.0, 0.0], &[50.0, 50.0, 50.0]), vec![50.0, -50.0, 0.0]);

        // Short envelope
        assert_eq!(clamp(&[100.0, -100.0], &[10.0]), vec![10.0, -100.0]);
    }

    #[test]
    fn test_clamp_axes() {
        let envelope = AxisVector([81.0, 140.0, 120.0, 140.0, 120.0, 140.0, 120.0]);
        let v = AxisVector([100.0, -200.0, 50.0, 0.0, -120.0, 141.0, 119.0]);

        assert_eq!(
            clamp_axes(&v, Some(&envelope)),
            AxisVector([81.0, -140.0, 50.0, 0.0, -120.0, 140.0, 119.0])
        );
        assert_eq!(clamp_axes(&v, None), v);

        let v = AxisVector([100.0, -100.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(
            clamp_axes(&v, Some(&AxisVector([50.0; 7]))),
            AxisVector([50.0, -50.0, 0.0, 0.0, 0.0, 0.0, 0.0])
        );
    }
}
