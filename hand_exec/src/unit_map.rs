//! # Unit mapping
//!
//! The hand's command and telemetry interface uses the canonical joint order
//!
//! | Index | Joint          |
//! |-------|----------------|
//! | 0     | knuckle        |
//! | 1     | thumb proximal |
//! | 2     | thumb distal   |
//! | 3     | finger 12      |
//! | 4     | finger 13      |
//! | 5     | finger 22      |
//! | 6     | finger 23      |
//!
//! in radians, while the hardware orders its axes as knuckle, finger 22, finger 23, thumb 
//! proximal, thumb distal, finger 12, finger 13, in degrees.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Serialize, Deserialize};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of independently actuated axes on the hand.
pub const NUM_AXES: usize = 7;

/// Canonical joint index for each hardware axis.
const JOINT_OF_AXIS: [usize; NUM_AXES] = [0, 5, 6, 1, 2, 3, 4];

/// Hardware axis index for each canonical joint.
const AXIS_OF_JOINT: [usize; NUM_AXES] = [0, 3, 4, 5, 6, 1, 2];

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Joint values in canonical order.
///
/// Units: radians or radians/second
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct JointVector(pub [f64; NUM_AXES]);

/// Axis values in hardware order.
///
/// Units: degrees or degrees/second
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisVector(pub [f64; NUM_AXES]);

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl JointVector {
    /// Build from a slice, returning `None` if it isn't exactly `NUM_AXES` long.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        if values.len() != NUM_AXES {
            return None;
        }

        let mut v = [0f64; NUM_AXES];
        v.copy_from_slice(values);
        Some(Self(v))
    }

    /// Convert into hardware order and units.
    pub fn to_hardware(&self) -> AxisVector {
        let mut axes = [0f64; NUM_AXES];

        for (axis, joint) in JOINT_OF_AXIS.iter().enumerate() {
            axes[axis] = self.0[*joint].to_degrees();
        }

        AxisVector(axes)
    }

    /// Element-wise `self - other`.
    pub fn sub(&self, other: &Self) -> Self {
        let mut diff = [0f64; NUM_AXES];
        for i in 0..NUM_AXES {
            diff[i] = self.0[i] - other.0[i];
        }
        Self(diff)
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.0.to_vec()
    }
}

impl AxisVector {
    /// Convert into canonical joint order and units.
    pub fn to_joint(&self) -> JointVector {
        let mut joints = [0f64; NUM_AXES];

        for (joint, axis) in AXIS_OF_JOINT.iter().enumerate() {
            joints[joint] = self.0[*axis].to_radians();
        }

        JointVector(joints)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
