//! # Hand control telecommands

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Serialize, Deserialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A trajectory goal for the hand.
///
/// Only the first point is executed, interpolation is left to the planner that produced the goal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryGoal {
    /// Names of the joints the point values refer to, in any order.
    pub joint_names: Vec<String>,

    /// The points of the trajectory.
    pub points: Vec<TrajectoryPoint>,
}

/// A single point in a trajectory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    /// Joint positions in the order of the goal's `joint_names`.
    ///
    /// Units: radians
    pub positions: Vec<f64>,

    /// Joint velocities in the order of the goal's `joint_names`. Unused by the hand.
    ///
    /// Units: radians/second
    #[serde(default)]
    pub velocities: Vec<f64>,

    /// Time after the start of the trajectory this point should be reached by.
    ///
    /// Units: seconds
    #[serde(default)]
    pub time_from_start_s: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TrajectoryGoal {
    /// Build a single-point goal from names and positions.
    pub fn single_point(joint_names: Vec<String>, positions: Vec<f64>) -> Self {
        Self {
            joint_names,
            points: vec![TrajectoryPoint {
                positions,
                ..Default::default()
            }],
        }
    }
}
