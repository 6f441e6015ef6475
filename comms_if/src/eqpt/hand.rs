//! # Hand Equipment Telemetry
//!
//! Structures published by `hand_exec` once per control cycle.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Measured state of the joints, in canonical joint order followed by the mimic joint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JointState {
    pub names: Vec<String>,

    /// Units: radians
    pub position: Vec<f64>,

    /// Units: radians/second
    pub velocity: Vec<f64>,

    /// Not measured by the hand, always empty.
    pub effort: Vec<f64>,
}

/// Position and velocity of every joint at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JointPointState {
    /// Units: radians
    pub positions: Vec<f64>,

    /// Units: radians/second
    pub velocities: Vec<f64>,
}

/// Desired, actual and error state of the joint controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerState {
    pub joint_names: Vec<String>,
    pub desired: JointPointState,
    pub actual: JointPointState,

    /// `desired - actual`, per joint and per field
    pub error: JointPointState,
}

/// Named temperature readings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemperatureArray {
    pub names: Vec<String>,

    /// Units: degrees Celsius
    pub temperatures: Vec<f64>,
}

/// Overall status of the hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagLevel,
    pub message: String,
}

/// Final result of a trajectory goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalResult {
    /// ID given in the `GoalAccepted` response
    pub id: u64,
    pub outcome: GoalOutcome,
}

/// Telemetry packet published by the hand executable every cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandTm {
    /// Time the packet was built
    pub timestamp: DateTime<Utc>,

    /// Seconds since the start of the executable's session
    pub elapsed_s: f64,

    /// Name of the current operation mode
    pub operation_mode: String,

    /// Joint feedback, `None` while the hand is not connected
    pub joint_state: Option<JointState>,

    /// Controller feedback, `None` while the hand is not connected
    pub controller_state: Option<ControllerState>,

    /// Temperatures, `None` when not connected or the sensor count was inconsistent
    pub temperature: Option<TemperatureArray>,

    pub diagnostic: Diagnostic,

    /// Goals which resolved since the last packet
    pub goal_results: Vec<GoalResult>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Status levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagLevel {
    Ok,
    Warn,
    Error,
}

/// Outcome of a trajectory goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalOutcome {
    /// All axes reached idle
    Succeeded,

    /// A newer goal arrived, or the hand was stopped or disconnected, before completion
    Aborted,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Diagnostic {
    pub fn new<S: Into<String>>(level: DiagLevel, message: S) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

impl HandTm {
    /// Parse a packet received from the telemetry socket.
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }
}
