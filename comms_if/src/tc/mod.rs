//! # Telecommand module
//!
//! This module provides telecommand functionality to the communications interface. Telecommands
//! are sent to `hand_exec` as JSON, tagged with their `type` and carrying an optional `payload`:
//!
//! ```json
//! {"type": "SetOperationMode", "payload": "velocity"}
//! {"type": "EmergencyStop"}
//! ```

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod hand_ctrl;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Serialize, Deserialize};
use thiserror::Error;

// Internal
pub use hand_ctrl::{TrajectoryGoal, TrajectoryPoint};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A telecommand, i.e. an instruction sent to the hand by an operator or a planning stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Tc {
    /// Connect to and initialise the hand.
    Init,

    /// Stop all motion, keeping the connection.
    Stop,

    /// Recover from an error by re-initialising.
    Recover,

    /// Switch the operation mode, payload is the mode name (`position`, `velocity`, `effort`).
    SetOperationMode(String),

    /// Emergency stop, disconnecting from the hand.
    EmergencyStop,

    /// Disable the hand and close the connection.
    Shutdown,

    /// Enable the axes and apply motor current.
    MotorOn,

    /// Disable the axes and remove motor current.
    MotorOff,

    /// Move to the single target point of the goal. Position mode only.
    FollowTrajectory(TrajectoryGoal),

    /// Drive the joints at the given velocities (rad/s, canonical joint order). Velocity mode
    /// only.
    SetVelocities(Vec<f64>),
}

/// Response sent back for each telecommand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TcResponse {
    /// The service completed successfully, with a human readable message.
    Ok(String),

    /// The service failed, with a human readable message.
    Failed(String),

    /// A trajectory goal was accepted and will be tracked under the given ID.
    GoalAccepted(u64),

    /// The command was rejected before anything was changed.
    Rejected(String),

    /// The telecommand could not be parsed.
    Invalid,
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum TcParseError {
    #[error("TC contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Tc {
    /// Parse a new TC from a JSON packet
    pub fn from_json(json_str: &str) -> Result<Self, TcParseError> {
        serde_json::from_str(json_str).map_err(TcParseError::InvalidJson)
    }

    /// Serialise the TC into a JSON packet
    pub fn to_json(&self) -> Result<String, TcParseError> {
        serde_json::to_string(self).map_err(TcParseError::InvalidJson)
    }

    /// Short name of the TC, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Tc::Init => "Init",
            Tc::Stop => "Stop",
            Tc::Recover => "Recover",
            Tc::SetOperationMode(_) => "SetOperationMode",
            Tc::EmergencyStop => "EmergencyStop",
            Tc::Shutdown => "Shutdown",
            Tc::MotorOn => "MotorOn",
            Tc::MotorOff => "MotorOff",
            Tc::FollowTrajectory(_) => "FollowTrajectory",
            Tc::SetVelocities(_) => "SetVelocities",
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
