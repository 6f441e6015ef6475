//! # Hardware port
//!
//! Abstract access to the hand's device driver. Every operation addresses all axes at once, in
//! hardware axis order and units (see [`crate::unit_map`]). Any communication or device fault is
//! returned as a [`HwError`].

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod sim;
mod transport;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Serialize, Deserialize};

// Internal
pub use sim::*;
pub use transport::*;
use crate::unit_map::{AxisVector, NUM_AXES};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Operations the hand controller needs from the device driver.
///
/// Calls are synchronous and block the calling thread until the device answers or the driver's
/// own timeout expires.
pub trait HardwarePort: Send {
    /// Open a connection to the hand over the given transport.
    fn connect(&mut self, transport: &Transport) -> Result<(), HwError>;

    /// Close the connection.
    fn close(&mut self) -> Result<(), HwError>;

    /// Enable or disable all axes.
    fn set_axis_enable(&mut self, enable: bool) -> Result<(), HwError>;

    /// Set the motor current of all axes.
    ///
    /// Units: amperes
    fn set_axis_motor_current(&mut self, current_a: f64) -> Result<(), HwError>;

    /// Select the controller used for subsequent moves.
    fn set_controller(&mut self, controller: ControllerType) -> Result<(), HwError>;

    /// Units: degrees
    fn set_axis_target_angle(&mut self, angles: &AxisVector) -> Result<(), HwError>;

    /// Units: degrees/second
    fn set_axis_target_velocity(&mut self, velocities: &AxisVector) -> Result<(), HwError>;

    /// Start moving to the target angles, optionally waiting for the move to finish.
    fn move_hand(&mut self, blocking: bool) -> Result<(), HwError>;

    /// Units: degrees
    fn get_axis_actual_angle(&mut self) -> Result<AxisVector, HwError>;

    /// Units: degrees/second
    fn get_axis_actual_velocity(&mut self) -> Result<AxisVector, HwError>;

    fn get_axis_actual_state(&mut self) -> Result<[AxisState; NUM_AXES], HwError>;

    /// Units: degrees/second
    fn get_axis_max_velocity(&mut self) -> Result<AxisVector, HwError>;

    /// Read all temperature sensors.
    ///
    /// Units: degrees Celsius
    fn get_temperature(&mut self) -> Result<Vec<f64>, HwError>;

    /// Stop all motion.
    fn stop(&mut self) -> Result<(), HwError>;

    /// Stop all motion immediately and cut power to the motors.
    fn emergency_stop(&mut self) -> Result<(), HwError>;
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Discrete status of a single axis as reported by the hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisState {
    /// Not moving, the only state which completes a goal
    Idle,
    Positioning,
    SpeedMode,
    NotInitialised,
    CwBlocked,
    CcwBlocked,
    Disabled,
    LimitsReached,
}

/// Controller types supported by the hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerType {
    /// Move to target angles
    Pose,

    /// Track target velocities
    Velocity,

    /// Track target velocities with acceleration limits
    VelocityAcceleration,
}

/// Errors raised by a hardware port.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HwError {
    #[error("The hand is not connected")]
    NotConnected,

    #[error("Communication with the hand failed: {0}")]
    Communication(String),

    #[error("The hand reported an error: {0}")]
    Device(String),

    #[error("This port cannot connect over {0}")]
    UnsupportedTransport(String),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl AxisState {
    pub fn is_idle(&self) -> bool {
        matches!(self, AxisState::Idle)
    }
}
