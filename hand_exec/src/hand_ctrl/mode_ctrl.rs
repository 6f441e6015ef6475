//! Operation mode state machine

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{error, info};
use serde::{Serialize, Deserialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::Ordering;

// Internal
use super::{HandCtrl, HandCtrlError, ServiceResponse};
use crate::hw_port::ControllerType;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Operation modes of the hand. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationMode {
    /// Trajectory goals move the hand to target angles
    Position,

    /// Velocity commands drive the joints directly
    Velocity,

    /// Recognised but inert, commands staged in this mode are not written to the hardware
    EffortDisabled,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl OperationMode {
    /// The hardware controller which implements this mode, if any.
    pub fn controller_type(&self) -> Option<ControllerType> {
        match self {
            OperationMode::Position => Some(ControllerType::Pose),
            OperationMode::Velocity => Some(ControllerType::Velocity),
            OperationMode::EffortDisabled => None,
        }
    }
}

impl FromStr for OperationMode {
    type Err = HandCtrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "position" => Ok(OperationMode::Position),
            "velocity" => Ok(OperationMode::Velocity),
            "effort" => Ok(OperationMode::EffortDisabled),
            _ => Err(HandCtrlError::UnsupportedMode(s.into())),
        }
    }
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationMode::Position => "position",
            OperationMode::Velocity => "velocity",
            OperationMode::EffortDisabled => "effort",
        };
        write!(f, "{}", name)
    }
}

impl HandCtrl {
    /// The current operation mode.
    pub fn operation_mode(&self) -> OperationMode {
        *self.mode.read()
    }

    /// The current mode together with the command epoch, read consistently with respect to mode
    /// switches.
    pub(super) fn mode_and_epoch(&self) -> (OperationMode, u64) {
        let mode = self.mode.read();
        (*mode, self.cmd_epoch.load(Ordering::SeqCst))
    }

    /// Set operation mode service.
    pub fn set_operation_mode(&self, name: &str) -> ServiceResponse {
        match self.request_mode(name) {
            Ok(mode) => ServiceResponse::ok(format!("Operation mode set to '{}'", mode)),
            Err(e) => ServiceResponse::failed(e.to_string()),
        }
    }

    /// Switch to the named operation mode.
    ///
    /// Any pending command is discarded, even if the switch fails, along with commands accepted in
    /// the old mode which are still waiting to be staged. On failure the current mode is unchanged.
    pub fn request_mode(&self, name: &str) -> Result<OperationMode, HandCtrlError> {
        let _ops = self.ops_lock.lock();
        self.switch_mode(name)
    }

    /// Mode switch without taking the operations lock, for use inside other operations.
    pub(super) fn switch_mode(&self, name: &str) -> Result<OperationMode, HandCtrlError> {
        // Held for the whole switch so intake never sees the new epoch with the old mode
        let mut current = self.mode.write();
        self.invalidate_commands();

        let mode: OperationMode = name.parse().map_err(|e| {
            error!("Operation mode '{}' not supported", name);
            e
        })?;

        // Stop first, a stop may disable the axes so they are re-enabled after selecting the
        // controller
        self.with_hw(|hw| {
            hw.stop()?;

            if let Some(controller) = mode.controller_type() {
                hw.set_controller(controller)?;
                hw.set_axis_enable(true)?;
            }

            Ok(())
        })
        .map_err(|e| {
            error!("Could not switch to {} mode: {}", mode, e);
            HandCtrlError::HardwareFault(e)
        })?;

        *current = mode;
        info!("Operation mode set to {}", mode);

        Ok(mode)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
