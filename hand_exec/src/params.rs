//! # Hand Executable Parameters
//!
//! This module provide parameters for the hand executable, loaded from `hand_exec.toml`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Serialize, Deserialize};

use crate::hw_port::DeviceParams;
use crate::unit_map::NUM_AXES;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandExecParams {

    /// Frequency of the control loop.
    ///
    /// Units: Hertz
    #[serde(default = "default_frequency_hz")]
    pub frequency_hz: f64,

    /// Connection to the hand
    pub device: DeviceParams,

    /// Simulated hand, used when the device type is `SIM`
    #[serde(default)]
    pub sim: SimParams
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimParams {
    /// Maximum velocity of each axis in hardware order.
    ///
    /// Units: degrees/second
    pub max_velocity_degs: [f64; NUM_AXES]
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ExecParamsError {
    #[error("The control loop frequency must be positive, found {0} Hz")]
    InvalidFrequency(f64),

    #[error("Simulated axis {0} has a non-positive maximum velocity")]
    InvalidSimVelocity(usize)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl HandExecParams {
    /// Check the parameters are usable.
    pub fn validate(&self) -> Result<(), ExecParamsError> {
        if !(self.frequency_hz > 0.0) {
            return Err(ExecParamsError::InvalidFrequency(self.frequency_hz));
        }

        for (i, v) in self.sim.max_velocity_degs.iter().enumerate() {
            if !(*v > 0.0) {
                return Err(ExecParamsError::InvalidSimVelocity(i));
            }
        }

        Ok(())
    }

    /// Target period of one cycle in seconds.
    pub fn cycle_period_s(&self) -> f64 {
        1.0 / self.frequency_hz
    }
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            max_velocity_degs: [81.0, 140.0, 120.0, 140.0, 120.0, 140.0, 120.0]
        }
    }
}

fn default_frequency_hz() -> f64 {
    50.0
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::hw_port::DeviceType;

    #[test]
    fn test_load_exec_params() {
        let params: HandExecParams = util::params::from_str(r#"
            [device]
            device_type = "ESD"
            device_string = "/dev/can1"
        "#).unwrap();

        assert_eq!(params.frequency_hz, 50.0);
        assert_eq!(params.device.device_type, DeviceType::Esd);
        assert_eq!(params.device.tcp_port, 23);
        assert!(params.validate().is_ok());
        assert!((params.cycle_period_s() - 0.02).abs() < 1e-12);

        let mut bad = params.clone();
        bad.frequency_hz = 0.0;
        assert!(bad.validate().is_err());
    }
}
