//! Parameters structure for HandCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Serialize, Deserialize};
use std::collections::HashSet;

use super::OperationMode;
use crate::unit_map::NUM_AXES;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for hand control, loaded from `hand_ctrl.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {

    // ---- JOINTS ----

    /// Names of the joints in canonical order: knuckle, thumb proximal, thumb distal,
    /// finger 12, finger 13, finger 22, finger 23.
    pub joint_names: Vec<String>,

    /// Name of the joint coupled to the knuckle, published with the knuckle's feedback.
    pub mimic_joint_name: String,

    // ---- MODES ----

    /// Operation mode set when the hand is initialised.
    pub default_mode: String,

    // ---- TIMING ----

    /// Time to wait after staging a trajectory before checking whether it has finished.
    ///
    /// Units: seconds
    pub settle_delay_s: f64,

    /// Interval at which goals and blocked submitters re-check for progress.
    ///
    /// Units: seconds
    pub poll_interval_s: f64,

    // ---- MONITORING ----

    /// Number of consecutive cycles containing hardware faults tolerated before the status is
    /// raised to warning.
    pub max_consec_fault_cycles: u64,

    // ---- MOTORS ----

    /// Motor current applied by the motor on service.
    ///
    /// Units: amperes
    pub motor_on_current_a: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ParamsError {
    #[error("Expected {expected} joint names, found {found}")]
    WrongNumberOfJoints { expected: usize, found: usize },

    #[error("Joint name {0} appears more than once")]
    DuplicateJoint(String),

    #[error("Joint name {0} is used for both a joint and the mimic joint")]
    MimicIsJoint(String),

    #[error("Invalid default operation mode '{0}'")]
    InvalidDefaultMode(String),

    #[error("{0} must be positive")]
    NotPositive(&'static str),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Check the parameters describe a usable hand.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.joint_names.len() != NUM_AXES {
            return Err(ParamsError::WrongNumberOfJoints {
                expected: NUM_AXES,
                found: self.joint_names.len(),
            });
        }

        let mut seen = HashSet::new();
        for name in self.joint_names.iter() {
            if !seen.insert(name.as_str()) {
                return Err(ParamsError::DuplicateJoint(name.clone()));
            }
        }

        if seen.contains(self.mimic_joint_name.as_str()) {
            return Err(ParamsError::MimicIsJoint(self.mimic_joint_name.clone()));
        }

        self.default_operation_mode()?;

        if !(self.settle_delay_s > 0.0) {
            return Err(ParamsError::NotPositive("settle_delay_s"));
        }
        if !(self.poll_interval_s > 0.0) {
            return Err(ParamsError::NotPositive("poll_interval_s"));
        }
        if !(self.motor_on_current_a > 0.0) {
            return Err(ParamsError::NotPositive("motor_on_current_a"));
        }

        Ok(())
    }

    /// The parsed default operation mode.
    pub fn default_operation_mode(&self) -> Result<OperationMode, ParamsError> {
        self.default_mode
            .parse()
            .map_err(|_| ParamsError::InvalidDefaultMode(self.default_mode.clone()))
    }
}

impl Default for Params {
    fn default() -> Self {
        Self {
            joint_names: vec![
                "sdh_knuckle_joint".into(),
                "sdh_thumb_2_joint".into(),
                "sdh_thumb_3_joint".into(),
                "sdh_finger_12_joint".into(),
                "sdh_finger_13_joint".into(),
                "sdh_finger_22_joint".into(),
                "sdh_finger_23_joint".into(),
            ],
            mimic_joint_name: "sdh_finger_21_joint".into(),
            default_mode: "position".into(),
            settle_delay_s: 0.5,
            poll_interval_s: 0.01,
            max_consec_fault_cycles: 5,
            motor_on_current_a: 0.5,
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_params_valid() {
        let params = Params::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.default_operation_mode().unwrap(), OperationMode::Position);
    }

    #[test]
    fn test_invalid_params() {
        let mut p = Params::default();
        p.joint_names.pop();
        assert!(matches!(
            p.validate(),
            Err(ParamsError::WrongNumberOfJoints { expected: 7, found: 6 })
        ));

        let mut p = Params::default();
        p.joint_names[6] = p.joint_names[0].clone();
        assert!(matches!(p.validate(), Err(ParamsError::DuplicateJoint(_))));

        let mut p = Params::default();
        p.default_mode = "torque".into();
        assert!(matches!(p.validate(), Err(ParamsError::InvalidDefaultMode(_))));

        let mut p = Params::default();
        p.poll_interval_s = 0.0;
        assert!(matches!(p.validate(), Err(ParamsError::NotPositive("poll_interval_s"))));
    }

    #[test]
    fn test_partial_file() {
        let p: Params = util::params::from_str("default_mode = \"velocity\"").unwrap();
        assert_eq!(p.default_operation_mode().unwrap(), OperationMode::Velocity);
        assert_eq!(p.joint_names.len(), 7);
    }
}
