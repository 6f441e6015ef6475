//! # Simulated hand
//!
//! A [`HardwarePort`] which integrates axis motion in software. Used when the device type is
//! `SIM` and as the hardware double in tests, where faults, axis states and sensor counts can be
//! forced from outside.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

// Internal
use super::{AxisState, ControllerType, HardwarePort, HwError, Transport};
use crate::unit_map::{AxisVector, NUM_AXES};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of temperature sensors on the hand.
pub const NUM_TEMPERATURE_SENSORS: usize = 9;

/// Angle within which a positioning axis is considered on target.
///
/// Units: degrees
const ON_TARGET_TOLERANCE_DEG: f64 = 1e-6;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Handle to a simulated hand.
///
/// Clones share the same simulated hand, so a test can keep one clone to inspect and manipulate
/// the hand while the controller owns another.
#[derive(Clone)]
pub struct SimHand {
    inner: Arc<Mutex<SimState>>,
}

struct SimState {
    open: bool,
    enabled: bool,
    motor_current_a: f64,
    controller: ControllerType,

    angles: AxisVector,
    velocities: AxisVector,
    target_angles: AxisVector,
    target_velocities: AxisVector,
    max_velocity: AxisVector,

    /// Set by a move, cleared once all axes reach their targets or on stop
    moving: bool,
    last_step: Instant,

    faults: HashSet<SimOp>,
    forced_states: Option<[AxisState; NUM_AXES]>,
    num_temperatures: usize,
    call_log: Vec<SimOp>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Operations on the simulated hand, used for the call log and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimOp {
    Connect,
    Close,
    SetAxisEnable,
    SetAxisMotorCurrent,
    SetController,
    SetAxisTargetAngle,
    SetAxisTargetVelocity,
    MoveHand,
    GetAxisActualAngle,
    GetAxisActualVelocity,
    GetAxisActualState,
    GetAxisMaxVelocity,
    GetTemperature,
    Stop,
    EmergencyStop,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimHand {
    /// Create a new, unconnected, simulated hand.
    pub fn new(max_velocity: AxisVector) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SimState {
                open: false,
                enabled: false,
                motor_current_a: 0.0,
                controller: ControllerType::Pose,
                angles: AxisVector::default(),
                velocities: AxisVector::default(),
                target_angles: AxisVector::default(),
                target_velocities: AxisVector::default(),
                max_velocity,
                moving: false,
                last_step: Instant::now(),
                faults: HashSet::new(),
                forced_states: None,
                num_temperatures: NUM_TEMPERATURE_SENSORS,
                call_log: Vec::new(),
            })),
        }
    }

    /// Make every following call of `op` fail with a communication error.
    pub fn inject_fault(&self, op: SimOp) {
        self.inner.lock().faults.insert(op);
    }

    /// Remove all injected faults.
    pub fn clear_faults(&self) {
        self.inner.lock().faults.clear();
    }

    /// Override the reported axis states, or return to simulated states with `None`.
    pub fn force_axis_states(&self, states: Option<[AxisState; NUM_AXES]>) {
        self.inner.lock().forced_states = states;
    }

    /// Change the number of temperatures reported.
    pub fn set_num_temperatures(&self, num: usize) {
        self.inner.lock().num_temperatures = num;
    }

    /// Operations called so far, oldest first.
    pub fn call_log(&self) -> Vec<SimOp> {
        self.inner.lock().call_log.clone()
    }

    pub fn clear_call_log(&self) {
        self.inner.lock().call_log.clear();
    }

    pub fn target_angles(&self) -> AxisVector {
        self.inner.lock().target_angles
    }

    pub fn target_velocities(&self) -> AxisVector {
        self.inner.lock().target_velocities
    }

    pub fn is_open(&self) -> bool {
        self.inner.lock().open
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.lock().enabled
    }

    pub fn motor_current_a(&self) -> f64 {
        self.inner.lock().motor_current_a
    }

    pub fn controller(&self) -> ControllerType {
        self.inner.lock().controller
    }

    /// Lock the state, advance the simulation and record the call.
    ///
    /// Fails if a fault is injected for `op` or, for anything other than connecting, if the hand
    /// isn't open.
    fn call(&self, op: SimOp) -> Result<MutexGuard<'_, SimState>, HwError> {
        let mut state = self.inner.lock();

        state.call_log.push(op);
        state.step();

        if state.faults.contains(&op) {
            return Err(HwError::Communication(format!("injected fault in {:?}", op)));
        }

        if op != SimOp::Connect && !state.open {
            return Err(HwError::NotConnected);
        }

        trace!("SimHand: {:?}", op);

        Ok(state)
    }
}

impl SimState {
    /// Integrate axis motion since the last step.
    fn step(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_step).as_secs_f64();
        self.last_step = now;

        if !self.open || !self.enabled {
            self.velocities = AxisVector::default();
            return;
        }

        match self.controller {
            ControllerType::Pose => {
                if !self.moving {
                    self.velocities = AxisVector::default();
                    return;
                }

                let mut all_on_target = true;

                for i in 0..NUM_AXES {
                    let error = self.target_angles.0[i] - self.angles.0[i];
                    let max_step = self.max_velocity.0[i] * dt;

                    if error.abs() <= max_step {
                        self.angles.0[i] = self.target_angles.0[i];
                        self.velocities.0[i] = 0.0;
                    }
                    else {
                        self.angles.0[i] += error.signum() * max_step;
                        self.velocities.0[i] = error.signum() * self.max_velocity.0[i];
                        all_on_target = false;
                    }
                }

                if all_on_target {
                    self.moving = false;
                }
            }
            ControllerType::Velocity | ControllerType::VelocityAcceleration => {
                for i in 0..NUM_AXES {
                    self.velocities.0[i] = self.target_velocities.0[i];
                    self.angles.0[i] += self.velocities.0[i] * dt;
                }
            }
        }
    }

    fn axis_states(&self) -> [AxisState; NUM_AXES] {
        if let Some(forced) = self.forced_states {
            return forced;
        }

        let mut states = [AxisState::Idle; NUM_AXES];

        for (i, s) in states.iter_mut().enumerate() {
            *s = if !self.enabled {
                AxisState::Disabled
            }
            else {
                match self.controller {
                    ControllerType::Pose => {
                        let error = self.target_angles.0[i] - self.angles.0[i];
                        if self.moving && error.abs() > ON_TARGET_TOLERANCE_DEG {
                            AxisState::Positioning
                        }
                        else {
                            AxisState::Idle
                        }
                    }
                    _ => {
                        if self.velocities.0[i] != 0.0 {
                            AxisState::SpeedMode
                        }
                        else {
                            AxisState::Idle
                        }
                    }
                }
            };
        }

        states
    }

    fn halt(&mut self) {
        self.moving = false;
        self.target_velocities = AxisVector::default();
        self.velocities = AxisVector::default();
    }
}

impl HardwarePort for SimHand {
    fn connect(&mut self, transport: &Transport) -> Result<(), HwError> {
        let mut state = self.call(SimOp::Connect)?;

        match transport {
            Transport::Sim => {
                state.open = true;
                state.last_step = Instant::now();
                Ok(())
            }
            t => Err(HwError::UnsupportedTransport(t.name().into())),
        }
    }

    fn close(&mut self) -> Result<(), HwError> {
        let mut state = self.call(SimOp::Close)?;
        state.halt();
        state.open = false;
        Ok(())
    }

    fn set_axis_enable(&mut self, enable: bool) -> Result<(), HwError> {
        let mut state = self.call(SimOp::SetAxisEnable)?;
        state.enabled = enable;
        if !enable {
            state.halt();
        }
        Ok(())
    }

    fn set_axis_motor_current(&mut self, current_a: f64) -> Result<(), HwError> {
        self.call(SimOp::SetAxisMotorCurrent)?.motor_current_a = current_a;
        Ok(())
    }

    fn set_controller(&mut self, controller: ControllerType) -> Result<(), HwError> {
        let mut state = self.call(SimOp::SetController)?;
        state.halt();
        state.controller = controller;
        Ok(())
    }

    fn set_axis_target_angle(&mut self, angles: &AxisVector) -> Result<(), HwError> {
        self.call(SimOp::SetAxisTargetAngle)?.target_angles = *angles;
        Ok(())
    }

    fn set_axis_target_velocity(&mut self, velocities: &AxisVector) -> Result<(), HwError> {
        self.call(SimOp::SetAxisTargetVelocity)?.target_velocities = *velocities;
        Ok(())
    }

    fn move_hand(&mut self, blocking: bool) -> Result<(), HwError> {
        {
            let mut state = self.call(SimOp::MoveHand)?;
            if state.controller != ControllerType::Pose {
                return Err(HwError::Device("move requested outside of pose control".into()));
            }
            state.moving = true;
        }

        // Blocking moves wait for the simulation to finish the motion
        while blocking {
            let mut state = self.inner.lock();
            state.step();
            if !state.moving {
                break;
            }
            drop(state);
            std::thread::sleep(std::time::Duration::from_millis(5));
        }

        Ok(())
    }

    fn get_axis_actual_angle(&mut self) -> Result<AxisVector, HwError> {
        Ok(self.call(SimOp::GetAxisActualAngle)?.angles)
    }

    fn get_axis_actual_velocity(&mut self) -> Result<AxisVector, HwError> {
        Ok(self.call(SimOp::GetAxisActualVelocity)?.velocities)
    }

    fn get_axis_actual_state(&mut self) -> Result<[AxisState; NUM_AXES], HwError> {
        Ok(self.call(SimOp::GetAxisActualState)?.axis_states())
    }

    fn get_axis_max_velocity(&mut self) -> Result<AxisVector, HwError> {
        Ok(self.call(SimOp::GetAxisMaxVelocity)?.max_velocity)
    }

    fn get_temperature(&mut self) -> Result<Vec<f64>, HwError> {
        let state = self.call(SimOp::GetTemperature)?;

        // Warmer closer to the electronics
        Ok((0..state.num_temperatures)
            .map(|i| 25.0 + 0.5 * i as f64 + 10.0 * state.motor_current_a)
            .collect())
    }

    fn stop(&mut self) -> Result<(), HwError> {
        self.call(SimOp::Stop)?.halt();
        Ok(())
    }

    fn emergency_stop(&mut self) -> Result<(), HwError> {
        let mut state = self.call(SimOp::EmergencyStop)?;
        state.halt();
        state.enabled = false;
        state.motor_current_a = 0.0;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    fn open_hand() -> SimHand {
        let mut hand = SimHand::new(AxisVector([1000.0; NUM_AXES]));
        hand.connect(&Transport::Sim).unwrap();
        hand.set_axis_enable(true).unwrap();
        hand
    }

    #[test]
    fn test_only_sim_transport() {
        let mut hand = SimHand::new(AxisVector::default());
        let tcp = Transport::Tcp {
            address: "192.168.1.42".into(),
            port: 23,
            timeout_s: 0.04,
        };

        assert!(matches!(hand.connect(&tcp), Err(HwError::UnsupportedTransport(_))));
        assert!(matches!(hand.stop(), Err(HwError::NotConnected)));
        assert!(hand.connect(&Transport::Sim).is_ok());
        assert!(hand.is_open());
    }

    #[test]
    fn test_pose_move() {
        let mut hand = open_hand();
        hand.set_controller(ControllerType::Pose).unwrap();
        hand.set_axis_target_angle(&AxisVector([100.0; NUM_AXES])).unwrap();
        hand.move_hand(false).unwrap();

        assert!(hand.get_axis_actual_state().unwrap().iter().any(|s| *s == AxisState::Positioning));

        hand.move_hand(true).unwrap();

        assert_eq!(hand.get_axis_actual_angle().unwrap(), AxisVector([100.0; NUM_AXES]));
        assert!(hand.get_axis_actual_state().unwrap().iter().all(|s| s.is_idle()));
    }

    #[test]
    fn test_velocity_control() {
        let mut hand = open_hand();
        hand.set_controller(ControllerType::Velocity).unwrap();

        let mut vel = AxisVector::default();
        vel.0[3] = 20.0;
        hand.set_axis_target_velocity(&vel).unwrap();

        std::thread::sleep(Duration::from_millis(20));

        let states = hand.get_axis_actual_state().unwrap();
        assert_eq!(states[3], AxisState::SpeedMode);
        assert_eq!(states[0], AxisState::Idle);
        assert!(hand.get_axis_actual_angle().unwrap().0[3] > 0.0);

        hand.stop().unwrap();
        assert_eq!(hand.get_axis_actual_velocity().unwrap(), AxisVector::default());
    }

    #[test]
    fn test_faults_and_overrides() {
        let mut hand = open_hand();

        hand.inject_fault(SimOp::GetAxisActualAngle);
        assert!(matches!(hand.get_axis_actual_angle(), Err(HwError::Communication(_))));
        assert!(hand.get_axis_actual_velocity().is_ok());
        hand.clear_faults();
        assert!(hand.get_axis_actual_angle().is_ok());

        hand.force_axis_states(Some([AxisState::CwBlocked; NUM_AXES]));
        assert_eq!(hand.get_axis_actual_state().unwrap(), [AxisState::CwBlocked; NUM_AXES]);

        assert_eq!(hand.get_temperature().unwrap().len(), NUM_TEMPERATURE_SENSORS);
        hand.set_num_temperatures(4);
        assert_eq!(hand.get_temperature().unwrap().len(), 4);

        hand.emergency_stop().unwrap();
        assert!(!hand.is_enabled());
        assert_eq!(hand.motor_current_a(), 0.0);

        let log = hand.call_log();
        assert_eq!(log[0], SimOp::Connect);
        assert_eq!(log.last(), Some(&SimOp::EmergencyStop));
    }
}
