//! # Update loop
//!
//! The fixed-rate control cycle. Each cycle commits the pending command, if any, then reads
//! feedback from the hand and builds the telemetry packet. Every hardware call is isolated: a
//! fault is logged and counted, the rest of the cycle still runs and the last known value is
//! published in place of a failed read.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use chrono::Utc;
use log::{error, warn};
use serde::Serialize;
use std::sync::Arc;

// Internal
use comms_if::eqpt::hand::{
    ControllerState, DiagLevel, Diagnostic, HandTm, JointPointState, JointState,
    TemperatureArray,
};
use util::{module::State, session::{self, Session}};
use super::{
    vel_clamp, ConnectionState, HandCtrl, HandCtrlError, OperationMode, PendingCommand,
    TEMPERATURE_NAMES,
};
use crate::hw_port::HwError;
use crate::unit_map::{AxisVector, JointVector};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Cyclic part of hand control.
#[derive(Default)]
pub struct UpdateLoop {
    ctrl: Option<Arc<HandCtrl>>,

    /// Last successfully read axis angles
    ///
    /// Units: degrees
    last_angles: AxisVector,

    /// Last successfully read axis velocities
    ///
    /// Units: degrees/second
    last_velocities: AxisVector,

    num_consec_fault_cycles: u64,
}

/// Status of a single cycle.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    /// A pending command was taken from the slot this cycle
    pub command_committed: bool,

    /// Number of hardware calls which failed this cycle
    pub num_hw_faults: u32,

    /// Number of consecutive cycles, including this one, with at least one hardware fault
    pub num_consec_fault_cycles: u64,

    /// The hand reported a different number of temperatures than there are sensor names
    pub temperature_mismatch: bool,

    /// The committed command didn't match the current mode and was dropped
    pub command_mismatched: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl UpdateLoop {
    /// Create an already initialised loop for the given controller.
    pub fn new(ctrl: Arc<HandCtrl>) -> Self {
        Self {
            ctrl: Some(ctrl),
            ..Default::default()
        }
    }

    /// Commit a command taken from the pending slot.
    fn commit(
        &self,
        ctrl: &HandCtrl,
        cmd: PendingCommand,
        report: &mut StatusReport,
    ) -> Result<(), HandCtrlError> {
        if let Err(e) = ctrl.with_hw(|hw| hw.stop()) {
            Self::hw_fault("stop", &e, report);
        }

        let write = match (ctrl.operation_mode(), cmd) {
            (OperationMode::Position, PendingCommand::Trajectory(angles)) => ctrl.with_hw(|hw| {
                hw.set_axis_target_angle(&angles)?;
                hw.move_hand(false)
            }),
            (OperationMode::Velocity, PendingCommand::Velocity(velocities)) => {
                let envelope = ctrl.velocity_envelope();
                let clamped = vel_clamp::clamp_axes(&velocities, envelope.as_ref());
                ctrl.with_hw(|hw| hw.set_axis_target_velocity(&clamped))
            }
            (OperationMode::EffortDisabled, _) => {
                warn!("Moving in effort mode currently disabled");
                Ok(())
            }
            (mode, cmd) => {
                return Err(HandCtrlError::Internal(format!(
                    "{} command pending in {} mode",
                    cmd.kind(),
                    mode
                )))
            }
        };

        if let Err(e) = write {
            Self::hw_fault(cmd.kind(), &e, report);
        }

        Ok(())
    }

    fn hw_fault(what: &str, e: &HwError, report: &mut StatusReport) {
        error!("Hardware fault in {}: {}", what, e);
        report.num_hw_faults += 1;
    }

    /// Read feedback from the hand, returning joint state, controller state and temperatures.
    fn read_feedback(
        &mut self,
        ctrl: &HandCtrl,
        report: &mut StatusReport,
    ) -> (JointState, ControllerState, Option<TemperatureArray>) {
        // Angles and velocities are read separately so one failing doesn't lose the other
        match ctrl.with_hw(|hw| hw.get_axis_actual_angle()) {
            Ok(a) => self.last_angles = a,
            Err(e) => Self::hw_fault("angle read", &e, report),
        }
        match ctrl.with_hw(|hw| hw.get_axis_actual_velocity()) {
            Ok(v) => self.last_velocities = v,
            Err(e) => Self::hw_fault("velocity read", &e, report),
        }

        let positions = self.last_angles.to_joint();
        let velocities = self.last_velocities.to_joint();

        // Joint state, the mimic joint follows the knuckle
        let params = ctrl.params();
        let mut joint_state = JointState {
            names: params.joint_names.clone(),
            position: positions.to_vec(),
            velocity: velocities.to_vec(),
            effort: Vec::new(),
        };
        joint_state.names.push(params.mimic_joint_name.clone());
        joint_state.position.push(positions.0[0]);
        joint_state.velocity.push(velocities.0[0]);

        // Controller state
        let desired = ctrl.desired();
        let controller_state = ControllerState {
            joint_names: params.joint_names.clone(),
            desired: point_state(&desired.positions, &desired.velocities),
            actual: point_state(&positions, &velocities),
            error: point_state(
                &desired.positions.sub(&positions),
                &desired.velocities.sub(&velocities),
            ),
        };

        // Axis states, kept from the last read on a fault
        match ctrl.with_hw(|hw| hw.get_axis_actual_state()) {
            Ok(s) => ctrl.set_axis_states(Some(s)),
            Err(e) => Self::hw_fault("axis state read", &e, report),
        }

        let temperature = match ctrl.with_hw(|hw| hw.get_temperature()) {
            Ok(t) if t.len() == TEMPERATURE_NAMES.len() => Some(TemperatureArray {
                names: TEMPERATURE_NAMES.iter().map(|s| s.to_string()).collect(),
                temperatures: t,
            }),
            Ok(t) => {
                let e = HandCtrlError::InconsistentTelemetry(format!(
                    "{} temperatures for {} sensor names",
                    t.len(),
                    TEMPERATURE_NAMES.len()
                ));
                warn!("{}", e);
                report.temperature_mismatch = true;
                None
            }
            Err(e) => {
                Self::hw_fault("temperature read", &e, report);
                None
            }
        };

        (joint_state, controller_state, temperature)
    }

    fn diagnostic(&self, ctrl: &HandCtrl, max_consec_fault_cycles: u64) -> Diagnostic {
        match ctrl.connection_state() {
            ConnectionState::Error => {
                Diagnostic::new(DiagLevel::Error, "one or more drives are in Error mode")
            }
            ConnectionState::Connected if self.num_consec_fault_cycles > max_consec_fault_cycles => {
                Diagnostic::new(DiagLevel::Warn, "hardware communication degraded")
            }
            ConnectionState::Connected => Diagnostic::new(DiagLevel::Ok, "sdh initialized and running"),
            _ => Diagnostic::new(DiagLevel::Warn, "sdh not initialized"),
        }
    }
}

impl State for UpdateLoop {
    type InitData = Arc<HandCtrl>;
    type InitError = HandCtrlError;

    type InputData = ();
    type OutputData = HandTm;
    type StatusReport = StatusReport;
    type ProcError = HandCtrlError;

    /// Initialise the loop for the given controller.
    fn init(&mut self, init_data: Self::InitData, _session: &Session)
        -> Result<(), Self::InitError>
    {
        *self = Self::new(init_data);
        Ok(())
    }

    /// Run one control cycle.
    ///
    /// Hardware faults never fail the cycle, they are counted in the status report and reflected
    /// in the published diagnostic. A committed command which doesn't match the current mode is
    /// dropped and flagged in the status report, telemetry is still produced. An error is only
    /// returned if the loop was never initialised.
    fn proc(&mut self, _input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        let ctrl = match &self.ctrl {
            Some(c) => c.clone(),
            None => return Err(HandCtrlError::Internal("update loop not initialised".into())),
        };

        let mut report = StatusReport::default();
        let mut feedback = None;

        if ctrl.is_connected() {
            // Axis states are invalidated before the slot is released so goal watchers wait for
            // a read made after the commit
            if let Some(cmd) = ctrl.pending.take_and(|| ctrl.set_axis_states(None)) {
                report.command_committed = true;
                if let Err(e) = self.commit(&ctrl, cmd, &mut report) {
                    error!("{}", e);
                    report.command_mismatched = true;
                }
            }

            feedback = Some(self.read_feedback(&ctrl, &mut report));
        }

        if report.num_hw_faults > 0 && ctrl.is_connected() {
            self.num_consec_fault_cycles += 1;
        }
        else {
            self.num_consec_fault_cycles = 0;
        }
        report.num_consec_fault_cycles = self.num_consec_fault_cycles;

        let diagnostic = self.diagnostic(&ctrl, ctrl.params().max_consec_fault_cycles);

        let (joint_state, controller_state, temperature) = match feedback {
            Some((j, c, t)) => (Some(j), Some(c), t),
            None => (None, None, None),
        };

        let tm = HandTm {
            timestamp: Utc::now(),
            elapsed_s: session::get_elapsed_seconds(),
            operation_mode: ctrl.operation_mode().to_string(),
            joint_state,
            controller_state,
            temperature,
            diagnostic,
            goal_results: Vec::new(),
        };

        Ok((tm, report))
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn point_state(positions: &JointVector, velocities: &JointVector) -> JointPointState {
    JointPointState {
        positions: positions.to_vec(),
        velocities: velocities.to_vec(),
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::hand_ctrl::test_util::*;
    use crate::hw_port::{ControllerType, SimOp};
    use comms_if::tc::hand_ctrl::TrajectoryGoal;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_not_connected() {
        let (ctrl, sim) = sim_ctrl();
        let mut ul = UpdateLoop::new(ctrl.clone());

        let (tm, report) = ul.proc(&()).unwrap();
        assert!(tm.joint_state.is_none());
        assert!(tm.controller_state.is_none());
        assert!(tm.temperature.is_none());
        assert_eq!(tm.diagnostic, Diagnostic::new(DiagLevel::Warn, "sdh not initialized"));
        assert_eq!(tm.operation_mode, "position");
        assert_eq!(report.num_hw_faults, 0);

        // No hardware access at all
        assert!(sim.call_log().is_empty());
    }

    #[test]
    fn test_uninitialised_loop() {
        let mut ul = UpdateLoop::default();
        assert!(matches!(ul.proc(&()), Err(HandCtrlError::Internal(_))));
    }

    #[test]
    fn test_feedback() {
        let (ctrl, _sim) = connected_ctrl("position");
        let mut ul = UpdateLoop::new(ctrl.clone());

        let (tm, report) = ul.proc(&()).unwrap();
        assert_eq!(report.num_hw_faults, 0);
        assert!(!report.command_committed);
        assert_eq!(tm.diagnostic.level, DiagLevel::Ok);

        let js = tm.joint_state.unwrap();
        assert_eq!(js.names.len(), 8);
        assert_eq!(js.names[7], "sdh_finger_21_joint");
        assert_eq!(js.position.len(), 8);
        assert!(js.effort.is_empty());

        let cs = tm.controller_state.unwrap();
        assert_eq!(cs.joint_names.len(), 7);
        assert_eq!(cs.desired.positions, vec![0.0; 7]);

        let temps = tm.temperature.unwrap();
        assert_eq!(temps.names[0], "root");
        assert_eq!(temps.temperatures.len(), 9);

        assert!(ctrl.axis_states().is_some());
    }

    #[test]
    fn test_commit_trajectory() {
        let (ctrl, sim) = connected_ctrl("position");
        let mut ul = UpdateLoop::new(ctrl.clone());

        let positions = vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7];
        let goal = TrajectoryGoal::single_point(ctrl.joint_names().to_vec(), positions.clone());
        let ticket = ctrl.accept_trajectory(&goal).unwrap();
        ctrl.stage_trajectory(&ticket);

        sim.clear_call_log();
        let (tm, report) = ul.proc(&()).unwrap();
        assert!(report.command_committed);
        assert_eq!(ctrl.pending_command(), None);

        let log = sim.call_log();
        assert_eq!(&log[..3], &[SimOp::Stop, SimOp::SetAxisTargetAngle, SimOp::MoveHand]);
        assert_eq!(sim.target_angles(), JointVector::from_slice(&positions).unwrap().to_hardware());

        // Desired is the staged target, the hand hasn't got there yet
        let cs = tm.controller_state.unwrap();
        assert_eq!(cs.desired.positions, positions);
        for (e, (d, a)) in cs.error.positions.iter()
            .zip(cs.desired.positions.iter().zip(cs.actual.positions.iter()))
        {
            assert!((e - (d - a)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_commit_velocity_clamped() {
        let (ctrl, sim) = connected_ctrl("velocity");
        let mut ul = UpdateLoop::new(ctrl.clone());
        assert_eq!(sim.controller(), ControllerType::Velocity);

        // 10 rad/s is well above the 50 deg/s envelope
        ctrl.submit_velocity(&[10.0, -10.0, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
        ul.proc(&()).unwrap();

        assert_eq!(
            sim.target_velocities(),
            AxisVector([50.0, 0.0, 0.0, -50.0, 0.0, 0.0, 0.0])
        );
    }

    #[test]
    fn test_mismatched_command() {
        let (ctrl, sim) = connected_ctrl("position");
        let mut ul = UpdateLoop::new(ctrl.clone());

        // Only reachable by bypassing intake
        ctrl.pending.stage(PendingCommand::Velocity(AxisVector([1.0; 7])));

        let (tm, report) = ul.proc(&()).unwrap();
        assert!(report.command_committed);
        assert!(report.command_mismatched);
        assert_eq!(ctrl.pending_command(), None);
        assert_eq!(sim.target_velocities(), AxisVector::default());

        // The rest of the cycle still runs
        assert!(tm.joint_state.is_some());
        assert!(tm.controller_state.is_some());
        assert!(tm.temperature.is_some());
        assert_eq!(tm.diagnostic.level, DiagLevel::Ok);

        let (_, report) = ul.proc(&()).unwrap();
        assert!(!report.command_mismatched);
    }

    #[test]
    fn test_effort_mode_commits_nothing() {
        let (ctrl, sim) = connected_ctrl("position");
        let mut ul = UpdateLoop::new(ctrl.clone());

        ctrl.pending.stage(PendingCommand::Trajectory(AxisVector([1.0; 7])));
        ctrl.request_mode("effort").unwrap();
        ctrl.pending.stage(PendingCommand::Trajectory(AxisVector([1.0; 7])));

        sim.clear_call_log();
        let (_, report) = ul.proc(&()).unwrap();
        assert!(report.command_committed);
        assert!(!sim.call_log().contains(&SimOp::SetAxisTargetAngle));
        assert!(!sim.call_log().contains(&SimOp::MoveHand));
    }

    #[test]
    fn test_angle_fault_still_publishes_velocity() {
        let (ctrl, sim) = connected_ctrl("velocity");
        let mut ul = UpdateLoop::new(ctrl.clone());

        ctrl.submit_velocity(&[0.1; 7]).unwrap();
        ul.proc(&()).unwrap();
        thread::sleep(Duration::from_millis(20));

        sim.inject_fault(SimOp::GetAxisActualAngle);
        let (tm, report) = ul.proc(&()).unwrap();

        assert_eq!(report.num_hw_faults, 1);
        assert_eq!(report.num_consec_fault_cycles, 1);
        assert_eq!(tm.diagnostic.level, DiagLevel::Ok);

        let js = tm.joint_state.unwrap();
        for v in js.velocity.iter() {
            assert!((v - 0.1).abs() < 1e-9);
        }
    }

    #[test]
    fn test_repeated_faults_degrade_status() {
        let (ctrl, sim) = connected_ctrl("position");
        let mut ul = UpdateLoop::new(ctrl.clone());
        let max = ctrl.params().max_consec_fault_cycles;

        sim.inject_fault(SimOp::GetTemperature);

        for _ in 0..max {
            let (tm, _) = ul.proc(&()).unwrap();
            assert_eq!(tm.diagnostic.level, DiagLevel::Ok);
            assert!(tm.temperature.is_none());
        }

        let (tm, report) = ul.proc(&()).unwrap();
        assert_eq!(report.num_consec_fault_cycles, max + 1);
        assert_eq!(
            tm.diagnostic,
            Diagnostic::new(DiagLevel::Warn, "hardware communication degraded")
        );

        sim.clear_faults();
        let (tm, report) = ul.proc(&()).unwrap();
        assert_eq!(report.num_consec_fault_cycles, 0);
        assert_eq!(tm.diagnostic.level, DiagLevel::Ok);
    }

    #[test]
    fn test_temperature_mismatch() {
        let (ctrl, sim) = connected_ctrl("position");
        let mut ul = UpdateLoop::new(ctrl.clone());

        sim.set_num_temperatures(8);
        let (tm, report) = ul.proc(&()).unwrap();

        assert!(report.temperature_mismatch);
        assert_eq!(report.num_hw_faults, 0);
        assert!(tm.temperature.is_none());
        assert!(tm.joint_state.is_some());
    }

    #[test]
    fn test_error_status() {
        let (ctrl, sim) = sim_ctrl();
        let mut ul = UpdateLoop::new(ctrl.clone());

        sim.inject_fault(SimOp::Connect);
        ctrl.init();

        let (tm, _) = ul.proc(&()).unwrap();
        assert_eq!(
            tm.diagnostic,
            Diagnostic::new(DiagLevel::Error, "one or more drives are in Error mode")
        );
    }
}
