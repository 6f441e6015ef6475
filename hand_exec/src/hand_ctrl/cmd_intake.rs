//! Intake of trajectory goals and velocity commands
//!
//! Both command kinds are validated synchronously, so a rejection never changes any state, then
//! staged in the pending slot for the update loop to commit. Staging blocks while another command
//! is waiting to be committed.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use std::sync::atomic::Ordering;

// Internal
use comms_if::eqpt::hand::GoalOutcome;
use comms_if::tc::hand_ctrl::TrajectoryGoal;
use super::{HandCtrl, HandCtrlError, OperationMode, PendingCommand};
use crate::unit_map::{JointVector, NUM_AXES};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An accepted trajectory goal, ready to be staged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoalTicket {
    /// Unique ID of the goal, later goals have larger IDs.
    pub id: u64,

    /// Command epoch the goal was accepted in.
    pub cmd_epoch: u64,

    /// Target positions in canonical order.
    ///
    /// Units: radians
    target: JointVector,
}

/// An accepted velocity command, ready to be staged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityTicket {
    /// Command epoch the command was accepted in.
    pub cmd_epoch: u64,

    /// Target velocities in canonical order.
    ///
    /// Units: radians/second
    target: JointVector,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl GoalTicket {
    pub fn target(&self) -> JointVector {
        self.target
    }
}

impl VelocityTicket {
    pub fn target(&self) -> JointVector {
        self.target
    }
}

impl HandCtrl {
    /// Validate a trajectory goal and register it as the latest goal.
    ///
    /// Only the first point of the goal is used. Positions are matched to the canonical joints by
    /// name, so the goal may list its joints in any order. Registering the goal supersedes any
    /// goal accepted before it.
    pub fn accept_trajectory(&self, goal: &TrajectoryGoal) -> Result<GoalTicket, HandCtrlError> {
        // The epoch is read before the connection, a disconnect after this point invalidates it
        let (mode, cmd_epoch) = self.mode_and_epoch();
        if mode != OperationMode::Position {
            warn!("Rejecting trajectory goal, sdh not in position mode");
            return Err(HandCtrlError::NotInMode {
                expected: OperationMode::Position,
                current: mode,
            });
        }

        if !self.is_connected() {
            warn!("Rejecting trajectory goal, sdh not initialized");
            return Err(HandCtrlError::NotInitialized);
        }

        let target = self.map_goal(goal).map_err(|e| {
            warn!("Rejecting trajectory goal: {}", e);
            e
        })?;

        let id = self.next_goal_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.latest_goal_id.store(id, Ordering::SeqCst);

        info!("Accepted trajectory goal {}: {:?} rad", id, target.0);

        Ok(GoalTicket { id, cmd_epoch, target })
    }

    /// Stage an accepted goal, blocking until the pending slot is free.
    ///
    /// The goal is dropped instead if, by the time the slot frees up, a newer goal has been
    /// accepted, the mode has changed or the hand was disconnected. Returns whether the goal was
    /// staged.
    pub fn stage_trajectory(&self, ticket: &GoalTicket) -> bool {
        let staged = self.pending.stage_if(
            PendingCommand::Trajectory(ticket.target.to_hardware()),
            || self.latest_goal_id() == ticket.id && self.cmd_epoch() == ticket.cmd_epoch,
            || self.desired.lock().positions = ticket.target,
        );

        if staged {
            debug!("Staged trajectory goal {}", ticket.id);
        }
        else {
            info!("Trajectory goal {} dropped before staging", ticket.id);
        }

        staged
    }

    /// Stage an accepted goal and wait for it to resolve.
    pub fn execute_trajectory(&self, ticket: GoalTicket) -> GoalOutcome {
        if !self.stage_trajectory(&ticket) {
            return GoalOutcome::Aborted;
        }

        self.watch_goal(&ticket)
    }

    /// Accept, stage and watch a trajectory goal, blocking until it resolves.
    pub fn submit_trajectory(&self, goal: &TrajectoryGoal) -> Result<GoalOutcome, HandCtrlError> {
        let ticket = self.accept_trajectory(goal)?;
        Ok(self.execute_trajectory(ticket))
    }

    /// Validate a velocity command given in canonical order.
    ///
    /// Units: radians/second
    pub fn accept_velocity(&self, velocities: &[f64]) -> Result<VelocityTicket, HandCtrlError> {
        let (mode, cmd_epoch) = self.mode_and_epoch();

        if !self.is_connected() {
            debug!("Ignoring velocity command, sdh not initialized");
            return Err(HandCtrlError::NotInitialized);
        }

        let target = JointVector::from_slice(velocities).ok_or_else(|| {
            warn!(
                "Velocity array dimension mismatch: {} values for {} joints",
                velocities.len(),
                NUM_AXES
            );
            HandCtrlError::DimensionMismatch {
                expected: NUM_AXES,
                found: velocities.len(),
            }
        })?;

        if mode != OperationMode::Velocity {
            debug!("Ignoring velocity command, sdh not in velocity mode");
            return Err(HandCtrlError::NotInMode {
                expected: OperationMode::Velocity,
                current: mode,
            });
        }

        Ok(VelocityTicket { cmd_epoch, target })
    }

    /// Stage a validated velocity command, blocking until the pending slot is free.
    ///
    /// The command is dropped if the mode changed or the hand was disconnected since it was
    /// accepted. Returns whether the command was staged.
    pub fn stage_velocity(&self, ticket: &VelocityTicket) -> bool {
        let staged = self.pending.stage_if(
            PendingCommand::Velocity(ticket.target.to_hardware()),
            || self.cmd_epoch() == ticket.cmd_epoch,
            || self.desired.lock().velocities = ticket.target,
        );

        if !staged {
            debug!("Velocity command dropped before staging");
        }

        staged
    }

    /// Validate and stage a velocity command.
    pub fn submit_velocity(&self, velocities: &[f64]) -> Result<bool, HandCtrlError> {
        let ticket = self.accept_velocity(velocities)?;
        Ok(self.stage_velocity(&ticket))
    }

    /// Map the first point of a goal into canonical joint order.
    fn map_goal(&self, goal: &TrajectoryGoal) -> Result<JointVector, HandCtrlError> {
        let point = goal
            .points
            .first()
            .ok_or_else(|| HandCtrlError::MalformedGoal("goal has no points".into()))?;

        if point.positions.len() != NUM_AXES {
            return Err(HandCtrlError::MalformedGoal(format!(
                "expected {} positions, found {}",
                NUM_AXES,
                point.positions.len()
            )));
        }

        if goal.joint_names.len() != point.positions.len() {
            return Err(HandCtrlError::MalformedGoal(format!(
                "{} joint names for {} positions",
                goal.joint_names.len(),
                point.positions.len()
            )));
        }

        let mut target = JointVector::default();

        for (i, name) in self.joint_names().iter().enumerate() {
            let idx = goal
                .joint_names
                .iter()
                .position(|n| n == name)
                .ok_or_else(|| HandCtrlError::MalformedGoal(format!("joint '{}' missing", name)))?;

            target.0[i] = point.positions[idx];
        }

        Ok(target)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::hand_ctrl::test_util::*;
    use crate::hand_ctrl::UpdateLoop;
    use crate::hw_port::{AxisState, SimOp};
    use crate::unit_map::AxisVector;
    use util::module::State;
    use crossbeam_channel::unbounded;
    use std::thread;
    use std::time::Duration;

    fn goal(names: &[&str], positions: &[f64]) -> TrajectoryGoal {
        TrajectoryGoal::single_point(
            names.iter().map(|s| s.to_string()).collect(),
            positions.to_vec(),
        )
    }

    fn canonical_goal(ctrl: &HandCtrl, positions: &[f64]) -> TrajectoryGoal {
        TrajectoryGoal::single_point(ctrl.joint_names().to_vec(), positions.to_vec())
    }

    #[test]
    fn test_trajectory_rejections() {
        // Checked before connection state
        let (ctrl, _sim) = connected_ctrl("velocity");
        ctrl.emergency_stop();
        assert!(matches!(
            ctrl.accept_trajectory(&canonical_goal(&ctrl, &[0.0; 7])),
            Err(HandCtrlError::NotInMode { .. })
        ));

        let (ctrl, _sim) = sim_ctrl();
        assert!(matches!(
            ctrl.accept_trajectory(&canonical_goal(&ctrl, &[0.0; 7])),
            Err(HandCtrlError::NotInitialized)
        ));

        let (ctrl, _sim) = connected_ctrl("position");
        let no_points = TrajectoryGoal {
            joint_names: ctrl.joint_names().to_vec(),
            points: vec![],
        };
        assert!(matches!(
            ctrl.accept_trajectory(&no_points),
            Err(HandCtrlError::MalformedGoal(_))
        ));

        let mut six = canonical_goal(&ctrl, &[0.0; 7]);
        six.points[0].positions.pop();
        assert!(matches!(
            ctrl.accept_trajectory(&six),
            Err(HandCtrlError::MalformedGoal(_))
        ));

        let mut missing = canonical_goal(&ctrl, &[0.0; 7]);
        missing.joint_names[3] = "sdh_finger_21_joint".into();
        assert!(matches!(
            ctrl.accept_trajectory(&missing),
            Err(HandCtrlError::MalformedGoal(_))
        ));

        // Nothing was registered or staged
        assert_eq!(ctrl.latest_goal_id(), 0);
        assert_eq!(ctrl.pending_command(), None);
    }

    #[test]
    fn test_scrambled_goal() {
        let (ctrl, _sim) = connected_ctrl("position");

        let g = goal(
            &[
                "sdh_finger_23_joint",
                "sdh_thumb_2_joint",
                "sdh_finger_12_joint",
                "sdh_knuckle_joint",
                "sdh_finger_22_joint",
                "sdh_thumb_3_joint",
                "sdh_finger_13_joint",
            ],
            &[0.7, 0.2, 0.4, 0.1, 0.6, 0.3, 0.5],
        );

        let ticket = ctrl.accept_trajectory(&g).unwrap();
        assert_eq!(ticket.id, 1);
        assert_eq!(ticket.target(), JointVector([0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7]));

        assert!(ctrl.stage_trajectory(&ticket));

        // Hardware order is knuckle, f22, f23, thumb2, thumb3, f12, f13
        let expected: [f64; 7] = [0.1, 0.6, 0.7, 0.2, 0.3, 0.4, 0.5];
        match ctrl.pending_command() {
            Some(PendingCommand::Trajectory(AxisVector(angles))) => {
                for (a, e) in angles.iter().zip(expected.iter()) {
                    assert!((a - e.to_degrees()).abs() < 1e-9);
                }
            }
            other => panic!("Unexpected pending command {:?}", other),
        }

        assert_eq!(ctrl.desired().positions, ticket.target());
    }

    #[test]
    fn test_velocity_rejections() {
        let (ctrl, _sim) = sim_ctrl();
        assert!(matches!(
            ctrl.submit_velocity(&[0.0; 7]),
            Err(HandCtrlError::NotInitialized)
        ));

        let (ctrl, _sim) = connected_ctrl("velocity");
        assert!(matches!(
            ctrl.submit_velocity(&[0.0; 5]),
            Err(HandCtrlError::DimensionMismatch { expected: 7, found: 5 })
        ));

        let (ctrl, _sim) = connected_ctrl("position");
        assert!(matches!(
            ctrl.submit_velocity(&[0.0; 7]),
            Err(HandCtrlError::NotInMode { .. })
        ));
        assert_eq!(ctrl.pending_command(), None);
        assert_eq!(ctrl.desired().velocities, JointVector::default());
    }

    #[test]
    fn test_velocity_staged() {
        let (ctrl, _sim) = connected_ctrl("velocity");
        let v = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7];

        ctrl.submit_velocity(&v).unwrap();

        assert_eq!(
            ctrl.pending_command(),
            Some(PendingCommand::Velocity(JointVector(v).to_hardware()))
        );
        assert_eq!(ctrl.desired().velocities, JointVector(v));
    }

    #[test]
    fn test_concurrent_goals_staged_one_at_a_time() {
        let (ctrl, _sim) = connected_ctrl("position");

        let first = ctrl.accept_trajectory(&canonical_goal(&ctrl, &[0.1; 7])).unwrap();
        assert!(ctrl.stage_trajectory(&first));

        let second = ctrl.accept_trajectory(&canonical_goal(&ctrl, &[0.2; 7])).unwrap();

        let (tx, rx) = unbounded();
        let ctrl_second = ctrl.clone();
        let jh = thread::spawn(move || {
            tx.send(ctrl_second.stage_trajectory(&second)).unwrap();
        });

        // The second goal waits for the first to be consumed
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(
            ctrl.pending.take(),
            Some(PendingCommand::Trajectory(first.target().to_hardware()))
        );

        assert_eq!(rx.recv_timeout(Duration::from_secs(1)), Ok(true));
        assert_eq!(
            ctrl.pending_command(),
            Some(PendingCommand::Trajectory(second.target().to_hardware()))
        );

        jh.join().unwrap();
    }

    #[test]
    fn test_superseded_goal_never_staged() {
        let (ctrl, sim) = connected_ctrl("position");
        sim.force_axis_states(Some([AxisState::Idle; 7]));

        let a = ctrl.accept_trajectory(&canonical_goal(&ctrl, &[0.1; 7])).unwrap();
        assert!(ctrl.stage_trajectory(&a));

        // B and C both queue behind A before the loop runs
        let (tx, rx) = unbounded();
        let mut jhs = Vec::new();
        for positions in [0.2, 0.3].iter() {
            let ticket = ctrl.accept_trajectory(&canonical_goal(&ctrl, &[*positions; 7])).unwrap();
            let ctrl_clone = ctrl.clone();
            let tx = tx.clone();
            jhs.push(thread::spawn(move || {
                tx.send((ticket.id, ctrl_clone.execute_trajectory(ticket))).unwrap();
            }));
        }

        // B was superseded while waiting, it gives up without staging
        let (id, outcome) = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(id, 2);
        assert_eq!(outcome, GoalOutcome::Aborted);

        let _loop = LoopThread::spawn(ctrl.clone(), Duration::from_millis(5));

        assert_eq!(rx.recv_timeout(Duration::from_secs(2)), Ok((3, GoalOutcome::Succeeded)));

        // The hand holds C's target
        let c_target = JointVector([0.3; 7]);
        assert_eq!(sim.target_angles(), c_target.to_hardware());
        assert_eq!(ctrl.desired().positions, c_target);

        for jh in jhs {
            jh.join().unwrap();
        }
    }

    #[test]
    fn test_blocked_goal_dropped_by_mode_switch() {
        let (ctrl, sim) = connected_ctrl("position");

        let a = ctrl.accept_trajectory(&canonical_goal(&ctrl, &[0.1; 7])).unwrap();
        assert!(ctrl.stage_trajectory(&a));
        let b = ctrl.accept_trajectory(&canonical_goal(&ctrl, &[0.2; 7])).unwrap();

        let (tx, rx) = unbounded();
        let ctrl_clone = ctrl.clone();
        let jh = thread::spawn(move || {
            tx.send(ctrl_clone.execute_trajectory(b)).unwrap();
        });
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

        ctrl.request_mode("velocity").unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(1)), Ok(GoalOutcome::Aborted));
        assert_eq!(ctrl.pending_command(), None);
        assert_eq!(ctrl.desired().positions, JointVector([0.1; 7]));

        // Nothing from position mode reaches the hardware
        sim.clear_call_log();
        let mut ul = UpdateLoop::new(ctrl.clone());
        let (_, report) = ul.proc(&()).unwrap();
        assert!(!report.command_committed);
        assert!(!sim.call_log().contains(&SimOp::SetAxisTargetAngle));

        jh.join().unwrap();
    }

    #[test]
    fn test_queued_velocity_dropped_by_mode_switch() {
        let (ctrl, _sim) = connected_ctrl("velocity");

        let stale = ctrl.accept_velocity(&[0.1; 7]).unwrap();
        ctrl.request_mode("velocity").unwrap();
        assert!(!ctrl.stage_velocity(&stale));
        assert_eq!(ctrl.pending_command(), None);
        assert_eq!(ctrl.desired().velocities, JointVector::default());

        // Disconnecting invalidates too
        let stale = ctrl.accept_velocity(&[0.1; 7]).unwrap();
        ctrl.emergency_stop();
        assert!(!ctrl.stage_velocity(&stale));
        assert_eq!(ctrl.pending_command(), None);
    }
}
