//! # Intake workers
//!
//! Staging a command blocks until the update loop has committed the previous one, and a
//! trajectory goal then blocks until it resolves. Since telecommands are handled on the same
//! thread as the update loop, that blocking part is done here on worker threads. Validation still
//! happens on the calling thread so rejections can be reported immediately.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

// Internal
use comms_if::eqpt::hand::GoalResult;
use crate::hand_ctrl::{GoalTicket, HandCtrl, VelocityTicket};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Worker threads staging commands on behalf of the main loop.
pub struct IntakeWorkers {
    ctrl: Arc<HandCtrl>,

    /// Velocity commands, staged in order by a single worker
    vel_tx: Option<Sender<VelocityTicket>>,
    vel_jh: Option<JoinHandle<()>>,

    /// Outcomes of goals, one thread runs each goal
    results_tx: Sender<GoalResult>,
    results_rx: Receiver<GoalResult>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl IntakeWorkers {
    pub fn new(ctrl: Arc<HandCtrl>) -> Self {
        let (vel_tx, vel_rx) = unbounded::<VelocityTicket>();
        let (results_tx, results_rx) = unbounded();

        let vel_ctrl = ctrl.clone();
        let vel_jh = thread::Builder::new()
            .name("velocity_intake".into())
            .spawn(move || {
                // Exits once the sender is dropped
                // Commands queued before a disconnect or mode switch are dropped when staged
                for ticket in vel_rx.iter() {
                    if !vel_ctrl.stage_velocity(&ticket) {
                        debug!("Dropped queued velocity command");
                    }
                }
            });

        let vel_jh = match vel_jh {
            Ok(jh) => Some(jh),
            Err(e) => {
                error!("Could not start the velocity intake thread: {}", e);
                None
            }
        };

        Self {
            ctrl,
            vel_tx: Some(vel_tx),
            vel_jh,
            results_tx,
            results_rx,
        }
    }

    /// Queue a validated velocity command for staging.
    pub fn submit_velocity(&self, ticket: VelocityTicket) {
        let sent = match (&self.vel_tx, &self.vel_jh) {
            (Some(tx), Some(_)) => tx.send(ticket).is_ok(),
            _ => false,
        };

        if !sent {
            warn!("Velocity intake not running, command dropped");
        }
    }

    /// Run an accepted goal on its own thread.
    ///
    /// The outcome is returned by [`IntakeWorkers::drain_results`] once the goal resolves.
    pub fn submit_goal(&self, ticket: GoalTicket) {
        let ctrl = self.ctrl.clone();
        let results_tx = self.results_tx.clone();
        let id = ticket.id;

        let spawned = thread::Builder::new()
            .name(format!("goal_{}", id))
            .spawn(move || {
                let outcome = ctrl.execute_trajectory(ticket);
                results_tx.send(GoalResult { id, outcome }).ok();
            });

        if let Err(e) = spawned {
            error!("Could not start a thread for goal {}: {}", id, e);
        }
    }

    /// Outcomes of goals which resolved since the last call.
    pub fn drain_results(&self) -> Vec<GoalResult> {
        self.results_rx.try_iter().collect()
    }
}

impl Drop for IntakeWorkers {
    fn drop(&mut self) {
        self.vel_tx.take();

        if let Some(jh) = self.vel_jh.take() {
            jh.join().ok();
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::hand_ctrl::test_util::*;
    use crate::hw_port::AxisState;
    use crate::unit_map::AxisVector;
    use comms_if::eqpt::hand::GoalOutcome;
    use comms_if::tc::hand_ctrl::TrajectoryGoal;
    use std::time::{Duration, Instant};

    fn wait_for<F: FnMut() -> bool>(mut f: F) -> bool {
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(2) {
            if f() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_goal_results() {
        let (ctrl, sim) = connected_ctrl("position");
        sim.force_axis_states(Some([AxisState::Idle; 7]));
        let _loop = LoopThread::spawn(ctrl.clone(), Duration::from_millis(5));
        let workers = IntakeWorkers::new(ctrl.clone());

        let goal = TrajectoryGoal::single_point(ctrl.joint_names().to_vec(), vec![0.0; 7]);
        let ticket = ctrl.accept_trajectory(&goal).unwrap();
        workers.submit_goal(ticket);

        let mut results = Vec::new();
        assert!(wait_for(|| {
            results.extend(workers.drain_results());
            !results.is_empty()
        }));
        assert_eq!(results, vec![GoalResult { id: ticket.id, outcome: GoalOutcome::Succeeded }]);
        assert!(workers.drain_results().is_empty());
    }

    #[test]
    fn test_velocity_staged_in_background() {
        let (ctrl, sim) = connected_ctrl("velocity");
        let _loop = LoopThread::spawn(ctrl.clone(), Duration::from_millis(5));
        let workers = IntakeWorkers::new(ctrl.clone());

        let v = ctrl.accept_velocity(&[0.1; 7]).unwrap();
        workers.submit_velocity(v);

        assert!(wait_for(|| sim.target_velocities() == v.target().to_hardware()));

        // Dropping the workers stops the thread
        drop(workers);
        assert_ne!(sim.target_velocities(), AxisVector::default());
    }

    #[test]
    fn test_queued_velocity_dropped_after_estop() {
        let (ctrl, sim) = connected_ctrl("velocity");
        let workers = IntakeWorkers::new(ctrl.clone());

        // Hold the slot so the next command queues behind it
        let first = ctrl.accept_velocity(&[0.1; 7]).unwrap();
        assert!(ctrl.stage_velocity(&first));
        let second = ctrl.accept_velocity(&[0.2; 7]).unwrap();
        workers.submit_velocity(second);
        thread::sleep(Duration::from_millis(50));

        assert!(ctrl.emergency_stop().success);
        drop(workers);

        assert_eq!(ctrl.pending_command(), None);
        assert_eq!(ctrl.desired().velocities, first.target());
        assert_eq!(sim.target_velocities(), AxisVector::default());
    }
}
