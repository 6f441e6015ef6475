//! Completion tracking for trajectory goals

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use std::thread;
use std::time::Duration;

// Internal
use comms_if::eqpt::hand::GoalOutcome;
use super::{GoalTicket, HandCtrl};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Tracks a single trajectory goal until it resolves.
#[derive(Debug, Clone, Copy)]
pub struct GoalWatcher {
    id: u64,
    cmd_epoch: u64,
    state: WatcherState,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// Waiting for all axes to become idle
    Tracking,

    /// A newer goal was accepted
    Superseded,

    /// The connection to the hand was dropped or the mode changed
    Cancelled,

    /// All axes idle after the goal was committed
    Completed,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl GoalWatcher {
    pub fn new(ticket: &GoalTicket) -> Self {
        Self {
            id: ticket.id,
            cmd_epoch: ticket.cmd_epoch,
            state: WatcherState::Tracking,
        }
    }

    /// Check the goal against the controller, returning the new state.
    ///
    /// Once left, `Tracking` is never re-entered. The goal can only complete once its command has
    /// been committed and axis states have been read since.
    pub fn poll(&mut self, ctrl: &HandCtrl) -> WatcherState {
        if self.state != WatcherState::Tracking {
            return self.state;
        }

        self.state = if ctrl.latest_goal_id() != self.id {
            WatcherState::Superseded
        }
        else if !ctrl.is_connected() || ctrl.cmd_epoch() != self.cmd_epoch {
            WatcherState::Cancelled
        }
        else if ctrl.pending.is_occupied() {
            WatcherState::Tracking
        }
        else {
            match ctrl.axis_states() {
                Some(states) if states.iter().all(|s| s.is_idle()) => WatcherState::Completed,
                _ => WatcherState::Tracking,
            }
        };

        self.state
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    /// Outcome to report, `None` while still tracking.
    pub fn outcome(&self) -> Option<GoalOutcome> {
        match self.state {
            WatcherState::Tracking => None,
            WatcherState::Completed => Some(GoalOutcome::Succeeded),
            WatcherState::Superseded | WatcherState::Cancelled => Some(GoalOutcome::Aborted),
        }
    }
}

impl HandCtrl {
    /// Block until the given goal resolves.
    ///
    /// Waits for the settling delay first, since the hand takes some time to leave idle after a
    /// move is triggered, then polls at the configured interval. There is no timeout.
    pub fn watch_goal(&self, ticket: &GoalTicket) -> GoalOutcome {
        let id = ticket.id;
        let mut watcher = GoalWatcher::new(ticket);
        let poll_interval = Duration::from_secs_f64(self.params.poll_interval_s);

        thread::sleep(Duration::from_secs_f64(self.params.settle_delay_s));

        loop {
            watcher.poll(self);

            if let Some(outcome) = watcher.outcome() {
                match watcher.state() {
                    WatcherState::Completed => info!("Goal {} succeeded", id),
                    WatcherState::Superseded => info!("Goal {} aborted, superseded by a newer goal", id),
                    _ => warn!("Goal {} aborted, sdh disconnected or mode changed", id),
                }
                return outcome;
            }

            debug!("Goal {} still moving", id);
            thread::sleep(poll_interval);
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
    use crossbeam_channel::unbounded;
    use comms_if::tc::hand_ctrl::TrajectoryGoal;
    use std::time::Instant;

    const MOVING: [AxisState; 7] = [AxisState::Positioning; 7];
    const IDLE: [AxisState; 7] = [AxisState::Idle; 7];

    fn zero_goal(ctrl: &HandCtrl) -> TrajectoryGoal {
        TrajectoryGoal::single_point(ctrl.joint_names().to_vec(), vec![0.0; 7])
    }

    #[test]
    fn test_poll() {
        let (ctrl, _sim) = connected_ctrl("position");
        let ticket = ctrl.accept_trajectory(&zero_goal(&ctrl)).unwrap();
        let mut watcher = GoalWatcher::new(&ticket);

        // Staged but not committed, stale idle states don't count
        ctrl.set_axis_states(Some(IDLE));
        assert!(ctrl.stage_trajectory(&ticket));
        assert_eq!(watcher.poll(&ctrl), WatcherState::Tracking);
        assert_eq!(watcher.outcome(), None);

        // Committed, no fresh states yet
        ctrl.pending.take_and(|| ctrl.set_axis_states(None));
        assert_eq!(watcher.poll(&ctrl), WatcherState::Tracking);

        ctrl.set_axis_states(Some(MOVING));
        assert_eq!(watcher.poll(&ctrl), WatcherState::Tracking);

        ctrl.set_axis_states(Some(IDLE));
        assert_eq!(watcher.poll(&ctrl), WatcherState::Completed);
        assert_eq!(watcher.outcome(), Some(GoalOutcome::Succeeded));

        // Terminal
        ctrl.accept_trajectory(&zero_goal(&ctrl)).unwrap();
        assert_eq!(watcher.poll(&ctrl), WatcherState::Completed);
    }

    #[test]
    fn test_mode_switch_cancels_staged_goal() {
        let (ctrl, _sim) = connected_ctrl("position");
        let ticket = ctrl.accept_trajectory(&zero_goal(&ctrl)).unwrap();
        let mut watcher = GoalWatcher::new(&ticket);
        assert!(ctrl.stage_trajectory(&ticket));

        // Staged but never committed, then discarded by the switch
        ctrl.request_mode("position").unwrap();
        ctrl.set_axis_states(Some(IDLE));

        assert_eq!(watcher.poll(&ctrl), WatcherState::Cancelled);
        assert_eq!(watcher.outcome(), Some(GoalOutcome::Aborted));
    }

    #[test]
    fn test_idle_goal_succeeds() {
        let (ctrl, sim) = connected_ctrl("position");
        sim.force_axis_states(Some(IDLE));
        let _loop = LoopThread::spawn(ctrl.clone(), Duration::from_millis(5));

        let start = Instant::now();
        let outcome = ctrl.submit_trajectory(&zero_goal(&ctrl)).unwrap();

        assert_eq!(outcome, GoalOutcome::Succeeded);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_simulated_move_succeeds() {
        let (ctrl, _sim) = connected_ctrl("position");
        let _loop = LoopThread::spawn(ctrl.clone(), Duration::from_millis(5));

        // 0.1 rad at 50 deg/s takes ~0.11 s
        let goal = TrajectoryGoal::single_point(ctrl.joint_names().to_vec(), vec![0.1; 7]);
        assert_eq!(ctrl.submit_trajectory(&goal).unwrap(), GoalOutcome::Succeeded);
    }

    #[test]
    fn test_second_goal_aborts_first() {
        let (ctrl, sim) = connected_ctrl("position");
        sim.force_axis_states(Some(MOVING));
        let _loop = LoopThread::spawn(ctrl.clone(), Duration::from_millis(5));

        let (tx, rx) = unbounded();
        let ctrl_clone = ctrl.clone();
        let jh = thread::spawn(move || {
            let outcome = ctrl_clone.submit_trajectory(&zero_goal(&ctrl_clone)).unwrap();
            tx.send(outcome).unwrap();
        });

        // Let the first goal start tracking
        thread::sleep(Duration::from_millis(100));
        assert!(rx.try_recv().is_err());

        let ticket = ctrl.accept_trajectory(&zero_goal(&ctrl)).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)), Ok(GoalOutcome::Aborted));

        sim.force_axis_states(Some(IDLE));
        assert_eq!(ctrl.execute_trajectory(ticket), GoalOutcome::Succeeded);

        jh.join().unwrap();
    }

    #[test]
    fn test_emergency_stop_cancels_goal() {
        let (ctrl, sim) = connected_ctrl("position");
        sim.force_axis_states(Some(MOVING));
        let _loop = LoopThread::spawn(ctrl.clone(), Duration::from_millis(5));

        let (tx, rx) = unbounded();
        let ctrl_clone = ctrl.clone();
        let jh = thread::spawn(move || {
            let outcome = ctrl_clone.submit_trajectory(&zero_goal(&ctrl_clone)).unwrap();
            tx.send(outcome).unwrap();
        });

        thread::sleep(Duration::from_millis(100));
        assert!(ctrl.emergency_stop().success);

        assert_eq!(rx.recv_timeout(Duration::from_secs(1)), Ok(GoalOutcome::Aborted));
        jh.join().unwrap();
    }
}
