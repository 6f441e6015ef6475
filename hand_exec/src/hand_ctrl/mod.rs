//! # Hand control module
//!
//! Owns the connection to the hand and everything needed to command it: the lifecycle of the
//! hardware connection, the operation mode state machine, intake of trajectory and velocity
//! commands, and the cyclic update which commits commands and reads feedback.
//!
//! The controller is shared between the main loop, which runs the [`UpdateLoop`], and the threads
//! submitting commands, so all state is behind locks and every method takes `&self`. The pending
//! command slot is the only state written by both sides.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod cmd_intake;
mod goal_watcher;
mod lifecycle;
mod mode_ctrl;
mod params;
mod pending;
mod update_loop;
pub mod vel_clamp;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

// Internal
pub use cmd_intake::*;
pub use goal_watcher::*;
pub use lifecycle::*;
pub use mode_ctrl::*;
pub use params::*;
pub use pending::*;
pub use update_loop::*;
use lifecycle::Lifecycle;

use crate::hw_port::{AxisState, DeviceParams, HardwarePort, HwError};
use crate::unit_map::{JointVector, NUM_AXES};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Names of the hand's temperature sensors, in the order the hardware reports them.
pub const TEMPERATURE_NAMES: [&str; 9] = [
    "root",
    "proximal_finger_1",
    "distal_finger_1",
    "proximal_finger_2",
    "distal_finger_2",
    "proximal_finger_3",
    "distal_finger_3",
    "controller",
    "pcb",
];

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The hand controller.
pub struct HandCtrl {
    params: Params,

    /// Used to resolve the transport each time the hand is initialised
    device: DeviceParams,

    /// The hardware, locked for the duration of each call (or short sequence of calls)
    hw: Mutex<Box<dyn HardwarePort>>,

    lifecycle: RwLock<Lifecycle>,

    mode: RwLock<OperationMode>,

    /// Serialises lifecycle and mode operations against each other
    ops_lock: Mutex<()>,

    pending: PendingSlot,

    next_goal_id: AtomicU64,

    /// ID of the most recently accepted goal, older goals are superseded
    latest_goal_id: AtomicU64,

    /// Incremented, with the pending slot locked, whenever commands accepted so far become
    /// invalid: on a mode switch and when the connection is dropped
    cmd_epoch: AtomicU64,

    /// Last axis states read from the hardware, `None` until read or while a command is being
    /// committed
    axis_states: RwLock<Option<[AxisState; NUM_AXES]>>,

    desired: Mutex<Desired>,
}

/// Last commanded joint values, reported as the desired controller state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Desired {
    /// From the last staged trajectory.
    ///
    /// Units: radians
    pub positions: JointVector,

    /// From the last staged velocity command.
    ///
    /// Units: radians/second
    pub velocities: JointVector,
}

/// Result of a lifecycle or mode service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceResponse {
    pub success: bool,
    pub message: String,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur during hand control.
#[derive(Debug, thiserror::Error)]
pub enum HandCtrlError {
    #[error("Operation mode '{0}' not supported")]
    UnsupportedMode(String),

    #[error("Rejected, sdh not initialized")]
    NotInitialized,

    #[error("Rejected, sdh not in {expected} mode (current mode is {current})")]
    NotInMode {
        expected: OperationMode,
        current: OperationMode,
    },

    #[error("Rejected, malformed goal: {0}")]
    MalformedGoal(String),

    #[error("Velocity array dimension mismatch: expected {expected} values, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Hardware fault: {0}")]
    HardwareFault(#[from] HwError),

    #[error("Inconsistent telemetry: {0}")]
    InconsistentTelemetry(String),

    #[error("Internal consistency error: {0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl HandCtrl {
    /// Create a new controller for the given hardware.
    ///
    /// The hand is not connected until [`HandCtrl::init`] is called. The initial operation mode
    /// is the configured default.
    pub fn new(
        params: Params,
        device: DeviceParams,
        hw: Box<dyn HardwarePort>,
    ) -> Result<Self, ParamsError> {
        params.validate()?;
        let mode = params.default_operation_mode()?;
        let poll_interval = Duration::from_secs_f64(params.poll_interval_s);

        Ok(Self {
            params,
            device,
            hw: Mutex::new(hw),
            lifecycle: RwLock::new(Lifecycle::default()),
            mode: RwLock::new(mode),
            ops_lock: Mutex::new(()),
            pending: PendingSlot::new(poll_interval),
            next_goal_id: AtomicU64::new(0),
            latest_goal_id: AtomicU64::new(0),
            cmd_epoch: AtomicU64::new(0),
            axis_states: RwLock::new(None),
            desired: Mutex::new(Desired::default()),
        })
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Canonical joint names.
    pub fn joint_names(&self) -> &[String] {
        &self.params.joint_names
    }

    /// The command waiting to be committed, if any.
    pub fn pending_command(&self) -> Option<PendingCommand> {
        self.pending.peek()
    }

    /// Last axis states read from the hardware.
    pub fn axis_states(&self) -> Option<[AxisState; NUM_AXES]> {
        *self.axis_states.read()
    }

    pub fn desired(&self) -> Desired {
        *self.desired.lock()
    }

    /// ID of the most recently accepted trajectory goal, 0 if none has been accepted.
    pub fn latest_goal_id(&self) -> u64 {
        self.latest_goal_id.load(Ordering::SeqCst)
    }

    /// Run `f` with exclusive access to the hardware.
    pub(crate) fn with_hw<T, F>(&self, f: F) -> Result<T, HwError>
    where
        F: FnOnce(&mut dyn HardwarePort) -> Result<T, HwError>,
    {
        let mut hw = self.hw.lock();
        f(hw.as_mut())
    }

    /// Current command epoch, accepted commands carry the epoch they were accepted in.
    pub fn cmd_epoch(&self) -> u64 {
        self.cmd_epoch.load(Ordering::SeqCst)
    }

    /// Discard the pending command and every accepted command not yet staged.
    pub(crate) fn invalidate_commands(&self) {
        self.pending.clear_and(|| {
            self.cmd_epoch.fetch_add(1, Ordering::SeqCst);
        });
    }

    pub(crate) fn set_axis_states(&self, states: Option<[AxisState; NUM_AXES]>) {
        *self.axis_states.write() = states;
    }
}

impl ServiceResponse {
    pub fn ok<S: Into<String>>(message: S) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed<S: Into<String>>(message: S) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// TEST HELPERS
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use crate::hw_port::{DeviceType, SimHand};
    use crate::unit_map::AxisVector;
    use crossbeam_channel::{bounded, Sender};
    use std::sync::Arc;
    use std::thread::{self, JoinHandle};
    use util::module::State;

    /// Parameters with short delays so tests run quickly.
    pub fn fast_params() -> Params {
        Params {
            settle_delay_s: 0.05,
            poll_interval_s: 0.005,
            ..Default::default()
        }
    }

    pub fn sim_device() -> DeviceParams {
        DeviceParams {
            device_type: DeviceType::Sim,
            ..Default::default()
        }
    }

    /// A controller and a handle on its simulated hand, not yet initialised.
    pub fn sim_ctrl() -> (Arc<HandCtrl>, SimHand) {
        let sim = SimHand::new(AxisVector([50.0; NUM_AXES]));
        let ctrl = HandCtrl::new(fast_params(), sim_device(), Box::new(sim.clone())).unwrap();
        (Arc::new(ctrl), sim)
    }

    /// A controller connected to its simulated hand in the given mode.
    pub fn connected_ctrl(mode: &str) -> (Arc<HandCtrl>, SimHand) {
        let (ctrl, sim) = sim_ctrl();
        assert!(ctrl.init().success);
        ctrl.request_mode(mode).unwrap();
        (ctrl, sim)
    }

    /// Runs the update loop in a background thread until dropped.
    pub struct LoopThread {
        stop_tx: Option<Sender<()>>,
        jh: Option<JoinHandle<()>>,
    }

    impl LoopThread {
        pub fn spawn(ctrl: Arc<HandCtrl>, period: Duration) -> Self {
            let (stop_tx, stop_rx) = bounded::<()>(1);

            let jh = thread::spawn(move || {
                let mut update_loop = UpdateLoop::new(ctrl);
                loop {
                    update_loop.proc(&()).ok();
                    if stop_rx.recv_timeout(period).is_ok() {
                        break;
                    }
                }
            });

            Self {
                stop_tx: Some(stop_tx),
                jh: Some(jh),
            }
        }
    }

    impl Drop for LoopThread {
        fn drop(&mut self) {
            if let Some(tx) = self.stop_tx.take() {
                tx.send(()).ok();
            }
            if let Some(jh) = self.jh.take() {
                jh.join().ok();
            }
        }
    }
}
