//! # Telecommand processor module
//!
//! The telecommand processor handles TCs coming from any source.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info};

// Internal
use comms_if::tc::{Tc, TcResponse};
use hand_lib::{
    data_store::DataStore,
    hand_ctrl::{HandCtrl, ServiceResponse},
    intake_workers::IntakeWorkers,
};

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Execute a telecommand, returning the response to send back.
///
/// Lifecycle and mode TCs are executed immediately. Commands are validated immediately and then
/// handed to the intake workers, goals report their outcome later through telemetry.
pub(crate) fn exec(
    ds: &mut DataStore,
    ctrl: &HandCtrl, 
    workers: &IntakeWorkers, 
    tc: &Tc
) -> TcResponse {
    debug!("Recieved {} command", tc.name());
    ds.num_tcs += 1;

    match tc {
        Tc::Init => service(ctrl.init()),
        Tc::Stop => service(ctrl.stop()),
        Tc::Recover => service(ctrl.recover()),
        Tc::SetOperationMode(mode) => service(ctrl.set_operation_mode(mode)),
        Tc::EmergencyStop => service(ctrl.emergency_stop()),
        Tc::Shutdown => service(ctrl.shutdown()),
        Tc::MotorOn => service(ctrl.motor_on()),
        Tc::MotorOff => service(ctrl.motor_off()),
        Tc::FollowTrajectory(goal) => match ctrl.accept_trajectory(goal) {
            Ok(ticket) => {
                workers.submit_goal(ticket);
                TcResponse::GoalAccepted(ticket.id)
            },
            Err(e) => TcResponse::Rejected(e.to_string())
        },
        Tc::SetVelocities(velocities) => match ctrl.accept_velocity(velocities) {
            Ok(v) => {
                workers.submit_velocity(v);
                TcResponse::Ok("velocities queued".into())
            },
            Err(e) => TcResponse::Rejected(e.to_string())
        }
    }
}

fn service(response: ServiceResponse) -> TcResponse {
    info!("{}", response.message);

    match response.success {
        true => TcResponse::Ok(response.message),
        false => TcResponse::Failed(response.message)
    }
}
