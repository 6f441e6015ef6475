//! Main hand executable entry point.
//! 
//! # Architecture
//! 
//! The general execution methodology consists of:
//! 
//!     - Initialise the session, logging and parameters
//!     - Create the hand controller over the configured hardware
//!     - Main loop:
//!         - Telecommand processing and handling
//!         - Hand update (commit pending command, read feedback)
//!         - Telemetry publication
//!         - Cycle management
//! 
//! Telecommands come either from clients over the network or from a timed script given as the
//! only argument. The hand is not connected until an `Init` TC is received.

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use comms_if::net::NetParams;
use hand_lib::{
    data_store::DataStore,
    hand_ctrl::{self, HandCtrl, UpdateLoop},
    hw_port::{DeviceType, SimHand},
    intake_workers::IntakeWorkers,
    params::HandExecParams,
    tc_server::{TcServer, TcServerError},
    tm_server::TmServer,
    unit_map::AxisVector,
};

mod tc_processor;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, error, info, warn};
use std::env;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use color_eyre::{Report, eyre::{WrapErr, eyre}};

// Internal
use util::{
    host, 
    module::State,
    logger::{logger_init, LevelFilter},
    session::Session,
    script_interpreter::{ScriptInterpreter, PendingTcs},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of consecutive cycle overruns after which a warning is raised.
const MAX_CONSEC_CYCLE_OVERRUNS: u64 = 50;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {

    // ---- EARLY INITIALISATION ----

    color_eyre::install()?;

    // Initialise session
    let session = Session::new(
        "hand_exec", 
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Info, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("SDH Hand Executable\n");
    info!(
        "Running on: {:#?}", 
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let exec_params: HandExecParams = util::params::load("hand_exec.toml")
        .wrap_err("Could not load exec params")?;
    exec_params.validate()
        .wrap_err("Invalid exec params")?;

    let ctrl_params: hand_ctrl::Params = util::params::load("hand_ctrl.toml")
        .wrap_err("Could not load hand control params")?;

    let net_params: NetParams = util::params::load("net.toml")
        .wrap_err("Could not load net params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE TC SOURCE ----

    // TC source is used to determine whether we're getting TCs from a script or from clients
    let mut tc_source = TcSource::None;
    let mut use_tc_server = false;

    // Collect all arguments
    let args: Vec<String> = env::args().collect();

    debug!("CLI arguments: {:?}", args);
    
    // If we have a single argument use it as the script path
    if args.len() == 2 {

        info!("Loading script from \"{}\"", &args[1]);

        let si = ScriptInterpreter::new(&args[1])
            .wrap_err("Failed to load script")?;

        info!(
            "Loaded script lasts {:.02} s and contains {} TCs\n",
            si.get_duration(),
            si.get_num_tcs()
        );

        tc_source = TcSource::Script(si);
    }
    // If no arguments then setup the tc server
    else if args.len() == 1 {

        info!("No script provided, remote control via the TcServer will be used\n");
        use_tc_server = true;

    }
    else {
        return Err(eyre!(
            "Expected either zero or one argument, found {}", args.len() - 1)
        );
    }

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut ds = DataStore::default();

    if exec_params.device.device_type != DeviceType::Sim {
        warn!(
            "No driver is available for {:?} devices, only the simulated hand can be connected",
            exec_params.device.device_type
        );
    }
    let hw = SimHand::new(AxisVector(exec_params.sim.max_velocity_degs));

    let ctrl = Arc::new(
        HandCtrl::new(ctrl_params, exec_params.device.clone(), Box::new(hw))
            .wrap_err("Failed to create HandCtrl")?
    );
    info!(
        "HandCtrl created in {} mode, waiting for Init", 
        ctrl.operation_mode()
    );

    let mut update_loop = UpdateLoop::default();
    update_loop.init(ctrl.clone(), &session)
        .wrap_err("Failed to initialise UpdateLoop")?;
    info!("UpdateLoop init complete");

    let workers = IntakeWorkers::new(ctrl.clone());
    info!("IntakeWorkers started");

    info!("Module initialisation complete\n");

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = comms_if::net::zmq::Context::new();

    if use_tc_server {
        tc_source = TcSource::Remote(
            TcServer::new(&zmq_ctx, &net_params)
                .wrap_err("Failed to initialise the TcServer")?
        );
        info!("TcServer initialised");
    }

    let mut tm_server = {
        let s = TmServer::new(&zmq_ctx, &net_params)
            .wrap_err("Failed to initialise TmServer")?;
        info!("TmServer initialised");
        s
    };

    info!("Network initialisation complete");

    // ---- MAIN LOOP ----

    let cycle_period = Duration::from_secs_f64(exec_params.cycle_period_s());

    info!("Begining main loop at {} Hz\n", exec_params.frequency_hz);

    loop {

        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // Clear items that need wiping at the start of the cycle
        ds.cycle_start(exec_params.frequency_hz);

        // ---- TELECOMMAND PROCESSING ----

        match tc_source {
            TcSource::None => return Err(eyre!("No TC source present")),

            TcSource::Remote(ref server) => {
                // Get commands until none remain
                loop {
                    match server.recieve_tc() {
                        Ok(Some(tc)) => {
                            let response = tc_processor::exec(&mut ds, &ctrl, &workers, &tc);

                            if let Err(e) = server.send_response(response) {
                                warn!("Could not respond to TC: {}", e);
                            }
                        },
                        Ok(None) => break,
                        Err(TcServerError::TcParseError(e)) => {
                            warn!("Could not parse recieved TC: {}", e);
                            break;
                        },
                        Err(TcServerError::NonUtf8Request) => {
                            warn!("Recieved a non UTF-8 TC");
                            break;
                        },
                        Err(e) => return Err(e)
                            .wrap_err("An error occured while receiving TCs from clients")
                    }
                }
            },

            TcSource::Script(ref mut si) => 
                match si.get_pending_tcs() {
                    PendingTcs::None => (),
                    PendingTcs::Some(tc_vec) => {
                        for tc in tc_vec.iter() {
                            let response = tc_processor::exec(&mut ds, &ctrl, &workers, tc);
                            info!("{} -> {:?}", tc.name(), response);
                        }
                    }
                    // Exit if end of script reached
                    PendingTcs::EndOfScript => {
                        info!("End of TC script reached, stopping");
                        break
                    }
                }
        };

        // ---- HAND UPDATE ----

        let tm = match update_loop.proc(&()) {
            Ok((mut tm, r)) => {
                ds.update_loop_status_rpt = r;
                tm.goal_results = workers.drain_results();
                Some(tm)
            },
            Err(e) => {
                warn!("Error during UpdateLoop processing: {}", e);
                None
            }
        };

        // ---- TELEMETRY ----

        if let Some(tm) = tm {
            ds.record_diagnostic(&tm.diagnostic);

            if let Err(e) = tm_server.send(&tm) {
                warn!("TmServer error: {}", e);
            }
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => {
                ds.num_consec_cycle_overruns = 0;
                thread::sleep(d);
            },
            None => {
                warn!(
                    "Cycle overran by {:.06} s", 
                    cycle_dur.as_secs_f64() - cycle_period.as_secs_f64()
                );
                ds.num_consec_cycle_overruns += 1;

                if ds.num_consec_cycle_overruns == MAX_CONSEC_CYCLE_OVERRUNS {
                    error!(
                        "{} consecutive cycle overruns, the hand is not being updated at {} Hz",
                        MAX_CONSEC_CYCLE_OVERRUNS,
                        exec_params.frequency_hz
                    );
                }
            }
        }

        ds.cycle_end();
    }

    // ---- SHUTDOWN ----

    if ctrl.is_connected() {
        let response = ctrl.shutdown();
        info!("{}", response.message);
    }

    // Stops the velocity worker, goal threads end once they see the hand disconnected
    drop(workers);

    info!("End of execution after {} cycles and {} TCs", ds.num_cycles, ds.num_tcs);
    session.exit();

    Ok(())
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Various sources for the telecommands incoming to the exec.
#[allow(dead_code)]
enum TcSource {
    None,
    Remote(TcServer),
    Script(ScriptInterpreter)
}
