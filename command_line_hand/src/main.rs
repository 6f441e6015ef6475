//! # Command line hand client
//!
//! Interactive shell which sends telecommands to a running `hand_exec`. Type `help` for the list
//! of commands.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod client;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{thread, time::Duration};
use color_eyre::{Result, eyre::WrapErr};
use rustyline::{error::ReadlineError, DefaultEditor};
use structopt::{StructOpt, clap::AppSettings};

use comms_if::{net::zmq, tc::{Tc, TcResponse, TrajectoryGoal}};
use client::HandClient;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

const PROMPT: &str = "SDH $ ";
const HISTORY_PATH: &str = "data/history.txt";

/// Canonical joint order expected by `hand_exec`.
const JOINT_NAMES: [&str; 7] = [
    "sdh_knuckle_joint",
    "sdh_thumb_2_joint",
    "sdh_thumb_3_joint",
    "sdh_finger_12_joint",
    "sdh_finger_13_joint",
    "sdh_finger_22_joint",
    "sdh_finger_23_joint",
];

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Command line options of the client itself.
#[derive(Debug, StructOpt)]
#[structopt(name = "command_line_hand", about = "Interactive control of the SDH hand")]
struct Opts {
    /// Telecommand endpoint of hand_exec
    #[structopt(long, default_value = "tcp://localhost:5020")]
    tc_endpoint: String,

    /// Telemetry endpoint of hand_exec
    #[structopt(long, default_value = "tcp://localhost:5021")]
    tm_endpoint: String,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A command entered at the prompt.
#[derive(Debug, StructOpt)]
#[structopt(name = "sdh", setting = AppSettings::NoBinaryName)]
enum Command {
    /// Connect to and initialise the hand
    Init,

    /// Stop all motion
    Stop,

    /// Re-initialise the hand after an error
    Recover,

    /// Switch operation mode (position, velocity or effort)
    Mode {
        name: String
    },

    /// Emergency stop, disconnects the hand
    Estop,

    /// Disable the hand and disconnect
    Shutdown,

    /// Enable the axes and apply motor current
    MotorOn,

    /// Disable the axes and remove motor current
    MotorOff,

    /// Move to the given joint positions (7 values, rad)
    #[structopt(setting = AppSettings::AllowNegativeNumbers)]
    Goal {
        positions: Vec<f64>
    },

    /// Drive the joints at the given velocities (7 values, rad/s)
    #[structopt(setting = AppSettings::AllowNegativeNumbers)]
    Vel {
        velocities: Vec<f64>
    },

    /// Set all joint velocities to zero
    ZeroVel,

    /// Move all joints to zero
    StartPos,

    /// Switch to position mode, move to the given positions, wait, then return to velocity mode
    #[structopt(setting = AppSettings::AllowNegativeNumbers)]
    Pose {
        positions: Vec<f64>,

        /// Seconds to wait for the move before switching back
        #[structopt(short, long, default_value = "2.0")]
        time: f64
    },

    /// Print the next telemetry packet
    Tm,

    /// Exit the client
    Exit
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    let ctx = zmq::Context::new();
    let client = HandClient::new(&ctx, &opts.tc_endpoint, &opts.tm_endpoint)
        .wrap_err("Could not create the hand client")?;

    println!("Sending TCs to {}, telemetry from {}", opts.tc_endpoint, opts.tm_endpoint);

    let mut rl = DefaultEditor::new()
        .wrap_err("Could not start the line editor")?;
    if rl.load_history(HISTORY_PATH).is_err() {
        println!("No history detected");
    }

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                rl.add_history_entry(line.as_str()).ok();

                match Command::from_iter_safe(line.split_whitespace()) {
                    Ok(Command::Exit) => break,
                    Ok(cmd) => {
                        if let Err(e) = exec(&client, cmd) {
                            println!("Error: {:#}", e);
                        }
                    },
                    // Also covers help output
                    Err(e) => println!("{}", e.message)
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                println!("Unhandled Error: {:?}", e);
                break
            }
        }
    }

    if let Err(e) = rl.save_history(HISTORY_PATH) {
        println!("Could not save history: {}", e);
    }

    println!("Exiting...");

    Ok(())
}

fn exec(client: &HandClient, cmd: Command) -> Result<()> {
    match cmd {
        Command::Init => send(client, Tc::Init),
        Command::Stop => send(client, Tc::Stop),
        Command::Recover => send(client, Tc::Recover),
        Command::Mode { name } => send(client, Tc::SetOperationMode(name)),
        Command::Estop => send(client, Tc::EmergencyStop),
        Command::Shutdown => send(client, Tc::Shutdown),
        Command::MotorOn => send(client, Tc::MotorOn),
        Command::MotorOff => send(client, Tc::MotorOff),
        Command::Goal { positions } => send(client, goal(positions)),
        Command::Vel { velocities } => send(client, Tc::SetVelocities(velocities)),
        Command::ZeroVel => send(client, Tc::SetVelocities(vec![0.0; JOINT_NAMES.len()])),
        Command::StartPos => send(client, goal(vec![0.0; JOINT_NAMES.len()])),
        Command::Pose { positions, time } => {
            send(client, Tc::SetOperationMode("position".into()))?;
            send(client, goal(positions))?;
            thread::sleep(Duration::from_secs_f64(time.max(0.0)));
            send(client, Tc::SetOperationMode("velocity".into()))
        },
        Command::Tm => {
            let tm = client.recv_tm()
                .wrap_err("Could not get telemetry")?;
            println!("{:#?}", tm);
            Ok(())
        },
        Command::Exit => Ok(())
    }
}

/// Send a TC and print the response.
fn send(client: &HandClient, tc: Tc) -> Result<()> {
    let response = client.send_tc(&tc)
        .wrap_err_with(|| format!("Could not send {}", tc.name()))?;

    match response {
        TcResponse::Ok(msg) => println!("OK: {}", msg),
        TcResponse::Failed(msg) => println!("FAILED: {}", msg),
        TcResponse::GoalAccepted(id) => println!("Goal {} accepted", id),
        TcResponse::Rejected(reason) => println!("REJECTED: {}", reason),
        TcResponse::Invalid => println!("hand_exec could not parse the TC")
    }

    Ok(())
}

fn goal(positions: Vec<f64>) -> Tc {
    Tc::FollowTrajectory(TrajectoryGoal::single_point(
        JOINT_NAMES.iter().map(|s| s.to_string()).collect(),
        positions
    ))
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn parse(line: &str) -> Command {
        Command::from_iter_safe(line.split_whitespace()).unwrap()
    }

    #[test]
    fn test_parse_commands() {
        assert!(matches!(parse("init"), Command::Init));
        assert!(matches!(parse("motor-on"), Command::MotorOn));
        assert!(matches!(parse("zero-vel"), Command::ZeroVel));

        match parse("mode velocity") {
            Command::Mode { name } => assert_eq!(name, "velocity"),
            c => panic!("Unexpected command {:?}", c)
        }

        match parse("vel 0.1 -0.2 0 0 0 0 0") {
            Command::Vel { velocities } => {
                assert_eq!(velocities, vec![0.1, -0.2, 0.0, 0.0, 0.0, 0.0, 0.0])
            },
            c => panic!("Unexpected command {:?}", c)
        }

        match parse("pose 0 0 0 0.5 0.5 0.5 0.5 --time 3") {
            Command::Pose { positions, time } => {
                assert_eq!(positions.len(), 7);
                assert_eq!(time, 3.0);
            },
            c => panic!("Unexpected command {:?}", c)
        }

        assert!(Command::from_iter_safe("fly".split_whitespace()).is_err());
    }

    #[test]
    fn test_goal() {
        match goal(vec![0.0; 7]) {
            Tc::FollowTrajectory(g) => {
                assert_eq!(g.joint_names.len(), 7);
                assert_eq!(g.points[0].positions, vec![0.0; 7]);
            },
            t => panic!("Unexpected TC {:?}", t)
        }
    }
}
