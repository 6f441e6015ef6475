//! # Hand library.
//!
//! This library allows other crates in the workspace to access items defined inside the hand 
//! executable crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Global data store for the executable
pub mod data_store;

/// Hand control - operation modes, command intake and the cyclic update of the hand
pub mod hand_ctrl;

/// Hardware port - the interface to the hand's device driver, plus a simulated hand
pub mod hw_port;

/// Worker threads which stage commands without blocking the main loop
pub mod intake_workers;

/// Parameters for the executable
pub mod params;

/// Telecommand server - recieves telecommands from clients
pub mod tc_server;

/// Telemetry server - publishes the hand's telemetry
pub mod tm_server;

/// Mapping between joint order/units and hardware axis order/units
pub mod unit_map;
