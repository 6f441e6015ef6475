//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the hand control software: the telecommands
//! accepted by `hand_exec`, the telemetry it publishes, and the network plumbing both travel over.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod tc;

/// Telemetry and feedback definitions for equipment (the hand)
pub mod eqpt;

/// Network module
pub mod net;
