//! # Equipment Interface
//!
//! This module defines the interface structures which are published by equipment executables.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod hand;
