//! # Data Store

use comms_if::eqpt::hand::{DiagLevel, Diagnostic};
use log::{error, info, warn};

use crate::hand_ctrl;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
#[derive(Default)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    /// True if this cycle falls on a 1Hz boundary
    pub is_1_hz_cycle: bool,

    /// Session elapsed time
    pub elapsed_s: f64,

    // UpdateLoop
    pub update_loop_status_rpt: hand_ctrl::StatusReport,

    /// Diagnostic published in the previous cycle
    pub last_diagnostic: Option<Diagnostic>,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,

    /// Number of telecommands executed
    pub num_tcs: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Perform actions required at the start of a cycle.
    ///
    /// Clears those items that need clearing at the start of a cycle, and sets the 1Hz cycle flag.
    pub fn cycle_start(&mut self, cycle_frequency_hz: f64) {
        let cycles_per_second = (cycle_frequency_hz.round() as u128).max(1);
        self.is_1_hz_cycle = self.num_cycles % cycles_per_second == 0;

        self.update_loop_status_rpt = hand_ctrl::StatusReport::default();

        self.elapsed_s = util::session::get_elapsed_seconds();
    }

    /// Record the diagnostic published this cycle, logging any change of status.
    ///
    /// Returns `true` if the diagnostic changed.
    pub fn record_diagnostic(&mut self, diagnostic: &Diagnostic) -> bool {
        if self.last_diagnostic.as_ref() == Some(diagnostic) {
            return false;
        }

        match diagnostic.level {
            DiagLevel::Ok => info!("Hand status OK: {}", diagnostic.message),
            DiagLevel::Warn => warn!("Hand status WARN: {}", diagnostic.message),
            DiagLevel::Error => error!("Hand status ERROR: {}", diagnostic.message),
        }

        self.last_diagnostic = Some(diagnostic.clone());
        true
    }

    /// Perform actions required at the end of a cycle.
    pub fn cycle_end(&mut self) {
        self.num_cycles += 1;
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
