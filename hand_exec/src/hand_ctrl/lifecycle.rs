//! Hardware connection lifecycle

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{error, info, warn};
use serde::{Serialize, Deserialize};

// Internal
use super::{HandCtrl, ServiceResponse};
use crate::hw_port::Transport;
use crate::unit_map::AxisVector;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Connection state and what was learned from the hardware on connecting.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct Lifecycle {
    pub state: ConnectionState,

    /// Maximum axis velocities, read when connecting.
    ///
    /// Units: degrees/second
    pub envelope: Option<AxisVector>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// State of the connection to the hand.
///
/// `Error` is only left by an explicit init (or recover).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Initializing,
    Connected,
    Error,
}

impl Default for ConnectionState {
    fn default() -> Self {
        ConnectionState::Disconnected
    }
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl HandCtrl {
    pub fn connection_state(&self) -> ConnectionState {
        self.lifecycle.read().state
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    /// Maximum axis velocities, `None` until connected.
    pub fn velocity_envelope(&self) -> Option<AxisVector> {
        self.lifecycle.read().envelope
    }

    fn set_connection_state(&self, state: ConnectionState) {
        let mut lc = self.lifecycle.write();

        if lc.state != state {
            info!("Connection state: {:?} -> {:?}", lc.state, state);
            lc.state = state;
        }
    }

    /// Init service.
    ///
    /// Connects over the configured transport, reads the velocity envelope, then commits the
    /// current operation mode. Succeeds immediately if already connected.
    pub fn init(&self) -> ServiceResponse {
        let _ops = self.ops_lock.lock();

        if self.is_connected() {
            warn!("...sdh already initialized...");
            return ServiceResponse::ok("sdh already initialized");
        }

        let transport = match Transport::from_params(&self.device) {
            Ok(t) => t,
            Err(e) => {
                error!("{}", e);
                return ServiceResponse::failed(e.to_string());
            }
        };

        info!("Starting initializing {}", transport.name());
        self.set_connection_state(ConnectionState::Initializing);

        let connect = self.with_hw(|hw| {
            hw.connect(&transport)?;
            hw.get_axis_max_velocity()
        });

        match connect {
            Ok(envelope) => {
                info!("Initialized {} for SDH", transport.name());
                info!("Maximum axis velocities: {:?} deg/s", envelope.0);
                self.lifecycle.write().envelope = Some(envelope);
            }
            Err(e) => {
                error!("An exception was caught: {}", e);
                self.set_connection_state(ConnectionState::Error);
                return ServiceResponse::failed(e.to_string());
            }
        }

        let mode = self.operation_mode();
        if let Err(e) = self.switch_mode(&mode.to_string()) {
            error!("Could not set operation mode to '{}': {}", mode, e);
            self.set_connection_state(ConnectionState::Error);
            return ServiceResponse::failed(format!("Could not set operation mode to '{}'", mode));
        }

        self.set_connection_state(ConnectionState::Connected);

        ServiceResponse::ok(format!("sdh initialized over {}", transport.name()))
    }

    /// Recover service, re-initialises the hand.
    pub fn recover(&self) -> ServiceResponse {
        info!("Recovering sdh");
        self.init()
    }

    /// Stop service. Always succeeds, hardware faults are only logged.
    pub fn stop(&self) -> ServiceResponse {
        info!("Stopping sdh");

        if let Err(e) = self.with_hw(|hw| hw.stop()) {
            error!("An exception was caught: {}", e);
        }

        info!("Stopping sdh succesfull");
        ServiceResponse::ok("sdh stopped")
    }

    /// Emergency stop service.
    ///
    /// The connection is dropped before the hardware is touched, so the update loop stops
    /// commanding the hand straight away.
    pub fn emergency_stop(&self) -> ServiceResponse {
        let _ops = self.ops_lock.lock();

        warn!("EMERGENCY stop requested");
        self.set_connection_state(ConnectionState::Disconnected);
        self.invalidate_commands();

        let result = self.with_hw(|hw| {
            hw.emergency_stop()?;
            hw.set_axis_enable(false)?;
            hw.set_axis_motor_current(0.0)
        });

        match result {
            Ok(()) => ServiceResponse::ok("EMERGENCY stop"),
            Err(e) => {
                error!("An exception was caught: {}", e);
                self.set_connection_state(ConnectionState::Error);
                ServiceResponse::failed(e.to_string())
            }
        }
    }

    /// Shutdown service, disables the hand and closes the connection.
    pub fn shutdown(&self) -> ServiceResponse {
        let _ops = self.ops_lock.lock();

        info!("Shutting down sdh");
        self.set_connection_state(ConnectionState::Disconnected);
        self.invalidate_commands();

        let result = self.with_hw(|hw| {
            hw.set_axis_enable(false)?;
            hw.set_axis_motor_current(0.0)?;
            hw.close()
        });

        match result {
            Ok(()) => {
                self.lifecycle.write().envelope = None;
                ServiceResponse::ok("disconnected from SDH")
            }
            Err(e) => {
                error!("An exception was caught: {}", e);
                self.set_connection_state(ConnectionState::Error);
                ServiceResponse::failed(e.to_string())
            }
        }
    }

    /// Motor on service, enables the axes and applies the configured motor current.
    pub fn motor_on(&self) -> ServiceResponse {
        let current_a = self.params.motor_on_current_a;

        let result = self.with_hw(|hw| {
            hw.set_axis_enable(true)?;
            hw.set_axis_motor_current(current_a)
        });

        match result {
            Ok(()) => {
                info!("Motor ON ({} A)", current_a);
                ServiceResponse::ok("Motor ON")
            }
            Err(e) => {
                error!("An exception was caught: {}", e);
                ServiceResponse::failed(e.to_string())
            }
        }
    }

    /// Motor off service, disables the axes and removes motor current.
    pub fn motor_off(&self) -> ServiceResponse {
        let result = self.with_hw(|hw| {
            hw.set_axis_enable(false)?;
            hw.set_axis_motor_current(0.0)
        });

        match result {
            Ok(()) => {
                info!("Motor OFF");
                ServiceResponse::ok("Motor OFF")
            }
            Err(e) => {
                error!("An exception was caught: {}", e);
                ServiceResponse::failed(e.to_string())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
