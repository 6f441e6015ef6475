//! # TM Server

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::hand::HandTm, 
    net::{zmq, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions}
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Telemetry server, publishes one packet per cycle to any subscribers.
pub struct TmServer {
    socket: MonitoredSocket
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TmServerError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not send telemetry: {0}")]
    SendError(zmq::Error),

    #[error("Could not serialize the telemetry: {0}")]
    SerializationError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TmServer {
    /// Create a new instance of the TM Server.
    ///
    /// This function will not block until a subscriber connects.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, TmServerError> {
        let socket = MonitoredSocket::new(
            ctx,
            zmq::PUB,
            SocketOptions::server(),
            &params.tm_endpoint
        ).map_err(TmServerError::SocketError)?;

        Ok(Self {
            socket
        })
    }

    pub fn send(&mut self, tm: &HandTm) -> Result<(), TmServerError> {
        let packet_string = serde_json::to_string(tm)
            .map_err(TmServerError::SerializationError)?;

        self.socket.send(&packet_string, 0)
            .map_err(TmServerError::SendError)
    }
}
