//! # Hand client
//!
//! Sends telecommands to `hand_exec` over a REQ socket and listens to its telemetry.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::hand::HandTm,
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
    tc::{Tc, TcParseError, TcResponse}
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Time to wait for a TC response. Init can take a while on real hardware.
const TC_RECV_TIMEOUT_MS: i32 = 5000;

/// Time to wait for a telemetry packet.
const TM_RECV_TIMEOUT_MS: i32 = 1000;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct HandClient {
    tc_socket: MonitoredSocket,
    tm_socket: MonitoredSocket
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum HandClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not subscribe to telemetry: {0}")]
    SubscribeError(zmq::Error),

    #[error("Could not serialize the TC: {0}")]
    SerializationError(TcParseError),

    #[error("Could not send the TC: {0}")]
    SendError(zmq::Error),

    #[error("No response from hand_exec: {0}")]
    RecvError(zmq::Error),

    #[error("hand_exec sent a message which was not valid UTF-8")]
    NonUtf8Message,

    #[error("Could not parse the message from hand_exec: {0}")]
    DeserializeError(serde_json::Error)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl HandClient {
    /// Connect to the executable's TC and TM endpoints.
    ///
    /// Does not block until the executable is running.
    pub fn new(
        ctx: &zmq::Context, 
        tc_endpoint: &str, 
        tm_endpoint: &str
    ) -> Result<Self, HandClientError> {
        let tc_socket = MonitoredSocket::new(
            ctx,
            zmq::REQ,
            SocketOptions::client(TC_RECV_TIMEOUT_MS),
            tc_endpoint
        ).map_err(HandClientError::SocketError)?;

        let tm_socket = MonitoredSocket::new(
            ctx,
            zmq::SUB,
            SocketOptions::client(TM_RECV_TIMEOUT_MS),
            tm_endpoint
        ).map_err(HandClientError::SocketError)?;

        tm_socket.set_subscribe(b"")
            .map_err(HandClientError::SubscribeError)?;

        Ok(Self {
            tc_socket,
            tm_socket
        })
    }

    /// Send a TC and wait for its response.
    pub fn send_tc(&self, tc: &Tc) -> Result<TcResponse, HandClientError> {
        let tc_str = tc.to_json()
            .map_err(HandClientError::SerializationError)?;

        self.tc_socket.send(&tc_str, 0)
            .map_err(HandClientError::SendError)?;

        let response_str = recv_string(&self.tc_socket)?;

        serde_json::from_str(&response_str)
            .map_err(HandClientError::DeserializeError)
    }

    /// Wait for the next telemetry packet.
    pub fn recv_tm(&self) -> Result<HandTm, HandClientError> {
        let tm_str = recv_string(&self.tm_socket)?;

        HandTm::from_json(&tm_str)
            .map_err(HandClientError::DeserializeError)
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn recv_string(socket: &MonitoredSocket) -> Result<String, HandClientError> {
    match socket.recv_string(0) {
        Ok(Ok(s)) => Ok(s),
        Ok(Err(_)) => Err(HandClientError::NonUtf8Message),
        Err(e) => Err(HandClientError::RecvError(e))
    }
}
