//! # Telecommand Server
//!
//! Receives telecommands from clients over a bound REP socket. Every request must be answered
//! with exactly one response before the next request can be received.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    net::{zmq, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions},
    tc::{Tc, TcParseError, TcResponse}
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Telecommand server
pub struct TcServer {
    socket: MonitoredSocket
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TcServerError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not send the response to the client: {0}")]
    SendError(zmq::Error),

    #[error("Could not recieve a message from the client: {0}")]
    RecvError(zmq::Error),

    #[error("Could not serialize the response: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not parse the recieved telecommand: {0}")]
    TcParseError(TcParseError),

    #[error("The client sent a message which was not valid UTF-8")]
    NonUtf8Request
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TcServer {

    /// Create a new instance of the TC Server, bound to the telecommand endpoint.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, TcServerError> {
        let socket = MonitoredSocket::new(
            ctx, 
            zmq::REP, 
            SocketOptions::server(), 
            &params.tc_endpoint
        ).map_err(TcServerError::SocketError)?;

        Ok(Self {
            socket
        })
    }

    /// Recieve a single TC from a client.
    ///
    /// Call in a loop until `Ok(None)` is returned, meaning there are no more TCs waiting right
    /// now.
    ///
    /// After recieving a valid TC a response must be sent using `.send_response()` before
    /// attempting to recieve another TC. If the request couldn't be parsed the `Invalid` response
    /// is sent by this function.
    pub fn recieve_tc(&self) -> Result<Option<Tc>, TcServerError> {
        let tc_str = match self.socket.recv_string(0) {
            // Valid message
            Ok(Ok(s)) => s,
            // Non UTF-8 message
            Ok(Err(_)) => {
                self.send_response(TcResponse::Invalid)?;
                return Err(TcServerError::NonUtf8Request)
            },
            // No message waiting
            Err(zmq::Error::EAGAIN) => return Ok(None),
            // No response is sent if we could not recieve
            Err(e) => return Err(TcServerError::RecvError(e))
        };

        match Tc::from_json(&tc_str) {
            Ok(tc) => Ok(Some(tc)),
            Err(e) => {
                self.send_response(TcResponse::Invalid)?;
                Err(TcServerError::TcParseError(e))
            }
        }
    }

    /// Send the given response back to the client.
    ///
    /// This function must be called after recieving a TC.
    pub fn send_response(&self, response: TcResponse) -> Result<(), TcServerError> {
        let response_str = serde_json::to_string(&response)
            .map_err(TcServerError::SerializationError)?;

        self.socket.send(&response_str, 0)
            .map_err(TcServerError::SendError)
    }
}
