//! Transport selection for connecting to the hand

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Serialize, Deserialize};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Serial connections always run at this baud rate.
const RS232_BAUD_RATE: u32 = 115_200;

/// Serial connection timeout.
///
/// Units: seconds
const RS232_TIMEOUT_S: f64 = 1.0;

/// ESD CAN device paths and the net numbers they map to.
const ESD_NETS: [(&str, u32); 2] = [("/dev/can0", 0), ("/dev/can1", 1)];

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Device connection parameters, the `[device]` table of `hand_exec.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceParams {
    #[serde(default = "default_device_type")]
    pub device_type: DeviceType,

    /// Serial port or CAN device path, or IP address for TCP
    #[serde(default = "default_device_string")]
    pub device_string: String,

    /// Serial port number
    #[serde(default)]
    pub device_num: u32,

    #[serde(default = "default_tcp_port")]
    pub tcp_port: u16,

    /// CAN baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Units: seconds
    #[serde(default = "default_timeout_s")]
    pub timeout_s: f64,

    /// CAN ID the hand sends on
    #[serde(default = "default_id_read")]
    pub id_read: u32,

    /// CAN ID the hand listens on
    #[serde(default = "default_id_write")]
    pub id_write: u32,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Types of device connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceType {
    Rs232,
    Pcan,
    Esd,
    Tcp,
    Sim,
}

/// A fully resolved connection to the hand.
#[derive(Debug, Clone, PartialEq)]
pub enum Transport {
    Rs232 {
        port: u32,
        baud_rate: u32,
        timeout_s: f64,
        device_string: String,
    },
    PeakCan {
        baud_rate: u32,
        timeout_s: f64,
        id_read: u32,
        id_write: u32,
        device_string: String,
    },
    EsdCan {
        net: u32,
        baud_rate: u32,
        timeout_s: f64,
        id_read: u32,
        id_write: u32,
    },
    Tcp {
        address: String,
        port: u16,
        timeout_s: f64,
    },
    Sim,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("Currently only support for /dev/can0 and /dev/can1")]
    UnsupportedEsdDevice(String),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Transport {
    /// Resolve the transport described by the device parameters.
    pub fn from_params(params: &DeviceParams) -> Result<Self, TransportError> {
        Ok(match params.device_type {
            DeviceType::Rs232 => Transport::Rs232 {
                port: params.device_num,
                baud_rate: RS232_BAUD_RATE,
                timeout_s: RS232_TIMEOUT_S,
                device_string: params.device_string.clone(),
            },
            DeviceType::Pcan => Transport::PeakCan {
                baud_rate: params.baud_rate,
                timeout_s: params.timeout_s,
                id_read: params.id_read,
                id_write: params.id_write,
                device_string: params.device_string.clone(),
            },
            DeviceType::Esd => {
                let net = ESD_NETS
                    .iter()
                    .find(|(path, _)| *path == params.device_string)
                    .map(|(_, net)| *net)
                    .ok_or_else(|| TransportError::UnsupportedEsdDevice(
                        params.device_string.clone()
                    ))?;

                Transport::EsdCan {
                    net,
                    baud_rate: params.baud_rate,
                    timeout_s: params.timeout_s,
                    id_read: params.id_read,
                    id_write: params.id_write,
                }
            }
            DeviceType::Tcp => Transport::Tcp {
                address: params.device_string.clone(),
                port: params.tcp_port,
                timeout_s: params.timeout_s,
            },
            DeviceType::Sim => Transport::Sim,
        })
    }

    /// Human readable name of the transport.
    pub fn name(&self) -> &'static str {
        match self {
            Transport::Rs232 { .. } => "RS232",
            Transport::PeakCan { .. } => "PEAK CAN",
            Transport::EsdCan { .. } => "ESD CAN",
            Transport::Tcp { .. } => "TCP",
            Transport::Sim => "SIM",
        }
    }
}

impl Default for DeviceParams {
    fn default() -> Self {
        Self {
            device_type: default_device_type(),
            device_string: default_device_string(),
            device_num: 0,
            tcp_port: default_tcp_port(),
            baud_rate: default_baud_rate(),
            timeout_s: default_timeout_s(),
            id_read: default_id_read(),
            id_write: default_id_write(),
        }
    }
}

fn default_device_type() -> DeviceType { DeviceType::Tcp }
fn default_device_string() -> String { String::from("192.168.1.42") }
fn default_tcp_port() -> u16 { 23 }
fn default_baud_rate() -> u32 { 1_000_000 }
fn default_timeout_s() -> f64 { 0.04 }
fn default_id_read() -> u32 { 43 }
fn default_id_write() -> u32 { 42 }

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn params(device_type: DeviceType, device_string: &str) -> DeviceParams {
        DeviceParams {
            device_type,
            device_string: device_string.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_esd_nets() {
        match Transport::from_params(&params(DeviceType::Esd, "/dev/can1")) {
            Ok(Transport::EsdCan { net, id_read, id_write, .. }) => {
                assert_eq!(net, 1);
                assert_eq!(id_read, 43);
                assert_eq!(id_write, 42);
            }
            t => panic!("Unexpected transport {:?}", t),
        }

        let err = Transport::from_params(&params(DeviceType::Esd, "/dev/can7")).unwrap_err();
        assert_eq!(
            format!("{}", err),
            "Currently only support for /dev/can0 and /dev/can1"
        );
    }

    #[test]
    fn test_rs232_fixed_settings() {
        let mut p = params(DeviceType::Rs232, "/dev/ttyUSB%d");
        p.device_num = 2;

        assert_eq!(
            Transport::from_params(&p).unwrap(),
            Transport::Rs232 {
                port: 2,
                baud_rate: 115_200,
                timeout_s: 1.0,
                device_string: "/dev/ttyUSB%d".into()
            }
        );
    }

    #[test]
    fn test_tcp_default() {
        assert_eq!(
            Transport::from_params(&DeviceParams::default()).unwrap(),
            Transport::Tcp {
                address: "192.168.1.42".into(),
                port: 23,
                timeout_s: 0.04
            }
        );
    }
}
