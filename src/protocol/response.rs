//! Classification of inbound packets.
//!
//! Responses are conventionally `request + N`; errors use the fixed type
//! 0xDB and info replies use `key + 0x40`.

use crate::protocol::command::{InfoKey, RequestCode};
use crate::protocol::packet::Packet;

pub const ERROR_RESPONSE: u8 = 0xDB;
pub const HEARTBEAT_RESPONSE: u8 = 0xDD;
pub const PRINT_STATUS_RESPONSE: u8 = 0xB3;

/// A classified response, borrowing the packet payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Response<'a> {
    /// Printer-level error with its code (0xFF when none was sent).
    DeviceError(u8),
    /// Heartbeat reply; the status layout depends on its length.
    Heartbeat(&'a [u8]),
    /// Battery level in percent.
    Battery(u8),
    /// Model identifier (B1 = 4096).
    DeviceType(u16),
    /// Any other info key, raw.
    Info { key: InfoKey, value: &'a [u8] },
    /// Progress of the current print job.
    PrintStatus { page: u16, progress1: u8, progress2: u8 },
    /// Per-command acknowledgment.
    Ack { command: RequestCode, success: bool },
    /// Unrecognised type or a known type with a short payload.
    Unknown { kind: u8, payload: &'a [u8] },
}

impl<'a> Response<'a> {
    pub fn classify(packet: &'a Packet) -> Self {
        parse(packet.kind, &packet.payload)
    }

    /// Heartbeat-class replies flip the session to Ready.
    pub fn is_heartbeat(&self) -> bool {
        matches!(self, Response::Heartbeat(_))
    }
}

/// Map a decoded `(type, payload)` to a [`Response`].
pub fn parse(kind: u8, data: &[u8]) -> Response<'_> {
    let unknown = Response::Unknown {
        kind,
        payload: data,
    };

    match kind {
        ERROR_RESPONSE => Response::DeviceError(data.first().copied().unwrap_or(0xFF)),
        HEARTBEAT_RESPONSE => Response::Heartbeat(data),
        PRINT_STATUS_RESPONSE => match data {
            [p0, p1, progress1, progress2, ..] => Response::PrintStatus {
                page: u16::from_be_bytes([*p0, *p1]),
                progress1: *progress1,
                progress2: *progress2,
            },
            _ => unknown,
        },
        _ => {
            if let Some(key) = InfoKey::from_response_type(kind) {
                return parse_info(key, data).unwrap_or(unknown);
            }
            match (ack_for(kind), data.first()) {
                (Some(command), Some(&status)) => Response::Ack {
                    command,
                    success: status != 0,
                },
                _ => unknown,
            }
        }
    }
}

fn parse_info(key: InfoKey, data: &[u8]) -> Option<Response<'_>> {
    match key {
        InfoKey::Battery => data.first().map(|&level| Response::Battery(level)),
        InfoKey::DeviceType => match data {
            [hi, lo, ..] => Some(Response::DeviceType(u16::from_be_bytes([*hi, *lo]))),
            _ => None,
        },
        _ => Some(Response::Info { key, value: data }),
    }
}

/// Which request a per-command acknowledgment answers.
fn ack_for(kind: u8) -> Option<RequestCode> {
    Some(match kind {
        0x31 => RequestCode::SetLabelDensity,
        0x33 => RequestCode::SetLabelType,
        0x02 => RequestCode::StartPrint,
        0x04 => RequestCode::StartPagePrint,
        0x14 => RequestCode::SetDimension,
        0xE4 => RequestCode::EndPagePrint,
        0xF4 => RequestCode::EndPrint,
        _ => return None,
    })
}
