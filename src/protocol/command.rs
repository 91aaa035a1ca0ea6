//! Outbound request codes and payload builders.
//!
//! Multi-byte fields are big-endian on the wire.

use heapless::Vec;

use crate::config::{MAX_PAYLOAD, ROW_BYTES};
use crate::error::CodecError;
use crate::protocol::packet::{self, Frame};

/// Request type byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum RequestCode {
    GetInfo = 0x40,
    GetRfid = 0x1A,
    Heartbeat = 0xDC,
    SetLabelType = 0x23,
    SetLabelDensity = 0x21,
    StartPrint = 0x01,
    EndPrint = 0xF3,
    StartPagePrint = 0x03,
    EndPagePrint = 0xE3,
    AllowPrintClear = 0x20,
    SetDimension = 0x13,
    SetQuantity = 0x15,
    GetPrintStatus = 0xA3,
    PrintBitmapRowIndexed = 0x83,
    PrintEmptyRow = 0x84,
    PrintBitmapRow = 0x85,
}

/// Keys accepted by [`RequestCode::GetInfo`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum InfoKey {
    Density = 1,
    PrintSpeed = 2,
    LabelType = 3,
    LanguageType = 6,
    AutoShutdownTime = 7,
    DeviceType = 8,
    SoftVersion = 9,
    Battery = 10,
    DeviceSerial = 11,
    HardVersion = 12,
}

impl InfoKey {
    /// Info responses come back as `key + 0x40`.
    pub const fn response_type(self) -> u8 {
        self as u8 + 0x40
    }

    pub fn from_response_type(kind: u8) -> Option<Self> {
        Some(match kind.checked_sub(0x40)? {
            1 => InfoKey::Density,
            2 => InfoKey::PrintSpeed,
            3 => InfoKey::LabelType,
            6 => InfoKey::LanguageType,
            7 => InfoKey::AutoShutdownTime,
            8 => InfoKey::DeviceType,
            9 => InfoKey::SoftVersion,
            10 => InfoKey::Battery,
            11 => InfoKey::DeviceSerial,
            12 => InfoKey::HardVersion,
            _ => return None,
        })
    }
}

/// A request ready to be framed.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Command {
    pub code: RequestCode,
    pub payload: Vec<u8, MAX_PAYLOAD>,
}

impl Command {
    fn new(code: RequestCode, payload: &[u8]) -> Result<Self, CodecError> {
        let payload = Vec::from_slice(payload).map_err(|_| CodecError::PayloadTooLarge)?;
        Ok(Self { code, payload })
    }

    fn fixed(code: RequestCode, payload: &[u8]) -> Self {
        // Fixed payloads are a handful of bytes.
        Self {
            code,
            payload: Vec::from_slice(payload).unwrap_or_default(),
        }
    }

    pub fn heartbeat() -> Self {
        Self::fixed(RequestCode::Heartbeat, &[0x01])
    }

    pub fn get_info(key: InfoKey) -> Self {
        Self::fixed(RequestCode::GetInfo, &[key as u8])
    }

    pub fn set_label_density(density: u8) -> Self {
        Self::fixed(RequestCode::SetLabelDensity, &[density])
    }

    pub fn set_label_type(label_type: u8) -> Self {
        Self::fixed(RequestCode::SetLabelType, &[label_type])
    }

    pub fn start_print(total_pages: u16, page_color: u8) -> Self {
        let [hi, lo] = total_pages.to_be_bytes();
        Self::fixed(RequestCode::StartPrint, &[hi, lo, 0, 0, 0, 0, page_color])
    }

    pub fn start_page_print() -> Self {
        Self::fixed(RequestCode::StartPagePrint, &[0x01])
    }

    pub fn set_dimension(rows: u16, cols: u16, copies: u16) -> Self {
        let [r0, r1] = rows.to_be_bytes();
        let [c0, c1] = cols.to_be_bytes();
        let [n0, n1] = copies.to_be_bytes();
        Self::fixed(RequestCode::SetDimension, &[r0, r1, c0, c1, n0, n1])
    }

    /// One row of 1bpp pixels.  Bytes 2..5 are the per-third black pixel
    /// counts; the printer accepts zeros there.
    pub fn bitmap_row(row: u16, pixels: &[u8]) -> Result<Self, CodecError> {
        let [hi, lo] = row.to_be_bytes();
        let mut payload: Vec<u8, MAX_PAYLOAD> = Vec::new();
        payload
            .extend_from_slice(&[hi, lo, 0, 0, 0, 1])
            .and_then(|_| payload.extend_from_slice(pixels))
            .map_err(|_| CodecError::PayloadTooLarge)?;
        Ok(Self {
            code: RequestCode::PrintBitmapRow,
            payload,
        })
    }

    pub fn empty_row(row: u16, count: u8) -> Self {
        let [hi, lo] = row.to_be_bytes();
        Self::fixed(RequestCode::PrintEmptyRow, &[hi, lo, count])
    }

    pub fn end_page_print() -> Self {
        Self::fixed(RequestCode::EndPagePrint, &[0x01])
    }

    pub fn end_print() -> Self {
        Self::fixed(RequestCode::EndPrint, &[0x01])
    }

    pub fn get_print_status() -> Self {
        Self::fixed(RequestCode::GetPrintStatus, &[0x01])
    }

    /// Arbitrary payload, for request codes without a dedicated builder.
    pub fn raw(code: RequestCode, payload: &[u8]) -> Result<Self, CodecError> {
        Self::new(code, payload)
    }

    pub fn encode(&self) -> Result<Frame, CodecError> {
        packet::encode(self.code as u8, &self.payload)
    }
}

/// Payload size of a full-width bitmap row command.
pub const BITMAP_ROW_PAYLOAD: usize = 6 + ROW_BYTES;
