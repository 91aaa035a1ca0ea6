//! Unified error type for niimbot-ble.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` (feature `defmt`) for efficient on-target
//! logging.

use core::fmt;

/// Top-level error type used across the library.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The built frame does not fit the encoder's staging buffer.
    InvalidSize,

    /// No transport attached, or a precondition on session state failed.
    InvalidState,

    /// An acknowledgment-required write was not confirmed in time.
    Timeout,

    /// The printer session has not seen a heartbeat response yet.
    NotReady,

    /// The printer answered with an explicit error packet.
    Device(u8),

    /// BLE link fault.
    Link(LinkError),

    /// Wire framing fault.
    Codec(CodecError),
}

/// Transport faults raised by the link manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// Local privacy could not be configured.
    PrivacyFailed,
    /// Scan could not start.
    ScanFailed,
    /// Connection attempt failed.
    ConnectFailed,
    /// MTU exchange failed.
    MtuFailed,
    /// The printer service is absent on the connected device.
    ServiceNotFound,
    /// The printer characteristic is absent (or cannot notify).
    CharacteristicNotFound,
    /// Notification registration failed.
    NotifyFailed,
    /// The CCCD write was refused.
    DescriptorWriteFailed,
    /// The radio refused a write request.
    WriteFailed,
    /// No characteristic handle yet: the link is not ready.
    NotReady,
    /// The event is not legal in the current link state.
    Rejected,
}

/// Framing faults reported by the packet codec.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodecError {
    /// Payload longer than the encoder accepts.
    PayloadTooLarge,
    /// Not enough bytes buffered for the declared frame.
    Incomplete,
    /// The first two bytes are not the start marker.
    BadStart,
    /// The end marker is missing where the length says it should be.
    BadEnd,
    /// Checksum byte disagrees with the frame contents.
    Checksum { expected: u8, actual: u8 },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidSize => f.write_str("frame does not fit the transmit buffer"),
            Error::InvalidState => f.write_str("invalid state"),
            Error::Timeout => f.write_str("write acknowledgment timed out"),
            Error::NotReady => f.write_str("printer not ready"),
            Error::Device(code) => write!(f, "printer error {:#04x}", code),
            Error::Link(e) => write!(f, "link: {:?}", e),
            Error::Codec(e) => write!(f, "codec: {:?}", e),
        }
    }
}

// Convenience conversions

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        match e {
            LinkError::NotReady => Error::InvalidState,
            other => Error::Link(other),
        }
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::PayloadTooLarge => Error::InvalidSize,
            other => Error::Codec(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_contract_errors_map_to_distinct_outcomes() {
        assert_eq!(Error::from(LinkError::NotReady), Error::InvalidState);
        assert_eq!(Error::from(CodecError::PayloadTooLarge), Error::InvalidSize);
        assert_eq!(
            Error::from(LinkError::ConnectFailed),
            Error::Link(LinkError::ConnectFailed)
        );
    }
}
