//! Pairing policy: "just works" for the single trusted printer.
//!
//! Every request is answered affirmatively without user interaction and
//! outcomes are only logged.  The address filter in the scanner is the
//! only thing that decides which device we pair with.

use crate::config::BLE_MAX_KEY_SIZE;

/// IO capabilities advertised during pairing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IoCapability {
    DisplayOnly,
    DisplayYesNo,
    KeyboardOnly,
    None,
    KeyboardDisplay,
}

/// Security manager parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SecurityParams {
    pub bond: bool,
    pub mitm: bool,
    pub secure_connections: bool,
    pub io_caps: IoCapability,
    pub oob: bool,
    pub max_key_size: u8,
}

pub const JUST_WORKS: SecurityParams = SecurityParams {
    bond: true,
    mitm: false,
    secure_connections: true,
    io_caps: IoCapability::None,
    oob: false,
    max_key_size: BLE_MAX_KEY_SIZE,
};

/// A prompt raised by the security manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SecurityRequest {
    /// Peer asked us to start pairing.
    Pairing,
    /// Peer wants a passkey entered.
    PasskeyEntry,
    /// Passkey shown for confirmation on the peer.
    PasskeyDisplay(u32),
    /// LE Secure Connections numeric comparison.
    NumericComparison(u32),
    /// Out-of-band temporary key requested.
    OutOfBand,
}

/// Answer sent back to the security manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SecurityReply {
    /// Accept the pairing request.
    Accept,
    /// Confirm a numeric comparison.
    Confirm,
    /// Fixed passkey / temporary key.
    Key([u8; 16]),
    /// Nothing to send.
    None,
}

/// Keys distributed at the end of pairing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KeyKind {
    PeerEncryption,
    PeerIdentity,
    PeerSigning,
    LocalEncryption,
    LocalIdentity,
    LocalSigning,
    LinkKey,
}

/// Temporary key used when the stack insists on one.
const FIXED_TK: [u8; 16] = [1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];

/// Decide how to answer `request`.  Always affirmative.
pub fn respond(request: SecurityRequest) -> SecurityReply {
    match request {
        SecurityRequest::Pairing => {
            info!("security: pairing request accepted");
            SecurityReply::Accept
        }
        SecurityRequest::NumericComparison(passkey) => {
            info!("security: numeric comparison {}, confirming", passkey);
            SecurityReply::Confirm
        }
        SecurityRequest::PasskeyDisplay(passkey) => {
            info!("security: passkey notify {}", passkey);
            SecurityReply::None
        }
        SecurityRequest::PasskeyEntry => {
            info!("security: passkey request");
            SecurityReply::Key(FIXED_TK)
        }
        SecurityRequest::OutOfBand => {
            info!("security: OOB request");
            SecurityReply::Key(FIXED_TK)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_prompt_is_answered_without_rejection() {
        assert_eq!(respond(SecurityRequest::Pairing), SecurityReply::Accept);
        assert_eq!(
            respond(SecurityRequest::NumericComparison(123456)),
            SecurityReply::Confirm
        );
        assert_eq!(respond(SecurityRequest::PasskeyDisplay(1)), SecurityReply::None);
        assert!(matches!(
            respond(SecurityRequest::OutOfBand),
            SecurityReply::Key(_)
        ));
        assert!(matches!(
            respond(SecurityRequest::PasskeyEntry),
            SecurityReply::Key(_)
        ));
    }

    #[test]
    fn just_works_needs_no_io() {
        assert_eq!(JUST_WORKS.io_caps, IoCapability::None);
        assert!(JUST_WORKS.bond);
        assert!(!JUST_WORKS.oob);
        assert_eq!(JUST_WORKS.max_key_size, 16);
    }
}
