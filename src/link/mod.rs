//! BLE central link to the printer.
//!
//! The radio driver turns stack callbacks into [`LinkEvent`]s and hands
//! them, one at a time, to the [`LinkManager`] owned by a single task.
//! The manager answers with non-blocking requests on the [`Radio`] and
//! reports upward through a [`LinkObserver`].
//!
//! ```text
//!  Idle -> PrivacyConfigured -> Scanning -> Connecting -> Connected
//!       -> MtuNegotiated -> ServiceDiscovered -> CharacteristicDiscovered
//!       -> NotifySubscribed (link ready)
//!  any connected state --disconnect--> Scanning
//! ```

pub mod manager;
pub mod profile;
pub mod security;

use heapless::Vec;

use crate::config::MAX_MTU;
use crate::error::LinkError;
use profile::{BdAddr, ConnId, HandleRange, Uuid128, Uuid16};
use security::{KeyKind, SecurityReply, SecurityRequest};

pub use manager::LinkManager;

/// Attributes reported per discovery step.
pub const MAX_DISCOVERED: usize = 8;

/// Largest notification payload carried in a [`LinkEvent`].
pub const NOTIFY_CAPACITY: usize = MAX_MTU as usize - 3;

/// Link manager state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    /// Nothing configured yet.
    Idle,
    /// Privacy is set up; the scanner is not running.
    PrivacyConfigured,
    /// Looking for the target address.
    Scanning,
    /// Connection initiated to `peer`.
    Connecting { peer: BdAddr },
    /// Connection open, MTU exchange pending.
    Connected,
    /// MTU agreed, service search running.
    MtuNegotiated,
    /// Printer service located, characteristic search running.
    ServiceDiscovered,
    /// Printer characteristic located, subscription in progress.
    CharacteristicDiscovered,
    /// Notifications enabled: the link is ready.
    NotifySubscribed,
    /// Discovery failed; the connection stays open but unused until it drops.
    Stalled,
}

impl LinkState {
    /// A connection handle exists in this state.
    pub fn has_connection(&self) -> bool {
        !matches!(
            self,
            LinkState::Idle
                | LinkState::PrivacyConfigured
                | LinkState::Scanning
                | LinkState::Connecting { .. }
        )
    }
}

/// A characteristic found during discovery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiscoveredChar {
    /// `None` for 16-bit or otherwise unrecognised UUIDs.
    pub uuid: Option<Uuid128>,
    pub handle: u16,
    pub notify: bool,
}

/// A descriptor found under a characteristic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiscoveredDescriptor {
    /// `None` for 128-bit UUIDs.
    pub uuid: Option<Uuid16>,
    pub handle: u16,
}

/// Everything the radio can tell the link manager.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkEvent {
    PrivacyConfigured { ok: bool },
    ScanStarted { ok: bool },
    /// The bounded scan window closed without a connection.
    ScanWindowElapsed,
    Advertisement { addr: BdAddr },
    Opened { conn: ConnId, ok: bool },
    MtuConfigured { conn: ConnId, ok: bool, mtu: u16 },
    ServiceFound { conn: ConnId, uuid: Uuid128, range: HandleRange },
    ServiceSearchComplete { conn: ConnId, ok: bool },
    CharacteristicsDiscovered {
        conn: ConnId,
        ok: bool,
        chars: Vec<DiscoveredChar, MAX_DISCOVERED>,
    },
    NotifyRegistered { conn: ConnId, ok: bool, handle: u16 },
    DescriptorsDiscovered {
        conn: ConnId,
        ok: bool,
        descriptors: Vec<DiscoveredDescriptor, MAX_DISCOVERED>,
    },
    /// A write with response finished (characteristic or descriptor).
    WriteComplete { conn: ConnId, handle: u16, ok: bool },
    Notification {
        conn: ConnId,
        handle: u16,
        data: Vec<u8, NOTIFY_CAPACITY>,
    },
    Security { conn: ConnId, request: SecurityRequest },
    KeyExchanged { conn: ConnId, kind: KeyKind },
    AuthComplete { conn: ConnId, success: bool, reason: u8 },
    ServiceChanged { conn: ConnId },
    Disconnected { conn: ConnId, reason: u8 },
}

impl LinkEvent {
    /// Connection the event belongs to, if any.
    pub fn conn(&self) -> Option<ConnId> {
        use LinkEvent::*;
        match *self {
            PrivacyConfigured { .. } | ScanStarted { .. } | ScanWindowElapsed | Advertisement { .. } => {
                None
            }
            Opened { conn, .. }
            | MtuConfigured { conn, .. }
            | ServiceFound { conn, .. }
            | ServiceSearchComplete { conn, .. }
            | CharacteristicsDiscovered { conn, .. }
            | NotifyRegistered { conn, .. }
            | DescriptorsDiscovered { conn, .. }
            | WriteComplete { conn, .. }
            | Notification { conn, .. }
            | Security { conn, .. }
            | KeyExchanged { conn, .. }
            | AuthComplete { conn, .. }
            | ServiceChanged { conn }
            | Disconnected { conn, .. } => Some(conn),
        }
    }
}

/// Requests the link manager issues to the BLE stack.
///
/// Every method only queues work and returns immediately; the outcome
/// comes back later as a [`LinkEvent`].  An `Err` means the request could
/// not even be issued.
pub trait Radio {
    fn configure_privacy(&mut self) -> Result<(), LinkError>;
    /// Apply scan parameters and start a bounded scan window.
    fn start_scan(&mut self) -> Result<(), LinkError>;
    fn stop_scan(&mut self);
    fn connect(&mut self, peer: BdAddr) -> Result<(), LinkError>;
    fn disconnect(&mut self, conn: ConnId);
    fn exchange_mtu(&mut self, conn: ConnId, mtu: u16) -> Result<(), LinkError>;
    fn discover_services(&mut self, conn: ConnId, uuid: Uuid128) -> Result<(), LinkError>;
    fn discover_characteristics(&mut self, conn: ConnId, range: HandleRange)
        -> Result<(), LinkError>;
    fn register_notify(&mut self, conn: ConnId, handle: u16) -> Result<(), LinkError>;
    fn discover_descriptors(
        &mut self,
        conn: ConnId,
        char_handle: u16,
        range: HandleRange,
    ) -> Result<(), LinkError>;
    fn write(
        &mut self,
        conn: ConnId,
        handle: u16,
        data: &[u8],
        require_ack: bool,
    ) -> Result<(), LinkError>;
    fn reply_security(&mut self, conn: ConnId, reply: SecurityReply);
}

/// Upward notifications from the link manager.  Called synchronously
/// from the event path, so implementations must not block.
pub trait LinkObserver {
    /// Notifications are enabled on the printer characteristic.
    fn on_link_ready(&mut self);
    /// Raw notification payload from the printer.
    fn on_data(&mut self, data: &[u8]);
    /// A write with response to the printer characteristic finished.
    fn on_write_complete(&mut self, ok: bool);
    /// The connection dropped; scanning has been restarted.
    fn on_disconnected(&mut self);
}
