//! Bluetooth Low Energy subsystem.
//!
//! This module drives the Nordic SoftDevice S140 in **Central** role on
//! behalf of the library's link manager:
//!
//! 1. **Scanner** - bounded scan windows filtered on the printer address.
//! 2. **Connection** - connects with just-works security and bonding.
//! 3. **Printer Client** - GATT discovery of the printer service and the
//!    notification listener for one connection.
//! 4. **Radio** - executes the link manager's queued requests and turns
//!    their outcomes into `LinkEvent`s.
//!
//! Events that do not answer a request (notifications, pairing updates,
//! link loss) are posted on [`EVENTS`] for the radio task.

pub mod connection;
pub mod printer_client;
pub mod radio;
pub mod scanner;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use niimbot_ble::link::LinkEvent;

/// Unsolicited link events, consumed by the radio task.
pub static EVENTS: Channel<CriticalSectionRawMutex, LinkEvent, 8> = Channel::new();

/// The SoftDevice wrapper does not surface the HCI disconnect reason.
pub const REASON_UNKNOWN: u8 = 0x00;
