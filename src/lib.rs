//! Host-testable core of the niimbot-ble label printer controller.
//!
//! Everything that decides what goes over the air lives here: the
//! Niimbot packet codec, the printer session, the BLE link state machine
//! and the bridge that ties them together.  None of it touches hardware,
//! so the whole crate runs under `cargo test` on the host.
//!
//! Usage: `cargo test` (unit + integration tests)
//!
//! Note: The embedded binary (`src/main.rs`, feature `embedded`) owns the
//! SoftDevice radio driver and task wiring, and pulls all of its logic
//! from this library.
//!
//! ```text
//!  SoftDevice -> ble::Driver -> LinkEvent -> link::LinkManager
//!                                               |  LinkObserver
//!                                               v
//!                                         bridge::Shared (session)
//!                                               ^  Transport
//!                                               |
//!  print trigger ------------------------> printer::Printer
//! ```

#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
#[macro_use]
mod fmt;

pub mod bridge;
pub mod config;
pub mod error;
pub mod image;
pub mod link;
pub mod printer;
pub mod protocol;
pub mod session;

pub use bridge::{Feedback, LinkTransport, Outbound, Shared};
pub use error::{CodecError, Error, LinkError};
pub use link::{LinkEvent, LinkManager, LinkObserver, LinkState, Radio};
pub use printer::{Printer, Transport};
pub use session::{PrinterSession, SessionEvent, SessionState};
