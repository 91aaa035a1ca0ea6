//! Printer session - protocol state for one BLE link.
//!
//! Owns the receive buffer, readiness flag and last known status.  The
//! BLE side feeds raw notification bytes into [`PrinterSession::feed`];
//! the session reassembles them into packets, validates them and maps
//! each response to a state change or a log line.
//!
//! ```text
//!  Disconnected --link ready--> AwaitingHeartbeat --0xDD--> Ready
//!        ^                                                   |
//!        +-------------------- disconnect -------------------+
//! ```
//!
//! This type does no I/O and never blocks; the async command path lives
//! in [`crate::printer`].

pub mod buffer;
pub mod status;

use crate::config::FRAME_OVERHEAD;
use crate::protocol::packet::{self, Decoded, Packet, START_MARKER};
use crate::protocol::response::Response;
use buffer::RxBuffer;
use status::{HeartbeatLayout, PrinterStatus};

/// Session readiness.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionState {
    /// No subscribed link.
    Disconnected,
    /// Link is up, heartbeat sent, no reply seen yet.
    AwaitingHeartbeat,
    /// A heartbeat reply arrived on this link.
    Ready,
}

/// Something the session wants its owner to know about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionEvent {
    /// First heartbeat reply on this connection.  Fires once per link.
    Ready,
    /// The printer reported an error packet.
    DeviceError(u8),
    /// A per-command acknowledgment came back negative.
    CommandRejected(u8),
}

pub struct PrinterSession {
    state: SessionState,
    status: PrinterStatus,
    rx: RxBuffer,
    last_error: Option<u8>,
}

impl PrinterSession {
    pub const fn new() -> Self {
        Self {
            state: SessionState::Disconnected,
            status: PrinterStatus {
                closing_state: None,
                power_level: None,
                paper_state: None,
                rfid_read_state: None,
            },
            rx: RxBuffer::new(),
            last_error: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    pub fn status(&self) -> &PrinterStatus {
        &self.status
    }

    /// Error code of the last device error packet, cleared on read.
    pub fn take_device_error(&mut self) -> Option<u8> {
        self.last_error.take()
    }

    /// Bytes currently held for reassembly.
    pub fn buffered(&self) -> usize {
        self.rx.len()
    }

    /// The link manager subscribed to the printer characteristic.
    pub fn on_link_ready(&mut self) {
        self.reset();
        self.state = SessionState::AwaitingHeartbeat;
        info!("session: link ready, awaiting heartbeat");
    }

    /// The link dropped: forget everything learned on it.
    pub fn on_disconnect(&mut self) {
        self.reset();
        info!("session: disconnected");
    }

    fn reset(&mut self) {
        self.state = SessionState::Disconnected;
        self.status = PrinterStatus::default();
        self.rx.clear();
        self.last_error = None;
    }

    /// Append inbound bytes and dispatch every complete packet.
    ///
    /// `on_event` is invoked synchronously for readiness and error
    /// notifications.  Returns the number of packets dispatched.
    pub fn feed(&mut self, data: &[u8], mut on_event: impl FnMut(SessionEvent)) -> usize {
        if self.rx.append(data) {
            warn!(
                "session: receive buffer overflow, dropped stream ({} new bytes)",
                data.len()
            );
        }

        let mut dispatched = 0;
        while self.rx.len() >= FRAME_OVERHEAD {
            // Drop pre-sync garbage.  Keep a trailing 0x55 in case it is
            // the first half of a marker.
            let skip = self
                .rx
                .find(START_MARKER)
                .unwrap_or(self.rx.len().saturating_sub(1));
            if skip > 0 {
                debug!("session: discarding {} bytes before start marker", skip);
                self.rx.consume(skip);
            }
            if self.rx.len() < FRAME_OVERHEAD {
                break;
            }

            match packet::decode(self.rx.as_slice()) {
                Decoded::Packet { packet, consumed } => {
                    self.rx.consume(consumed);
                    self.dispatch(&packet, &mut on_event);
                    dispatched += 1;
                }
                Decoded::Incomplete => {
                    if let Some(total) = packet::declared_len(self.rx.as_slice()) {
                        if total > self.rx.capacity() {
                            warn!("session: declared frame of {} bytes cannot fit", total);
                            self.rx.consume(1);
                            continue;
                        }
                    }
                    break;
                }
                Decoded::Invalid(e) => {
                    warn!("session: invalid frame ({:?}), resynchronising", e);
                    self.rx.consume(1);
                }
            }
        }
        dispatched
    }

    fn dispatch(&mut self, packet: &Packet, on_event: &mut impl FnMut(SessionEvent)) {
        debug!(
            "session: response type={:#x} len={}",
            packet.kind,
            packet.payload.len()
        );

        match Response::classify(packet) {
            Response::DeviceError(code) => {
                error!("session: printer error {:#x}", code);
                self.last_error = Some(code);
                on_event(SessionEvent::DeviceError(code));
            }
            Response::Heartbeat(data) => {
                match self.status.apply_heartbeat(data) {
                    HeartbeatLayout::Known(_) => info!(
                        "session: heartbeat status {:?}",
                        self.status
                    ),
                    HeartbeatLayout::Unrecognized(len) => {
                        warn!("session: unrecognised heartbeat length {}", len)
                    }
                    HeartbeatLayout::Short(_) => {}
                }
                if self.state != SessionState::Ready {
                    self.state = SessionState::Ready;
                    info!("session: printer ready");
                    on_event(SessionEvent::Ready);
                }
            }
            Response::Battery(level) => info!("session: battery {}%", level),
            Response::DeviceType(model) => info!("session: device type {} (B1 = 4096)", model),
            Response::Info { key, value } => {
                info!("session: info {:?} = {:?}", key, value)
            }
            Response::PrintStatus {
                page,
                progress1,
                progress2,
            } => info!(
                "session: print status page={} progress={}/{}",
                page, progress1, progress2
            ),
            Response::Ack { command, success } => {
                info!("session: {:?} success={}", command, success);
                if !success {
                    on_event(SessionEvent::CommandRejected(command as u8));
                }
            }
            Response::Unknown { kind, payload } => {
                info!("session: unknown response {:#x} {:?}", kind, payload)
            }
        }
    }
}

impl Default for PrinterSession {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════
