//! Application-wide constants and compile-time configuration.
//!
//! Protocol geometry, timing parameters and BLE tuning live here so they
//! can be adjusted in one place.  The printer address and MTU are the
//! only runtime inputs; see [`LinkConfig`].

use embassy_time::Duration;

use crate::error::Error;
use crate::link::profile::{BdAddr, Uuid128};

// Printer (Niimbot B1)

/// Printable width in dots (limited by the printhead).
pub const PAPER_WIDTH_DOTS: u16 = 384;

/// Label height in dots (30 mm @ 203 DPI).
pub const PAPER_HEIGHT_DOTS: u16 = 240;

/// Printhead resolution.
pub const PRINTER_DPI: u16 = 203;

/// Bytes in one 1-bit-per-pixel printer row.
pub const ROW_BYTES: usize = PAPER_WIDTH_DOTS as usize / 8;

/// Rows between progress log lines while streaming an image.
pub const PROGRESS_LOG_ROWS: u16 = 60;

/// Interval between keep-alive status queries while idle.
pub const PING_INTERVAL: Duration = Duration::from_millis(5000);

// Protocol

/// Capacity of the inbound reassembly buffer.
pub const RX_BUFFER_CAPACITY: usize = 512;

/// Largest frame the transmit path stages.
pub const FRAME_CAPACITY: usize = 255;

/// Frame overhead: 2 start + type + length + checksum + 2 end.
pub const FRAME_OVERHEAD: usize = 7;

/// Largest payload accepted by the encoder.
pub const MAX_PAYLOAD: usize = FRAME_CAPACITY - FRAME_OVERHEAD;

/// Largest payload a received frame can declare (one length byte).
pub const MAX_INBOUND_PAYLOAD: usize = u8::MAX as usize;

// BLE

/// Printer service `e7810a71-73ae-499d-8c15-faa9aef0c3f2`.
pub const PRINTER_SERVICE_UUID: Uuid128 = Uuid128::from_u128(0xe7810a71_73ae_499d_8c15_faa9aef0c3f2);

/// Printer data characteristic `bef8d6c9-9c21-4c9e-b632-bd58c1009f9f`.
pub const PRINTER_CHAR_UUID: Uuid128 = Uuid128::from_u128(0xbef8d6c9_9c21_4c9e_b632_bd58c1009f9f);

/// Default ATT MTU requested after connecting.
pub const DEFAULT_MTU: u16 = 247;

/// ATT MTU bounds accepted from `PRINTER_MTU`.  The upper bound sizes
/// the notification buffer.
pub const MIN_MTU: u16 = 23;
pub const MAX_MTU: u16 = 247;

/// Length of the first scan window (seconds).  Scanning restarts every
/// time a window elapses without finding the printer.
pub const BLE_SCAN_WINDOW_SECS: u16 = 30;

/// Scan interval / window (in 0.625 ms units).
pub const BLE_SCAN_INTERVAL: u16 = 0x50;
pub const BLE_SCAN_WINDOW: u16 = 0x30;

/// BLE connection interval range (in 1.25 ms units).
pub const BLE_CONN_INTERVAL_MIN: u16 = 24;
pub const BLE_CONN_INTERVAL_MAX: u16 = 40;

/// BLE slave latency (number of connection events the peripheral can skip).
pub const BLE_SLAVE_LATENCY: u16 = 0;

/// BLE supervision timeout (in 10 ms units). 400 = 4 s.
pub const BLE_SUP_TIMEOUT: u16 = 400;

/// Maximum encryption key size offered during pairing.
pub const BLE_MAX_KEY_SIZE: u8 = 16;

// Print trigger

/// Button debounce time (ms).
pub const BUTTON_DEBOUNCE_MS: u64 = 50;

/// Quiet period after a print before the next trigger is served.
pub const PRINT_COOLDOWN: Duration = Duration::from_secs(2);

/// How long the status LED flashes after a failed print.
pub const ERROR_BLINK_DURATION: Duration = Duration::from_secs(2);

/// Half-period of the error flash.
pub const ERROR_BLINK_PERIOD: Duration = Duration::from_millis(100);

/// Runtime link inputs, provided once at initialisation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkConfig {
    /// Hardware address of the one printer we talk to.
    pub target: BdAddr,
    /// ATT MTU to negotiate.
    pub mtu: u16,
}

impl LinkConfig {
    pub const fn new(target: BdAddr) -> Self {
        Self {
            target,
            mtu: DEFAULT_MTU,
        }
    }

    /// Build from the `PRINTER_BDA` / `PRINTER_MTU` strings baked in at
    /// compile time.
    pub fn from_strs(bda: &str, mtu: Option<&str>) -> Result<Self, Error> {
        let target = parse_bdaddr(bda)?;
        let mtu = match mtu {
            Some(s) => s.trim().parse::<u16>().map_err(|_| Error::InvalidState)?,
            None => DEFAULT_MTU,
        };
        if !(MIN_MTU..=MAX_MTU).contains(&mtu) {
            return Err(Error::InvalidState);
        }
        Ok(Self { target, mtu })
    }
}

/// Label settings sent at the start of every print.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PrintSettings {
    /// Print density, 1..=5 (3 = medium).
    pub density: u8,
    /// Label type (1 = labels with gaps).
    pub label_type: u8,
}

impl Default for PrintSettings {
    fn default() -> Self {
        Self {
            density: 3,
            label_type: 1,
        }
    }
}

/// Settle delays and the write acknowledgment timeout.
///
/// The delays are empirical: the printer needs time to digest each
/// setup command and to feed the label before the job is closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrintTiming {
    /// Pause after each setup command.
    pub settle: Duration,
    /// Pause after the last row, before ending the page.
    pub before_end_page: Duration,
    /// Pause after ending the page, before ending the print.
    pub before_end_print: Duration,
    /// Bounded wait for a write acknowledgment.
    pub write_timeout: Duration,
}

impl Default for PrintTiming {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(10),
            before_end_page: Duration::from_millis(100),
            before_end_print: Duration::from_millis(2000),
            write_timeout: Duration::from_millis(1000),
        }
    }
}

/// Parse `"AA:BB:CC:DD:EE:FF"` into an address in display order.
pub fn parse_bdaddr(s: &str) -> Result<BdAddr, Error> {
    let mut bytes = [0u8; 6];
    let mut parts = s.trim().split(':');
    for byte in bytes.iter_mut() {
        let part = parts.next().ok_or(Error::InvalidState)?;
        if part.len() != 2 {
            return Err(Error::InvalidState);
        }
        *byte = u8::from_str_radix(part, 16).map_err(|_| Error::InvalidState)?;
    }
    if parts.next().is_some() {
        return Err(Error::InvalidState);
    }
    Ok(BdAddr::new(bytes))
}
