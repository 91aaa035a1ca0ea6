//! BLE GATT client for the Niimbot printer service.
//!
//! Discovery is done in one pass by the SoftDevice wrapper: it locates
//! the service by UUID and reports every characteristic with its
//! descriptors.  [`PrinterClient`] records what it saw so the radio can
//! answer the link manager's step-by-step discovery requests.
//!
//! The notification listener runs in its own task for the lifetime of a
//! connection and reports link loss when the connection closes.

use defmt::{info, warn};
use heapless::Vec;
use niimbot_ble::config::{PRINTER_CHAR_UUID, PRINTER_SERVICE_UUID};
use niimbot_ble::link::profile::{HandleRange, CCCD_UUID};
use niimbot_ble::link::{
    DiscoveredChar, DiscoveredDescriptor, LinkEvent, MAX_DISCOVERED, NOTIFY_CAPACITY,
};
use nrf_softdevice::ble::gatt_client::{self, Characteristic, Client, Descriptor, DiscoverError};
use nrf_softdevice::ble::{Connection, HvxType, Uuid};

use crate::ble::{EVENTS, REASON_UNKNOWN};

/// Hand-written client: the characteristic UUIDs are 128-bit vendor
/// UUIDs and we want raw handles, not typed accessors.
pub struct PrinterClient {
    chars: Vec<DiscoveredChar, MAX_DISCOVERED>,
    /// `(characteristic value handle, descriptor)`.
    descriptors: Vec<(u16, DiscoveredDescriptor), MAX_DISCOVERED>,
    range: Option<HandleRange>,
}

/// A notification from the printer.
pub struct Notified {
    pub handle: u16,
    pub data: Vec<u8, NOTIFY_CAPACITY>,
}

impl PrinterClient {
    pub fn characteristics(&self) -> Vec<DiscoveredChar, MAX_DISCOVERED> {
        self.chars.clone()
    }

    pub fn descriptors_of(&self, char_handle: u16) -> Vec<DiscoveredDescriptor, MAX_DISCOVERED> {
        self.descriptors
            .iter()
            .filter(|(owner, _)| *owner == char_handle)
            .map(|(_, d)| *d)
            .collect()
    }

    /// Handles spanned by what was discovered.
    pub fn range(&self) -> HandleRange {
        self.range.unwrap_or(HandleRange {
            start: 0x0001,
            end: 0xFFFF,
        })
    }

    fn widen(&mut self, handle: u16) {
        let range = self.range.get_or_insert(HandleRange {
            start: handle,
            end: handle,
        });
        range.start = range.start.min(handle);
        range.end = range.end.max(handle);
    }
}

impl Client for PrinterClient {
    type Event = Notified;

    fn uuid() -> Uuid {
        Uuid::new_128(&PRINTER_SERVICE_UUID.to_le_bytes())
    }

    fn new_undiscovered(_conn: Connection) -> Self {
        Self {
            chars: Vec::new(),
            descriptors: Vec::new(),
            range: None,
        }
    }

    fn discovered_characteristic(
        &mut self,
        characteristic: &Characteristic,
        descriptors: &[Descriptor],
    ) {
        let printer_char = Uuid::new_128(&PRINTER_CHAR_UUID.to_le_bytes());
        let cccd = Uuid::new_16(CCCD_UUID.0);

        let found = DiscoveredChar {
            uuid: (characteristic.uuid == Some(printer_char)).then_some(PRINTER_CHAR_UUID),
            handle: characteristic.handle_value,
            notify: characteristic.props.notify() != 0,
        };
        self.widen(characteristic.handle_decl);
        self.widen(characteristic.handle_value);

        for descriptor in descriptors {
            self.widen(descriptor.handle);
            let entry = DiscoveredDescriptor {
                uuid: (descriptor.uuid == Some(cccd)).then_some(CCCD_UUID),
                handle: descriptor.handle,
            };
            if self.descriptors.push((found.handle, entry)).is_err() {
                warn!("too many descriptors, ignoring handle {}", descriptor.handle);
            }
        }
        if self.chars.push(found).is_err() {
            warn!("too many characteristics, ignoring handle {}", found.handle);
        }
    }

    fn discovery_complete(&mut self) -> Result<(), DiscoverError> {
        // Missing characteristics are judged by the link manager.
        Ok(())
    }

    fn on_hvx(
        &self,
        _conn: &Connection,
        type_: HvxType,
        handle: u16,
        data: &[u8],
    ) -> Option<Self::Event> {
        if !matches!(type_, HvxType::Notification) {
            return None;
        }
        let n = data.len().min(NOTIFY_CAPACITY);
        if n < data.len() {
            warn!("notification truncated from {} to {} bytes", data.len(), n);
        }
        let mut buf = Vec::new();
        let _ = buf.extend_from_slice(&data[..n]);
        Some(Notified { handle, data: buf })
    }
}

/// Discover the printer service on `conn`.
pub async fn discover(conn: &Connection) -> Result<PrinterClient, DiscoverError> {
    info!("Discovering printer service...");
    gatt_client::discover::<PrinterClient>(conn).await
}

/// Forward notifications on `conn` until it closes, then report the loss.
#[embassy_executor::task]
pub async fn notify_task(conn: Connection) {
    let Some(id) = conn.handle() else {
        return;
    };
    info!("notification listener started on connection {}", id);

    let listener = PrinterClient::new_undiscovered(conn.clone());
    let _ = gatt_client::run(&conn, &listener, |event| {
        let event = LinkEvent::Notification {
            conn: id,
            handle: event.handle,
            data: event.data,
        };
        if EVENTS.try_send(event).is_err() {
            warn!("link event queue full, dropping notification");
        }
    })
    .await;

    info!("notification listener ended (connection {} closed)", id);
    EVENTS
        .send(LinkEvent::Disconnected {
            conn: id,
            reason: REASON_UNKNOWN,
        })
        .await;
}
