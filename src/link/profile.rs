//! Identifiers and per-connection GATT handles for the one printer link.

use core::fmt;

/// Connection handle assigned by the radio.
pub type ConnId = u16;

/// 6-byte device address, stored in display order
/// (`A4:93:40:A0:87:57` is `[0xA4, 0x93, ..]`).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BdAddr([u8; 6]);

impl BdAddr {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Radios hand addresses over least-significant octet first.
    pub fn from_le_bytes(mut bytes: [u8; 6]) -> Self {
        bytes.reverse();
        Self(bytes)
    }

    pub fn to_le_bytes(&self) -> [u8; 6] {
        let mut bytes = self.0;
        bytes.reverse();
        bytes
    }
}

impl fmt::Debug for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a, b, c, d, e, g
        )
    }
}

/// 128-bit UUID, stored little-endian as it appears over the air.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Uuid128([u8; 16]);

impl Uuid128 {
    /// From the canonical big-endian `u128` form
    /// (`0xe7810a71_73ae_...` for `e7810a71-73ae-...`).
    pub const fn from_u128(value: u128) -> Self {
        Self(value.to_le_bytes())
    }

    pub const fn from_le_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub const fn to_le_bytes(&self) -> [u8; 16] {
        self.0
    }
}

/// 16-bit SIG-assigned UUID.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Uuid16(pub u16);

/// Client Characteristic Configuration descriptor.
pub const CCCD_UUID: Uuid16 = Uuid16(0x2902);

/// CCCD value enabling notifications (little-endian `0x0001`).
pub const CCCD_ENABLE_NOTIFY: [u8; 2] = [0x01, 0x00];

/// Attribute handle range of a discovered service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HandleRange {
    pub start: u16,
    pub end: u16,
}

impl HandleRange {
    pub fn contains(&self, handle: u16) -> bool {
        (self.start..=self.end).contains(&handle)
    }
}

/// Link target plus the handles learned on the current connection.
///
/// Every handle is tied to the connection generation it was discovered
/// on.  [`LinkProfile::clear`] drops them all and bumps the generation, so
/// nothing learned on a previous connection can be used on the next one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkProfile {
    pub target: BdAddr,
    pub service_uuid: Uuid128,
    pub char_uuid: Uuid128,
    generation: u32,
    conn: Option<ConnId>,
    service: Option<HandleRange>,
    char_handle: Option<u16>,
    cccd_handle: Option<u16>,
    active: bool,
}

impl LinkProfile {
    pub const fn new(target: BdAddr, service_uuid: Uuid128, char_uuid: Uuid128) -> Self {
        Self {
            target,
            service_uuid,
            char_uuid,
            generation: 0,
            conn: None,
            service: None,
            char_handle: None,
            cccd_handle: None,
            active: false,
        }
    }

    /// Number of connections torn down so far.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn conn(&self) -> Option<ConnId> {
        self.conn
    }

    pub fn service(&self) -> Option<HandleRange> {
        self.service
    }

    pub fn char_handle(&self) -> Option<u16> {
        self.char_handle
    }

    pub fn cccd_handle(&self) -> Option<u16> {
        self.cccd_handle
    }

    /// Notifications are enabled and the characteristic may be written.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn set_conn(&mut self, conn: ConnId) {
        self.conn = Some(conn);
    }

    pub(crate) fn set_service(&mut self, range: HandleRange) {
        self.service = Some(range);
    }

    pub(crate) fn set_char_handle(&mut self, handle: u16) {
        self.char_handle = Some(handle);
    }

    pub(crate) fn set_cccd_handle(&mut self, handle: u16) {
        self.cccd_handle = Some(handle);
    }

    pub(crate) fn activate(&mut self) {
        self.active = true;
    }

    /// Forget the connection and all its handles.
    pub fn clear(&mut self) {
        self.conn = None;
        self.service = None;
        self.char_handle = None;
        self.cccd_handle = None;
        self.active = false;
        self.generation = self.generation.wrapping_add(1);
    }
}
