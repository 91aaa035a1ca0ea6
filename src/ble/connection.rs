//! Central connection setup with "just works" pairing and bonding.
//!
//! The printer is the only peer, so one bond slot is kept in RAM.  Key
//! exchange and security-mode updates are forwarded to the link manager
//! as events so they show up in the link log.

use core::cell::RefCell;

use defmt::{info, warn};
use embassy_time::{with_timeout, Duration};
use niimbot_ble::config;
use niimbot_ble::link::security::{self, IoCapability, KeyKind, SecurityRequest, JUST_WORKS};
use niimbot_ble::link::LinkEvent;
use nrf_softdevice::ble::security::{IoCapabilities, SecurityHandler};
use nrf_softdevice::ble::{
    central, Address, Connection, EncryptionInfo, IdentityKey, MasterId, SecurityMode,
};
use nrf_softdevice::raw;
use nrf_softdevice::Softdevice;
use static_cell::StaticCell;

use crate::ble::EVENTS;

struct PeerBond {
    master_id: MasterId,
    key: EncryptionInfo,
    peer_id: IdentityKey,
}

pub struct Bonder {
    peer: RefCell<Option<PeerBond>>,
}

impl Bonder {
    /// The one bonder for the firmware.  Must only be called once.
    pub fn take() -> &'static Bonder {
        static BONDER: StaticCell<Bonder> = StaticCell::new();
        BONDER.init(Bonder {
            peer: RefCell::new(None),
        })
    }
}

fn post(event: LinkEvent) {
    if EVENTS.try_send(event).is_err() {
        warn!("link event queue full, dropping security event");
    }
}

impl SecurityHandler for Bonder {
    fn io_capabilities(&self) -> IoCapabilities {
        match JUST_WORKS.io_caps {
            IoCapability::DisplayOnly => IoCapabilities::DisplayOnly,
            IoCapability::DisplayYesNo => IoCapabilities::DisplayYesNo,
            IoCapability::KeyboardOnly => IoCapabilities::KeyboardOnly,
            IoCapability::None => IoCapabilities::None,
            IoCapability::KeyboardDisplay => IoCapabilities::KeyboardDisplay,
        }
    }

    fn can_bond(&self, _conn: &Connection) -> bool {
        JUST_WORKS.bond
    }

    fn display_passkey(&self, passkey: &[u8; 6]) {
        let value = passkey
            .iter()
            .fold(0u32, |acc, d| acc * 10 + d.wrapping_sub(b'0') as u32);
        let _ = security::respond(SecurityRequest::PasskeyDisplay(value));
    }

    fn on_bonded(
        &self,
        conn: &Connection,
        master_id: MasterId,
        key: EncryptionInfo,
        peer_id: IdentityKey,
    ) {
        self.peer.replace(Some(PeerBond {
            master_id,
            key,
            peer_id,
        }));
        if let Some(handle) = conn.handle() {
            post(LinkEvent::KeyExchanged {
                conn: handle,
                kind: KeyKind::PeerEncryption,
            });
            post(LinkEvent::KeyExchanged {
                conn: handle,
                kind: KeyKind::PeerIdentity,
            });
        }
    }

    fn get_key(&self, _conn: &Connection, master_id: MasterId) -> Option<EncryptionInfo> {
        self.peer
            .borrow()
            .as_ref()
            .and_then(|p| (p.master_id == master_id).then_some(p.key))
    }

    fn get_peripheral_key(&self, conn: &Connection) -> Option<(MasterId, EncryptionInfo)> {
        self.peer.borrow().as_ref().and_then(|p| {
            p.peer_id
                .is_match(conn.peer_address())
                .then_some((p.master_id, p.key))
        })
    }

    fn on_security_update(&self, conn: &Connection, mode: SecurityMode) {
        info!("BLE security mode updated: {}", mode);
        if let Some(handle) = conn.handle() {
            let success = !matches!(mode, SecurityMode::NoAccess | SecurityMode::Open);
            post(LinkEvent::AuthComplete {
                conn: handle,
                success,
                reason: 0,
            });
        }
    }
}

/// Connect to `peer`, giving up after one scan window.
pub async fn connect(
    sd: &'static Softdevice,
    bonder: &'static Bonder,
    peer: &Address,
) -> Option<Connection> {
    let whitelist = [peer];
    let conn_cfg = central::ConnectConfig {
        scan_config: central::ScanConfig {
            whitelist: Some(&whitelist),
            interval: config::BLE_SCAN_INTERVAL as u32,
            window: config::BLE_SCAN_WINDOW as u32,
            ..Default::default()
        },
        conn_params: raw::ble_gap_conn_params_t {
            min_conn_interval: config::BLE_CONN_INTERVAL_MIN,
            max_conn_interval: config::BLE_CONN_INTERVAL_MAX,
            slave_latency: config::BLE_SLAVE_LATENCY,
            conn_sup_timeout: config::BLE_SUP_TIMEOUT,
        },
        ..Default::default()
    };

    let window = Duration::from_secs(config::BLE_SCAN_WINDOW_SECS as u64);
    match with_timeout(window, central::connect_with_security(sd, &conn_cfg, bonder)).await {
        Ok(Ok(conn)) => Some(conn),
        Ok(Err(_)) => {
            warn!("BLE connect failed");
            None
        }
        Err(_) => {
            warn!("BLE connect timed out");
            None
        }
    }
}
