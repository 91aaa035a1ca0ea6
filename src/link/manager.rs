//! Link manager: the `(state, event)` transition table.

use crate::config::{LinkConfig, PRINTER_CHAR_UUID, PRINTER_SERVICE_UUID};
use crate::error::LinkError;
use crate::link::profile::{ConnId, LinkProfile, CCCD_ENABLE_NOTIFY, CCCD_UUID};
use crate::link::security;
use crate::link::{LinkEvent, LinkObserver, LinkState, Radio};

pub struct LinkManager {
    state: LinkState,
    profile: LinkProfile,
    mtu: u16,
}

impl LinkManager {
    pub fn new(config: LinkConfig) -> Self {
        Self {
            state: LinkState::Idle,
            profile: LinkProfile::new(config.target, PRINTER_SERVICE_UUID, PRINTER_CHAR_UUID),
            mtu: config.mtu,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn profile(&self) -> &LinkProfile {
        &self.profile
    }

    /// The printer characteristic is subscribed and writable.
    pub fn is_ready(&self) -> bool {
        self.state == LinkState::NotifySubscribed
    }

    /// Kick off the bring-up: configure privacy.  Scanning follows once
    /// the radio confirms.
    pub fn start(&mut self, radio: &mut impl Radio) -> Result<(), LinkError> {
        if self.state != LinkState::Idle {
            warn!("link: start ignored in {:?}", self.state);
            return Err(LinkError::Rejected);
        }
        info!("link: configuring privacy, target {:?}", self.profile.target);
        radio.configure_privacy().map_err(|e| {
            error!("link: privacy request failed: {:?}", e);
            LinkError::PrivacyFailed
        })
    }

    /// Write `data` to the printer characteristic.
    ///
    /// Without a subscribed characteristic this performs no I/O and
    /// returns [`LinkError::NotReady`].
    pub fn send(
        &mut self,
        radio: &mut impl Radio,
        data: &[u8],
        require_ack: bool,
    ) -> Result<(), LinkError> {
        let (Some(conn), Some(handle)) = (self.profile.conn(), self.profile.char_handle()) else {
            error!("link: characteristic not available, dropping {} bytes", data.len());
            return Err(LinkError::NotReady);
        };
        if !self.profile.is_active() {
            error!("link: notifications not enabled yet, dropping {} bytes", data.len());
            return Err(LinkError::NotReady);
        }
        trace!("link: write {} bytes ack={}", data.len(), require_ack);
        radio.write(conn, handle, data, require_ack).map_err(|e| {
            error!("link: write failed: {:?}", e);
            LinkError::WriteFailed
        })
    }

    /// Apply one radio event.
    ///
    /// Returns `Err(Rejected)` for events that are not legal in the
    /// current state (state is left untouched) and the matching
    /// [`LinkError`] for transport faults.
    pub fn handle(
        &mut self,
        event: LinkEvent,
        radio: &mut impl Radio,
        observer: &mut impl LinkObserver,
    ) -> Result<(), LinkError> {
        if let (Some(current), Some(conn)) = (self.profile.conn(), event.conn()) {
            if current != conn {
                warn!("link: event for stale connection {} (current {})", conn, current);
                return Err(LinkError::Rejected);
            }
        }

        use LinkEvent as E;
        use LinkState as S;

        match (self.state, event) {
            // Privacy and scanning
            (S::Idle, E::PrivacyConfigured { ok: true }) => {
                info!("link: privacy configured");
                self.state = S::PrivacyConfigured;
                self.begin_scan(radio)
            }
            (S::Idle, E::PrivacyConfigured { ok: false }) => {
                error!("link: privacy configuration failed");
                Err(LinkError::PrivacyFailed)
            }
            (S::Scanning, E::ScanStarted { ok: true }) => {
                info!("link: scanning started");
                Ok(())
            }
            (S::Scanning, E::ScanStarted { ok: false }) => {
                error!("link: scan start failed");
                self.state = S::PrivacyConfigured;
                Err(LinkError::ScanFailed)
            }
            (S::PrivacyConfigured | S::Scanning, E::ScanWindowElapsed) => {
                debug!("link: scan window elapsed, restarting");
                self.begin_scan(radio)
            }
            (S::Scanning, E::Advertisement { addr }) if addr == self.profile.target => {
                info!("link: target {:?} found, connecting", addr);
                radio.stop_scan();
                match radio.connect(addr) {
                    Ok(()) => {
                        self.state = S::Connecting { peer: addr };
                        Ok(())
                    }
                    Err(e) => {
                        error!("link: connect request failed: {:?}", e);
                        // Failure to scan again is reported by begin_scan.
                        let _ = self.begin_scan(radio);
                        Err(LinkError::ConnectFailed)
                    }
                }
            }
            (_, E::Advertisement { .. }) => Ok(()),

            // Connection setup
            (S::Connecting { .. }, E::Opened { conn, ok: true }) => {
                info!("link: connection {} open, requesting MTU {}", conn, self.mtu);
                self.profile.set_conn(conn);
                self.state = S::Connected;
                let mtu = self.mtu;
                self.request(radio, conn, LinkError::MtuFailed, |r| {
                    r.exchange_mtu(conn, mtu)
                })
            }
            (S::Connecting { peer }, E::Opened { ok: false, .. }) => {
                error!("link: connection to {:?} failed, rescanning", peer);
                // Failure to scan again is reported by begin_scan.
                let _ = self.begin_scan(radio);
                Err(LinkError::ConnectFailed)
            }
            (S::Connected, E::MtuConfigured { conn, ok, mtu }) => {
                if ok {
                    info!("link: MTU configured: {}", mtu);
                } else {
                    warn!("link: MTU exchange failed, keeping default");
                }
                self.state = S::MtuNegotiated;
                let uuid = self.profile.service_uuid;
                self.request(radio, conn, LinkError::ServiceNotFound, |r| {
                    r.discover_services(conn, uuid)
                })
            }

            // Discovery
            (S::MtuNegotiated, E::ServiceFound { uuid, range, .. }) => {
                if uuid == self.profile.service_uuid {
                    info!("link: printer service found {:?}", range);
                    self.profile.set_service(range);
                } else {
                    debug!("link: ignoring service {:?}", uuid);
                }
                Ok(())
            }
            (S::MtuNegotiated, E::ServiceSearchComplete { conn, ok }) => {
                if !ok {
                    error!("link: service search failed");
                    return self.stall(LinkError::ServiceNotFound);
                }
                let Some(range) = self.profile.service() else {
                    error!("link: printer service not found");
                    return self.stall(LinkError::ServiceNotFound);
                };
                info!("link: service search complete");
                self.state = S::ServiceDiscovered;
                self.request(radio, conn, LinkError::CharacteristicNotFound, |r| {
                    r.discover_characteristics(conn, range)
                })
            }
            (S::ServiceDiscovered, E::CharacteristicsDiscovered { conn, ok, chars }) => {
                let target = self.profile.char_uuid;
                let found = chars.iter().find(|c| c.uuid == Some(target));
                let Some(found) = found.filter(|_| ok) else {
                    error!("link: printer characteristic not found");
                    return self.stall(LinkError::CharacteristicNotFound);
                };
                info!("link: printer characteristic at handle {}", found.handle);
                self.profile.set_char_handle(found.handle);
                self.state = S::CharacteristicDiscovered;
                if !found.notify {
                    error!("link: printer characteristic cannot notify");
                    return self.stall(LinkError::NotifyFailed);
                }
                let handle = found.handle;
                self.request(radio, conn, LinkError::NotifyFailed, |r| {
                    r.register_notify(conn, handle)
                })
            }
            (S::CharacteristicDiscovered, E::NotifyRegistered { conn, ok, handle }) => {
                if !ok || Some(handle) != self.profile.char_handle() {
                    error!("link: notify registration failed");
                    return self.stall(LinkError::NotifyFailed);
                }
                info!("link: notify registration successful");
                let Some(range) = self.profile.service() else {
                    return self.stall(LinkError::ServiceNotFound);
                };
                self.request(radio, conn, LinkError::NotifyFailed, |r| {
                    r.discover_descriptors(conn, handle, range)
                })
            }
            (S::CharacteristicDiscovered, E::DescriptorsDiscovered { conn, ok, descriptors }) => {
                let cccd = descriptors.iter().find(|d| d.uuid == Some(CCCD_UUID));
                let Some(cccd) = cccd.filter(|_| ok) else {
                    error!("link: no CCCD under printer characteristic");
                    return self.stall(LinkError::NotifyFailed);
                };
                info!("link: enabling notifications via CCCD {}", cccd.handle);
                self.profile.set_cccd_handle(cccd.handle);
                let handle = cccd.handle;
                self.request(radio, conn, LinkError::DescriptorWriteFailed, |r| {
                    r.write(conn, handle, &CCCD_ENABLE_NOTIFY, true)
                })
            }
            (S::CharacteristicDiscovered, E::WriteComplete { handle, ok, .. })
                if Some(handle) == self.profile.cccd_handle() =>
            {
                if !ok {
                    error!("link: CCCD write failed");
                    return self.stall(LinkError::DescriptorWriteFailed);
                }
                info!("link: notifications enabled, link ready");
                self.profile.activate();
                self.state = S::NotifySubscribed;
                observer.on_link_ready();
                Ok(())
            }

            // Data path
            (S::NotifySubscribed, E::WriteComplete { handle, ok, .. })
                if Some(handle) == self.profile.char_handle() =>
            {
                if !ok {
                    error!("link: characteristic write failed");
                }
                observer.on_write_complete(ok);
                Ok(())
            }
            (S::NotifySubscribed, E::Notification { handle, data, .. })
                if Some(handle) == self.profile.char_handle() =>
            {
                debug!("link: notification ({} bytes)", data.len());
                observer.on_data(&data);
                Ok(())
            }

            // Security, on any open connection
            (s, E::Security { conn, request }) if s.has_connection() => {
                radio.reply_security(conn, security::respond(request));
                Ok(())
            }
            (s, E::KeyExchanged { kind, .. }) if s.has_connection() => {
                info!("link: key exchanged: {:?}", kind);
                Ok(())
            }
            (s, E::AuthComplete { success, reason, .. }) if s.has_connection() => {
                if success {
                    info!("link: pairing successful");
                } else {
                    info!("link: pairing failed, reason {:#x}", reason);
                }
                Ok(())
            }
            (s, E::ServiceChanged { .. }) if s.has_connection() => {
                info!("link: service changed");
                Ok(())
            }

            // Link loss
            (s, E::Disconnected { reason, .. })
                if s.has_connection() || matches!(s, S::Connecting { .. }) =>
            {
                info!("link: disconnected, reason {:#x}; rescanning", reason);
                self.profile.clear();
                observer.on_disconnected();
                self.begin_scan(radio)
            }

            (state, event) => {
                warn!("link: {:?} rejected in {:?}", event, state);
                Err(LinkError::Rejected)
            }
        }
    }

    fn begin_scan(&mut self, radio: &mut impl Radio) -> Result<(), LinkError> {
        match radio.start_scan() {
            Ok(()) => {
                self.state = LinkState::Scanning;
                Ok(())
            }
            Err(e) => {
                error!("link: scan request failed: {:?}", e);
                self.state = LinkState::PrivacyConfigured;
                Err(LinkError::ScanFailed)
            }
        }
    }

    /// Issue a follow-up request on `conn`.  If the radio refuses it the
    /// connection is dropped so the disconnect path can start over.
    fn request<R: Radio>(
        &mut self,
        radio: &mut R,
        conn: ConnId,
        fault: LinkError,
        issue: impl FnOnce(&mut R) -> Result<(), LinkError>,
    ) -> Result<(), LinkError> {
        issue(&mut *radio).map_err(|e| {
            error!("link: request failed ({:?}), disconnecting", e);
            self.state = LinkState::Stalled;
            radio.disconnect(conn);
            fault
        })
    }

    /// Discovery failed: keep the connection, stop progressing.
    fn stall(&mut self, fault: LinkError) -> Result<(), LinkError> {
        self.state = LinkState::Stalled;
        Err(fault)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::profile::{BdAddr, HandleRange, Uuid128, Uuid16};
    use crate::link::security::{SecurityReply, SecurityRequest};
    use crate::link::{DiscoveredChar, DiscoveredDescriptor};
    use heapless::Vec;
    use std::vec::Vec as StdVec;

    const TARGET: BdAddr = BdAddr::new([0xA4, 0x93, 0x40, 0xA0, 0x87, 0x57]);
    const OTHER: BdAddr = BdAddr::new([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
    const RANGE: HandleRange = HandleRange { start: 0x20, end: 0x30 };
    const CHAR: u16 = 0x22;
    const CCCD: u16 = 0x23;

    #[derive(Debug, PartialEq, Eq)]
    enum Call {
        Privacy,
        StartScan,
        StopScan,
        Connect(BdAddr),
        Disconnect(ConnId),
        Mtu(ConnId, u16),
        Services(ConnId, Uuid128),
        Chars(ConnId, HandleRange),
        RegisterNotify(ConnId, u16),
        Descriptors(ConnId, u16),
        Write(ConnId, u16, StdVec<u8>, bool),
        Security(ConnId, SecurityReply),
    }

    #[derive(Default)]
    struct FakeRadio {
        calls: StdVec<Call>,
        refuse_connect: bool,
    }

    impl FakeRadio {
        fn take(&mut self) -> StdVec<Call> {
            core::mem::take(&mut self.calls)
        }
    }

    impl Radio for FakeRadio {
        fn configure_privacy(&mut self) -> Result<(), LinkError> {
            self.calls.push(Call::Privacy);
            Ok(())
        }
        fn start_scan(&mut self) -> Result<(), LinkError> {
            self.calls.push(Call::StartScan);
            Ok(())
        }
        fn stop_scan(&mut self) {
            self.calls.push(Call::StopScan);
        }
        fn connect(&mut self, peer: BdAddr) -> Result<(), LinkError> {
            self.calls.push(Call::Connect(peer));
            if self.refuse_connect {
                Err(LinkError::ConnectFailed)
            } else {
                Ok(())
            }
        }
        fn disconnect(&mut self, conn: ConnId) {
            self.calls.push(Call::Disconnect(conn));
        }
        fn exchange_mtu(&mut self, conn: ConnId, mtu: u16) -> Result<(), LinkError> {
            self.calls.push(Call::Mtu(conn, mtu));
            Ok(())
        }
        fn discover_services(&mut self, conn: ConnId, uuid: Uuid128) -> Result<(), LinkError> {
            self.calls.push(Call::Services(conn, uuid));
            Ok(())
        }
        fn discover_characteristics(
            &mut self,
            conn: ConnId,
            range: HandleRange,
        ) -> Result<(), LinkError> {
            self.calls.push(Call::Chars(conn, range));
            Ok(())
        }
        fn register_notify(&mut self, conn: ConnId, handle: u16) -> Result<(), LinkError> {
            self.calls.push(Call::RegisterNotify(conn, handle));
            Ok(())
        }
        fn discover_descriptors(
            &mut self,
            conn: ConnId,
            char_handle: u16,
            _range: HandleRange,
        ) -> Result<(), LinkError> {
            self.calls.push(Call::Descriptors(conn, char_handle));
            Ok(())
        }
        fn write(
            &mut self,
            conn: ConnId,
            handle: u16,
            data: &[u8],
            require_ack: bool,
        ) -> Result<(), LinkError> {
            self.calls
                .push(Call::Write(conn, handle, data.to_vec(), require_ack));
            Ok(())
        }
        fn reply_security(&mut self, conn: ConnId, reply: SecurityReply) {
            self.calls.push(Call::Security(conn, reply));
        }
    }

    #[derive(Default)]
    struct Recorder {
        ready: usize,
        disconnected: usize,
        writes: StdVec<bool>,
        data: StdVec<StdVec<u8>>,
    }

    impl LinkObserver for Recorder {
        fn on_link_ready(&mut self) {
            self.ready += 1;
        }
        fn on_data(&mut self, data: &[u8]) {
            self.data.push(data.to_vec());
        }
        fn on_write_complete(&mut self, ok: bool) {
            self.writes.push(ok);
        }
        fn on_disconnected(&mut self) {
            self.disconnected += 1;
        }
    }

    struct Harness {
        link: LinkManager,
        radio: FakeRadio,
        obs: Recorder,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                link: LinkManager::new(LinkConfig::new(TARGET)),
                radio: FakeRadio::default(),
                obs: Recorder::default(),
            }
        }

        fn feed(&mut self, event: LinkEvent) -> Result<(), LinkError> {
            self.link.handle(event, &mut self.radio, &mut self.obs)
        }

        fn scanning(&mut self) {
            self.link.start(&mut self.radio).unwrap();
            self.feed(LinkEvent::PrivacyConfigured { ok: true }).unwrap();
            self.feed(LinkEvent::ScanStarted { ok: true }).unwrap();
        }

        fn up_to_characteristic(&mut self, conn: ConnId) {
            self.feed(LinkEvent::Advertisement { addr: TARGET }).unwrap();
            self.feed(LinkEvent::Opened { conn, ok: true }).unwrap();
            self.feed(LinkEvent::MtuConfigured { conn, ok: true, mtu: 247 })
                .unwrap();
            self.feed(LinkEvent::ServiceFound {
                conn,
                uuid: PRINTER_SERVICE_UUID,
                range: RANGE,
            })
            .unwrap();
            self.feed(LinkEvent::ServiceSearchComplete { conn, ok: true })
                .unwrap();
            self.feed(chars(conn, &[printer_char(true)])).unwrap();
        }

        fn ready(&mut self, conn: ConnId) {
            self.up_to_characteristic(conn);
            self.feed(LinkEvent::NotifyRegistered {
                conn,
                ok: true,
                handle: CHAR,
            })
            .unwrap();
            self.feed(descriptors(conn)).unwrap();
            self.feed(LinkEvent::WriteComplete {
                conn,
                handle: CCCD,
                ok: true,
            })
            .unwrap();
        }
    }

    fn printer_char(notify: bool) -> DiscoveredChar {
        DiscoveredChar {
            uuid: Some(PRINTER_CHAR_UUID),
            handle: CHAR,
            notify,
        }
    }

    fn chars(conn: ConnId, list: &[DiscoveredChar]) -> LinkEvent {
        LinkEvent::CharacteristicsDiscovered {
            conn,
            ok: true,
            chars: Vec::from_slice(list).unwrap(),
        }
    }

    fn descriptors(conn: ConnId) -> LinkEvent {
        LinkEvent::DescriptorsDiscovered {
            conn,
            ok: true,
            descriptors: Vec::from_slice(&[
                DiscoveredDescriptor {
                    uuid: Some(Uuid16(0x2901)),
                    handle: CCCD + 1,
                },
                DiscoveredDescriptor {
                    uuid: Some(CCCD_UUID),
                    handle: CCCD,
                },
            ])
            .unwrap(),
        }
    }

    #[test]
    fn full_bring_up_reaches_link_ready_once() {
        let mut h = Harness::new();
        h.scanning();
        assert_eq!(h.link.state(), LinkState::Scanning);
        assert_eq!(h.radio.take(), [Call::Privacy, Call::StartScan]);

        // Unrelated services are tolerated.
        h.feed(LinkEvent::Advertisement { addr: TARGET }).unwrap();
        h.feed(LinkEvent::Opened { conn: 1, ok: true }).unwrap();
        h.feed(LinkEvent::MtuConfigured { conn: 1, ok: true, mtu: 247 })
            .unwrap();
        h.feed(LinkEvent::ServiceFound {
            conn: 1,
            uuid: Uuid128::from_u128(0x1800),
            range: HandleRange { start: 1, end: 9 },
        })
        .unwrap();
        h.feed(LinkEvent::ServiceFound {
            conn: 1,
            uuid: PRINTER_SERVICE_UUID,
            range: RANGE,
        })
        .unwrap();
        h.feed(LinkEvent::ServiceSearchComplete { conn: 1, ok: true })
            .unwrap();
        assert_eq!(h.link.state(), LinkState::ServiceDiscovered);

        let other = DiscoveredChar {
            uuid: None,
            handle: 0x21,
            notify: true,
        };
        h.feed(chars(1, &[other, printer_char(true)])).unwrap();
        h.feed(LinkEvent::NotifyRegistered {
            conn: 1,
            ok: true,
            handle: CHAR,
        })
        .unwrap();
        h.feed(descriptors(1)).unwrap();
        assert_eq!(h.obs.ready, 0);
        h.feed(LinkEvent::WriteComplete {
            conn: 1,
            handle: CCCD,
            ok: true,
        })
        .unwrap();

        assert_eq!(h.link.state(), LinkState::NotifySubscribed);
        assert!(h.link.is_ready());
        assert_eq!(h.obs.ready, 1);
        assert!(h.obs.writes.is_empty());
        assert_eq!(
            h.radio.take(),
            [
                Call::StopScan,
                Call::Connect(TARGET),
                Call::Mtu(1, 247),
                Call::Services(1, PRINTER_SERVICE_UUID),
                Call::Chars(1, RANGE),
                Call::RegisterNotify(1, CHAR),
                Call::Descriptors(1, CHAR),
                Call::Write(1, CCCD, std::vec![0x01, 0x00], true),
            ]
        );
    }

    #[test]
    fn other_devices_and_duplicate_reports_are_ignored() {
        let mut h = Harness::new();
        h.scanning();
        h.radio.take();

        h.feed(LinkEvent::Advertisement { addr: OTHER }).unwrap();
        assert!(h.radio.take().is_empty());
        assert_eq!(h.link.state(), LinkState::Scanning);

        h.feed(LinkEvent::Advertisement { addr: TARGET }).unwrap();
        h.feed(LinkEvent::Advertisement { addr: TARGET }).unwrap();
        assert_eq!(h.radio.take(), [Call::StopScan, Call::Connect(TARGET)]);
        assert_eq!(h.link.state(), LinkState::Connecting { peer: TARGET });
    }

    #[test]
    fn failed_open_resumes_scanning_immediately() {
        let mut h = Harness::new();
        h.scanning();
        h.feed(LinkEvent::Advertisement { addr: TARGET }).unwrap();
        h.radio.take();

        assert_eq!(
            h.feed(LinkEvent::Opened { conn: 0, ok: false }),
            Err(LinkError::ConnectFailed)
        );
        assert_eq!(h.link.state(), LinkState::Scanning);
        assert_eq!(h.radio.take(), [Call::StartScan]);
        assert_eq!(h.link.profile().conn(), None);
    }

    #[test]
    fn refused_open_with_handle_is_not_adopted() {
        let mut h = Harness::new();
        h.scanning();
        h.feed(LinkEvent::Advertisement { addr: TARGET }).unwrap();
        h.radio.take();

        assert_eq!(
            h.feed(LinkEvent::Opened { conn: 5, ok: false }),
            Err(LinkError::ConnectFailed)
        );
        assert_eq!(h.link.state(), LinkState::Scanning);
        assert_eq!(h.radio.take(), [Call::StartScan]);
        assert_eq!(h.link.profile().conn(), None);
    }

    #[test]
    fn refused_connect_request_resumes_scanning() {
        let mut h = Harness::new();
        h.radio.refuse_connect = true;
        h.scanning();
        assert_eq!(
            h.feed(LinkEvent::Advertisement { addr: TARGET }),
            Err(LinkError::ConnectFailed)
        );
        assert_eq!(h.link.state(), LinkState::Scanning);
    }

    #[test]
    fn missing_service_stalls_the_connection() {
        let mut h = Harness::new();
        h.scanning();
        h.feed(LinkEvent::Advertisement { addr: TARGET }).unwrap();
        h.feed(LinkEvent::Opened { conn: 4, ok: true }).unwrap();
        h.feed(LinkEvent::MtuConfigured { conn: 4, ok: true, mtu: 247 })
            .unwrap();
        h.radio.take();

        assert_eq!(
            h.feed(LinkEvent::ServiceSearchComplete { conn: 4, ok: true }),
            Err(LinkError::ServiceNotFound)
        );
        assert_eq!(h.link.state(), LinkState::Stalled);
        assert!(h.radio.take().is_empty());

        // A later drop still recovers.
        h.feed(LinkEvent::Disconnected { conn: 4, reason: 0x13 })
            .unwrap();
        assert_eq!(h.link.state(), LinkState::Scanning);
    }

    #[test]
    fn characteristic_without_notify_stalls() {
        let mut h = Harness::new();
        h.scanning();
        h.feed(LinkEvent::Advertisement { addr: TARGET }).unwrap();
        h.feed(LinkEvent::Opened { conn: 1, ok: true }).unwrap();
        h.feed(LinkEvent::MtuConfigured { conn: 1, ok: true, mtu: 247 })
            .unwrap();
        h.feed(LinkEvent::ServiceFound {
            conn: 1,
            uuid: PRINTER_SERVICE_UUID,
            range: RANGE,
        })
        .unwrap();
        h.feed(LinkEvent::ServiceSearchComplete { conn: 1, ok: true })
            .unwrap();
        h.radio.take();

        assert_eq!(
            h.feed(chars(1, &[printer_char(false)])),
            Err(LinkError::NotifyFailed)
        );
        assert_eq!(h.link.state(), LinkState::Stalled);
        assert!(h.radio.take().is_empty());
    }

    #[test]
    fn disconnect_during_discovery_clears_handles_and_rediscovers() {
        let mut h = Harness::new();
        h.scanning();
        h.up_to_characteristic(1);
        assert_eq!(h.link.state(), LinkState::CharacteristicDiscovered);
        assert_eq!(h.link.profile().char_handle(), Some(CHAR));
        let generation = h.link.profile().generation();
        h.radio.take();

        h.feed(LinkEvent::Disconnected { conn: 1, reason: 0x08 })
            .unwrap();
        assert_eq!(h.link.state(), LinkState::Scanning);
        assert_eq!(h.link.profile().conn(), None);
        assert_eq!(h.link.profile().service(), None);
        assert_eq!(h.link.profile().char_handle(), None);
        assert_eq!(h.link.profile().generation(), generation + 1);
        assert_eq!(h.obs.disconnected, 1);
        assert_eq!(h.radio.take(), [Call::StartScan]);

        // Nothing from the old connection is honoured.
        h.feed(LinkEvent::Advertisement { addr: TARGET }).unwrap();
        h.feed(LinkEvent::Opened { conn: 2, ok: true }).unwrap();
        assert_eq!(
            h.feed(LinkEvent::NotifyRegistered {
                conn: 1,
                ok: true,
                handle: CHAR
            }),
            Err(LinkError::Rejected)
        );
        assert_eq!(h.link.state(), LinkState::Connected);

        // Discovery starts from scratch on the new connection.
        h.feed(LinkEvent::MtuConfigured { conn: 2, ok: true, mtu: 247 })
            .unwrap();
        assert_eq!(
            h.radio.take(),
            [
                Call::StopScan,
                Call::Connect(TARGET),
                Call::Mtu(2, 247),
                Call::Services(2, PRINTER_SERVICE_UUID),
            ]
        );
        assert_eq!(h.link.profile().char_handle(), None);
    }

    #[test]
    fn send_before_ready_performs_no_io() {
        let mut h = Harness::new();
        h.scanning();
        h.up_to_characteristic(1);
        h.radio.take();

        assert_eq!(
            h.link.send(&mut h.radio, &[1, 2, 3], true),
            Err(LinkError::NotReady)
        );
        assert!(h.radio.take().is_empty());
    }

    #[test]
    fn data_path_once_ready() {
        let mut h = Harness::new();
        h.scanning();
        h.ready(7);
        h.radio.take();

        h.link.send(&mut h.radio, &[0x55, 0x55], true).unwrap();
        assert_eq!(
            h.radio.take(),
            [Call::Write(7, CHAR, std::vec![0x55, 0x55], true)]
        );

        h.feed(LinkEvent::WriteComplete {
            conn: 7,
            handle: CHAR,
            ok: true,
        })
        .unwrap();
        h.feed(LinkEvent::WriteComplete {
            conn: 7,
            handle: CHAR,
            ok: false,
        })
        .unwrap();
        assert_eq!(h.obs.writes, [true, false]);

        h.feed(LinkEvent::Notification {
            conn: 7,
            handle: CHAR,
            data: Vec::from_slice(&[0xAA, 0xBB]).unwrap(),
        })
        .unwrap();
        assert_eq!(h.obs.data, [std::vec![0xAA, 0xBB]]);
    }

    #[test]
    fn illegal_events_are_rejected_without_state_change() {
        let mut h = Harness::new();
        assert_eq!(
            h.feed(LinkEvent::WriteComplete {
                conn: 0,
                handle: CHAR,
                ok: true
            }),
            Err(LinkError::Rejected)
        );
        assert_eq!(h.link.state(), LinkState::Idle);
        assert!(h.obs.writes.is_empty());

        h.scanning();
        assert_eq!(
            h.feed(LinkEvent::Disconnected { conn: 0, reason: 0 }),
            Err(LinkError::Rejected)
        );
        assert_eq!(h.link.state(), LinkState::Scanning);
        assert_eq!(h.obs.disconnected, 0);
        assert_eq!(h.link.start(&mut h.radio), Err(LinkError::Rejected));
    }

    #[test]
    fn privacy_failure_stops_bring_up() {
        let mut h = Harness::new();
        h.link.start(&mut h.radio).unwrap();
        assert_eq!(
            h.feed(LinkEvent::PrivacyConfigured { ok: false }),
            Err(LinkError::PrivacyFailed)
        );
        assert_eq!(h.link.state(), LinkState::Idle);
        assert_eq!(h.radio.take(), [Call::Privacy]);
    }

    #[test]
    fn elapsed_scan_window_restarts_scan() {
        let mut h = Harness::new();
        h.scanning();
        h.radio.take();
        h.feed(LinkEvent::ScanWindowElapsed).unwrap();
        assert_eq!(h.radio.take(), [Call::StartScan]);
        assert_eq!(h.link.state(), LinkState::Scanning);

        assert_eq!(
            h.feed(LinkEvent::ScanStarted { ok: false }),
            Err(LinkError::ScanFailed)
        );
        assert_eq!(h.link.state(), LinkState::PrivacyConfigured);
        h.feed(LinkEvent::ScanWindowElapsed).unwrap();
        assert_eq!(h.link.state(), LinkState::Scanning);
    }

    #[test]
    fn security_prompts_are_accepted_automatically() {
        let mut h = Harness::new();
        h.scanning();
        h.feed(LinkEvent::Advertisement { addr: TARGET }).unwrap();
        h.feed(LinkEvent::Opened { conn: 3, ok: true }).unwrap();
        h.radio.take();

        h.feed(LinkEvent::Security {
            conn: 3,
            request: SecurityRequest::Pairing,
        })
        .unwrap();
        h.feed(LinkEvent::Security {
            conn: 3,
            request: SecurityRequest::NumericComparison(42),
        })
        .unwrap();
        h.feed(LinkEvent::AuthComplete {
            conn: 3,
            success: true,
            reason: 0,
        })
        .unwrap();
        assert_eq!(
            h.radio.take(),
            [
                Call::Security(3, SecurityReply::Accept),
                Call::Security(3, SecurityReply::Confirm),
            ]
        );
        assert_eq!(h.link.state(), LinkState::Connected);
    }
}
