//! SoftDevice implementation of the link manager's radio.
//!
//! The link manager only queues [`Request`]s (its `Radio` methods must
//! not block).  The radio task then pops each request, runs it to
//! completion on the SoftDevice with [`Driver::execute`], and feeds the
//! resulting events back into the manager.

use defmt::{debug, error, info, warn, Format};
use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use heapless::{Deque, Vec};
use niimbot_ble::error::LinkError;
use niimbot_ble::link::profile::{BdAddr, ConnId, HandleRange, Uuid128};
use niimbot_ble::link::security::SecurityReply;
use niimbot_ble::link::{LinkEvent, Radio};
use niimbot_ble::protocol::Frame;
use nrf_softdevice::ble::gatt_client::{self, DiscoverError};
use nrf_softdevice::ble::{Address, AddressType, Connection};
use nrf_softdevice::{raw, Softdevice};

use crate::ble::connection::{self, Bonder};
use crate::ble::printer_client::{self, PrinterClient};
use crate::ble::scanner::{self, ScanOutcome};

/// One queued radio operation.
#[derive(Format)]
pub enum Request {
    ConfigurePrivacy,
    StartScan,
    StopScan,
    Connect(BdAddr),
    Disconnect(ConnId),
    ExchangeMtu(ConnId, u16),
    DiscoverServices(ConnId, Uuid128),
    DiscoverCharacteristics(ConnId, HandleRange),
    RegisterNotify(ConnId, u16),
    DiscoverDescriptors(ConnId, u16),
    Write {
        conn: ConnId,
        handle: u16,
        data: Frame,
        require_ack: bool,
    },
    ReplySecurity(ConnId, SecurityReply),
}

/// Requests issued by the link manager, not yet executed.
pub struct RequestQueue {
    pending: Deque<Request, 8>,
}

impl RequestQueue {
    pub const fn new() -> Self {
        Self {
            pending: Deque::new(),
        }
    }

    pub fn pop(&mut self) -> Option<Request> {
        self.pending.pop_front()
    }

    fn push(&mut self, request: Request, fault: LinkError) -> Result<(), LinkError> {
        self.pending.push_back(request).map_err(|_| {
            error!("radio request queue full");
            fault
        })
    }
}

impl Radio for RequestQueue {
    fn configure_privacy(&mut self) -> Result<(), LinkError> {
        self.push(Request::ConfigurePrivacy, LinkError::PrivacyFailed)
    }

    fn start_scan(&mut self) -> Result<(), LinkError> {
        self.push(Request::StartScan, LinkError::ScanFailed)
    }

    fn stop_scan(&mut self) {
        let _ = self.push(Request::StopScan, LinkError::ScanFailed);
    }

    fn connect(&mut self, peer: BdAddr) -> Result<(), LinkError> {
        self.push(Request::Connect(peer), LinkError::ConnectFailed)
    }

    fn disconnect(&mut self, conn: ConnId) {
        let _ = self.push(Request::Disconnect(conn), LinkError::Rejected);
    }

    fn exchange_mtu(&mut self, conn: ConnId, mtu: u16) -> Result<(), LinkError> {
        self.push(Request::ExchangeMtu(conn, mtu), LinkError::MtuFailed)
    }

    fn discover_services(&mut self, conn: ConnId, uuid: Uuid128) -> Result<(), LinkError> {
        self.push(
            Request::DiscoverServices(conn, uuid),
            LinkError::ServiceNotFound,
        )
    }

    fn discover_characteristics(
        &mut self,
        conn: ConnId,
        range: HandleRange,
    ) -> Result<(), LinkError> {
        self.push(
            Request::DiscoverCharacteristics(conn, range),
            LinkError::CharacteristicNotFound,
        )
    }

    fn register_notify(&mut self, conn: ConnId, handle: u16) -> Result<(), LinkError> {
        self.push(Request::RegisterNotify(conn, handle), LinkError::NotifyFailed)
    }

    fn discover_descriptors(
        &mut self,
        conn: ConnId,
        char_handle: u16,
        _range: HandleRange,
    ) -> Result<(), LinkError> {
        self.push(
            Request::DiscoverDescriptors(conn, char_handle),
            LinkError::NotifyFailed,
        )
    }

    fn write(
        &mut self,
        conn: ConnId,
        handle: u16,
        data: &[u8],
        require_ack: bool,
    ) -> Result<(), LinkError> {
        let data = Frame::from_slice(data).map_err(|_| LinkError::WriteFailed)?;
        self.push(
            Request::Write {
                conn,
                handle,
                data,
                require_ack,
            },
            LinkError::WriteFailed,
        )
    }

    fn reply_security(&mut self, conn: ConnId, reply: SecurityReply) {
        let _ = self.push(Request::ReplySecurity(conn, reply), LinkError::Rejected);
    }
}

/// Pause before retrying a scan the SoftDevice refused.
const SCAN_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Events produced by one request.
pub type Outcome = Vec<LinkEvent, 2>;

/// Owns the SoftDevice-side state of the printer link.
pub struct Driver {
    sd: &'static Softdevice,
    spawner: Spawner,
    bonder: &'static Bonder,
    target: BdAddr,
    /// Address (with type) of the last matching advertisement.
    peer: Option<Address>,
    conn: Option<Connection>,
    client: Option<PrinterClient>,
}

impl Driver {
    pub fn new(sd: &'static Softdevice, spawner: Spawner, target: BdAddr) -> Self {
        Self {
            sd,
            spawner,
            bonder: Bonder::take(),
            target,
            peer: None,
            conn: None,
            client: None,
        }
    }

    fn connection(&self, id: ConnId) -> Option<&Connection> {
        self.conn.as_ref().filter(|c| c.handle() == Some(id))
    }

    /// Run `request` to completion.
    pub async fn execute(&mut self, request: Request) -> Outcome {
        debug!("radio: {}", request);
        let mut out = Outcome::new();
        let mut emit = |event: LinkEvent| {
            let _ = out.push(event);
        };

        match request {
            Request::ConfigurePrivacy => emit(LinkEvent::PrivacyConfigured {
                ok: configure_privacy(),
            }),
            Request::StartScan => match scanner::scan_for(self.sd, self.target).await {
                ScanOutcome::Found(address) => {
                    self.peer = Some(address);
                    emit(LinkEvent::ScanStarted { ok: true });
                    emit(LinkEvent::Advertisement {
                        addr: scanner::peer_bdaddr(&address),
                    });
                }
                ScanOutcome::WindowElapsed => {
                    emit(LinkEvent::ScanStarted { ok: true });
                    emit(LinkEvent::ScanWindowElapsed);
                }
                ScanOutcome::Failed => {
                    Timer::after(SCAN_RETRY_DELAY).await;
                    emit(LinkEvent::ScanStarted { ok: false });
                    emit(LinkEvent::ScanWindowElapsed);
                }
            },
            // The scan already stopped on the matching advertisement.
            Request::StopScan => {}
            Request::Connect(peer) => {
                let address = self
                    .peer
                    .filter(|a| scanner::peer_bdaddr(a) == peer)
                    .unwrap_or_else(|| Address::new(AddressType::Public, peer.to_le_bytes()));
                self.client = None;
                let conn = connection::connect(self.sd, self.bonder, &address).await;
                match conn.as_ref().and_then(|c| c.handle().map(|h| (c, h))) {
                    Some((conn, id)) => {
                        info!("connected to {}, handle {}", peer, id);
                        let listening = self
                            .spawner
                            .spawn(printer_client::notify_task(conn.clone()))
                            .is_ok();
                        if listening {
                            self.conn = Some(conn.clone());
                        } else {
                            // No listener means no replies; refuse the link.
                            error!("notification listener still busy, dropping {}", id);
                            let _ = conn.disconnect();
                        }
                        emit(LinkEvent::Opened { conn: id, ok: listening });
                    }
                    None => emit(LinkEvent::Opened { conn: 0, ok: false }),
                }
            }
            Request::Disconnect(id) => {
                if let Some(conn) = self.connection(id) {
                    let _ = conn.disconnect();
                }
                self.client = None;
            }
            Request::ExchangeMtu(id, mtu) => {
                let ok = match self.connection(id) {
                    Some(conn) => gatt_client::att_mtu_exchange(conn, mtu).await.is_ok(),
                    None => false,
                };
                emit(LinkEvent::MtuConfigured { conn: id, ok, mtu });
            }
            Request::DiscoverServices(id, uuid) => {
                let result = match self.connection(id) {
                    Some(conn) => Some(printer_client::discover(conn).await),
                    None => None,
                };
                match result {
                    Some(Ok(client)) => {
                        emit(LinkEvent::ServiceFound {
                            conn: id,
                            uuid,
                            range: client.range(),
                        });
                        emit(LinkEvent::ServiceSearchComplete { conn: id, ok: true });
                        self.client = Some(client);
                    }
                    Some(Err(DiscoverError::ServiceNotFound)) => {
                        emit(LinkEvent::ServiceSearchComplete { conn: id, ok: true })
                    }
                    Some(Err(_)) | None => {
                        emit(LinkEvent::ServiceSearchComplete { conn: id, ok: false })
                    }
                }
            }
            Request::DiscoverCharacteristics(id, _range) => {
                let chars = self
                    .client
                    .as_ref()
                    .map(|c| c.characteristics())
                    .unwrap_or_default();
                emit(LinkEvent::CharacteristicsDiscovered {
                    conn: id,
                    ok: self.client.is_some(),
                    chars,
                });
            }
            // HVX reaches the listener task without local registration.
            Request::RegisterNotify(id, handle) => emit(LinkEvent::NotifyRegistered {
                conn: id,
                ok: self.connection(id).is_some(),
                handle,
            }),
            Request::DiscoverDescriptors(id, char_handle) => {
                let descriptors = self
                    .client
                    .as_ref()
                    .map(|c| c.descriptors_of(char_handle))
                    .unwrap_or_default();
                emit(LinkEvent::DescriptorsDiscovered {
                    conn: id,
                    ok: self.client.is_some(),
                    descriptors,
                });
            }
            Request::Write {
                conn: id,
                handle,
                data,
                require_ack,
            } => match self.connection(id) {
                None => {
                    warn!("write on closed connection {}", id);
                    if require_ack {
                        emit(LinkEvent::WriteComplete {
                            conn: id,
                            handle,
                            ok: false,
                        });
                    }
                }
                Some(conn) if require_ack => {
                    let ok = gatt_client::write(conn, handle, &data).await.is_ok();
                    emit(LinkEvent::WriteComplete {
                        conn: id,
                        handle,
                        ok,
                    });
                }
                Some(conn) => {
                    if gatt_client::write_without_response(conn, handle, &data)
                        .await
                        .is_err()
                    {
                        warn!("write without response failed on handle {}", handle);
                    }
                }
            },
            // The security handler already answered in-line.
            Request::ReplySecurity(id, reply) => {
                debug!("security reply for {}: {}", id, reply)
            }
        }
        out
    }
}

/// Enable device privacy with a resolvable private address.
fn configure_privacy() -> bool {
    let params = raw::ble_gap_privacy_params_t {
        privacy_mode: raw::BLE_GAP_PRIVACY_MODE_DEVICE_PRIVACY as u8,
        private_addr_type: raw::BLE_GAP_ADDR_TYPE_RANDOM_PRIVATE_RESOLVABLE as u8,
        private_addr_cycle_s: 0,
        p_device_irk: core::ptr::null_mut(),
    };
    let ret = unsafe { raw::sd_ble_gap_privacy_set(&params) };
    if ret != raw::NRF_SUCCESS {
        error!("sd_ble_gap_privacy_set failed: {}", ret);
    }
    ret == raw::NRF_SUCCESS
}
