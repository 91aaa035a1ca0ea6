//! BLE GAP scanner - looks for the one configured printer.
//!
//! Uses the SoftDevice Central-role scanning API.  Every advertisement
//! is compared against the target address; the first match ends the
//! scan.  A scan window that closes without a match is reported so the
//! link manager can start the next one.

use defmt::{info, warn};
use embassy_time::{with_timeout, Duration};
use niimbot_ble::config::{BLE_SCAN_INTERVAL, BLE_SCAN_WINDOW, BLE_SCAN_WINDOW_SECS};
use niimbot_ble::link::profile::BdAddr;
use nrf_softdevice::ble::{central, Address};
use nrf_softdevice::Softdevice;

/// How a scan window ended.
pub enum ScanOutcome {
    /// The target advertised; carries the address with its type.
    Found(Address),
    /// The window closed without seeing the target.
    WindowElapsed,
    /// The SoftDevice refused to scan.
    Failed,
}

/// Address of an advertiser, in display order.
pub fn peer_bdaddr(address: &Address) -> BdAddr {
    BdAddr::from_le_bytes(address.bytes())
}

/// Run one scan window of `BLE_SCAN_WINDOW_SECS` seconds.
pub async fn scan_for(sd: &Softdevice, target: BdAddr) -> ScanOutcome {
    info!(
        "BLE scan starting ({} s window), looking for {}",
        BLE_SCAN_WINDOW_SECS, target
    );

    let config = central::ScanConfig {
        active: true,
        interval: BLE_SCAN_INTERVAL as u32,
        window: BLE_SCAN_WINDOW as u32,
        ..Default::default()
    };

    // Return None to keep scanning, Some(..) to stop.
    let scan = central::scan(sd, &config, |params| {
        let address = Address::from_raw(params.peer_addr);
        (peer_bdaddr(&address) == target).then_some((address, params.rssi))
    });

    let window = Duration::from_secs(BLE_SCAN_WINDOW_SECS as u64);
    match with_timeout(window, scan).await {
        Ok(Ok((address, rssi))) => {
            info!("Found printer (RSSI {})", rssi);
            ScanOutcome::Found(address)
        }
        Ok(Err(_)) => {
            warn!("BLE scan ended with error");
            ScanOutcome::Failed
        }
        Err(_) => ScanOutcome::WindowElapsed,
    }
}
