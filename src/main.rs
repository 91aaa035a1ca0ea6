//! niimbot-ble firmware - nRF52840 + SoftDevice S140.
//!
//! Tasks:
//!   - `softdevice_task`: runs the SoftDevice event loop
//!   - `radio_task`: owns the link manager, executes its radio requests
//!     and carries frames from the printer task to the air
//!   - `printer_task`: heartbeat on link-up, keep-alive pings, prints
//!   - `button_task`: print trigger (P0.11)
//!   - `feedback_task`: status LED (P0.13, active-low)
//!
//! The printer address is baked in at build time:
//! `PRINTER_BDA=AA:BB:CC:DD:EE:FF cargo run --release --features embedded`
//! (`PRINTER_MTU` optionally overrides the ATT MTU).

#![no_std]
#![no_main]

mod ble;
mod trigger;

use defmt::{error, info, warn};
use embassy_executor::Spawner;
use embassy_futures::select::{select, select4, Either, Either4};
use embassy_nrf::gpio::{AnyPin, Level, Output, OutputDrive, Pin};
use embassy_nrf::interrupt::Priority;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{with_timeout, Duration, Instant, Ticker, Timer};
use niimbot_ble::bridge::{self, Feedback, LinkTransport, Outbound, Shared};
use niimbot_ble::config::{
    self, LinkConfig, PrintSettings, PrintTiming, PAPER_HEIGHT_DOTS, PAPER_WIDTH_DOTS,
};
use niimbot_ble::image::BorderLabel;
use niimbot_ble::link::{LinkEvent, LinkManager};
use niimbot_ble::printer::Printer;
use nrf_softdevice::{raw, Softdevice};
use {defmt_rtt as _, panic_probe as _};

use crate::ble::radio::{Driver, RequestQueue};
use crate::ble::EVENTS;

type Mutex = CriticalSectionRawMutex;

/// Depth of the printer-to-radio frame queue.
const OUTBOUND_DEPTH: usize = 4;

static SHARED: Shared<Mutex> = Shared::new();
static OUTBOUND: Channel<Mutex, Outbound, OUTBOUND_DEPTH> = Channel::new();
static TRIGGER: Channel<Mutex, (), 1> = Channel::new();
static FEEDBACK: Channel<Mutex, Feedback, 4> = Channel::new();

/// Label printed on every trigger.
static LABEL: BorderLabel = BorderLabel {
    width: PAPER_WIDTH_DOTS,
    height: PAPER_HEIGHT_DOTS,
    border: 4,
};

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

fn dispatch(link: &mut LinkManager, queue: &mut RequestQueue, event: LinkEvent) {
    if let Err(e) = link.handle(event, queue, &mut &SHARED) {
        warn!("link: {}", e);
    }
}

#[embassy_executor::task]
async fn radio_task(mut driver: Driver, mut link: LinkManager) -> ! {
    let mut queue = RequestQueue::new();
    if let Err(e) = link.start(&mut queue) {
        error!("link start failed: {}", e);
    }

    loop {
        while let Some(request) = queue.pop() {
            for event in driver.execute(request).await {
                dispatch(&mut link, &mut queue, event);
            }
        }

        match select(EVENTS.receive(), OUTBOUND.receive()).await {
            Either::First(event) => dispatch(&mut link, &mut queue, event),
            Either::Second(out) => bridge::deliver(&mut link, &mut queue, &SHARED, &out),
        }
    }
}

fn notify(feedback: Feedback) {
    if FEEDBACK.try_send(feedback).is_err() {
        warn!("feedback queue full, dropping {}", feedback);
    }
}

#[embassy_executor::task]
async fn printer_task(transport: LinkTransport<'static, Mutex, OUTBOUND_DEPTH>) -> ! {
    let mut printer = Printer::new(&SHARED, PrintSettings::default(), PrintTiming::default());
    printer.attach(transport);
    let mut ping = Ticker::every(config::PING_INTERVAL);

    loop {
        match select4(
            SHARED.wait_link_up(),
            SHARED.wait_ready(),
            TRIGGER.receive(),
            ping.next(),
        )
        .await
        {
            Either4::First(()) => {
                info!("link up, sending heartbeat");
                if let Err(e) = printer.heartbeat().await {
                    warn!("heartbeat failed: {}", e);
                }
            }
            Either4::Second(()) => {
                info!("printer ready");
                notify(Feedback::LinkReady);
            }
            Either4::Third(()) => {
                if !printer.is_ready() {
                    warn!("print requested but printer not ready");
                    notify(Feedback::PrintFailed);
                    continue;
                }
                let started = Instant::now();
                let result = printer.print(&LABEL).await;
                match &result {
                    Ok(()) => info!("label printed in {} ms", started.elapsed().as_millis()),
                    Err(e) => error!("print failed: {}", e),
                }
                notify(Feedback::for_print(&result));
                Timer::after(config::PRINT_COOLDOWN).await;
                ping.reset();
            }
            Either4::Fourth(()) => {
                if let Err(e) = printer.keepalive().await {
                    warn!("keep-alive failed: {}", e);
                }
            }
        }
    }
}

/// Drives the status LED: steady on while the printer is ready, one
/// short blink per printed label, fast flashing after a failure.
#[embassy_executor::task]
async fn feedback_task(mut led: Output<'static>) -> ! {
    let idle = Duration::from_secs(1);

    loop {
        match with_timeout(idle, FEEDBACK.receive()).await {
            Ok(Feedback::LinkReady) | Err(_) => {}
            Ok(Feedback::PrintSucceeded) => {
                led.set_high();
                Timer::after(Duration::from_millis(200)).await;
            }
            Ok(Feedback::PrintFailed) => {
                let until = Instant::now() + config::ERROR_BLINK_DURATION;
                while Instant::now() < until {
                    led.toggle();
                    Timer::after(config::ERROR_BLINK_PERIOD).await;
                }
            }
        }
        let level = if SHARED.is_ready() { Level::Low } else { Level::High };
        led.set_level(level);
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("niimbot-ble starting...");

    // The SoftDevice reserves priorities 0, 1 and 4.
    let mut nrf_config = embassy_nrf::config::Config::default();
    nrf_config.gpiote_interrupt_priority = Priority::P2;
    nrf_config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(nrf_config);

    let link_config = match LinkConfig::from_strs(
        option_env!("PRINTER_BDA").unwrap_or(""),
        option_env!("PRINTER_MTU"),
    ) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("bad PRINTER_BDA / PRINTER_MTU: {}", e);
            return;
        }
    };
    info!("printer {} (MTU {})", link_config.target, link_config.mtu);

    let sd_config = nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t {
            att_mtu: link_config.mtu,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: raw::BLE_GAP_ADV_SET_COUNT_DEFAULT as u8,
            periph_role_count: 0,
            central_role_count: 1,
            central_sec_count: 1,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        ..Default::default()
    };
    let sd: &'static Softdevice = Softdevice::enable(&sd_config);
    spawner.must_spawn(softdevice_task(sd));

    let driver = Driver::new(sd, spawner, link_config.target);
    spawner.must_spawn(radio_task(driver, LinkManager::new(link_config)));
    spawner.must_spawn(printer_task(LinkTransport::new(
        &SHARED,
        OUTBOUND.sender(),
    )));

    let trigger_pin: AnyPin = p.P0_11.degrade();
    spawner.must_spawn(trigger::button_task(trigger_pin, TRIGGER.sender()));

    let led = Output::new(p.P0_13.degrade(), Level::High, OutputDrive::Standard);
    spawner.must_spawn(feedback_task(led));

    info!("all tasks spawned");
}
