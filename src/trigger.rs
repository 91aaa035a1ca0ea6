//! Print trigger input.
//!
//! One active-low button (or touch pad) with internal pull-up.  Each
//! debounced press queues one print request; presses that arrive while
//! a request is still queued are dropped.

use defmt::{info, warn};
use embassy_nrf::gpio::{AnyPin, Input, Pull};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;
use embassy_time::{Duration, Timer};
use niimbot_ble::config::BUTTON_DEBOUNCE_MS;

pub type TriggerSender = Sender<'static, CriticalSectionRawMutex, (), 1>;

/// Wait for presses on `pin` and forward them to the printer task.
#[embassy_executor::task]
pub async fn button_task(pin: AnyPin, tx: TriggerSender) -> ! {
    let mut btn = Input::new(pin, Pull::Up);
    let debounce = Duration::from_millis(BUTTON_DEBOUNCE_MS);

    loop {
        btn.wait_for_falling_edge().await;
        Timer::after(debounce).await;
        if btn.is_high() {
            continue;
        }

        info!("print trigger pressed");
        if tx.try_send(()).is_err() {
            warn!("print already pending, ignoring trigger");
        }

        btn.wait_for_rising_edge().await;
        Timer::after(debounce).await;
    }
}
