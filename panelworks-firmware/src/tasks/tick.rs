//! Tick task
//!
//! Provides the 100 Hz time base for the controller: timers, sequencer
//! rows and the buzz-kill debounce all count these ticks.

use defmt::*;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Ticker};

use panelworks_core::clock::TICK_PERIOD_MS;

/// Signal to notify the controller of a tick (payload: ticks since boot)
pub static TICK_SIGNAL: Signal<CriticalSectionRawMutex, u32> = Signal::new();

/// Tick task - signals every tick period
#[embassy_executor::task]
pub async fn tick_task() {
    info!("Tick task started");

    let mut ticker = Ticker::every(Duration::from_millis(TICK_PERIOD_MS));
    let mut ticks: u32 = 0;

    loop {
        ticker.next().await;
        ticks = ticks.wrapping_add(1);
        TICK_SIGNAL.signal(ticks);
    }
}
