//! Main controller task
//!
//! Owns the panel controller. Applies panel commands as they arrive and
//! advances the clock, sequencer and arbiter on every tick.

use defmt::*;
use embassy_futures::select::{select, Either};

use panelworks_core::controller::Events;
use panelworks_core::{ControllerEvent, PanelController};

use crate::channels::COMMAND_CHANNEL;
use crate::tasks::tick::TICK_SIGNAL;

/// Most missed ticks replayed after a stall
const MAX_CATCH_UP: u32 = 10;

/// Controller task - main coordination loop
#[embassy_executor::task]
pub async fn controller_task(mut controller: PanelController<'static>) {
    info!("Controller task started");

    let mut last_tick: Option<u32> = None;

    loop {
        match select(COMMAND_CHANNEL.receive(), TICK_SIGNAL.wait()).await {
            Either::First(command) => {
                info!("Applying {:?}", command);
                report(controller.apply(command));
            }
            Either::Second(now) => {
                // Signals coalesce; replay ticks the loop missed
                let due = last_tick.map_or(1, |last| now.wrapping_sub(last));
                last_tick = Some(now);
                if due > 1 {
                    warn!("Controller {} ticks behind", due - 1);
                }
                for _ in 0..due.min(MAX_CATCH_UP) {
                    report(controller.tick());
                }
            }
        }
    }
}

/// Log controller events
fn report(events: Events) {
    for event in events {
        match event {
            ControllerEvent::SequenceFinished => info!("Sequence finished"),
            ControllerEvent::ChannelsSilenced(mask) => {
                debug!("Buzz-kill depowered {:?}", mask)
            }
            ControllerEvent::SignalLost => warn!("RC signal lost"),
            ControllerEvent::SignalRestored => info!("RC signal restored"),
        }
    }
}
