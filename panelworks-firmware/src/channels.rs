//! Inter-task communication channels and shared state
//!
//! The servo bank and RC monitor are the only state shared with the
//! interrupt executor; everything else moves through embassy-sync channels.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use panelworks_core::capture::RcMonitor;
use panelworks_core::servo::ServoBank;
use panelworks_protocol::PanelCommand;

/// Channel capacity for parsed panel commands
const COMMAND_CHANNEL_SIZE: usize = 8;

/// Panel commands received on the command UART
pub static COMMAND_CHANNEL: Channel<CriticalSectionRawMutex, PanelCommand, COMMAND_CHANNEL_SIZE> =
    Channel::new();

/// Commanded pulse widths, read by the pulse task
pub static SERVO_BANK: ServoBank = ServoBank::new();

/// RC input samples, written by the pulse task
pub static RC_MONITOR: RcMonitor = RcMonitor::new();
