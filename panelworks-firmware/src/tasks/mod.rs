//! Embassy async tasks
//!
//! Each task runs independently and communicates via channels/signals.
//! The pulse task runs on the interrupt executor; the rest share the
//! thread-mode executor.

pub mod command_rx;
pub mod controller;
pub mod pulse;
pub mod tick;

pub use command_rx::command_rx_task;
pub use controller::controller_task;
pub use pulse::{pulse_task, PioServos, RcCapture};
pub use tick::tick_task;
