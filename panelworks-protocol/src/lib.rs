//! Panel Command Language
//!
//! This crate defines the line-oriented text protocol spoken by the panel
//! controller on its command UART. A remote (radio link, touch app, serial
//! terminal) sends one command per line:
//!
//! ```text
//! ┌───────┬──────┬──────┬─────┐
//! │ START │ VERB │ ARG  │ END │
//! │ ':'   │ 2ch  │ 2dig │ \r  │
//! └───────┴──────┴──────┴─────┘
//! ```
//!
//! Only panel commands (`:`) are interpreted here. Lines starting with one of
//! the other start characters belong to peripherals (holoprojectors, displays,
//! sound) and are classified so the firmware can forward them untouched.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod command;
pub mod line;

pub use command::{
    parse_line, Command, CommandError, ForwardKind, PanelCommand, ALL_PANELS, PANEL_START,
};
pub use line::{Line, LineAssembler, LineError, LINE_END, MAX_LINE_LEN};
