//! Board-agnostic core logic for the Panelworks panel controller
//!
//! This crate contains all timing and motion logic that does not depend on
//! specific hardware implementations:
//!
//! - Tick clock and countdown timer registry
//! - Servo pulse engine (shared pulse bank, pulse train and PIO word encoding)
//! - RC input capture monitor
//! - Keyframe sequencer with per-channel speed limits
//! - Channel arbiter with buzz-kill
//! - Built-in panel routines and the panel controller
//! - Board configuration

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod arbiter;
pub mod capture;
pub mod channel;
pub mod clock;
pub mod config;
pub mod controller;
pub mod scripts;
pub mod sequencer;
pub mod servo;

pub use controller::{ControllerEvent, PanelController};
