//! Board configuration
//!
//! Configuration is supplied once at startup. The firmware embeds a
//! `board.toml` and parses it with [`parse_board_config`].

pub mod board;
pub mod parser;

pub use board::*;
pub use parser::parse_board_config;
