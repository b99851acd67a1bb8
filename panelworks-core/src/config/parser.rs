//! Minimal parser for the board configuration file
//!
//! Handles only the subset of TOML used by `board.toml`. It does NOT
//! support the full TOML spec.
//!
//! Supported features:
//! - `[section]` headers
//! - `key = value` pairs (string, integer, boolean)
//! - Single-line string arrays: `pins = ["gpio2", "gpio3"]`
//! - Comments (# ...)
//!
//! Unknown keys are ignored so older firmware accepts newer files.

use heapless::Vec;

use super::board::{BoardConfig, ConfigError, PinConfig};
use crate::servo::MAX_CHANNELS;

/// Current parsing context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Servo,
    Rc,
    BuzzKill,
    Panel,
    Uart,
}

/// Parse board TOML into a validated [`BoardConfig`]
///
/// Keys missing from the file keep their default values.
pub fn parse_board_config(input: &str) -> Result<BoardConfig, ConfigError> {
    let mut config = BoardConfig::default();
    let mut section = Section::Root;

    for line in input.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            section = parse_section_header(&line[1..line.len() - 1])?;
            continue;
        }

        if let Some((key, value)) = parse_key_value(line) {
            apply_key_value(&mut config, section, key, value)?;
        }
    }

    config.validate()?;
    Ok(config)
}

fn parse_section_header(header: &str) -> Result<Section, ConfigError> {
    match header.trim() {
        "servo" => Ok(Section::Servo),
        "rc" => Ok(Section::Rc),
        "buzz_kill" => Ok(Section::BuzzKill),
        "panel" => Ok(Section::Panel),
        "uart" => Ok(Section::Uart),
        _ => Err(ConfigError::InvalidSection),
    }
}

fn apply_key_value(
    config: &mut BoardConfig,
    section: Section,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    match section {
        Section::Servo => match key {
            "pins" => config.servo.pins = parse_pin_list(value)?,
            "reversed" => config.servo.reversed = parse_bool(value)?,
            "min_us" => config.servo.min_us = parse_int(value)?,
            "max_us" => config.servo.max_us = parse_int(value)?,
            "period_us" => config.servo.period_us = parse_int(value)?,
            "min_pause_us" => config.servo.min_pause_us = parse_int(value)?,
            _ => {}
        },
        Section::Rc => match key {
            "pin" => config.rc.pin = parse_pin(value)?,
            "bad_sample_threshold" => config.rc.bad_sample_threshold = parse_int(value)?,
            "min_valid_us" => config.rc.min_valid_us = parse_int(value)?,
            "max_valid_us" => config.rc.max_valid_us = parse_int(value)?,
            _ => {}
        },
        Section::BuzzKill => match key {
            "closed_us" => config.buzz_kill.closed_us = parse_int(value)?,
            "tolerance_us" => config.buzz_kill.tolerance_us = parse_int(value)?,
            "debounce_ticks" => config.buzz_kill.debounce_ticks = parse_int(value)?,
            _ => {}
        },
        Section::Panel => {
            if key == "open_us" {
                config.panel.open_us = parse_int(value)?;
            }
        }
        Section::Uart => match key {
            "tx_pin" => config.uart.tx_pin = parse_pin(value)?.pin,
            "rx_pin" => config.uart.rx_pin = parse_pin(value)?.pin,
            "baud_rate" => config.uart.baud_rate = parse_int(value)?,
            _ => {}
        },
        Section::Root => {}
    }

    Ok(())
}

/// Parse "key = value" line
fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let eq_pos = line.find('=')?;
    let key = line[..eq_pos].trim();
    let value = line[eq_pos + 1..].trim();

    // Remove inline comments
    let value = match value.find('#') {
        Some(hash_pos) if value[..hash_pos].matches('"').count() % 2 == 0 => {
            value[..hash_pos].trim()
        }
        _ => value,
    };

    if key.is_empty() || value.is_empty() {
        return None;
    }

    Some((key, value))
}

/// Parse a string value (removes quotes)
fn parse_string(value: &str) -> &str {
    let value = value.trim();
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// Parse an integer value, allowing `_` digit separators
fn parse_int<T: core::str::FromStr>(value: &str) -> Result<T, ConfigError> {
    let mut digits: heapless::String<16> = heapless::String::new();
    for ch in value.chars().filter(|c| *c != '_') {
        digits.push(ch).map_err(|_| ConfigError::InvalidValue)?;
    }
    digits.parse().map_err(|_| ConfigError::InvalidValue)
}

fn parse_bool(value: &str) -> Result<bool, ConfigError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ConfigError::InvalidValue),
    }
}

/// Parse a pin string like "gpio11", "!gpio12", "^gpio4"
fn parse_pin(value: &str) -> Result<PinConfig, ConfigError> {
    let mut s = parse_string(value);
    let mut pin = PinConfig::default();

    loop {
        if let Some(rest) = s.strip_prefix('!') {
            pin.inverted = true;
            s = rest;
        } else if let Some(rest) = s.strip_prefix('^') {
            pin.pull_up = true;
            s = rest;
        } else {
            break;
        }
    }

    pin.pin = s
        .strip_prefix("gpio")
        .ok_or(ConfigError::InvalidPin)?
        .parse()
        .map_err(|_| ConfigError::InvalidPin)?;

    Ok(pin)
}

/// Parse `["gpio2", "gpio3", ...]`
fn parse_pin_list(value: &str) -> Result<Vec<PinConfig, MAX_CHANNELS>, ConfigError> {
    let inner = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .ok_or(ConfigError::InvalidValue)?;

    let mut pins = Vec::new();
    for item in inner.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        pins.push(parse_pin(item)?)
            .map_err(|_| ConfigError::TooManyChannels)?;
    }

    if pins.is_empty() {
        return Err(ConfigError::NoChannels);
    }

    Ok(pins)
}
