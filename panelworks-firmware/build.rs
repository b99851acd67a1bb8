//! Build script for panelworks-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates board.toml at compile time

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Servo channels supported by the pulse engine
const MAX_CHANNELS: usize = 12;

/// Highest RP2040 GPIO number
const MAX_GPIO: i64 = 29;

/// UART0 pins the command port is wired to
const UART_TX_PIN: i64 = 0;
const UART_RX_PIN: i64 = 1;

fn main() {
    setup_linker();
    validate_config();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    // Copy memory.x to the output directory
    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    // Tell rustc where to find memory.x
    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Validate board.toml at compile time
fn validate_config() {
    println!("cargo:rerun-if-changed=board.toml");

    let config_path = Path::new("board.toml");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: board.toml not found!                                    ║\n\
            ║                                                                  ║\n\
            ║  The firmware requires a board.toml configuration file.          ║\n\
            ║  Please create one in the panelworks-firmware directory.         ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read board.toml                                ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in board.toml                        ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                ║                                                                  ║\n\
                {}\n\
                ║                                                                  ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    let mut errors = Vec::new();
    let servo_pins = validate_servo(&config, &mut errors);
    validate_rc(&config, &servo_pins, &mut errors);
    validate_buzz_kill(&config, &mut errors);
    validate_panel(&config, &mut errors);
    validate_uart(&config, &mut errors);

    if !errors.is_empty() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: Invalid board configuration in board.toml                ║\n\
            ╠══════════════════════════════════════════════════════════════════╣\n\
            {}\n\
            ╚══════════════════════════════════════════════════════════════════╝\n",
            errors
                .iter()
                .map(|e| format!("║  • {:<62} ║", e))
                .collect::<Vec<_>>()
                .join("\n")
        );
    }

    println!("cargo:warning=board.toml validated successfully");
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse "gpioNN" with optional "!" / "^" modifiers
fn parse_pin(value: &str) -> Option<i64> {
    let pin = value.trim_start_matches(['!', '^']);
    let number: i64 = pin.strip_prefix("gpio")?.parse().ok()?;
    (0..=MAX_GPIO).contains(&number).then_some(number)
}

fn int(section: &toml::Value, key: &str) -> Option<i64> {
    section.get(key).and_then(|v| v.as_integer())
}

fn check_range(
    section: &toml::Value,
    name: &str,
    key: &str,
    range: std::ops::RangeInclusive<i64>,
    errors: &mut Vec<String>,
) {
    if let Some(value) = section.get(key) {
        match value.as_integer() {
            Some(v) if range.contains(&v) => {}
            _ => errors.push(format!(
                "[{}] {} must be in {}..={}",
                name,
                key,
                range.start(),
                range.end()
            )),
        }
    }
}

fn validate_servo(config: &toml::Value, errors: &mut Vec<String>) -> Vec<i64> {
    let Some(servo) = config.get("servo") else {
        errors.push("Missing [servo] section".into());
        return Vec::new();
    };

    let mut pins = Vec::new();
    match servo.get("pins").and_then(|v| v.as_array()) {
        Some(list) => {
            for item in list {
                match item.as_str().and_then(parse_pin) {
                    Some(pin) if pin == UART_TX_PIN || pin == UART_RX_PIN => {
                        errors.push(format!("[servo] gpio{} is the command UART", pin));
                    }
                    Some(pin) if pins.contains(&pin) => {
                        errors.push(format!("[servo] gpio{} listed twice", pin));
                    }
                    Some(pin) => pins.push(pin),
                    None => errors.push(format!("[servo] invalid pin {}", item)),
                }
            }
            if list.is_empty() || list.len() > MAX_CHANNELS {
                errors.push(format!("[servo] pins must list 1..={} pins", MAX_CHANNELS));
            }
            if pins.windows(2).any(|pair| pair[1] != pair[0] + 1) {
                errors.push("[servo] pins must be consecutive GPIOs in channel order".into());
            }
        }
        None => errors.push("[servo] pins is required".into()),
    }

    if let Some(v) = servo.get("reversed") {
        if !v.is_bool() {
            errors.push("[servo] reversed must be true or false".into());
        }
    }

    check_range(servo, "servo", "min_us", 500..=1499, errors);
    check_range(servo, "servo", "max_us", 1501..=2500, errors);

    let period = int(servo, "period_us").unwrap_or(24_000);
    let pause = int(servo, "min_pause_us").unwrap_or(4_000);
    if period <= pause || pause < 0 {
        errors.push("[servo] period_us must exceed min_pause_us".into());
    }

    pins
}

fn validate_rc(config: &toml::Value, servo_pins: &[i64], errors: &mut Vec<String>) {
    let Some(rc) = config.get("rc") else {
        return;
    };

    if let Some(pin) = rc.get("pin") {
        match pin.as_str().and_then(parse_pin) {
            Some(p) if servo_pins.contains(&p) => {
                errors.push(format!("[rc] gpio{} is also a servo output", p));
            }
            Some(p) if p == UART_TX_PIN || p == UART_RX_PIN => {
                errors.push(format!("[rc] gpio{} is the command UART", p));
            }
            Some(_) => {}
            None => errors.push("[rc] pin must look like \"gpioNN\"".into()),
        }
    }

    check_range(rc, "rc", "bad_sample_threshold", 1..=255, errors);
    let min = int(rc, "min_valid_us").unwrap_or(800);
    let max = int(rc, "max_valid_us").unwrap_or(2200);
    if min >= max || min < 0 || max > 65_535 {
        errors.push("[rc] min_valid_us must be below max_valid_us".into());
    }
}

fn validate_buzz_kill(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(buzz) = config.get("buzz_kill") else {
        return;
    };
    check_range(buzz, "buzz_kill", "closed_us", 500..=2500, errors);
    check_range(buzz, "buzz_kill", "tolerance_us", 0..=500, errors);
    check_range(buzz, "buzz_kill", "debounce_ticks", 1..=65_535, errors);
}

fn validate_panel(config: &toml::Value, errors: &mut Vec<String>) {
    if let Some(panel) = config.get("panel") {
        check_range(panel, "panel", "open_us", 500..=2500, errors);
    }
}

fn validate_uart(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(uart) = config.get("uart") else {
        return;
    };

    let tx = uart.get("tx_pin").and_then(|v| v.as_str()).map(parse_pin);
    let rx = uart.get("rx_pin").and_then(|v| v.as_str()).map(parse_pin);
    if matches!(tx, Some(p) if p != Some(UART_TX_PIN)) {
        errors.push(format!("[uart] tx_pin must be gpio{} (UART0)", UART_TX_PIN));
    }
    if matches!(rx, Some(p) if p != Some(UART_RX_PIN)) {
        errors.push(format!("[uart] rx_pin must be gpio{} (UART0)", UART_RX_PIN));
    }
    check_range(uart, "uart", "baud_rate", 1_200..=921_600, errors);
}
