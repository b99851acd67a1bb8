//! Panelworks - Animatronic Panel Controller Firmware
//!
//! Firmware binary for RP2040-based panel controller boards. Drives up to
//! twelve hobby servos from one time base, reads a radio-control channel in
//! the gap after each pulse train, and plays timed panel routines on
//! commands received over a serial line.

#![no_std]
#![no_main]

use defmt::{panic, *};
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::Pull;
use embassy_rp::interrupt;
use embassy_rp::interrupt::{InterruptExt, Priority};
use embassy_rp::peripherals::{PIO0, UART0};
use embassy_rp::pio::{InterruptHandler as PioInterruptHandler, Pio};
use embassy_rp::uart::{BufferedInterruptHandler, Config as UartConfig, Uart};
use heapless::Vec;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use panelworks_core::config::{parse_board_config, BoardConfig};
use panelworks_core::servo::PulseTrain;
use panelworks_core::PanelController;

use crate::channels::{RC_MONITOR, SERVO_BANK};
use crate::pins::PinBank;
use crate::tasks::{PioServos, RcCapture};

/// Embedded board configuration (compiled into firmware)
/// Edit board.toml and rebuild to customize
const EMBEDDED_CONFIG: &str = include_str!("../board.toml");

mod channels;
mod pins;
mod tasks;

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
    PIO0_IRQ_0 => PioInterruptHandler<PIO0>;
});

/// High-priority executor for the pulse train
static EXECUTOR_PULSE: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn SWI_IRQ_1() {
    EXECUTOR_PULSE.on_interrupt()
}

// Static cells for UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; 16]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 256]> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Panelworks firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    let config = load_config();
    info!(
        "Board: {} channels, period {} us, RC on gpio{}",
        config.channel_count(),
        config.servo.period_us,
        config.rc.pin.pin
    );

    // Command UART (UART0 on gpio0/gpio1, checked by build.rs)
    let mut uart_config = UartConfig::default();
    uart_config.baudrate = config.uart.baud_rate;
    let tx_buf = TX_BUF.init([0u8; 16]);
    let rx_buf = RX_BUF.init([0u8; 256]);
    let uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, uart_config);
    let uart = uart.into_buffered(Irqs, tx_buf, rx_buf);
    let (_tx, rx) = uart.split();
    info!("UART initialized at {} baud", config.uart.baud_rate);

    // Servo outputs and RC input, by number from the board config. PIO0
    // drives both.
    let Pio {
        mut common,
        sm0,
        sm1,
        ..
    } = Pio::new(p.PIO0, Irqs);
    let mut pins = PinBank::new([
        None, // gpio0: UART0 TX
        None, // gpio1: UART0 RX
        Some(common.make_pio_pin(p.PIN_2)),
        Some(common.make_pio_pin(p.PIN_3)),
        Some(common.make_pio_pin(p.PIN_4)),
        Some(common.make_pio_pin(p.PIN_5)),
        Some(common.make_pio_pin(p.PIN_6)),
        Some(common.make_pio_pin(p.PIN_7)),
        Some(common.make_pio_pin(p.PIN_8)),
        Some(common.make_pio_pin(p.PIN_9)),
        Some(common.make_pio_pin(p.PIN_10)),
        Some(common.make_pio_pin(p.PIN_11)),
        Some(common.make_pio_pin(p.PIN_12)),
        Some(common.make_pio_pin(p.PIN_13)),
        Some(common.make_pio_pin(p.PIN_14)),
        Some(common.make_pio_pin(p.PIN_15)),
        Some(common.make_pio_pin(p.PIN_16)),
        Some(common.make_pio_pin(p.PIN_17)),
        Some(common.make_pio_pin(p.PIN_18)),
        Some(common.make_pio_pin(p.PIN_19)),
        Some(common.make_pio_pin(p.PIN_20)),
        Some(common.make_pio_pin(p.PIN_21)),
        Some(common.make_pio_pin(p.PIN_22)),
        Some(common.make_pio_pin(p.PIN_23)),
        Some(common.make_pio_pin(p.PIN_24)),
        Some(common.make_pio_pin(p.PIN_25)),
        Some(common.make_pio_pin(p.PIN_26)),
        Some(common.make_pio_pin(p.PIN_27)),
        Some(common.make_pio_pin(p.PIN_28)),
        Some(common.make_pio_pin(p.PIN_29)),
    ]);

    // Channel n is bit n-1 of the pin block, so a missing pin cannot be
    // skipped
    let mut servo_pins = Vec::new();
    for (index, pin) in config.servo.pins.iter().enumerate() {
        match pins.take(pin.pin) {
            Ok(gpio) => {
                if servo_pins.push((gpio, pin.inverted)).is_err() {
                    panic!("Servo channel {}: too many outputs", index + 1);
                }
            }
            Err(e) => panic!("Servo channel {} on gpio{}: {:?}", index + 1, pin.pin, e),
        }
    }
    let servos = PioServos::new(&mut common, sm0, &mut servo_pins);

    let mut rc_pin = match pins.take(config.rc.pin.pin) {
        Ok(gpio) => gpio,
        Err(e) => panic!("RC input on gpio{}: {:?}", config.rc.pin.pin, e),
    };
    rc_pin.set_pull(if config.rc.pin.pull_up {
        Pull::Up
    } else {
        Pull::None
    });
    let rc = RcCapture::new(&mut common, sm1, &rc_pin);
    info!("Servo outputs and RC input initialized");

    // Controller configures the shared bank and monitor before the pulse
    // task first reads them
    let mut controller = match PanelController::new(&config, &SERVO_BANK, &RC_MONITOR) {
        Ok(controller) => controller,
        Err(e) => panic!("Controller setup failed: {:?}", e),
    };
    let train = PulseTrain::new(&config.servo);

    interrupt::SWI_IRQ_1.set_priority(Priority::P2);
    let pulse_spawner = EXECUTOR_PULSE.start(interrupt::SWI_IRQ_1);
    pulse_spawner
        .spawn(tasks::pulse_task(servos, rc, train))
        .unwrap();

    // Power-up: close every panel softly
    for event in controller.start() {
        debug!("Startup event: {:?}", event);
    }
    controller.on_sequence_complete(startup_complete);
    info!("Closing all panels");

    spawner.spawn(tasks::tick_task()).unwrap();
    spawner.spawn(tasks::command_rx_task(rx)).unwrap();
    spawner.spawn(tasks::controller_task(controller)).unwrap();

    info!("All tasks spawned, firmware running");

    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}

/// Runs once when the power-up close routine ends
fn startup_complete() {
    info!("Panels closed, ready for commands");
}

/// Parse the embedded board configuration
///
/// Falls back to the built-in defaults if the file is broken. build.rs
/// rejects invalid files, so this only happens if the two disagree.
fn load_config() -> BoardConfig {
    match parse_board_config(EMBEDDED_CONFIG) {
        Ok(config) => {
            info!("Parsed embedded configuration successfully");
            config
        }
        Err(e) => {
            error!("Failed to parse embedded config: {:?}", e);
            error!("Using default board configuration");
            BoardConfig::default()
        }
    }
}
