//! Servo pulse task
//!
//! Runs on the high-priority interrupt executor and keeps PIO0 fed. State
//! machine 0 emits the pulse train from FIFO words, so pulse edges are
//! exact to one PIO cycle (1 µs) no matter how late the task runs. A late
//! refill lengthens the pause after the train and never a pulse.
//!
//! State machine 1 measures the RC input. It is only running while the
//! train is in its pause.

use defmt::*;
use embassy_rp::clocks::clk_sys_freq;
use embassy_rp::gpio::Level;
use embassy_rp::peripherals::PIO0;
use embassy_rp::pio::{
    Common, Config, Direction, FifoJoin, Pin, ShiftConfig, ShiftDirection, StateMachine,
};
use embassy_time::{with_deadline, Duration, Instant, Timer};
use fixed::types::U24F8;
use heapless::Vec;

use panelworks_core::capture::CaptureWindow;
use panelworks_core::servo::word::{self, CAPTURE_TICK_HZ, PIO_TICK_HZ};
use panelworks_core::servo::{PulseTrain, Step, MAX_CHANNELS};

use crate::channels::{RC_MONITOR, SERVO_BANK};

/// Poll interval while the bank is stopped
const HALTED_POLL_MS: u64 = 1;

/// Poll interval while waiting for the pause word to start
const DRAIN_POLL_US: u64 = 20;

/// Capture stops this long before the pause ends, leaving time to queue
/// the next frame
const CAPTURE_MARGIN_US: u32 = 300;

fn divider(tick_hz: u32) -> U24F8 {
    U24F8::from_bits(word::clock_divider_bits(clk_sys_freq(), tick_hz))
}

/// Servo outputs driven by PIO0 state machine 0
pub struct PioServos {
    sm: StateMachine<'static, PIO0, 0>,
    count: usize,
}

impl PioServos {
    /// Load the pulse program and hand it the servo pin block
    ///
    /// `pins` must be consecutive GPIOs, channel 1 first. Inverted pins are
    /// inverted at the pad, so the program always drives active-high.
    pub fn new(
        common: &mut Common<'static, PIO0>,
        mut sm: StateMachine<'static, PIO0, 0>,
        pins: &mut Vec<(Pin<'static, PIO0>, bool), MAX_CHANNELS>,
    ) -> Self {
        let prg = pio::pio_asm!(
            r#"
            .wrap_target
                pull block
                out pins, 16
                out x, 16
            hold:
                jmp x--, hold
                mov pins, null
            .wrap
            "#
        );
        let loaded = common.load_program(&prg.program);

        for (pin, inverted) in pins.iter_mut() {
            pin.set_output_inversion(*inverted);
        }
        let block: Vec<&Pin<'static, PIO0>, MAX_CHANNELS> =
            pins.iter().map(|(pin, _)| pin).collect();

        let mut cfg = Config::default();
        cfg.use_program(&loaded, &[]);
        cfg.set_out_pins(&block);
        cfg.clock_divider = divider(PIO_TICK_HZ);
        cfg.shift_out = ShiftConfig {
            threshold: 32,
            direction: ShiftDirection::Right,
            auto_fill: false,
        };
        cfg.fifo_join = FifoJoin::TxOnly;

        sm.set_config(&cfg);
        sm.set_pins(Level::Low, &block);
        sm.set_pin_dirs(Direction::Out, &block);
        sm.set_enable(true);

        Self {
            sm,
            count: block.len(),
        }
    }

    /// Number of servo outputs
    pub fn len(&self) -> usize {
        self.count
    }

    /// Queue one pulse
    async fn pulse(&mut self, channel: u8, width_us: u16) {
        let index = channel.saturating_sub(1);
        self.sm.tx().wait_push(word::pulse_word(index, width_us)).await;
    }

    /// Queue a pause and wait until the machine starts it
    ///
    /// Returns the (approximate) start of the pause.
    async fn pause(&mut self, pause_us: u32) -> Instant {
        let mut words = word::pause_words(pause_us);
        if let Some(first) = words.next() {
            self.sm.tx().wait_push(first).await;
        }
        while !self.sm.tx().empty() {
            Timer::after_micros(DRAIN_POLL_US).await;
        }
        let start = Instant::now();
        for rest in words {
            self.sm.tx().wait_push(rest).await;
        }
        start
    }

    /// Drop every queued word; the word in progress finishes at idle
    fn halt(&mut self) {
        self.sm.clear_fifos();
    }
}

/// RC pulse width capture on PIO0 state machine 1
pub struct RcCapture {
    sm: StateMachine<'static, PIO0, 1>,
    cfg: Config<'static, PIO0>,
}

impl RcCapture {
    /// Load the capture program for the RC input pin
    pub fn new(
        common: &mut Common<'static, PIO0>,
        mut sm: StateMachine<'static, PIO0, 1>,
        pin: &Pin<'static, PIO0>,
    ) -> Self {
        // Two cycles per count at 2 MHz: the pushed value is in µs
        let prg = pio::pio_asm!(
            r#"
            .wrap_target
                wait 0 pin 0
                wait 1 pin 0
                mov x, ~null
            count:
                jmp x--, still
            still:
                jmp pin, count
                mov isr, ~x
                push noblock
            .wrap
            "#
        );
        let loaded = common.load_program(&prg.program);

        let mut cfg = Config::default();
        cfg.use_program(&loaded, &[]);
        cfg.set_in_pins(&[pin]);
        cfg.set_jmp_pin(pin);
        cfg.clock_divider = divider(CAPTURE_TICK_HZ);
        cfg.fifo_join = FifoJoin::RxOnly;

        sm.set_config(&cfg);
        sm.set_pin_dirs(Direction::In, &[pin]);

        Self { sm, cfg }
    }

    /// Measure the first complete RC pulse that starts before `end`
    ///
    /// A pulse already high when sampling starts is skipped.
    async fn sample(&mut self, mut window: CaptureWindow, end: Instant) -> CaptureWindow {
        // Reloading the config rewinds the program
        self.sm.set_config(&self.cfg);
        self.sm.clear_fifos();
        self.sm.restart();
        self.sm.set_enable(true);

        if let Ok(width) = with_deadline(end, self.sm.rx().wait_pull()).await {
            window.record_width(width);
        }

        self.sm.set_enable(false);
        window
    }
}

/// Pulse task - feeds the servo frames and samples the RC input
#[embassy_executor::task]
pub async fn pulse_task(mut servos: PioServos, mut rc: RcCapture, mut train: PulseTrain) {
    info!("Pulse task started ({} outputs)", servos.len());

    let mut running = false;

    loop {
        match train.service(&SERVO_BANK) {
            Step::Pulse { channel, width_us } => {
                if !running {
                    debug!("Pulse train running");
                    running = true;
                }
                servos.pulse(channel, width_us).await;
            }
            Step::Pause { after_us, window } => {
                running = true;
                let start = servos.pause(after_us).await;
                let open_us = after_us.saturating_sub(CAPTURE_MARGIN_US);
                let end = start + Duration::from_micros(open_us as u64);

                let window = rc.sample(window, end).await;
                if RC_MONITOR.complete(window).is_none() {
                    trace!("RC sample rejected ({} bad)", RC_MONITOR.bad_samples());
                }
            }
            Step::Halted => {
                if running {
                    servos.halt();
                    debug!("Pulse train halted");
                    running = false;
                }
                Timer::after_millis(HALTED_POLL_MS).await;
            }
        }
    }
}
