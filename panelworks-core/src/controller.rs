//! Panel controller
//!
//! Ties the tick clock, sequencer and channel arbiter together and applies
//! panel commands to them. The controller runs in the main loop; the
//! interrupt side only sees the shared [`ServoBank`] and [`RcMonitor`].

use heapless::Vec;

use crate::arbiter::{ArbiterEvent, ChannelArbiter};
use crate::capture::{RcMonitor, RcReading};
use crate::channel::{ChannelMask, ChannelSelect, OwnerMode};
use crate::clock::{TickClock, TimerError};
use crate::config::{BoardConfig, ConfigError};
use crate::scripts::Routine;
use crate::sequencer::{CompletionCallback, PanelPositions, Sequencer, SequencerEvent};
use crate::servo::ServoBank;
use panelworks_protocol::{PanelCommand, ALL_PANELS};

/// Argument selecting the top panel group
pub const TOP_GROUP: u8 = 11;
/// Argument selecting the bottom panel group
pub const BOTTOM_GROUP: u8 = 12;
/// Last channel of the bottom group
const BOTTOM_GROUP_LAST: u8 = 6;

/// Most events a single tick can produce
pub const MAX_EVENTS: usize = 4;

/// Reasons the controller cannot be built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControllerError {
    /// Board configuration failed validation
    Config(ConfigError),
    /// Not enough countdown cells for every channel
    Timers(TimerError),
}

impl From<ConfigError> for ControllerError {
    fn from(e: ConfigError) -> Self {
        ControllerError::Config(e)
    }
}

impl From<TimerError> for ControllerError {
    fn from(e: TimerError) -> Self {
        ControllerError::Timers(e)
    }
}

/// Something worth reporting happened during a tick or command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControllerEvent {
    /// The running routine reached its end
    SequenceFinished,
    /// The buzz-kill depowered these channels
    ChannelsSilenced(ChannelMask),
    /// The RC input stopped delivering valid pulses
    SignalLost,
    /// The RC input is valid again
    SignalRestored,
}

/// Events from one call
pub type Events = Vec<ControllerEvent, MAX_EVENTS>;

/// Main-loop panel controller
pub struct PanelController<'a> {
    clock: TickClock,
    sequencer: Sequencer,
    arbiter: ChannelArbiter,
    bank: &'a ServoBank,
    monitor: &'a RcMonitor,
    open_us: u16,
    signal_lost: bool,
}

impl<'a> PanelController<'a> {
    /// Create a controller and apply the board configuration to the shared
    /// bank and monitor
    ///
    /// The configuration is validated first; nothing is touched if it is
    /// rejected. The pulse engine is left stopped until
    /// [`start`](Self::start).
    pub fn new(
        config: &BoardConfig,
        bank: &'a ServoBank,
        monitor: &'a RcMonitor,
    ) -> Result<Self, ControllerError> {
        config.validate()?;

        bank.configure(
            config.channel_count(),
            config.servo.min_us,
            config.servo.max_us,
        );
        monitor.configure(
            config.rc.bad_sample_threshold,
            config.rc.min_valid_us,
            config.rc.max_valid_us,
        );

        let mut clock = TickClock::new();
        let arbiter = ChannelArbiter::new(config, clock.timers_mut())?;

        let mut sequencer = Sequencer::new();
        sequencer.set_positions(PanelPositions {
            open_us: config.panel.open_us,
            closed_us: config.closed_us(),
        });

        Ok(Self {
            clock,
            sequencer,
            arbiter,
            bank,
            monitor,
            open_us: config.panel.open_us,
            signal_lost: true,
        })
    }

    /// Start pulsing and softly close every panel
    pub fn start(&mut self) -> Events {
        self.bank.start();
        self.play(Routine::CloseAll)
    }

    /// Stop every routine, depower every panel and halt the pulse engine
    pub fn shutdown(&mut self) {
        self.sequencer.stop(self.arbiter.channels_mut());
        self.arbiter
            .disable_and_depower(ChannelSelect::All, self.bank);
        self.bank.stop();
    }

    /// Number of channels under control
    pub fn channel_count(&self) -> u8 {
        self.arbiter.channels().len()
    }

    /// Tick clock
    pub fn clock(&self) -> &TickClock {
        &self.clock
    }

    /// Sequencer
    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    /// Channel arbiter
    pub fn arbiter(&self) -> &ChannelArbiter {
        &self.arbiter
    }

    /// Owner of a channel
    pub fn mode(&self, id: u8) -> OwnerMode {
        self.arbiter.mode(id)
    }

    /// Arm a one-shot callback for the routine that is currently loaded
    pub fn on_sequence_complete(&mut self, callback: CompletionCallback) {
        self.sequencer.add_completion_callback(callback);
    }

    /// Load and start a built-in routine with its speed preset
    pub fn play(&mut self, routine: Routine) -> Events {
        let channels = self.arbiter.channels_mut();
        self.sequencer.load(routine.sequence(), channels);
        self.sequencer.load_speed(routine.speed());
        let mut events = Events::new();
        if let Some(SequencerEvent::Finished) = self.sequencer.start(channels) {
            let _ = events.push(ControllerEvent::SequenceFinished);
        }
        events
    }

    /// Apply one panel command
    ///
    /// Arguments naming channels the board does not have are ignored.
    pub fn apply(&mut self, command: PanelCommand) -> Events {
        let count = self.channel_count();
        match command {
            PanelCommand::Sequence(number) => match Routine::from_number(number) {
                Some(routine) => return self.play(routine),
                None => self.sequencer.reset_speed(),
            },
            PanelCommand::Open(arg) => {
                let select = match arg {
                    n if n <= count => ChannelSelect::from_argument(n),
                    TOP_GROUP => ChannelSelect::Range(BOTTOM_GROUP_LAST + 1, count),
                    BOTTOM_GROUP => ChannelSelect::Range(1, BOTTOM_GROUP_LAST),
                    _ => return Events::new(),
                };
                self.arbiter
                    .freeze_at(select, self.open_us as i16, self.bank);
            }
            PanelCommand::Close(ALL_PANELS) => {
                self.arbiter.disable_rc_tracking(ChannelSelect::All);
                return self.play(Routine::CloseAll);
            }
            PanelCommand::Close(n) if n <= count => {
                self.arbiter.close_and_silence(
                    ChannelSelect::One(n),
                    self.bank,
                    self.clock.timers_mut(),
                );
            }
            PanelCommand::Rc(n) if n <= count => {
                self.arbiter
                    .enable_rc_tracking(ChannelSelect::from_argument(n));
            }
            PanelCommand::Stop(n) if n <= count => {
                self.arbiter
                    .disable_and_depower(ChannelSelect::from_argument(n), self.bank);
            }
            PanelCommand::Hold(n) if n <= count => {
                self.arbiter
                    .disable_rc_tracking(ChannelSelect::from_argument(n));
            }
            _ => {}
        }
        Events::new()
    }

    /// Advance one tick: timers, then the sequencer, then the arbiter
    pub fn tick(&mut self) -> Events {
        let mut events = Events::new();

        self.clock.tick();

        if let Some(SequencerEvent::Finished) =
            self.sequencer.tick(self.bank, self.arbiter.channels_mut())
        {
            let _ = events.push(ControllerEvent::SequenceFinished);
        }

        let reading = self.monitor.read();
        let lost = reading == RcReading::SignalLost;
        if lost != self.signal_lost {
            self.signal_lost = lost;
            let event = if lost {
                ControllerEvent::SignalLost
            } else {
                ControllerEvent::SignalRestored
            };
            let _ = events.push(event);
        }

        if let Some(ArbiterEvent::Silenced(mask)) =
            self.arbiter
                .tick(reading, self.bank, self.clock.timers_mut())
        {
            let _ = events.push(ControllerEvent::ChannelsSilenced(mask));
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureWindow;
    use crate::sequencer::sequence_ticks;
    use crate::servo::NO_PULSE;
    use portable_atomic::{AtomicU32, Ordering};

    const OPEN_US: u16 = 1000;
    const CLOSED_US: u16 = 2000;

    fn config() -> BoardConfig {
        BoardConfig::default()
    }

    fn feed(monitor: &RcMonitor, width: u32) {
        let mut window = CaptureWindow::new(20_000);
        window.record_width(width);
        monitor.complete(window);
    }

    fn run_ticks(controller: &mut PanelController, ticks: u32) -> std::vec::Vec<ControllerEvent> {
        let mut all = std::vec::Vec::new();
        for _ in 0..ticks {
            all.extend(controller.tick());
        }
        all
    }

    #[test]
    fn test_new_configures_shared_state() {
        let bank = ServoBank::new();
        let monitor = RcMonitor::new();
        let controller = PanelController::new(&config(), &bank, &monitor).unwrap();

        assert_eq!(controller.channel_count(), 10);
        assert_eq!(bank.channel_count(), 10);
        assert!(!bank.is_running());
        assert_eq!(monitor.read(), RcReading::SignalLost);
    }

    #[test]
    fn test_start_closes_all_panels_softly() {
        let bank = ServoBank::new();
        let monitor = RcMonitor::new();
        let mut controller = PanelController::new(&config(), &bank, &monitor).unwrap();

        assert!(controller.start().is_empty());
        assert!(bank.is_running());
        assert!(controller.sequencer().is_playing());

        // Outputs start silent, so the first row jumps straight to closed
        controller.tick();
        for id in 1..=10 {
            assert_eq!(bank.read(id), CLOSED_US as i16);
            assert_eq!(controller.mode(id), OwnerMode::Sequencer);
        }

        let total = sequence_ticks(Routine::CloseAll.sequence());
        let events = run_ticks(&mut controller, total - 1);
        assert!(events.contains(&ControllerEvent::SequenceFinished));
        assert_eq!(controller.mode(1), OwnerMode::Idle);
    }

    #[test]
    fn test_completion_callback_fires_once() {
        static CALLS: AtomicU32 = AtomicU32::new(0);
        fn done() {
            CALLS.fetch_add(1, Ordering::Relaxed);
        }

        let bank = ServoBank::new();
        let monitor = RcMonitor::new();
        let mut controller = PanelController::new(&config(), &bank, &monitor).unwrap();
        controller.start();
        controller.on_sequence_complete(done);

        run_ticks(&mut controller, 400);
        assert_eq!(CALLS.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_open_commands() {
        let bank = ServoBank::new();
        let monitor = RcMonitor::new();
        let mut controller = PanelController::new(&config(), &bank, &monitor).unwrap();

        controller.apply(PanelCommand::Open(3));
        assert_eq!(bank.read(3), OPEN_US as i16);
        assert_eq!(bank.read(2), NO_PULSE);
        assert_eq!(controller.mode(3), OwnerMode::Frozen);

        controller.apply(PanelCommand::Open(BOTTOM_GROUP));
        for id in 1..=6 {
            assert_eq!(bank.read(id), OPEN_US as i16);
        }
        assert_eq!(bank.read(7), NO_PULSE);

        controller.apply(PanelCommand::Open(TOP_GROUP));
        for id in 7..=10 {
            assert_eq!(bank.read(id), OPEN_US as i16);
        }

        // Not a channel and not a group
        controller.apply(PanelCommand::Open(40));
    }

    #[test]
    fn test_open_all() {
        let bank = ServoBank::new();
        let monitor = RcMonitor::new();
        let mut controller = PanelController::new(&config(), &bank, &monitor).unwrap();

        controller.apply(PanelCommand::Open(0));
        for id in 1..=10 {
            assert_eq!(bank.read(id), OPEN_US as i16);
        }
    }

    #[test]
    fn test_close_one_silences_after_debounce() {
        let bank = ServoBank::new();
        let monitor = RcMonitor::new();
        let cfg = config();
        let mut controller = PanelController::new(&cfg, &bank, &monitor).unwrap();

        controller.apply(PanelCommand::Open(2));
        controller.apply(PanelCommand::Close(2));
        assert_eq!(bank.read(2), CLOSED_US as i16);

        let events = run_ticks(&mut controller, cfg.buzz_kill.debounce_ticks as u32);
        let mut expected = ChannelMask::default();
        expected.insert(2);
        assert!(events.contains(&ControllerEvent::ChannelsSilenced(expected)));
        assert_eq!(bank.read(2), NO_PULSE);
        assert_eq!(controller.mode(2), OwnerMode::PoweredOff);
    }

    #[test]
    fn test_close_all_takes_panels_off_rc() {
        let bank = ServoBank::new();
        let monitor = RcMonitor::new();
        let mut controller = PanelController::new(&config(), &bank, &monitor).unwrap();

        controller.apply(PanelCommand::Rc(0));
        assert_eq!(controller.mode(4), OwnerMode::RcTracking);

        controller.apply(PanelCommand::Close(0));
        assert!(controller.sequencer().is_playing());
        controller.tick();
        assert_eq!(controller.mode(4), OwnerMode::Sequencer);
    }

    #[test]
    fn test_rc_tracking_and_signal_transitions() {
        let bank = ServoBank::new();
        let monitor = RcMonitor::new();
        let mut controller = PanelController::new(&config(), &bank, &monitor).unwrap();

        controller.apply(PanelCommand::Rc(5));
        feed(&monitor, 1_300);
        assert_eq!(controller.tick().as_slice(), [ControllerEvent::SignalRestored]);
        assert_eq!(bank.read(5), 1_300);

        // Bad samples until the threshold is reached
        for _ in 0..10 {
            let window = CaptureWindow::new(20_000);
            monitor.complete(window);
        }
        assert_eq!(controller.tick().as_slice(), [ControllerEvent::SignalLost]);
        assert_eq!(bank.read(5), NO_PULSE);
    }

    #[test]
    fn test_hold_and_stop() {
        let bank = ServoBank::new();
        let monitor = RcMonitor::new();
        let mut controller = PanelController::new(&config(), &bank, &monitor).unwrap();

        controller.apply(PanelCommand::Rc(0));
        feed(&monitor, 1_400);
        controller.tick();

        controller.apply(PanelCommand::Hold(1));
        feed(&monitor, 1_600);
        controller.tick();
        assert_eq!(bank.read(1), 1_400);
        assert_eq!(bank.read(2), 1_600);

        controller.apply(PanelCommand::Stop(0));
        for id in 1..=10 {
            assert_eq!(bank.read(id), NO_PULSE);
            assert_eq!(controller.mode(id), OwnerMode::PoweredOff);
        }
    }

    #[test]
    fn test_out_of_range_arguments_ignored() {
        let bank = ServoBank::new();
        let monitor = RcMonitor::new();
        let mut controller = PanelController::new(&config(), &bank, &monitor).unwrap();

        controller.apply(PanelCommand::Rc(11));
        controller.apply(PanelCommand::Close(11));
        controller.apply(PanelCommand::Stop(99));
        for id in 1..=10 {
            assert_eq!(controller.mode(id), OwnerMode::Idle);
        }
    }

    #[test]
    fn test_shutdown_depowers_and_halts() {
        let bank = ServoBank::new();
        let monitor = RcMonitor::new();
        let mut controller = PanelController::new(&config(), &bank, &monitor).unwrap();
        controller.start();
        run_ticks(&mut controller, 20);

        controller.shutdown();
        assert!(!bank.is_running());
        assert!(!controller.sequencer().is_playing());
        for id in 1..=10 {
            assert_eq!(bank.read(id), NO_PULSE);
            assert_eq!(controller.mode(id), OwnerMode::PoweredOff);
        }

        // Ticks no longer move anything
        run_ticks(&mut controller, 50);
        assert_eq!(bank.read(1), NO_PULSE);
    }

    #[test]
    fn test_sequence_command_plays_routine() {
        let bank = ServoBank::new();
        let monitor = RcMonitor::new();
        let mut controller = PanelController::new(&config(), &bank, &monitor).unwrap();
        bank.start();

        controller.apply(PanelCommand::Sequence(52));
        assert!(controller.sequencer().is_playing());
        assert!(controller.sequencer().speed().is_unlimited());

        controller.apply(PanelCommand::Sequence(56));
        assert!(!controller.sequencer().speed().is_unlimited());

        // Unknown routine leaves playback alone and clears speed limits
        controller.apply(PanelCommand::Sequence(3));
        assert!(controller.sequencer().is_playing());
        assert!(controller.sequencer().speed().is_unlimited());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let bank = ServoBank::new();
        let monitor = RcMonitor::new();
        let mut config = config();
        config.servo.min_us = 2000;
        config.servo.max_us = 1000;

        let result = PanelController::new(&config, &bank, &monitor);
        assert!(matches!(
            result,
            Err(ControllerError::Config(ConfigError::InvalidLimits))
        ));
        // Shared state is left as it was
        assert_eq!(bank.channel_count(), 12);
    }

    #[test]
    fn test_routines_use_configured_positions() {
        let bank = ServoBank::new();
        let monitor = RcMonitor::new();
        let mut config = config();
        config.panel.open_us = 1200;
        config.buzz_kill.closed_us = 1800;
        let mut controller = PanelController::new(&config, &bank, &monitor).unwrap();

        controller.start();
        controller.tick();
        assert_eq!(bank.read(1), 1800);

        controller.apply(PanelCommand::Open(2));
        assert_eq!(bank.read(2), 1200);
    }
}
