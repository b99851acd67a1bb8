//! Tick clock and countdown timer registry
//!
//! The clock advances once per base period ([`TICK_HZ`] times a second).
//! Each tick decrements every registered countdown cell that is not already
//! at zero. An expired cell stays at zero until it is reloaded.

use heapless::Vec;

/// Base tick rate (ticks per second)
pub const TICK_HZ: u32 = 100;

/// Tick period in milliseconds
pub const TICK_PERIOD_MS: u64 = 1000 / TICK_HZ as u64;

/// Maximum number of countdown cells
pub const MAX_TIMERS: usize = 16;

/// Timer registry errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerError {
    /// All countdown cells are in use
    Full,
}

/// Handle to a registered countdown cell
///
/// Only [`TimerRegistry::register`] hands these out, so a handle always
/// refers to a cell that exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerId(u8);

/// Fixed-capacity set of countdown cells
#[derive(Debug, Clone, Default)]
pub struct TimerRegistry<const N: usize = MAX_TIMERS> {
    cells: Vec<u16, N>,
}

impl<const N: usize> TimerRegistry<N> {
    /// Create an empty registry
    pub const fn new() -> Self {
        Self { cells: Vec::new() }
    }

    /// Add a countdown cell with an initial count
    pub fn register(&mut self, initial: u16) -> Result<TimerId, TimerError> {
        let index = self.cells.len();
        self.cells.push(initial).map_err(|_| TimerError::Full)?;
        Ok(TimerId(index as u8))
    }

    /// Decrement every running cell by one
    pub fn tick(&mut self) {
        for cell in self.cells.iter_mut().filter(|c| **c > 0) {
            *cell -= 1;
        }
    }

    /// Remaining ticks on a cell
    pub fn remaining(&self, id: TimerId) -> u16 {
        self.cells.get(id.0 as usize).copied().unwrap_or(0)
    }

    /// Reload a cell
    pub fn load(&mut self, id: TimerId, ticks: u16) {
        if let Some(cell) = self.cells.get_mut(id.0 as usize) {
            *cell = ticks;
        }
    }

    /// Check if a cell has counted down to zero
    pub fn is_expired(&self, id: TimerId) -> bool {
        self.remaining(id) == 0
    }

    /// Number of registered cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Check if no cells are registered
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Monotonic tick counter plus the timer registry it drives
#[derive(Debug, Clone, Default)]
pub struct TickClock {
    ticks: u32,
    timers: TimerRegistry,
}

impl TickClock {
    /// Create a clock at tick zero with no timers
    pub const fn new() -> Self {
        Self {
            ticks: 0,
            timers: TimerRegistry::new(),
        }
    }

    /// Advance one base period
    pub fn tick(&mut self) {
        self.ticks = self.ticks.wrapping_add(1);
        self.timers.tick();
    }

    /// Ticks elapsed since creation (wraps after ~497 days)
    pub fn now(&self) -> u32 {
        self.ticks
    }

    /// Timer registry
    pub fn timers(&self) -> &TimerRegistry {
        &self.timers
    }

    /// Mutable timer registry
    pub fn timers_mut(&mut self) -> &mut TimerRegistry {
        &mut self.timers
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_count_down() {
        let mut timers: TimerRegistry<4> = TimerRegistry::new();
        let a = timers.register(3).unwrap();
        let b = timers.register(1).unwrap();

        timers.tick();
        assert_eq!(timers.remaining(a), 2);
        assert!(timers.is_expired(b));

        timers.tick();
        timers.tick();
        assert!(timers.is_expired(a));
    }

    #[test]
    fn test_expired_cell_stays_at_zero() {
        let mut timers: TimerRegistry<2> = TimerRegistry::new();
        let id = timers.register(1).unwrap();
        for _ in 0..5 {
            timers.tick();
        }
        assert_eq!(timers.remaining(id), 0);

        timers.load(id, 2);
        timers.tick();
        assert_eq!(timers.remaining(id), 1);
    }

    #[test]
    fn test_registry_full() {
        let mut timers: TimerRegistry<2> = TimerRegistry::new();
        timers.register(0).unwrap();
        timers.register(0).unwrap();
        assert_eq!(timers.register(0), Err(TimerError::Full));
        assert_eq!(timers.len(), 2);
    }

    #[test]
    fn test_clock_drives_timers() {
        let mut clock = TickClock::new();
        let id = clock.timers_mut().register(2).unwrap();
        clock.tick();
        clock.tick();
        assert_eq!(clock.now(), 2);
        assert!(clock.timers().is_expired(id));
    }
}
