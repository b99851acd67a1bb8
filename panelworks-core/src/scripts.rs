//! Built-in panel routines
//!
//! Motion scripts launched by the `:SExx` command. Routines address panels
//! as open or closed; the sequencer resolves those to the board's
//! configured positions. Durations are in ticks (1/100 s).

use crate::sequencer::{Keyframe, Sequence, SpeedProfile, Target};
use crate::servo::MAX_CHANNELS;

const OPEN: Target = Target::Open;
const CLOSED: Target = Target::Closed;

/// Depowers every panel once a routine has closed them
const REST: Keyframe = Keyframe::uniform(1, Target::Off);

/// Speed preset: no limit
pub const SPEED_FAST: u16 = 0;
/// Speed preset: medium (µs per tick)
pub const SPEED_MEDIUM: u16 = 25;
/// Speed preset: slow (µs per tick)
pub const SPEED_SLOW: u16 = 15;
/// Speed preset: very slow (µs per tick)
pub const SPEED_SUPER_SLOW: u16 = 9;

/// Panels swept by the wave routines
const WAVE_PANELS: usize = 10;

/// Every panel closed except `channel` (1-based)
const fn open_only(duration: u16, channel: usize) -> Keyframe {
    let mut row = Keyframe::uniform(duration, CLOSED);
    if channel >= 1 && channel <= MAX_CHANNELS {
        row.targets[channel - 1] = OPEN;
    }
    row
}

/// Panels `1..=count` open, the rest closed
const fn open_first(duration: u16, count: usize) -> Keyframe {
    let mut row = Keyframe::uniform(duration, CLOSED);
    let mut i = 0;
    while i < count && i < MAX_CHANNELS {
        row.targets[i] = OPEN;
        i += 1;
    }
    row
}

/// Panels `1..=count` closed, the rest open
const fn close_first(duration: u16, count: usize) -> Keyframe {
    let mut row = Keyframe::uniform(duration, OPEN);
    let mut i = 0;
    while i < count && i < MAX_CHANNELS {
        row.targets[i] = CLOSED;
        i += 1;
    }
    row
}

/// Odd panels open and even closed, or the reverse
const fn alternate(duration: u16, odd_open: bool) -> Keyframe {
    let mut row = Keyframe::uniform(duration, CLOSED);
    let mut i = 0;
    while i < MAX_CHANNELS {
        // index 0 is panel 1 (odd)
        if (i % 2 == 0) == odd_open {
            row.targets[i] = OPEN;
        }
        i += 1;
    }
    row
}

/// Panels `first..=last` open, the rest closed
const fn open_range(duration: u16, first: usize, last: usize) -> Keyframe {
    let mut row = Keyframe::uniform(duration, CLOSED);
    let mut i = first;
    while i <= last && i <= MAX_CHANNELS {
        if i >= 1 {
            row.targets[i - 1] = OPEN;
        }
        i += 1;
    }
    row
}

static CLOSE_ALL: [Keyframe; 3] = [Keyframe::uniform(130, CLOSED), REST, Keyframe::end()];

static FULL_OPEN: [Keyframe; 5] = [
    Keyframe::uniform(20, CLOSED),
    Keyframe::uniform(300, OPEN),
    Keyframe::uniform(200, CLOSED),
    REST,
    Keyframe::end(),
];

static WAVE: [Keyframe; 14] = [
    Keyframe::uniform(30, CLOSED),
    open_only(50, 1),
    open_only(50, 2),
    open_only(50, 3),
    open_only(50, 4),
    open_only(50, 5),
    open_only(50, 6),
    open_only(50, 7),
    open_only(50, 8),
    open_only(50, 9),
    open_only(50, 10),
    Keyframe::uniform(150, CLOSED),
    REST,
    Keyframe::end(),
];

static FAST_WAVE: [Keyframe; 25] = [
    Keyframe::uniform(15, CLOSED),
    open_only(15, 1),
    open_only(15, 2),
    open_only(15, 3),
    open_only(15, 4),
    open_only(15, 5),
    open_only(15, 6),
    open_only(15, 7),
    open_only(15, 8),
    open_only(15, 9),
    open_only(15, 10),
    Keyframe::uniform(15, CLOSED),
    open_only(15, 10),
    open_only(15, 9),
    open_only(15, 8),
    open_only(15, 7),
    open_only(15, 6),
    open_only(15, 5),
    open_only(15, 4),
    open_only(15, 3),
    open_only(15, 2),
    open_only(15, 1),
    Keyframe::uniform(15, CLOSED),
    REST,
    Keyframe::end(),
];

static OPEN_CLOSE_WAVE: [Keyframe; 23] = [
    Keyframe::uniform(20, CLOSED),
    open_first(20, 1),
    open_first(20, 2),
    open_first(20, 3),
    open_first(20, 4),
    open_first(20, 5),
    open_first(20, 6),
    open_first(20, 7),
    open_first(20, 8),
    open_first(20, 9),
    open_first(80, WAVE_PANELS),
    close_first(20, 1),
    close_first(20, 2),
    close_first(20, 3),
    close_first(20, 4),
    close_first(20, 5),
    close_first(20, 6),
    close_first(20, 7),
    close_first(20, 8),
    close_first(20, 9),
    Keyframe::uniform(40, CLOSED),
    REST,
    Keyframe::end(),
];

static MARCHING_ANTS: [Keyframe; 15] = [
    Keyframe::uniform(20, CLOSED),
    alternate(50, true),
    alternate(50, false),
    alternate(50, true),
    alternate(50, false),
    alternate(50, true),
    alternate(50, false),
    alternate(50, true),
    alternate(50, false),
    alternate(50, true),
    alternate(50, false),
    alternate(50, true),
    Keyframe::uniform(100, CLOSED),
    REST,
    Keyframe::end(),
];

static LONG_OPEN: [Keyframe; 6] = [
    Keyframe::uniform(20, CLOSED),
    Keyframe::uniform(500, OPEN),
    Keyframe::uniform(500, OPEN),
    Keyframe::uniform(300, CLOSED),
    REST,
    Keyframe::end(),
];

static DANCE: [Keyframe; 17] = [
    Keyframe::uniform(20, CLOSED),
    open_range(25, 1, 6),
    open_range(25, 7, 10),
    open_range(25, 1, 6),
    open_range(25, 7, 10),
    alternate(25, true),
    alternate(25, false),
    alternate(25, true),
    alternate(25, false),
    open_range(25, 4, 7),
    open_range(25, 1, 10),
    open_range(25, 4, 7),
    Keyframe::uniform(25, CLOSED),
    open_range(50, 1, 10),
    Keyframe::uniform(100, CLOSED),
    REST,
    Keyframe::end(),
];

/// Built-in routines, numbered as on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Routine {
    /// 00: close every panel softly
    CloseAll,
    /// 51: open everything, then close
    FullOpen,
    /// 52: open one panel at a time
    Wave,
    /// 53: quick wave out and back
    FastWave,
    /// 54: open panels one by one, then close them one by one
    OpenCloseWave,
    /// 55: odd and even panels alternate
    MarchingAnts,
    /// 56: long, very slow open
    LongOpen,
    /// 57: rhythmic panel groups
    Dance,
}

impl Routine {
    /// Look up a routine by its command number
    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            0 => Some(Routine::CloseAll),
            51 => Some(Routine::FullOpen),
            52 => Some(Routine::Wave),
            53 => Some(Routine::FastWave),
            54 => Some(Routine::OpenCloseWave),
            55 => Some(Routine::MarchingAnts),
            56 => Some(Routine::LongOpen),
            57 => Some(Routine::Dance),
            _ => None,
        }
    }

    /// Motion script for this routine
    pub fn sequence(self) -> Sequence {
        match self {
            Routine::CloseAll => &CLOSE_ALL,
            Routine::FullOpen => &FULL_OPEN,
            Routine::Wave => &WAVE,
            Routine::FastWave => &FAST_WAVE,
            Routine::OpenCloseWave => &OPEN_CLOSE_WAVE,
            Routine::MarchingAnts => &MARCHING_ANTS,
            Routine::LongOpen => &LONG_OPEN,
            Routine::Dance => &DANCE,
        }
    }

    /// Speed limit the routine runs with
    pub fn speed(self) -> SpeedProfile {
        let rate = match self {
            Routine::CloseAll | Routine::FullOpen | Routine::MarchingAnts => SPEED_SLOW,
            Routine::LongOpen => SPEED_SUPER_SLOW,
            Routine::Wave | Routine::FastWave | Routine::OpenCloseWave | Routine::Dance => {
                SPEED_FAST
            }
        };
        SpeedProfile::uniform(rate)
    }
}
