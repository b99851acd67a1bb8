//! Command classification and panel command parsing
//!
//! The first character of a line selects its destination. Panel commands
//! have the fixed form `:CCxx` where `CC` is a two-letter verb and `xx` a
//! two-digit decimal argument (`00` addresses every panel).

/// Start character for panel commands
pub const PANEL_START: char = ':';

/// Panel command argument addressing every panel
pub const ALL_PANELS: u8 = 0;

/// Length of a well-formed panel command (`:CCxx`)
const PANEL_COMMAND_LEN: usize = 5;

/// Errors from command parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// Line starts with a character that no destination claims
    UnknownStart,
    /// Panel command has the wrong length
    Malformed,
    /// Panel command verb is not recognized
    UnknownVerb,
    /// Argument is not two decimal digits
    InvalidArgument,
}

/// Peripheral destinations for lines not handled by the panel controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ForwardKind {
    /// `*` holoprojector board
    Holo,
    /// `@` logic display board
    Display,
    /// `$` sound module
    Sound,
    /// `!` first custom expansion port
    Alt1,
    /// `%` second custom expansion port
    Alt2,
    /// `&` I2C bus
    I2c,
}

impl ForwardKind {
    /// Classify a start character
    pub fn from_start(ch: char) -> Option<Self> {
        match ch {
            '*' => Some(Self::Holo),
            '@' => Some(Self::Display),
            '$' => Some(Self::Sound),
            '!' => Some(Self::Alt1),
            '%' => Some(Self::Alt2),
            '&' => Some(Self::I2c),
            _ => None,
        }
    }
}

/// Panel commands (`:CCxx`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PanelCommand {
    /// `SE` - launch a built-in sequence
    Sequence(u8),
    /// `OP` - open a panel (0 = all, 11 = top group, 12 = bottom group)
    Open(u8),
    /// `CL` - close a panel, take it off RC and power it down once closed
    Close(u8),
    /// `RC` - put a panel under RC input control
    Rc(u8),
    /// `ST` - take a panel off RC and power it down immediately
    Stop(u8),
    /// `HD` - take a panel off RC and hold its last position
    Hold(u8),
}

impl PanelCommand {
    fn from_parts(verb: &str, arg: u8) -> Result<Self, CommandError> {
        match verb {
            "SE" => Ok(PanelCommand::Sequence(arg)),
            "OP" => Ok(PanelCommand::Open(arg)),
            "CL" => Ok(PanelCommand::Close(arg)),
            "RC" => Ok(PanelCommand::Rc(arg)),
            "ST" => Ok(PanelCommand::Stop(arg)),
            "HD" => Ok(PanelCommand::Hold(arg)),
            _ => Err(CommandError::UnknownVerb),
        }
    }
}

/// A classified command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command<'a> {
    /// Empty line (used by remotes as a keep-alive prompt)
    Empty,
    /// Panel command for this controller
    Panel(PanelCommand),
    /// Line for a peripheral, start character included
    Forward { kind: ForwardKind, text: &'a str },
}

/// Classify and parse one command line
pub fn parse_line(line: &str) -> Result<Command<'_>, CommandError> {
    let Some(start) = line.chars().next() else {
        return Ok(Command::Empty);
    };

    if start == PANEL_START {
        return parse_panel(line).map(Command::Panel);
    }

    ForwardKind::from_start(start)
        .map(|kind| Command::Forward { kind, text: line })
        .ok_or(CommandError::UnknownStart)
}

fn parse_panel(line: &str) -> Result<PanelCommand, CommandError> {
    if line.len() != PANEL_COMMAND_LEN || !line.is_ascii() {
        return Err(CommandError::Malformed);
    }

    let verb = &line[1..3];
    let arg = parse_argument(&line.as_bytes()[3..5])?;
    PanelCommand::from_parts(verb, arg)
}

fn parse_argument(digits: &[u8]) -> Result<u8, CommandError> {
    digits.iter().try_fold(0u8, |acc, &d| {
        if d.is_ascii_digit() {
            Ok(acc * 10 + (d - b'0'))
        } else {
            Err(CommandError::InvalidArgument)
        }
    })
}
