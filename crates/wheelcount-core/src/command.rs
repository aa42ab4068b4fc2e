//! `turndata` command group
//!
//! | Command                     | Action                                       |
//! |-----------------------------|----------------------------------------------|
//! | `turndata disp [minTime]`   | List stored sessions with `origin >= minTime` |
//! | `turndata active`           | Print the live session                       |
//! | `turndata clear`            | Erase the session log                        |
//! | `turndata debugtrigger`     | Count one synthetic turn now                 |
//! | `turndata writedbg`         | Append the debug pattern record              |
//! | `turndata info`             | Timer and error diagnostics                  |

use crate::error::{CommandError, error_text};

pub const COMMAND_GROUP: &str = "turndata";

/// Serial terminal the command output goes to
pub trait Terminal: core::fmt::Write {
    /// Whether a terminal is attached and output will be seen
    fn is_ready(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnDataCommand {
    Disp { min_time: u32 },
    Active,
    Clear,
    DebugTrigger,
    WriteDbg,
    Info,
}

impl TurnDataCommand {
    /// Parse a full command line such as `turndata disp 0x6500`.
    ///
    /// Arguments past the ones a subcommand uses are ignored.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut words = line.split_whitespace();

        let group = words.next().ok_or(CommandError::Empty)?;
        if group != COMMAND_GROUP {
            return Err(CommandError::UnknownCommand(error_text(group)));
        }

        let sub = words.next().ok_or(CommandError::MissingSubcommand)?;
        match sub {
            "disp" => {
                let min_time = match words.next() {
                    Some(arg) => parse_number(arg)?,
                    None => 0,
                };
                Ok(Self::Disp { min_time })
            }
            "active" => Ok(Self::Active),
            "clear" => Ok(Self::Clear),
            "debugtrigger" => Ok(Self::DebugTrigger),
            "writedbg" => Ok(Self::WriteDbg),
            "info" => Ok(Self::Info),
            other => Err(CommandError::UnknownSubcommand(error_text(other))),
        }
    }
}

/// Parse an unsigned number with C-style radix prefixes: `0x` hex, leading
/// `0` octal, decimal otherwise.
fn parse_number(arg: &str) -> Result<u32, CommandError> {
    let (digits, radix) = if let Some(hex) = arg.strip_prefix("0x").or_else(|| arg.strip_prefix("0X")) {
        (hex, 16)
    } else if arg.len() > 1 && arg.starts_with('0') {
        (&arg[1..], 8)
    } else {
        (arg, 10)
    };

    u32::from_str_radix(digits, radix).map_err(|_| CommandError::InvalidNumber(error_text(arg)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_subcommand() {
        assert_eq!(TurnDataCommand::parse("turndata disp"), Ok(TurnDataCommand::Disp { min_time: 0 }));
        assert_eq!(TurnDataCommand::parse("turndata active"), Ok(TurnDataCommand::Active));
        assert_eq!(TurnDataCommand::parse("turndata clear"), Ok(TurnDataCommand::Clear));
        assert_eq!(TurnDataCommand::parse("turndata debugtrigger"), Ok(TurnDataCommand::DebugTrigger));
        assert_eq!(TurnDataCommand::parse("turndata writedbg"), Ok(TurnDataCommand::WriteDbg));
        assert_eq!(TurnDataCommand::parse("  turndata   info  "), Ok(TurnDataCommand::Info));
    }

    #[test]
    fn disp_min_time_accepts_radix_prefixes() {
        assert_eq!(
            TurnDataCommand::parse("turndata disp 1700000000"),
            Ok(TurnDataCommand::Disp { min_time: 1_700_000_000 })
        );
        assert_eq!(TurnDataCommand::parse("turndata disp 0x10"), Ok(TurnDataCommand::Disp { min_time: 16 }));
        assert_eq!(TurnDataCommand::parse("turndata disp 010"), Ok(TurnDataCommand::Disp { min_time: 8 }));
        assert_eq!(TurnDataCommand::parse("turndata disp 0"), Ok(TurnDataCommand::Disp { min_time: 0 }));
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(TurnDataCommand::parse("   "), Err(CommandError::Empty));
        assert_eq!(TurnDataCommand::parse("turndata"), Err(CommandError::MissingSubcommand));
        assert_eq!(
            TurnDataCommand::parse("version"),
            Err(CommandError::UnknownCommand(error_text("version")))
        );
        assert_eq!(
            TurnDataCommand::parse("turndata dump"),
            Err(CommandError::UnknownSubcommand(error_text("dump")))
        );
        assert_eq!(
            TurnDataCommand::parse("turndata disp soon"),
            Err(CommandError::InvalidNumber(error_text("soon")))
        );
    }
}
