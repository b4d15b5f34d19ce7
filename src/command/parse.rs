use crate::device::types::CommandIntent;
use crate::error::InputError;

/// The interactive menu always sends rocking commands without the stop on disconnect flag.
pub const STOP_ON_DISCONNECT: bool = false;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Rocking,
    SupportLevel,
}

pub fn parse_number(line: &str) -> Result<i64, InputError> {
    let trimmed = line.trim();
    trimmed.parse::<i64>().map_err(|_| InputError::NotANumber { input: trimmed.to_string() })
}

pub fn parse_selection(line: &str) -> Result<Selection, InputError> {
    match parse_number(line)? {
        1 => Ok(Selection::Rocking),
        2 => Ok(Selection::SupportLevel),
        selection => Err(InputError::UnknownSelection { selection }),
    }
}

pub fn parse_rocking(line: &str) -> Result<CommandIntent, InputError> {
    Ok(CommandIntent::rocking(parse_number(line)?, STOP_ON_DISCONNECT)?)
}

pub fn parse_support_level(line: &str) -> Result<CommandIntent, InputError> {
    Ok(CommandIntent::support_level(parse_number(line)?)?)
}
