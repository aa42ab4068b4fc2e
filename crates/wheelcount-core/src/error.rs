//! Error types shared across the core

use thiserror_no_std::Error;

/// Numeric code reported by `turndata info` for a dropped turn.
pub const ERR_NOT_ADDED: u32 = 1001;

/// Short text captured from user input for error reports.
pub type ErrorText = heapless::String<16>;

/// Non-fatal errors raised while counting turns
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnError {
    #[error("turn at {time} falls outside the live session")]
    NotAdded { time: u32 },
}

impl TurnError {
    /// Code shown on the serial terminal
    pub const fn code(&self) -> u32 {
        match self {
            Self::NotAdded { .. } => ERR_NOT_ADDED,
        }
    }
}

/// Errors from the session write path
///
/// Running out of space is not an error: the log is erased and the write is
/// retried. Only a record that cannot fit in an empty log ends up here, which
/// means the firmware was built with a record size larger than the log.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    #[error("record of {size} bytes does not fit in an erased log")]
    RecordTooLarge { size: usize },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("bucket width must be non-zero")]
    ZeroBucketWidth,
    #[error("radio enable time {0} is past the end of the day")]
    EnableTimeOutOfRange(u32),
    #[error("config blob could not be decoded")]
    Decode,
    #[error("config could not be encoded")]
    Encode,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(ErrorText),
    #[error("missing turndata subcommand")]
    MissingSubcommand,
    #[error("unknown turndata subcommand: {0}")]
    UnknownSubcommand(ErrorText),
    #[error("invalid number: {0}")]
    InvalidNumber(ErrorText),
}

/// Copy as much of `text` as fits into an [`ErrorText`].
pub(crate) fn error_text(text: &str) -> ErrorText {
    let mut out = ErrorText::new();
    for c in text.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}
