use std::io;

use thiserror::Error;

/// Error raised while normalizing a raw configuration.
///
/// Configuration errors are always synchronous: they are reported when the
/// configuration is normalized, never at write time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid byte limit: {0:?}")]
    InvalidByteLimit(String),
    #[error("invalid interval: {0:?}")]
    InvalidInterval(String),
    #[error("invalid start of day: {0:?}")]
    InvalidStartOfDay(String),
    #[error("unsupported encoding: {0:?}")]
    UnsupportedEncoding(String),
}

#[derive(Error, Debug)]
pub enum WriteError {
    /// A single record that can never fit in a file. The writer is left
    /// untouched: an oversized record is not a rotation trigger.
    #[error("record of {len} bytes exceeds the byte limit of {limit}")]
    Overflow { len: u64, limit: u64 },
    /// The writer was ended and cannot accept further records.
    #[error("writer is terminal and cannot be written to")]
    Terminal,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl WriteError {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WriteError::Terminal)
    }

    pub fn is_overflow(&self) -> bool {
        matches!(self, WriteError::Overflow { .. })
    }
}
