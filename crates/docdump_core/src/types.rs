//! Core type definitions for docdump.

use std::fmt;
use std::str::FromStr;

use bson::Timestamp;
use serde::Serialize;
use thiserror::Error;

/// Position of an entry in the replication log.
///
/// Positions are ordered by seconds first, then by the sequence number that
/// disambiguates entries within the same second. This matches the order in
/// which the log itself stores entries, so comparing positions is the same
/// as comparing log order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LogPosition {
    /// Seconds component of the position.
    pub seconds: u32,
    /// Ordinal of the entry within its second.
    pub sequence: u32,
}

impl LogPosition {
    /// Creates a new log position.
    #[must_use]
    pub const fn new(seconds: u32, sequence: u32) -> Self {
        Self { seconds, sequence }
    }
}

impl fmt::Display for LogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.seconds, self.sequence)
    }
}

impl From<Timestamp> for LogPosition {
    fn from(ts: Timestamp) -> Self {
        Self {
            seconds: ts.time,
            sequence: ts.increment,
        }
    }
}

impl From<LogPosition> for Timestamp {
    fn from(position: LogPosition) -> Self {
        Timestamp {
            time: position.seconds,
            increment: position.sequence,
        }
    }
}

/// Error returned when parsing a [`LogPosition`] from its text encoding.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid log position {input:?}: expected \"<seconds>|<sequence>\"")]
pub struct ParsePositionError {
    input: String,
}

impl FromStr for LogPosition {
    type Err = ParsePositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParsePositionError {
            input: s.to_string(),
        };
        let (seconds, sequence) = s.split_once('|').ok_or_else(invalid)?;
        let seconds = seconds.trim().parse::<u32>().map_err(|_| invalid())?;
        let sequence = sequence.trim().parse::<u32>().map_err(|_| invalid())?;
        Ok(Self { seconds, sequence })
    }
}
