//! Battery Level value decoding and display classification.

use std::fmt;
use thiserror::Error;

/// A Battery Level value did not have the single-byte wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid Battery Level value length: {len}")]
pub struct MalformedValue {
    pub len: usize,
}

/// Battery charge as reported by the peripheral, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BatteryLevel(u8);

impl BatteryLevel {
    pub fn new(percent: u8) -> Self {
        Self(percent)
    }

    /// Decode a raw characteristic value. Exactly one byte is accepted.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MalformedValue> {
        match bytes {
            [level] => Ok(Self(*level)),
            _ => Err(MalformedValue { len: bytes.len() }),
        }
    }

    pub fn percent(&self) -> u8 {
        self.0
    }

    pub fn tier(&self) -> LevelTier {
        LevelTier::classify(self.0)
    }
}

impl fmt::Display for BatteryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelTier {
    Low,
    Medium,
    High,
}

impl LevelTier {
    pub fn classify(level: u8) -> Self {
        if level > 65 {
            LevelTier::High
        } else if level > 30 {
            LevelTier::Medium
        } else {
            LevelTier::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LevelTier::Low => "low",
            LevelTier::Medium => "medium",
            LevelTier::High => "high",
        }
    }
}

impl fmt::Display for LevelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
