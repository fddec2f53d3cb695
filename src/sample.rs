//! Sample records and channel identifiers shared by the generator, the
//! buffer and the device layer.

use serde::Serialize;

use crate::engine::SamplerError;

/// One of the two simulated signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Temperature-like signal, unbounded.
    Primary,
    /// Humidity-like signal, clamped to a percentage band.
    Secondary,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Primary, Channel::Secondary];

    /// Numeric id used on the device interface.
    pub fn id(self) -> u8 {
        match self {
            Channel::Primary => 0,
            Channel::Secondary => 1,
        }
    }

    /// Index into per-channel state arrays.
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.id() as usize
    }
}

impl TryFrom<i64> for Channel {
    type Error = SamplerError;

    fn try_from(id: i64) -> Result<Self, Self::Error> {
        match id {
            0 => Ok(Channel::Primary),
            1 => Ok(Channel::Secondary),
            other => Err(SamplerError::InvalidChannel(other)),
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Primary => write!(f, "Primary"),
            Channel::Secondary => write!(f, "Secondary"),
        }
    }
}

/// A single timestamped reading. Immutable once produced by a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Sample {
    pub channel: Channel,
    pub value: i32,
    /// Simulation clock at the tick that produced this sample.
    pub timestamp: u64,
    /// Generator step counter after this sample was produced.
    pub cycle: u64,
    /// Noise term drawn for this sample. Diagnostic only.
    pub noise_marker: i32,
}
