//! Text device interface over the sampling engine.
//! Reads yield one CSV line per sample; writes accept a channel id or `reset`.
//! Errors map the character-device rejections: oversized input, unparsable
//! input, unknown channel, and a read buffer too small for the next line.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::{SamplerError, SamplerStatus, SensorSampler};
use crate::sample::Sample;

/// Writes of this many bytes or more are rejected outright.
pub const MAX_WRITE_LEN: usize = 10;

/// Suggested read size; always large enough for one encoded sample.
pub const READ_CHUNK: usize = 256;

#[derive(Debug)]
pub enum DeviceError {
    InputTooLong { len: usize, max: usize },
    Parse(String),
    Sampler(SamplerError),
    BufferTooSmall { needed: usize, available: usize },
    Encode(serde_json::Error),
}

impl std::fmt::Display for DeviceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceError::InputTooLong { len, max } => {
                write!(f, "input of {len} bytes exceeds limit of {}", max - 1)
            }
            DeviceError::Parse(input) => write!(f, "unrecognized command: {input:?}"),
            DeviceError::Sampler(e) => write!(f, "{e}"),
            DeviceError::BufferTooSmall { needed, available } => {
                write!(f, "read buffer too small: need {needed} bytes, have {available}")
            }
            DeviceError::Encode(e) => write!(f, "status encoding failed: {e}"),
        }
    }
}

impl std::error::Error for DeviceError {}

impl From<SamplerError> for DeviceError {
    fn from(e: SamplerError) -> Self {
        DeviceError::Sampler(e)
    }
}

impl From<serde_json::Error> for DeviceError {
    fn from(e: serde_json::Error) -> Self {
        DeviceError::Encode(e)
    }
}

/// Parsed control input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Select(i64),
    Reset,
}

impl Command {
    /// Only trailing whitespace is ignored; leading whitespace is rejected.
    pub fn parse(input: &str) -> Result<Self, DeviceError> {
        let trimmed = input.trim_end();
        if trimmed.eq_ignore_ascii_case("reset") {
            return Ok(Command::Reset);
        }
        trimmed
            .parse::<i64>()
            .map(Command::Select)
            .map_err(|_| DeviceError::Parse(trimmed.to_string()))
    }
}

/// `channel,value,timestamp,cycle,noise_marker\n`
pub fn encode_line(sample: &Sample) -> String {
    format!(
        "{},{},{},{},{}\n",
        sample.channel.id(),
        sample.value,
        sample.timestamp,
        sample.cycle,
        sample.noise_marker
    )
}

/// Byte-stream facade shared by all sessions.
#[derive(Clone)]
pub struct SensorDevice {
    sampler: Arc<SensorSampler>,
}

impl SensorDevice {
    pub fn new(sampler: Arc<SensorSampler>) -> Self {
        Self { sampler }
    }

    pub fn open(&self) -> DeviceSession {
        let id = Uuid::new_v4();
        info!(session = %id, "device opened");
        DeviceSession {
            id,
            device: self.clone(),
        }
    }

    /// Next sample as one text line, or `Ok(None)` when there is no data yet.
    /// A line longer than `max_len` is an error and the sample stays queued.
    pub fn read(&self, max_len: usize) -> Result<Option<String>, DeviceError> {
        let mut needed = None;
        let sample = self.sampler.read_next_if(|sample| {
            let len = encode_line(sample).len();
            if len > max_len {
                needed = Some(len);
                false
            } else {
                true
            }
        });
        if let Some(needed) = needed {
            return Err(DeviceError::BufferTooSmall {
                needed,
                available: max_len,
            });
        }
        Ok(sample.map(|s| encode_line(&s)))
    }

    /// Apply a control write. Returns the number of bytes consumed.
    pub fn write(&self, input: &[u8]) -> Result<usize, DeviceError> {
        if input.len() >= MAX_WRITE_LEN {
            return Err(DeviceError::InputTooLong {
                len: input.len(),
                max: MAX_WRITE_LEN,
            });
        }
        let text = std::str::from_utf8(input)
            .map_err(|_| DeviceError::Parse(String::from_utf8_lossy(input).into_owned()))?;

        match Command::parse(text) {
            Ok(Command::Select(id)) => {
                let switch = self.sampler.select_channel_id(id).map_err(|e| {
                    warn!(id, "device rejected channel, use 0 or 1");
                    e
                })?;
                debug!(?switch, "device select");
            }
            Ok(Command::Reset) => self.sampler.reset(),
            Err(e) => {
                warn!(error = %e, "device write rejected");
                return Err(e);
            }
        }
        Ok(input.len())
    }

    pub fn status(&self) -> SamplerStatus {
        self.sampler.status()
    }

    pub fn status_json(&self) -> Result<String, DeviceError> {
        Ok(serde_json::to_string(&self.sampler.status())?)
    }
}

/// One open handle on the device. Logged on open and on release.
pub struct DeviceSession {
    id: Uuid,
    device: SensorDevice,
}

impl DeviceSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn read(&self, max_len: usize) -> Result<Option<String>, DeviceError> {
        self.device.read(max_len)
    }

    pub fn write(&self, input: &[u8]) -> Result<usize, DeviceError> {
        self.device.write(input)
    }

    pub fn status_json(&self) -> Result<String, DeviceError> {
        self.device.status_json()
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        info!(session = %self.id, "device released");
    }
}
