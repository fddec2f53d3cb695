//! Sampling engine: generator + buffer + channel selection behind one lock.
//! Every public operation takes the lock for its full duration, so producer
//! ticks and consumer reads/selects/resets never interleave mid-update.

use std::num::NonZeroUsize;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::buffer::SampleBuffer;
use crate::config::SamplerConfig;
use crate::generator::{RandomSource, SignalGenerator};
use crate::sample::{Channel, Sample};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SamplerError {
    InvalidChannel(i64),
}

impl std::fmt::Display for SamplerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SamplerError::InvalidChannel(id) => {
                write!(f, "invalid channel {id}, expected 0 or 1")
            }
        }
    }
}

impl std::error::Error for SamplerError {}

/// Outcome of a channel selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelSwitch {
    /// Selection changed and the buffer was cleared.
    Switched { from: Channel, to: Channel },
    /// Already selected; buffer untouched.
    Unchanged(Channel),
}

/// Read-only snapshot for diagnostics and formatting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SamplerStatus {
    pub selected_channel: Channel,
    pub cycle_counter: u64,
    pub buffered: usize,
    pub capacity: usize,
    pub trend_primary: i32,
    pub trend_secondary: i32,
    pub elapsed: u64,
    /// Samples discarded by overflow since start.
    pub evicted_total: u64,
}

/// Monotonic simulation clock, advanced once per tick.
#[derive(Debug, Clone, Copy)]
struct SimulationClock {
    ticks: u64,
}

impl SimulationClock {
    fn advance(&mut self) -> u64 {
        self.ticks += 1;
        self.ticks
    }
}

struct EngineState {
    generator: SignalGenerator,
    buffer: SampleBuffer<Sample>,
    selected: Channel,
    clock: SimulationClock,
    evicted_total: u64,
}

/// Shared sampling engine. Hold it behind an `Arc` to share between the
/// periodic driver and the consumer.
pub struct SensorSampler {
    state: Mutex<EngineState>,
}

impl SensorSampler {
    /// Build an engine from a validated config, seeding the RNG when asked.
    pub fn from_config(config: &SamplerConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        let capacity =
            NonZeroUsize::new(config.capacity).expect("sampler capacity validated by config");
        Self::with_source(capacity, config.boot_epoch, Box::new(rng))
    }

    pub fn with_source(
        capacity: NonZeroUsize,
        boot_epoch: u64,
        rng: Box<dyn RandomSource>,
    ) -> Self {
        Self {
            state: Mutex::new(EngineState {
                generator: SignalGenerator::new(boot_epoch, rng),
                buffer: SampleBuffer::new(capacity),
                selected: Channel::Primary,
                clock: SimulationClock { ticks: boot_epoch },
                evicted_total: 0,
            }),
        }
    }

    /// One sampler fire: advance the clock, generate for the selected
    /// channel, push. Returns the sample that was stored.
    pub fn tick(&self) -> Sample {
        let mut state = self.state.lock();
        let now = state.clock.advance();
        let channel = state.selected;
        let reading = state.generator.next(channel, now);
        let sample = Sample {
            channel,
            value: reading.value,
            timestamp: now,
            cycle: reading.cycle,
            noise_marker: reading.noise,
        };
        let evicted = state.buffer.push(sample).is_some();
        if evicted {
            state.evicted_total += 1;
        }
        debug!(
            channel = %channel,
            value = sample.value,
            cycle = sample.cycle,
            timestamp = now,
            evicted,
            "sample_pushed"
        );
        sample
    }

    /// Oldest unread sample, or `None` when nothing is buffered yet.
    pub fn read_next(&self) -> Option<Sample> {
        self.state.lock().buffer.pop_oldest()
    }

    /// Like `read_next`, but leaves the sample queued if `accept` rejects it.
    pub fn read_next_if(&self, accept: impl FnOnce(&Sample) -> bool) -> Option<Sample> {
        self.state.lock().buffer.pop_oldest_if(accept)
    }

    /// Switch channels. The buffer is cleared only when the selection
    /// actually changes, so stale samples never surface under the new channel.
    pub fn select_channel(&self, channel: Channel) -> ChannelSwitch {
        let mut state = self.state.lock();
        let from = state.selected;
        if from == channel {
            debug!(channel = %channel, "channel_already_selected");
            return ChannelSwitch::Unchanged(channel);
        }
        state.selected = channel;
        state.buffer.clear();
        info!(from = %from, to = %channel, "channel_switched_buffer_cleared");
        ChannelSwitch::Switched { from, to: channel }
    }

    /// Select by wire id. Unknown ids are rejected with state unchanged.
    pub fn select_channel_id(&self, id: i64) -> Result<ChannelSwitch, SamplerError> {
        let channel = Channel::try_from(id).map_err(|e| {
            warn!(id, "invalid_channel_rejected");
            e
        })?;
        Ok(self.select_channel(channel))
    }

    /// Clear the buffer, zero the cycle counter and both trends.
    /// Clock, boot epoch and channel selection are kept.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        let dropped = state.buffer.len();
        state.buffer.clear();
        state.generator.reset();
        info!(dropped, "sampler_reset");
    }

    pub fn status(&self) -> SamplerStatus {
        let state = self.state.lock();
        let (buffered, capacity) = state.buffer.occupancy();
        SamplerStatus {
            selected_channel: state.selected,
            cycle_counter: state.generator.cycle_counter(),
            buffered,
            capacity,
            trend_primary: state.generator.trend(Channel::Primary),
            trend_secondary: state.generator.trend(Channel::Secondary),
            elapsed: state.generator.elapsed(state.clock.ticks),
            evicted_total: state.evicted_total,
        }
    }

    pub fn selected_channel(&self) -> Channel {
        self.state.lock().selected
    }
}
