//! Periodic sampler driver: Idle → Armed → (tick, re-arm)* → Stopped.
//! Runs as a Tokio task on a fixed interval. Stopping cancels the timer and
//! waits for the task, so an in-flight tick always finishes and no tick
//! fires after `stop()` returns.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::engine::SensorSampler;

/// Lifecycle of the periodic driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SamplerState {
    Idle,
    Armed,
    Stopped,
}

impl std::fmt::Display for SamplerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SamplerState::Idle => write!(f, "Idle"),
            SamplerState::Armed => write!(f, "Armed"),
            SamplerState::Stopped => write!(f, "Stopped"),
        }
    }
}

impl SamplerState {
    /// Returns whether transitioning from `self` to `next` is valid.
    pub fn can_transition_to(self, next: SamplerState) -> bool {
        matches!(
            (self, next),
            (SamplerState::Idle, SamplerState::Armed)
                | (SamplerState::Armed, SamplerState::Stopped)
        )
    }
}

/// Thread-safe lifecycle tracker with a watch channel for subscribers.
pub struct StateTracker {
    state: RwLock<SamplerState>,
    state_tx: watch::Sender<SamplerState>,
}

impl StateTracker {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(SamplerState::Idle);
        Self {
            state: RwLock::new(SamplerState::Idle),
            state_tx,
        }
    }

    pub fn current(&self) -> SamplerState {
        *self.state.read()
    }

    /// Attempt a transition. Returns Ok(new_state) or Err with reason.
    pub fn transition(&self, next: SamplerState) -> Result<SamplerState, String> {
        let mut state = self.state.write();
        let current = *state;
        if !current.can_transition_to(next) {
            let msg = format!("invalid transition: {} -> {}", current, next);
            warn!("{}", msg);
            return Err(msg);
        }
        *state = next;
        self.state_tx.send_replace(next);
        info!(from = %current, to = %next, "sampler_state_transition");
        Ok(next)
    }

    pub fn subscribe(&self) -> watch::Receiver<SamplerState> {
        self.state_tx.subscribe()
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a running periodic sampler. Dropping it cancels the timer
/// without waiting; call `stop()` for a synchronous shutdown.
pub struct SamplerHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<u64>>,
    tracker: Arc<StateTracker>,
    period: Duration,
}

impl SamplerHandle {
    /// Arm the timer. The first fire happens one `period` after this call.
    /// Must be called from within a Tokio runtime.
    pub fn start(sampler: Arc<SensorSampler>, period: Duration) -> Self {
        let tracker = Arc::new(StateTracker::new());
        let cancel = CancellationToken::new();

        if let Err(e) = tracker.transition(SamplerState::Armed) {
            warn!(error = %e, "sampler arm transition rejected");
        }
        let task = tokio::spawn(run_sampler_loop(sampler, period, cancel.clone()));
        info!(period_ms = period.as_millis() as u64, "sampler armed");

        Self {
            cancel,
            task: Some(task),
            tracker,
            period,
        }
    }

    /// Cancel future fires and wait for the loop to exit. Returns the number
    /// of ticks the loop performed.
    pub async fn stop(mut self) -> u64 {
        self.cancel.cancel();
        let ticks = match self.task.take() {
            Some(task) => match task.await {
                Ok(ticks) => ticks,
                Err(e) => {
                    error!(error = %e, "sampler task panicked");
                    0
                }
            },
            None => 0,
        };
        if let Err(e) = self.tracker.transition(SamplerState::Stopped) {
            warn!(error = %e, "sampler stop transition rejected");
        }
        info!(ticks, "sampler stopped");
        ticks
    }

    pub fn state(&self) -> SamplerState {
        self.tracker.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<SamplerState> {
        self.tracker.subscribe()
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for SamplerHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.cancel.cancel();
        }
    }
}

/// Tick loop. Each fire runs one synchronous `tick()`; cancellation is only
/// observed between ticks, never inside one.
async fn run_sampler_loop(
    sampler: Arc<SensorSampler>,
    period: Duration,
    cancel: CancellationToken,
) -> u64 {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                let sample = sampler.tick();
                ticks += 1;
                debug!(
                    channel = %sample.channel,
                    value = sample.value,
                    timestamp = sample.timestamp,
                    "sampler fired"
                );
            }
        }
    }

    ticks
}
