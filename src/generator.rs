//! Signal generator: base offset + slow waveform + drifting trend + noise.
//! Trends for both channels are redrawn together every `TREND_PERIOD` calls.
//! Secondary is clamped to a percentage band; Primary is left unclamped.

use std::ops::RangeInclusive;

use crate::sample::Channel;
use crate::waveform;

/// Number of `next()` calls between trend redraws.
pub const TREND_PERIOD: u64 = 30;

/// Randomness provider (adapter for seeded, scripted or system sources).
pub trait RandomSource: Send {
    /// Uniform draw from the inclusive range `[low, high]`. Never fails.
    fn range_i32(&mut self, low: i32, high: i32) -> i32;
}

impl RandomSource for fastrand::Rng {
    #[inline]
    fn range_i32(&mut self, low: i32, high: i32) -> i32 {
        self.i32(low..=high)
    }
}

/// Per-channel composition constants.
#[derive(Debug, Clone)]
pub struct ChannelProfile {
    pub base: i32,
    /// Elapsed time units per degree of waveform phase.
    pub phase_divisor: i64,
    /// Peak contribution of the waveform term.
    pub waveform_scale: i32,
    pub use_cosine: bool,
    pub range_modulus: u64,
    pub trend_modulus: u64,
    pub noise: RangeInclusive<i32>,
    pub clamp: Option<RangeInclusive<i32>>,
}

impl ChannelProfile {
    pub fn for_channel(channel: Channel) -> Self {
        match channel {
            Channel::Primary => Self {
                base: 25,
                phase_divisor: 10,
                waveform_scale: 10,
                use_cosine: false,
                range_modulus: 20,
                trend_modulus: 5,
                noise: -5..=4,
                clamp: None,
            },
            Channel::Secondary => Self {
                base: 45,
                phase_divisor: 15,
                waveform_scale: 15,
                use_cosine: true,
                range_modulus: 35,
                trend_modulus: 8,
                noise: -7..=2,
                clamp: Some(10..=95),
            },
        }
    }
}

/// Result of one generator step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    pub value: i32,
    pub cycle: u64,
    pub noise: i32,
}

pub struct SignalGenerator {
    boot_epoch: u64,
    cycle_counter: u64,
    trend: [i32; 2],
    profiles: [ChannelProfile; 2],
    rng: Box<dyn RandomSource>,
}

impl SignalGenerator {
    pub fn new(boot_epoch: u64, rng: Box<dyn RandomSource>) -> Self {
        Self {
            boot_epoch,
            cycle_counter: 0,
            trend: [0; 2],
            profiles: [
                ChannelProfile::for_channel(Channel::Primary),
                ChannelProfile::for_channel(Channel::Secondary),
            ],
            rng,
        }
    }

    /// Produce the next value for `channel` at simulation time `now`.
    pub fn next(&mut self, channel: Channel, now: u64) -> Reading {
        self.cycle_counter += 1;
        let cycle = self.cycle_counter;

        if cycle % TREND_PERIOD == 0 {
            for ch in Channel::ALL {
                self.trend[ch.index()] = self.rng.range_i32(-1, 1);
            }
        }

        let elapsed = self.elapsed(now) as i64;
        let profile = &self.profiles[channel.index()];

        let angle = (elapsed / profile.phase_divisor) % waveform::TABLE_SIZE as i64;
        let wave = if profile.use_cosine {
            waveform::cosine(angle)
        } else {
            waveform::sine(angle)
        };
        let periodic = wave * profile.waveform_scale / waveform::AMPLITUDE;
        let range_term = (cycle % profile.range_modulus) as i32;
        let trend_term = self.trend[channel.index()] * (cycle % profile.trend_modulus) as i32;
        let noise = self
            .rng
            .range_i32(*profile.noise.start(), *profile.noise.end());

        let raw = profile.base + periodic + range_term + trend_term + noise;
        let value = match &profile.clamp {
            Some(band) => raw.clamp(*band.start(), *band.end()),
            None => raw,
        };

        Reading { value, cycle, noise }
    }

    /// Zero the cycle counter and both trends. The boot epoch is kept.
    pub fn reset(&mut self) {
        self.cycle_counter = 0;
        self.trend = [0; 2];
    }

    pub fn cycle_counter(&self) -> u64 {
        self.cycle_counter
    }

    pub fn trend(&self, channel: Channel) -> i32 {
        self.trend[channel.index()]
    }

    pub fn boot_epoch(&self) -> u64 {
        self.boot_epoch
    }

    /// Time units since the boot epoch; zero if `now` predates it.
    pub fn elapsed(&self, now: u64) -> u64 {
        now.saturating_sub(self.boot_epoch)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Always draws one end of the requested range.
    pub(crate) struct ExtremeSource {
        pub high: bool,
    }

    impl RandomSource for ExtremeSource {
        fn range_i32(&mut self, low: i32, high: i32) -> i32 {
            if self.high {
                high
            } else {
                low
            }
        }
    }

    /// Replays scripted trend draws and counts them; noise draws return 0
    /// when the range allows it.
    struct ScriptedTrends {
        trends: VecDeque<i32>,
        trend_draws: Arc<AtomicUsize>,
    }

    impl RandomSource for ScriptedTrends {
        fn range_i32(&mut self, low: i32, high: i32) -> i32 {
            if (low, high) == (-1, 1) {
                self.trend_draws.fetch_add(1, Ordering::SeqCst);
                self.trends.pop_front().unwrap_or(0)
            } else {
                0i32.clamp(low, high)
            }
        }
    }

    fn expected_primary(cycle: u64, elapsed: u64, trend: i32, noise: i32) -> i32 {
        let angle = ((elapsed / 10) % 360) as i64;
        25 + waveform::sine(angle) * 10 / 100
            + (cycle % 20) as i32
            + trend * (cycle % 5) as i32
            + noise
    }

    #[test]
    fn test_trend_redrawn_once_at_thirtieth_call() {
        let draws = Arc::new(AtomicUsize::new(0));
        let mut gen = SignalGenerator::new(
            0,
            Box::new(ScriptedTrends {
                trends: VecDeque::from([1, -1, 0, 0]),
                trend_draws: Arc::clone(&draws),
            }),
        );

        for _ in 0..29 {
            gen.next(Channel::Primary, 0);
        }
        assert_eq!(draws.load(Ordering::SeqCst), 0);
        assert_eq!(gen.trend(Channel::Primary), 0);

        gen.next(Channel::Primary, 0);
        assert_eq!(gen.cycle_counter(), 30);
        assert_eq!(draws.load(Ordering::SeqCst), 2);
        assert_eq!(gen.trend(Channel::Primary), 1);
        assert_eq!(gen.trend(Channel::Secondary), -1);

        for _ in 31..=59 {
            gen.next(Channel::Secondary, 0);
            assert_eq!(gen.trend(Channel::Primary), 1);
            assert_eq!(gen.trend(Channel::Secondary), -1);
        }
        assert_eq!(draws.load(Ordering::SeqCst), 2);

        gen.next(Channel::Secondary, 0);
        assert_eq!(draws.load(Ordering::SeqCst), 4);
        assert_eq!(gen.trend(Channel::Primary), 0);
    }

    #[test]
    fn test_primary_follows_formula_without_clamp() {
        // Primary is the only channel without a band.
        assert!(ChannelProfile::for_channel(Channel::Primary).clamp.is_none());

        let mut gen = SignalGenerator::new(100, Box::new(ExtremeSource { high: true }));
        for cycle in 1..=120u64 {
            let now = 100 + cycle * 37;
            let reading = gen.next(Channel::Primary, now);
            let trend = if cycle >= 30 { 1 } else { 0 };
            assert_eq!(
                reading.value,
                expected_primary(cycle, now - 100, trend, 4),
                "cycle {cycle}"
            );
            assert_eq!(reading.noise, 4);
        }
    }

    #[test]
    fn test_primary_minimum_reaches_low_edge_unaltered() {
        let mut gen = SignalGenerator::new(0, Box::new(ExtremeSource { high: false }));
        // elapsed 2700 puts the waveform at 270°, its trough.
        let mut last = None;
        for _ in 0..44 {
            last = Some(gen.next(Channel::Primary, 2700));
        }
        let reading = last.unwrap();
        assert_eq!(reading.cycle, 44);
        // 25 - 10 + 4 + (-1 * 4) - 5
        assert_eq!(reading.value, 10);
    }

    #[test]
    fn test_primary_low_draws_follow_formula_across_trend_cycles() {
        let mut gen = SignalGenerator::new(0, Box::new(ExtremeSource { high: false }));
        for cycle in 1..=120u64 {
            let reading = gen.next(Channel::Primary, 2700);
            let trend = if cycle >= 30 { -1 } else { 0 };
            let expected = expected_primary(cycle, 2700, trend, -5);
            assert_eq!(reading.value, expected, "cycle {cycle}");
            // The cycle term always covers the negative trend term.
            assert!(reading.value >= 10, "cycle {cycle}: {}", reading.value);
        }
    }

    #[test]
    fn test_secondary_upper_clamp_applies() {
        let mut gen = SignalGenerator::new(0, Box::new(ExtremeSource { high: true }));
        let mut reading = gen.next(Channel::Secondary, 0);
        for _ in 1..34 {
            reading = gen.next(Channel::Secondary, 0);
        }
        assert_eq!(reading.cycle, 34);
        // Raw: 45 + 15 + 34 + 1 * 2 + 2 = 98
        assert_eq!(reading.value, 95);
    }

    #[test]
    fn test_secondary_always_within_band() {
        for seed in 0..8 {
            let mut gen = SignalGenerator::new(0, Box::new(fastrand::Rng::with_seed(seed)));
            for now in 0..3_000u64 {
                let v = gen.next(Channel::Secondary, now * 3).value;
                assert!((10..=95).contains(&v), "seed {seed} now {now}: {v}");
            }
        }
    }

    #[test]
    fn test_seeded_sources_are_deterministic() {
        let mut a = SignalGenerator::new(0, Box::new(fastrand::Rng::with_seed(7)));
        let mut b = SignalGenerator::new(0, Box::new(fastrand::Rng::with_seed(7)));
        for now in 0..200 {
            let ch = if now % 3 == 0 { Channel::Secondary } else { Channel::Primary };
            assert_eq!(a.next(ch, now), b.next(ch, now));
        }
    }

    #[test]
    fn test_reset_keeps_boot_epoch() {
        let mut gen = SignalGenerator::new(5, Box::new(ExtremeSource { high: true }));
        for _ in 0..45 {
            gen.next(Channel::Primary, 50);
        }
        assert_eq!(gen.trend(Channel::Secondary), 1);

        gen.reset();
        assert_eq!(gen.cycle_counter(), 0);
        assert_eq!(gen.trend(Channel::Primary), 0);
        assert_eq!(gen.trend(Channel::Secondary), 0);
        assert_eq!(gen.boot_epoch(), 5);
        assert_eq!(gen.elapsed(50), 45);
        assert_eq!(gen.elapsed(2), 0);
    }
}
