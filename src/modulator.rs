use crate::clock::{as_millis_f64, from_millis_f64};
use crate::config::{Band, ModulatorConfig};
use crate::sampler::{chance, gaussian};
use rand::Rng;
use std::time::Duration;

/// What the modulator decided for this emission
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Modulation {
    /// emit this in-burst interval
    Burst(f64),
    /// emit this stall (fresh pause or the remainder of a pending one)
    Pause(f64),
    /// fall through to technique sampling
    Pass,
}

/// Bursts and pauses. Neither gate opens while the other sub-state is active.
#[derive(Debug, Clone)]
pub struct Modulator {
    cfg: ModulatorConfig,
    in_burst: bool,
    burst_remaining: u32,
    pause_until: Option<Duration>,
    bursts: u64,
    pauses: u64,
}

impl Modulator {
    pub fn new(cfg: ModulatorConfig) -> Self {
        Self {
            cfg,
            in_burst: false,
            burst_remaining: 0,
            pause_until: None,
            bursts: 0,
            pauses: 0,
        }
    }

    /// Decide the modulation for one emission at engine time `now`.
    ///
    /// `consecutive` is the number of emissions so far in the current run and
    /// `bounds` the engine clamp.
    pub fn modulate<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        now: Duration,
        consecutive: u32,
        bounds: Band,
    ) -> Modulation {
        if let Some(until) = self.pause_until.take() {
            if now < until {
                let remaining = as_millis_f64(until - now);
                return Modulation::Pause(bounds.clamp(remaining));
            }
        }

        if !self.in_burst {
            if self.pause_gate(rng, consecutive) {
                let pause_ms = self.cfg.pause_ms.sample(rng);
                self.pause_until = Some(now + from_millis_f64(pause_ms));
                self.pauses += 1;
                tracing::debug!(pause_ms, "pause started");
                return Modulation::Pause(bounds.clamp(pause_ms));
            }
            if self.burst_gate(rng, consecutive) {
                self.in_burst = true;
                self.burst_remaining = self.cfg.burst_length.sample(rng);
                self.bursts += 1;
                tracing::debug!(length = self.burst_remaining, "burst started");
            }
        }

        if self.in_burst {
            self.burst_remaining = self.burst_remaining.saturating_sub(1);
            if self.burst_remaining == 0 {
                self.in_burst = false;
            }
            let base = gaussian(rng, self.cfg.burst_mean_ms, self.cfg.burst_std_dev_ms).abs()
                * self.cfg.burst_jitter.sample(rng);
            let ceiling = self.cfg.burst_ceiling_ms.max(bounds.min);
            return Modulation::Burst(base.max(bounds.min).min(ceiling));
        }

        Modulation::Pass
    }

    fn pause_gate<R: Rng + ?Sized>(&self, rng: &mut R, consecutive: u32) -> bool {
        consecutive > self.cfg.pause_min_run && chance(rng, self.cfg.pause_probability)
    }

    fn burst_gate<R: Rng + ?Sized>(&self, rng: &mut R, consecutive: u32) -> bool {
        consecutive > self.cfg.burst_min_run && chance(rng, self.cfg.burst_probability)
    }

    /// Drop burst and pause sub-state, e.g. when an active span stops
    pub fn reset(&mut self) {
        self.in_burst = false;
        self.burst_remaining = 0;
        self.pause_until = None;
    }

    pub fn in_burst(&self) -> bool {
        self.in_burst
    }

    pub fn pause_pending(&self) -> bool {
        self.pause_until.is_some()
    }

    pub fn bursts(&self) -> u64 {
        self.bursts
    }

    pub fn pauses(&self) -> u64 {
        self.pauses
    }
}
