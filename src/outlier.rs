use crate::config::OutlierConfig;
use crate::error::ConfigError;
use crate::sampler::chance;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OutlierKind {
    /// short hesitation, emitted from its own range
    MicroPause,
    /// very fast click, applied as a down-scale of the sampled base interval
    PanicBurst,
    /// long stall, emitted from its own range
    DeadClick,
}

const KINDS: [OutlierKind; 3] = [
    OutlierKind::MicroPause,
    OutlierKind::PanicBurst,
    OutlierKind::DeadClick,
];

#[derive(Debug, Clone)]
pub struct OutlierInjector {
    cfg: OutlierConfig,
    kinds: WeightedIndex<f64>,
    cooldown: u32,
    count: u64,
}

impl OutlierInjector {
    pub fn new(cfg: OutlierConfig) -> Result<Self, ConfigError> {
        let kinds = WeightedIndex::new([
            cfg.micro_pause_weight,
            cfg.panic_burst_weight,
            cfg.dead_click_weight,
        ])
        .map_err(|_| ConfigError::InvalidWeights {
            field: "outliers.weights",
        })?;
        Ok(Self {
            cfg,
            kinds,
            cooldown: 0,
            count: 0,
        })
    }

    /// Called once per emission; returns the outlier to inject, if any.
    pub fn roll<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<OutlierKind> {
        if self.cooldown > 0 {
            self.cooldown -= 1;
            return None;
        }
        if !chance(rng, self.cfg.probability) {
            return None;
        }

        let kind = KINDS[self.kinds.sample(rng)];
        self.cooldown = self.cfg.cooldown.sample(rng);
        self.count += 1;
        tracing::debug!(%kind, cooldown = self.cooldown, "outlier injected");
        Some(kind)
    }

    /// Interval for kinds that replace the whole pipeline.
    ///
    /// `PanicBurst` has none; it scales the technique sample instead.
    pub fn interval<R: Rng + ?Sized>(&self, kind: OutlierKind, rng: &mut R) -> Option<f64> {
        match kind {
            OutlierKind::MicroPause => Some(self.cfg.micro_pause_ms.sample(rng)),
            OutlierKind::DeadClick => Some(self.cfg.dead_click_ms.sample(rng)),
            OutlierKind::PanicBurst => None,
        }
    }

    pub fn panic_scale(&self) -> f64 {
        self.cfg.panic_scale
    }

    pub fn cooldown(&self) -> u32 {
        self.cooldown
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}
