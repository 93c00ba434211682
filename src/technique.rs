use crate::config::{CountRange, TechniqueConfig, TechniqueProfile};
use crate::error::ConfigError;
use crate::sampler::{chance, gaussian, weibull};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Technique {
    /// high variance, burst-prone
    Butterfly,
    /// medium variance, sustained
    Jitter,
    /// lower variance, rhythmic
    Normal,
    /// single profile used by the steady set
    Steady,
}

/// Keeps one technique for a drawn number of emissions, then redraws
/// independently of the current one.
#[derive(Debug, Clone)]
pub struct TechniqueSelector {
    profiles: Vec<TechniqueProfile>,
    weights: WeightedIndex<f64>,
    persistence: CountRange,
    active: usize,
    elapsed: u32,
    next_transition: u32,
    switches: u64,
}

impl TechniqueSelector {
    pub fn new<R: Rng + ?Sized>(cfg: &TechniqueConfig, rng: &mut R) -> Result<Self, ConfigError> {
        let weights = WeightedIndex::new(cfg.profiles.iter().map(|p| p.weight)).map_err(|_| {
            ConfigError::InvalidWeights {
                field: "techniques.profiles",
            }
        })?;
        let active = weights.sample(rng);
        let next_transition = cfg.persistence.sample(rng);

        Ok(Self {
            profiles: cfg.profiles.clone(),
            weights,
            persistence: cfg.persistence,
            active,
            elapsed: 0,
            next_transition,
            switches: 0,
        })
    }

    /// Advance one emission and return the profile to sample from
    pub fn select<R: Rng + ?Sized>(&mut self, rng: &mut R) -> &TechniqueProfile {
        self.elapsed += 1;
        if self.elapsed >= self.next_transition {
            let previous = self.active;
            self.active = self.weights.sample(rng);
            self.elapsed = 0;
            self.next_transition = self.persistence.sample(rng);
            self.switches += 1;
            if previous != self.active {
                tracing::trace!(
                    from = %self.profiles[previous].technique,
                    to = %self.profiles[self.active].technique,
                    "technique switch"
                );
            }
        }
        &self.profiles[self.active]
    }

    /// Emissions left before the next draw
    pub fn remaining(&self) -> u32 {
        self.next_transition.saturating_sub(self.elapsed)
    }

    /// Number of renewal draws so far, self-transitions included
    pub fn switches(&self) -> u64 {
        self.switches
    }
}

/// Draw a base interval under `profile`: `|gaussian|` or Weibull, then jitter.
pub fn sample_base<R: Rng + ?Sized>(profile: &TechniqueProfile, rng: &mut R) -> f64 {
    let base = if chance(rng, profile.gaussian_share) {
        gaussian(rng, profile.gaussian_mean, profile.gaussian_std_dev).abs()
    } else {
        weibull(rng, profile.weibull_scale, profile.weibull_shape)
    };
    base * profile.jitter.sample(rng)
}
