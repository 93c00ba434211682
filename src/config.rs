use crate::app_dirs::AppDirs;
use crate::error::ConfigError;
use crate::technique::Technique;
use clap::ValueEnum;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Operating mode: how much dispersion the generated stream aims for
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, ValueEnum, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VarianceMode {
    Wide,
    Narrow,
}

/// Which techniques the selector rotates between
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, ValueEnum, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TechniqueSet {
    /// butterfly / jitter / normal rotation
    Mixed,
    /// a single steady profile
    Steady,
}

/// Inclusive float range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub min: f64,
    pub max: f64,
}

impl Band {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        crate::sampler::uniform(rng, self.min, self.max)
    }

    fn validate(&self, field: &'static str) -> Result<(), ConfigError> {
        if self.min.is_finite() && self.max.is_finite() && self.min <= self.max {
            Ok(())
        } else {
            Err(ConfigError::InvalidRange {
                field,
                min: self.min,
                max: self.max,
            })
        }
    }
}

/// Inclusive integer range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountRange {
    pub min: u32,
    pub max: u32,
}

impl CountRange {
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        crate::sampler::uniform_int(rng, self.min, self.max)
    }

    fn validate(&self, field: &'static str) -> Result<(), ConfigError> {
        if self.min <= self.max {
            Ok(())
        } else {
            Err(ConfigError::InvalidRange {
                field,
                min: self.min as f64,
                max: self.max as f64,
            })
        }
    }
}

/// Parameters of one technique
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechniqueProfile {
    pub technique: Technique,
    /// relative weight in the categorical draw
    pub weight: f64,
    pub gaussian_mean: f64,
    pub gaussian_std_dev: f64,
    pub weibull_scale: f64,
    pub weibull_shape: f64,
    /// probability of using the Gaussian branch instead of Weibull
    pub gaussian_share: f64,
    pub jitter: Band,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechniqueConfig {
    /// emissions a technique persists before the next draw
    pub persistence: CountRange,
    pub profiles: Vec<TechniqueProfile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModulatorConfig {
    pub burst_probability: f64,
    /// consecutive emissions required before a burst may start
    pub burst_min_run: u32,
    pub burst_length: CountRange,
    pub burst_mean_ms: f64,
    pub burst_std_dev_ms: f64,
    pub burst_jitter: Band,
    /// upper clamp for in-burst intervals; the lower clamp is the engine floor
    pub burst_ceiling_ms: f64,
    pub pause_probability: f64,
    pub pause_min_run: u32,
    pub pause_ms: Band,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierConfig {
    pub probability: f64,
    pub cooldown: CountRange,
    pub micro_pause_weight: f64,
    pub panic_burst_weight: f64,
    pub dead_click_weight: f64,
    pub micro_pause_ms: Band,
    pub dead_click_ms: Band,
    /// multiplier applied to the base interval on a panic burst
    pub panic_scale: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackConfig {
    pub period_ms: u64,
    /// inspect the full log (when long enough) rather than the history window
    pub prefer_session_log: bool,
    /// trailing history values inspected when the window is the source
    pub window: usize,
    pub low: f64,
    pub mid: f64,
    pub high: f64,
    pub starved: Band,
    pub moderate: Band,
    pub fine: Band,
    pub decay: f64,
    pub initial: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternConfig {
    pub window: usize,
    pub variance_floor: f64,
    pub multiplier: Band,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub window_ms: u64,
    pub spike_window_ms: u64,
    pub spike_events: usize,
    pub spike_delay_ms: u64,
    /// events per second averaged over the whole window
    pub sustained_rate: f64,
    pub sustained_delay_ms: u64,
}

/// Post-sampling shaping: fatigue, drift, rhythm, noise and per-span extras
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapingConfig {
    pub user_baseline: Band,
    pub warmup_clicks: u32,
    pub warmup_scale: Band,
    pub settle_clicks: u32,
    pub settle_scale: Band,
    pub fatigue_scale: Band,
    pub drift_step: f64,
    pub drift_limit: f64,
    pub initial_drift: Band,
    pub rhythm_step: Band,
    pub rhythm_amplitude_ms: f64,
    pub noise_ms: i32,
    pub reaction_mean_ms: f64,
    pub reaction_std_dev_ms: f64,
}

/// Minimum sample counts before a statistic is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinSamples {
    pub snapshot: usize,
    pub window_variance: usize,
    pub feedback_session: usize,
    pub feedback_window: usize,
    pub current_rate: usize,
    /// trailing values averaged for the current rate
    pub current_rate_window: usize,
    pub tracker: usize,
}

impl Default for MinSamples {
    fn default() -> Self {
        Self {
            snapshot: 20,
            window_variance: 10,
            feedback_session: 50,
            feedback_window: 15,
            current_rate: 5,
            current_rate_window: 10,
            tracker: 10,
        }
    }
}

/// Every tunable of the emission pipeline for one mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub mode: VarianceMode,
    pub technique_set: TechniqueSet,
    pub bounds: Band,
    pub techniques: TechniqueConfig,
    pub modulator: Option<ModulatorConfig>,
    pub outliers: OutlierConfig,
    pub feedback: FeedbackConfig,
    pub pattern: PatternConfig,
    pub rate_limit: RateLimitConfig,
    pub shaping: ShapingConfig,
    pub history_capacity: usize,
    pub min_samples: MinSamples,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::for_mode(VarianceMode::Wide, TechniqueSet::Mixed)
    }
}

impl EngineConfig {
    pub fn for_mode(mode: VarianceMode, technique_set: TechniqueSet) -> Self {
        let wide = mode == VarianceMode::Wide;

        let profiles = match technique_set {
            TechniqueSet::Mixed => vec![
                TechniqueProfile {
                    technique: Technique::Butterfly,
                    weight: 0.40,
                    gaussian_mean: 85.0,
                    gaussian_std_dev: 35.0,
                    weibull_scale: 80.0,
                    weibull_shape: 1.8,
                    gaussian_share: 0.7,
                    jitter: Band::new(0.70, 1.30),
                },
                TechniqueProfile {
                    technique: Technique::Jitter,
                    weight: 0.35,
                    gaussian_mean: 105.0,
                    gaussian_std_dev: 22.0,
                    weibull_scale: 100.0,
                    weibull_shape: 2.0,
                    gaussian_share: 0.7,
                    jitter: Band::new(0.82, 1.18),
                },
                TechniqueProfile {
                    technique: Technique::Normal,
                    weight: 0.25,
                    gaussian_mean: 120.0,
                    gaussian_std_dev: 18.0,
                    weibull_scale: 115.0,
                    weibull_shape: 2.5,
                    gaussian_share: 0.7,
                    jitter: Band::new(0.90, 1.10),
                },
            ],
            TechniqueSet::Steady if wide => vec![TechniqueProfile {
                technique: Technique::Steady,
                weight: 1.0,
                gaussian_mean: 100.0,
                gaussian_std_dev: 30.0,
                weibull_scale: 95.0,
                weibull_shape: 2.0,
                gaussian_share: 0.7,
                jitter: Band::new(0.75, 1.25),
            }],
            TechniqueSet::Steady => vec![TechniqueProfile {
                technique: Technique::Steady,
                weight: 1.0,
                gaussian_mean: 108.0,
                gaussian_std_dev: 24.0,
                weibull_scale: 100.0,
                weibull_shape: 2.2,
                gaussian_share: 0.7,
                jitter: Band::new(0.80, 1.20),
            }],
        };

        let steady = technique_set == TechniqueSet::Steady;

        let modulator = wide.then(|| ModulatorConfig {
            burst_probability: if steady { 0.15 } else { 0.20 },
            burst_min_run: 5,
            burst_length: CountRange::new(3, 8),
            burst_mean_ms: 55.0,
            burst_std_dev_ms: 12.0,
            burst_jitter: Band::new(0.85, 1.15),
            burst_ceiling_ms: 110.0,
            pause_probability: if steady { 0.08 } else { 0.02 },
            pause_min_run: 10,
            pause_ms: if steady {
                Band::new(250.0, 450.0)
            } else {
                Band::new(80.0, 120.0)
            },
        });

        // the steady set keeps a hard floor of 84 ms in both modes
        let bounds = match (technique_set, mode) {
            (TechniqueSet::Mixed, VarianceMode::Wide) => Band::new(60.0, 450.0),
            (TechniqueSet::Mixed, VarianceMode::Narrow) => Band::new(65.0, 400.0),
            (TechniqueSet::Steady, VarianceMode::Wide) => Band::new(84.0, 400.0),
            (TechniqueSet::Steady, VarianceMode::Narrow) => Band::new(84.0, 143.0),
        };

        let (low, mid, high) = match (technique_set, mode) {
            (TechniqueSet::Mixed, VarianceMode::Wide) => (1200.0, 1800.0, 2500.0),
            (TechniqueSet::Mixed, VarianceMode::Narrow) => (500.0, 800.0, 1200.0),
            (TechniqueSet::Steady, VarianceMode::Wide) => (800.0, 1500.0, 2500.0),
            (TechniqueSet::Steady, VarianceMode::Narrow) => (150.0, 200.0, 250.0),
        };
        let feedback = if wide {
            FeedbackConfig {
                period_ms: 10_000,
                prefer_session_log: true,
                // the steady set measures its whole history
                window: if steady { 50 } else { 30 },
                low,
                mid,
                high,
                starved: if steady {
                    Band::new(0.35, 0.50)
                } else {
                    Band::new(0.40, 0.60)
                },
                moderate: Band::new(0.25, 0.40),
                fine: Band::new(0.15, 0.28),
                decay: 0.85,
                initial: 0.15,
            }
        } else {
            FeedbackConfig {
                period_ms: 10_000,
                prefer_session_log: false,
                window: 30,
                low,
                mid,
                high,
                starved: if steady {
                    Band::new(0.25, 0.40)
                } else {
                    Band::new(0.30, 0.45)
                },
                moderate: Band::new(0.15, 0.30),
                fine: Band::new(0.08, 0.18),
                decay: 0.85,
                initial: 0.15,
            }
        };

        let pattern = match (technique_set, mode) {
            (TechniqueSet::Mixed, VarianceMode::Wide) => PatternConfig {
                window: 20,
                variance_floor: 400.0,
                multiplier: Band::new(0.55, 1.45),
            },
            (TechniqueSet::Mixed, VarianceMode::Narrow) => PatternConfig {
                window: 20,
                variance_floor: 250.0,
                multiplier: Band::new(0.65, 1.35),
            },
            (TechniqueSet::Steady, VarianceMode::Wide) => PatternConfig {
                window: 20,
                variance_floor: 250.0,
                multiplier: Band::new(0.60, 1.40),
            },
            (TechniqueSet::Steady, VarianceMode::Narrow) => PatternConfig {
                window: 20,
                variance_floor: 180.0,
                multiplier: Band::new(0.65, 1.35),
            },
        };

        // drift step, drift limit, rhythm amplitude, noise
        let (drift_step, drift_limit, rhythm_amplitude_ms, noise_ms) =
            match (technique_set, mode) {
                (TechniqueSet::Mixed, VarianceMode::Wide) => (0.010, 0.40, 25.0, 32),
                (TechniqueSet::Mixed, VarianceMode::Narrow) => (0.006, 0.28, 18.0, 24),
                (TechniqueSet::Steady, VarianceMode::Wide) => (0.008, 0.35, 22.0, 28),
                (TechniqueSet::Steady, VarianceMode::Narrow) => (0.005, 0.25, 18.0, 22),
            };

        Self {
            mode,
            technique_set,
            bounds,
            techniques: TechniqueConfig {
                persistence: CountRange::new(5, 15),
                profiles,
            },
            modulator,
            outliers: OutlierConfig {
                probability: 0.02,
                cooldown: CountRange::new(30, 80),
                micro_pause_weight: 0.70,
                panic_burst_weight: 0.20,
                dead_click_weight: 0.10,
                micro_pause_ms: Band::new(200.0, 350.0),
                dead_click_ms: Band::new(500.0, 800.0),
                panic_scale: 0.55,
            },
            feedback,
            pattern,
            rate_limit: RateLimitConfig {
                window_ms: 5_000,
                spike_window_ms: 1_000,
                spike_events: 16,
                spike_delay_ms: 80,
                sustained_rate: 12.0,
                sustained_delay_ms: 50,
            },
            shaping: ShapingConfig {
                user_baseline: Band::new(0.88, 1.12),
                warmup_clicks: 3,
                warmup_scale: Band::new(1.05, 1.20),
                settle_clicks: 8,
                settle_scale: Band::new(0.92, 1.08),
                fatigue_scale: Band::new(0.88, 0.98),
                drift_step,
                drift_limit,
                initial_drift: Band::new(-0.15, 0.15),
                rhythm_step: Band::new(0.20, 0.60),
                rhythm_amplitude_ms,
                noise_ms,
                reaction_mean_ms: 180.0,
                reaction_std_dev_ms: 45.0,
            },
            history_capacity: 50,
            min_samples: MinSamples::default(),
        }
    }

    /// Check every range, probability, weight and window
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bounds.validate("bounds")?;
        if self.bounds.min <= 0.0 {
            return Err(ConfigError::InvalidRange {
                field: "bounds",
                min: self.bounds.min,
                max: self.bounds.max,
            });
        }

        self.techniques.persistence.validate("techniques.persistence")?;
        if self.techniques.profiles.is_empty()
            || self
                .techniques
                .profiles
                .iter()
                .any(|p| !(p.weight >= 0.0 && p.weight.is_finite()))
            || self.techniques.profiles.iter().map(|p| p.weight).sum::<f64>() <= 0.0
        {
            return Err(ConfigError::InvalidWeights {
                field: "techniques.profiles",
            });
        }
        for p in &self.techniques.profiles {
            p.jitter.validate("techniques.jitter")?;
            probability("techniques.gaussian_share", p.gaussian_share)?;
            if p.weibull_shape <= 0.0 {
                return Err(ConfigError::InvalidRange {
                    field: "techniques.weibull_shape",
                    min: p.weibull_shape,
                    max: p.weibull_shape,
                });
            }
        }

        if let Some(m) = &self.modulator {
            probability("modulator.burst_probability", m.burst_probability)?;
            probability("modulator.pause_probability", m.pause_probability)?;
            m.burst_length.validate("modulator.burst_length")?;
            m.burst_jitter.validate("modulator.burst_jitter")?;
            m.pause_ms.validate("modulator.pause_ms")?;
        }

        let o = &self.outliers;
        probability("outliers.probability", o.probability)?;
        o.cooldown.validate("outliers.cooldown")?;
        o.micro_pause_ms.validate("outliers.micro_pause_ms")?;
        o.dead_click_ms.validate("outliers.dead_click_ms")?;
        let weights = [o.micro_pause_weight, o.panic_burst_weight, o.dead_click_weight];
        if weights.iter().any(|w| !(*w >= 0.0)) || weights.iter().sum::<f64>() <= 0.0 {
            return Err(ConfigError::InvalidWeights {
                field: "outliers.weights",
            });
        }

        let f = &self.feedback;
        if f.period_ms == 0 {
            return Err(ConfigError::ZeroWindow {
                field: "feedback.period_ms",
            });
        }
        if f.window == 0 {
            return Err(ConfigError::ZeroWindow {
                field: "feedback.window",
            });
        }
        if !(f.low <= f.mid && f.mid <= f.high) {
            return Err(ConfigError::InvalidRange {
                field: "feedback.thresholds",
                min: f.low,
                max: f.high,
            });
        }
        f.starved.validate("feedback.starved")?;
        f.moderate.validate("feedback.moderate")?;
        f.fine.validate("feedback.fine")?;

        if self.pattern.window == 0 {
            return Err(ConfigError::ZeroWindow {
                field: "pattern.window",
            });
        }
        self.pattern.multiplier.validate("pattern.multiplier")?;

        let r = &self.rate_limit;
        if r.window_ms == 0 || r.spike_window_ms == 0 {
            return Err(ConfigError::ZeroWindow {
                field: "rate_limit.window_ms",
            });
        }

        let s = &self.shaping;
        s.user_baseline.validate("shaping.user_baseline")?;
        s.warmup_scale.validate("shaping.warmup_scale")?;
        s.settle_scale.validate("shaping.settle_scale")?;
        s.fatigue_scale.validate("shaping.fatigue_scale")?;
        s.initial_drift.validate("shaping.initial_drift")?;
        s.rhythm_step.validate("shaping.rhythm_step")?;
        if s.noise_ms < 0 {
            return Err(ConfigError::InvalidRange {
                field: "shaping.noise_ms",
                min: s.noise_ms as f64,
                max: s.noise_ms as f64,
            });
        }

        if self.history_capacity == 0 {
            return Err(ConfigError::ZeroWindow {
                field: "history_capacity",
            });
        }
        // pattern breaks and window feedback read the history
        let needed = self
            .pattern
            .window
            .max(self.feedback.window)
            .max(self.min_samples.feedback_window);
        if self.history_capacity < needed {
            return Err(ConfigError::InvalidRange {
                field: "history_capacity",
                min: needed as f64,
                max: self.history_capacity as f64,
            });
        }

        Ok(())
    }
}

fn probability(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidProbability { field, value })
    }
}

/// Persisted user preferences
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub mode: VarianceMode,
    pub technique_set: TechniqueSet,
    pub seed: Option<u64>,
    pub export_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: VarianceMode::Wide,
            technique_set: TechniqueSet::Mixed,
            seed: None,
            export_dir: None,
        }
    }
}

impl Config {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::for_mode(self.mode, self.technique_set)
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => return cfg,
                Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "ignoring unreadable config"),
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).map_err(std::io::Error::other)?;
        fs::write(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::tempdir;

    #[test]
    fn builtin_modes_validate() {
        for mode in [VarianceMode::Wide, VarianceMode::Narrow] {
            for set in [TechniqueSet::Mixed, TechniqueSet::Steady] {
                let cfg = EngineConfig::for_mode(mode, set);
                assert_eq!(cfg.validate(), Ok(()), "{mode}/{set}");
            }
        }
    }

    #[test]
    fn narrow_mode_has_no_modulator() {
        let cfg = EngineConfig::for_mode(VarianceMode::Narrow, TechniqueSet::Mixed);
        assert!(cfg.modulator.is_none());
        let cfg = EngineConfig::for_mode(VarianceMode::Wide, TechniqueSet::Mixed);
        assert!(cfg.modulator.is_some());
    }

    #[test]
    fn mixed_set_weights_are_40_35_25() {
        let cfg = EngineConfig::for_mode(VarianceMode::Wide, TechniqueSet::Mixed);
        let weights: Vec<f64> = cfg.techniques.profiles.iter().map(|p| p.weight).collect();
        assert_eq!(weights, vec![0.40, 0.35, 0.25]);
    }

    #[test]
    fn rejects_inverted_band() {
        let mut cfg = EngineConfig::default();
        cfg.bounds = Band::new(400.0, 60.0);
        assert_matches!(
            cfg.validate(),
            Err(ConfigError::InvalidRange { field: "bounds", .. })
        );
    }

    #[test]
    fn rejects_probability_above_one() {
        let mut cfg = EngineConfig::default();
        cfg.outliers.probability = 1.5;
        assert_matches!(
            cfg.validate(),
            Err(ConfigError::InvalidProbability {
                field: "outliers.probability",
                ..
            })
        );
    }

    #[test]
    fn rejects_all_zero_outlier_weights() {
        let mut cfg = EngineConfig::default();
        cfg.outliers.micro_pause_weight = 0.0;
        cfg.outliers.panic_burst_weight = 0.0;
        cfg.outliers.dead_click_weight = 0.0;
        assert_matches!(cfg.validate(), Err(ConfigError::InvalidWeights { .. }));
    }

    #[test]
    fn rejects_history_shorter_than_its_readers() {
        let mut cfg = EngineConfig::for_mode(VarianceMode::Narrow, TechniqueSet::Mixed);
        cfg.history_capacity = 25;
        assert_matches!(
            cfg.validate(),
            Err(ConfigError::InvalidRange {
                field: "history_capacity",
                ..
            })
        );
        cfg.history_capacity = 30;
        assert!(cfg.validate().is_ok());

        let mut cfg = EngineConfig::for_mode(VarianceMode::Wide, TechniqueSet::Steady);
        cfg.history_capacity = 49;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn steady_set_carries_its_own_thresholds() {
        let wide = EngineConfig::for_mode(VarianceMode::Wide, TechniqueSet::Steady);
        assert_eq!(
            (wide.feedback.low, wide.feedback.mid, wide.feedback.high),
            (800.0, 1500.0, 2500.0)
        );
        assert_eq!(wide.feedback.starved, Band::new(0.35, 0.50));
        assert_eq!(wide.feedback.window, 50);
        assert_eq!(wide.bounds, Band::new(84.0, 400.0));
        assert_eq!(wide.pattern.variance_floor, 250.0);
        assert_eq!(wide.pattern.multiplier, Band::new(0.60, 1.40));
        assert_eq!(wide.shaping.drift_step, 0.008);
        assert_eq!(wide.shaping.drift_limit, 0.35);
        assert_eq!(wide.shaping.rhythm_amplitude_ms, 22.0);
        assert_eq!(wide.shaping.noise_ms, 28);
        let m = wide.modulator.unwrap();
        assert_eq!((m.burst_probability, m.pause_probability), (0.15, 0.08));
        assert_eq!(m.pause_ms, Band::new(250.0, 450.0));

        let narrow = EngineConfig::for_mode(VarianceMode::Narrow, TechniqueSet::Steady);
        assert_eq!(
            (narrow.feedback.low, narrow.feedback.mid, narrow.feedback.high),
            (150.0, 200.0, 250.0)
        );
        assert_eq!(narrow.feedback.starved, Band::new(0.25, 0.40));
        assert_eq!(narrow.bounds, Band::new(84.0, 143.0));
        assert_eq!(narrow.pattern.variance_floor, 180.0);
        assert_eq!(narrow.shaping.drift_step, 0.005);
        assert_eq!(narrow.shaping.drift_limit, 0.25);
        assert_eq!(narrow.shaping.rhythm_amplitude_ms, 18.0);
        assert_eq!(narrow.shaping.noise_ms, 22);

        let mixed = EngineConfig::for_mode(VarianceMode::Narrow, TechniqueSet::Mixed);
        assert_ne!(narrow.feedback, mixed.feedback);
        assert_ne!(narrow.pattern, mixed.pattern);
    }

    #[test]
    fn rejects_zero_pattern_window() {
        let mut cfg = EngineConfig::default();
        cfg.pattern.window = 0;
        assert_matches!(
            cfg.validate(),
            Err(ConfigError::ZeroWindow {
                field: "pattern.window"
            })
        );
    }

    #[test]
    fn band_clamp_and_contains() {
        let b = Band::new(60.0, 450.0);
        assert_eq!(b.clamp(10.0), 60.0);
        assert_eq!(b.clamp(900.0), 450.0);
        assert_eq!(b.clamp(100.0), 100.0);
        assert!(b.contains(60.0));
        assert!(!b.contains(450.1));
    }

    #[test]
    fn engine_config_json_roundtrip() {
        let cfg = EngineConfig::for_mode(VarianceMode::Narrow, TechniqueSet::Steady);
        let json = serde_json::to_string(&cfg).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config::default();
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn save_and_load_custom_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config {
            mode: VarianceMode::Narrow,
            technique_set: TechniqueSet::Steady,
            seed: Some(42),
            export_dir: Some(PathBuf::from("/tmp/cadence")),
        };
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn corrupt_config_falls_back_to_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, b"{ not json").unwrap();
        let store = FileConfigStore::with_path(&path);
        assert_eq!(store.load(), Config::default());
    }
}
