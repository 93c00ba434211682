use crate::clock::{as_millis_f64, from_millis_f64, SharedClock};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::feedback::{RunningVariance, VarianceFeedback};
use crate::modulator::{Modulation, Modulator};
use crate::outlier::{OutlierInjector, OutlierKind};
use crate::pattern::PatternBreakDetector;
use crate::rate_limit::{RateLimiter, Throttle};
use crate::sampler::{gaussian, uniform, uniform_int};
use crate::session::{EmissionKind, EventCounters, HistoryWindow, Lifecycle, SessionHandle};
use crate::stats::{current_rate, window_variance, LiveFigures};
use crate::technique::{sample_base, TechniqueSelector};
use crate::time_series::RatePoint;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::TAU;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

const HOLD_MEAN_MS: f64 = 26.0;
const HOLD_STD_DEV_MS: f64 = 8.0;

/// Performs the physical click. Receives the press-to-release hold time.
pub trait Actuator {
    fn click(&mut self, hold: Duration);
}

impl<F: FnMut(Duration)> Actuator for F {
    fn click(&mut self, hold: Duration) {
        self(hold)
    }
}

/// Result of one emission
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Emission {
    /// milliseconds the caller should wait before the next emission
    pub interval_ms: f64,
    /// stall applied before this emission, if any
    pub throttle: Throttle,
    pub kind: EmissionKind,
}

impl Emission {
    pub fn interval(&self) -> Duration {
        from_millis_f64(self.interval_ms)
    }
}

/// Per-span shaping state
#[derive(Debug, Clone)]
struct Shaping {
    consecutive: u32,
    user_baseline: f64,
    drift: f64,
    rhythm_phase: f64,
    reaction: Option<Duration>,
}

/// Owns every pipeline stage and a seeded random source. Lifecycle commands
/// from a [`SessionHandle`] are drained at the top of each emission.
pub struct Engine {
    cfg: EngineConfig,
    rng: StdRng,
    clock: SharedClock,
    selector: TechniqueSelector,
    modulator: Option<Modulator>,
    outliers: OutlierInjector,
    feedback: VarianceFeedback,
    pattern: PatternBreakDetector,
    limiter: RateLimiter,
    history: HistoryWindow,
    running: RunningVariance,
    shaping: Shaping,
    commands: Receiver<Lifecycle>,
    handle: SessionHandle,
}

impl Engine {
    /// Build an engine. `seed` fixes the random source; `None` seeds from the OS.
    pub fn new(cfg: EngineConfig, clock: SharedClock, seed: Option<u64>) -> Result<Self> {
        cfg.validate()?;

        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let selector = TechniqueSelector::new(&cfg.techniques, &mut rng)?;
        let outliers = OutlierInjector::new(cfg.outliers.clone())?;
        let feedback = VarianceFeedback::new(cfg.feedback.clone(), clock.now());
        let shaping = Shaping {
            consecutive: 0,
            user_baseline: cfg.shaping.user_baseline.sample(&mut rng),
            drift: 0.0,
            rhythm_phase: 0.0,
            reaction: None,
        };

        let (tx, commands) = mpsc::channel();
        let handle = SessionHandle::new(clock.clone(), tx, cfg.min_samples);

        tracing::info!(
            mode = %cfg.mode,
            techniques = %cfg.technique_set,
            seeded = seed.is_some(),
            "engine created"
        );

        Ok(Self {
            modulator: cfg.modulator.clone().map(Modulator::new),
            pattern: PatternBreakDetector::new(cfg.pattern.clone()),
            limiter: RateLimiter::new(cfg.rate_limit.clone()),
            history: HistoryWindow::new(cfg.history_capacity),
            running: RunningVariance::default(),
            selector,
            outliers,
            feedback,
            shaping,
            commands,
            handle,
            clock,
            rng,
            cfg,
        })
    }

    /// Cloneable handle for lifecycle hooks and snapshots
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Compute the next interval, click, record it, and return it.
    pub fn emit_once<A: Actuator + ?Sized>(&mut self, actuator: &mut A) -> Emission {
        self.drain_commands();

        let throttle = self.limiter.check(self.clock.now());
        let stall = throttle.delay() + self.shaping.reaction.take().unwrap_or_default();
        if !stall.is_zero() {
            self.clock.sleep(stall);
        }

        let now = self.clock.now();
        self.feedback.maybe_recompute(
            &mut self.rng,
            now,
            &self.running,
            self.history.values(),
            &self.cfg.min_samples,
        );

        let (interval_ms, kind) = self.next_interval(now);

        let hold = from_millis_f64(gaussian(&mut self.rng, HOLD_MEAN_MS, HOLD_STD_DEV_MS).abs());
        actuator.click(hold);

        self.record(interval_ms, kind);

        Emission {
            interval_ms,
            throttle,
            kind,
        }
    }

    fn drain_commands(&mut self) {
        while let Ok(cmd) = self.commands.try_recv() {
            match cmd {
                Lifecycle::Started => self.on_span_start(),
                Lifecycle::Stopped => {
                    if let Some(m) = self.modulator.as_mut() {
                        m.reset();
                    }
                }
            }
        }
    }

    fn on_span_start(&mut self) {
        let s = &self.cfg.shaping;
        self.shaping.user_baseline = s.user_baseline.sample(&mut self.rng);
        self.shaping.drift = s.initial_drift.sample(&mut self.rng);
        self.shaping.rhythm_phase = uniform(&mut self.rng, 0.0, TAU);
        self.shaping.consecutive = 0;
        let reaction =
            gaussian(&mut self.rng, s.reaction_mean_ms, s.reaction_std_dev_ms).abs();
        self.shaping.reaction = Some(from_millis_f64(reaction));
        tracing::debug!(
            baseline = self.shaping.user_baseline,
            drift = self.shaping.drift,
            reaction_ms = reaction,
            "span parameters re-randomised"
        );
    }

    fn next_interval(&mut self, now: Duration) -> (f64, EmissionKind) {
        let outlier = self.outliers.roll(&mut self.rng);
        if let Some(kind) = outlier {
            if let Some(ms) = self.outliers.interval(kind, &mut self.rng) {
                return (ms, EmissionKind::Outlier(kind));
            }
        }

        if let Some(m) = self.modulator.as_mut() {
            match m.modulate(&mut self.rng, now, self.shaping.consecutive, self.cfg.bounds) {
                Modulation::Burst(ms) => return (ms, EmissionKind::Burst),
                Modulation::Pause(ms) => return (ms, EmissionKind::Pause),
                Modulation::Pass => {}
            }
        }

        let profile = self.selector.select(&mut self.rng);
        let technique = profile.technique;
        let mut base = sample_base(profile, &mut self.rng);
        let kind = if outlier == Some(OutlierKind::PanicBurst) {
            base *= self.outliers.panic_scale();
            EmissionKind::Outlier(OutlierKind::PanicBurst)
        } else {
            EmissionKind::Technique(technique)
        };

        let shaped = self.shape(base);
        let clamped = self.cfg.bounds.clamp(shaped);
        let value = self
            .pattern
            .inspect(&mut self.rng, self.history.values(), clamped, self.cfg.bounds)
            .unwrap_or(clamped);
        (value, kind)
    }

    /// Baseline, fatigue, drift, rhythm, feedback and noise, in that order
    fn shape(&mut self, base: f64) -> f64 {
        let s = &self.cfg.shaping;
        let rng = &mut self.rng;
        let st = &mut self.shaping;

        let mut v = base * st.user_baseline;

        let fatigue = if st.consecutive < s.warmup_clicks {
            s.warmup_scale
        } else if st.consecutive < s.settle_clicks {
            s.settle_scale
        } else {
            s.fatigue_scale
        };
        v *= fatigue.sample(rng);

        st.drift = (st.drift + uniform(rng, -s.drift_step, s.drift_step))
            .clamp(-s.drift_limit, s.drift_limit);
        v *= 1.0 + st.drift;

        st.rhythm_phase = (st.rhythm_phase + s.rhythm_step.sample(rng)) % TAU;
        v += st.rhythm_phase.sin() * s.rhythm_amplitude_ms;

        v = self.feedback.apply(v);

        v + noise_offset(rng, s.noise_ms.max(0) as u32)
    }

    fn record(&mut self, interval_ms: f64, kind: EmissionKind) {
        let at = self.clock.now();
        self.limiter.record(at);
        self.history.push(interval_ms);
        self.running.push(interval_ms);
        self.shaping.consecutive = self.shaping.consecutive.saturating_add(1);

        let counters = EventCounters {
            bursts: self.modulator.as_ref().map(Modulator::bursts).unwrap_or(0),
            pauses: self.modulator.as_ref().map(Modulator::pauses).unwrap_or(0),
            outliers: self.outliers.count(),
            pattern_breaks: self.pattern.breaks(),
            variance_adjustments: self.feedback.adjustments(),
            throttles: self.limiter.throttled(),
        };
        let recent = self.history.values();
        let live = LiveFigures {
            current_rate: current_rate(recent, &self.cfg.min_samples),
            window_variance: window_variance(
                recent,
                self.cfg.feedback.window,
                &self.cfg.min_samples,
            ),
        };
        let offset = at.saturating_sub(self.handle.origin());

        self.handle.with_log(|log| {
            log.append(interval_ms, offset, kind);
            log.push_rate(RatePoint::new(
                offset.as_secs_f64(),
                live.current_rate.unwrap_or(0.0),
            ));
            log.publish(counters, live);
        });

        tracing::trace!(interval_ms, %kind, at_ms = as_millis_f64(offset), "emitted");
    }
}

/// Whole-millisecond noise in `[-n, n + 1]`
fn noise_offset<R: Rng + ?Sized>(rng: &mut R, n: u32) -> f64 {
    uniform_int(rng, 0, 2 * n + 1) as f64 - n as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::config::{CountRange, TechniqueSet, VarianceMode};
    use crate::error::CadenceError;
    use crate::technique::Technique;
    use assert_matches::assert_matches;
    use std::sync::Arc;

    fn engine(cfg: EngineConfig, seed: u64) -> (Engine, ManualClock) {
        let clock = ManualClock::new();
        let engine = Engine::new(cfg, Arc::new(clock.clone()), Some(seed)).unwrap();
        (engine, clock)
    }

    fn drive(engine: &mut Engine, clock: &ManualClock, n: usize) -> Vec<Emission> {
        (0..n)
            .map(|_| {
                let e = engine.emit_once(&mut |_: Duration| {});
                clock.sleep(e.interval());
                e
            })
            .collect()
    }

    #[test]
    fn rejects_invalid_config() {
        let mut cfg = EngineConfig::default();
        cfg.history_capacity = 0;
        let res = Engine::new(cfg, Arc::new(ManualClock::new()), Some(1));
        assert_matches!(res.err(), Some(CadenceError::Config(_)));
    }

    #[test]
    fn noise_reaches_one_past_the_upper_bound() {
        let mut rng = StdRng::seed_from_u64(12);
        let draws: Vec<f64> = (0..5_000).map(|_| noise_offset(&mut rng, 3)).collect();
        assert!(draws.iter().all(|d| (-3.0..=4.0).contains(d)));
        assert!(draws.contains(&-3.0));
        assert!(draws.contains(&4.0));
        assert!((0..100).all(|_| [0.0, 1.0].contains(&noise_offset(&mut rng, 0))));
    }

    #[test]
    fn non_outlier_emissions_stay_in_bounds() {
        for set in [TechniqueSet::Mixed, TechniqueSet::Steady] {
            for mode in [VarianceMode::Wide, VarianceMode::Narrow] {
                let cfg = EngineConfig::for_mode(mode, set);
                let bounds = cfg.bounds;
                let (mut e, clock) = engine(cfg, 11);
                for em in drive(&mut e, &clock, 2_000) {
                    if !em.kind.is_outlier() {
                        assert!(bounds.contains(em.interval_ms), "{set}/{mode}: {em:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn every_emission_is_logged_in_order() {
        let (mut e, clock) = engine(EngineConfig::default(), 5);
        let emitted: Vec<f64> = drive(&mut e, &clock, 300).iter().map(|e| e.interval_ms).collect();
        let log = e.handle().snapshot_log();
        assert_eq!(log.values(), emitted);
        assert!(log
            .intervals()
            .windows(2)
            .all(|w| w[0].index + 1 == w[1].index && w[0].offset <= w[1].offset));
    }

    #[test]
    fn forced_dead_click_lands_in_its_range() {
        let mut cfg = EngineConfig::default();
        cfg.outliers.probability = 1.0;
        cfg.outliers.cooldown = CountRange::new(1_000, 1_000);
        cfg.outliers.micro_pause_weight = 0.0;
        cfg.outliers.panic_burst_weight = 0.0;
        cfg.outliers.dead_click_weight = 1.0;
        let (mut e, _clock) = engine(cfg, 3);

        let em = e.emit_once(&mut |_: Duration| {});
        assert_eq!(em.kind, EmissionKind::Outlier(OutlierKind::DeadClick));
        assert!((500.0..=800.0).contains(&em.interval_ms));
        assert_eq!(e.handle().snapshot_log().counters().outliers, 1);
    }

    #[test]
    fn panic_burst_applies_to_any_technique() {
        let mut cfg = EngineConfig::for_mode(VarianceMode::Narrow, TechniqueSet::Steady);
        cfg.outliers.probability = 1.0;
        cfg.outliers.cooldown = CountRange::new(0, 0);
        cfg.outliers.micro_pause_weight = 0.0;
        cfg.outliers.dead_click_weight = 0.0;
        let (mut e, clock) = engine(cfg, 4);
        for em in drive(&mut e, &clock, 50) {
            assert_eq!(em.kind, EmissionKind::Outlier(OutlierKind::PanicBurst));
        }
    }

    #[test]
    fn actuator_sees_one_click_per_emission() {
        let (mut e, _clock) = engine(EngineConfig::default(), 6);
        let mut holds = Vec::new();
        for _ in 0..40 {
            e.emit_once(&mut |hold: Duration| holds.push(hold));
        }
        assert_eq!(holds.len(), 40);
        assert!(holds.iter().all(|h| *h < Duration::from_millis(200)));
    }

    #[test]
    fn span_start_schedules_reaction_delay() {
        let (mut e, clock) = engine(EngineConfig::default(), 7);
        let handle = e.handle();
        handle.start_active_span();
        let before = clock.now();
        e.emit_once(&mut |_: Duration| {});
        assert!(clock.now() > before, "reaction delay must be slept");

        // only once per span
        let before = clock.now();
        e.emit_once(&mut |_: Duration| {});
        assert_eq!(clock.now(), before);
    }

    #[test]
    fn stop_clears_burst_state() {
        let mut cfg = EngineConfig::default();
        if let Some(m) = cfg.modulator.as_mut() {
            m.burst_probability = 1.0;
            m.pause_probability = 0.0;
            m.burst_length = CountRange::new(8, 8);
        }
        cfg.outliers.probability = 0.0;
        let (mut e, clock) = engine(cfg, 8);
        let handle = e.handle();
        let kinds: Vec<EmissionKind> = drive(&mut e, &clock, 8).iter().map(|e| e.kind).collect();
        assert_eq!(kinds[7], EmissionKind::Burst);

        handle.start_active_span();
        handle.stop_active_span();
        handle.start_active_span();
        // consecutive reset on start keeps the gates shut for a few emissions
        let em = e.emit_once(&mut |_: Duration| {});
        assert_matches!(em.kind, EmissionKind::Technique(_));
    }

    #[test]
    fn steady_set_only_emits_steady() {
        let mut cfg = EngineConfig::for_mode(VarianceMode::Narrow, TechniqueSet::Steady);
        cfg.outliers.probability = 0.0;
        let (mut e, clock) = engine(cfg, 9);
        for em in drive(&mut e, &clock, 200) {
            assert_eq!(em.kind, EmissionKind::Technique(Technique::Steady));
        }
    }

    #[test]
    fn counters_are_published() {
        let (mut e, clock) = engine(EngineConfig::default(), 10);
        drive(&mut e, &clock, 1_500);
        let counters = e.handle().snapshot_log().counters();
        assert!(counters.bursts > 0);
        let stats = e.handle().snapshot_stats().unwrap();
        assert_eq!(stats.counters, counters);
        assert!(stats.current_rate.is_some());
    }
}
