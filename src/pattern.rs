use crate::config::{Band, PatternConfig};
use crate::util::variance;
use rand::Rng;

#[derive(Debug, Clone)]
pub struct PatternBreakDetector {
    cfg: PatternConfig,
    breaks: u64,
}

impl PatternBreakDetector {
    pub fn new(cfg: PatternConfig) -> Self {
        Self { cfg, breaks: 0 }
    }

    /// Inspect the trailing window of `history` and rewrite `candidate` if its
    /// variance is below the floor. Returns the rewritten value, re-clamped to
    /// `bounds`, or `None` when no break was needed.
    pub fn inspect<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        history: &[f64],
        candidate: f64,
        bounds: Band,
    ) -> Option<f64> {
        if history.len() < self.cfg.window {
            return None;
        }
        let recent = &history[history.len() - self.cfg.window..];
        let v = variance(recent)?;
        if v >= self.cfg.variance_floor {
            return None;
        }

        let rewritten = bounds.clamp(candidate * self.cfg.multiplier.sample(rng));
        self.breaks += 1;
        tracing::debug!(window_variance = v, candidate, rewritten, "pattern break");
        Some(rewritten)
    }

    pub fn breaks(&self) -> u64 {
        self.breaks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, TechniqueSet, VarianceMode};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const BOUNDS: Band = Band::new(60.0, 450.0);

    fn detector(mode: VarianceMode) -> PatternBreakDetector {
        PatternBreakDetector::new(EngineConfig::for_mode(mode, TechniqueSet::Mixed).pattern)
    }

    #[test]
    fn identical_window_always_triggers_once() {
        let mut rng = StdRng::seed_from_u64(1);
        for mode in [VarianceMode::Wide, VarianceMode::Narrow] {
            let mut d = detector(mode);
            let history = vec![108.0; 20];
            for expected in 1..=50u64 {
                let out = d.inspect(&mut rng, &history, 108.0, BOUNDS);
                let v = out.expect("identical window must break");
                assert!(BOUNDS.contains(v));
                assert_eq!(d.breaks(), expected);
            }
        }
    }

    #[test]
    fn rewrite_uses_mode_multiplier_range() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut d = detector(VarianceMode::Narrow);
        let history = vec![200.0; 25];
        for _ in 0..500 {
            let v = d.inspect(&mut rng, &history, 200.0, BOUNDS).unwrap();
            assert!((129.999..=270.001).contains(&v), "{v} outside 0.65..1.35 of 200");
        }
    }

    #[test]
    fn short_history_is_ignored() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut d = detector(VarianceMode::Wide);
        let history = vec![100.0; 19];
        assert_eq!(d.inspect(&mut rng, &history, 100.0, BOUNDS), None);
        assert_eq!(d.breaks(), 0);
    }

    #[test]
    fn dispersed_window_is_left_alone() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut d = detector(VarianceMode::Wide);
        // alternating 60/140: variance 1600, above the 400 floor
        let history: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 60.0 } else { 140.0 }).collect();
        assert_eq!(d.inspect(&mut rng, &history, 100.0, BOUNDS), None);
    }

    #[test]
    fn only_trailing_window_counts() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut d = detector(VarianceMode::Wide);
        let mut history: Vec<f64> = (0..30).map(|i| if i % 2 == 0 { 60.0 } else { 400.0 }).collect();
        history.extend(std::iter::repeat(100.0).take(20));
        assert!(d.inspect(&mut rng, &history, 100.0, BOUNDS).is_some());
    }
}
