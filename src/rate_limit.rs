use crate::config::RateLimitConfig;
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Throttle {
    None,
    /// too many events inside the spike sub-window
    Spike(Duration),
    /// average over the whole window above the sustained ceiling
    Sustained(Duration),
}

impl Throttle {
    pub fn delay(&self) -> Duration {
        match self {
            Throttle::None => Duration::ZERO,
            Throttle::Spike(d) | Throttle::Sustained(d) => *d,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    cfg: RateLimitConfig,
    stamps: VecDeque<Duration>,
    throttled: u64,
}

impl RateLimiter {
    pub fn new(cfg: RateLimitConfig) -> Self {
        Self {
            cfg,
            stamps: VecDeque::new(),
            throttled: 0,
        }
    }

    /// Record an emission at engine time `at`
    pub fn record(&mut self, at: Duration) {
        self.stamps.push_back(at);
    }

    /// Evict stale stamps and decide whether to stall before emitting at `now`
    pub fn check(&mut self, now: Duration) -> Throttle {
        let window = Duration::from_millis(self.cfg.window_ms);
        while let Some(&oldest) = self.stamps.front() {
            if now.saturating_sub(oldest) > window {
                self.stamps.pop_front();
            } else {
                break;
            }
        }

        if self.stamps.len() < 2 {
            return Throttle::None;
        }

        let spike_window = Duration::from_millis(self.cfg.spike_window_ms);
        let recent = self
            .stamps
            .iter()
            .filter(|&&t| now.saturating_sub(t) <= spike_window)
            .count();
        if recent >= self.cfg.spike_events {
            self.throttled += 1;
            tracing::debug!(recent, "rate spike throttle");
            return Throttle::Spike(Duration::from_millis(self.cfg.spike_delay_ms));
        }

        // a zero span has no defined average; skip rather than divide by zero
        let span = now.saturating_sub(self.stamps[0]).as_secs_f64();
        if span > 0.0 {
            let average = self.stamps.len() as f64 / span;
            if average > self.cfg.sustained_rate {
                self.throttled += 1;
                tracing::debug!(average, "sustained rate throttle");
                return Throttle::Sustained(Duration::from_millis(self.cfg.sustained_delay_ms));
            }
        }

        Throttle::None
    }

    pub fn throttled(&self) -> u64 {
        self.throttled
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use assert_matches::assert_matches;

    fn limiter() -> RateLimiter {
        RateLimiter::new(EngineConfig::default().rate_limit)
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn sixteen_events_in_one_second_force_spike_delay() {
        let mut rl = limiter();
        // 16 events spaced 60ms apart: 0..900ms
        for i in 0..16 {
            rl.record(ms(10_000 + i * 60));
        }
        let out = rl.check(ms(10_950));
        assert_eq!(out, Throttle::Spike(ms(80)));
        assert!(!out.delay().is_zero());
        assert_eq!(rl.throttled(), 1);
    }

    #[test]
    fn slow_history_is_not_throttled() {
        let mut rl = limiter();
        // 5 events per second for 4 seconds
        for i in 0..20 {
            rl.record(ms(i * 200));
        }
        let out = rl.check(ms(4_000));
        assert_eq!(out, Throttle::None);
        assert!(out.delay().is_zero());
    }

    #[test]
    fn sustained_average_above_ceiling() {
        let mut rl = limiter();
        // 13 events per second for ~4.6 seconds, never 16 inside one second
        for i in 0..60 {
            rl.record(ms(i * 77));
        }
        assert_matches!(rl.check(ms(60 * 77)), Throttle::Sustained(d) if d == ms(50));
    }

    #[test]
    fn stale_stamps_are_evicted() {
        let mut rl = limiter();
        for i in 0..16 {
            rl.record(ms(i * 10));
        }
        assert_eq!(rl.check(ms(20_000)), Throttle::None);
        assert!(rl.is_empty());
    }

    #[test]
    fn single_stamp_or_zero_span_is_ignored() {
        let mut rl = limiter();
        rl.record(ms(100));
        assert_eq!(rl.check(ms(100)), Throttle::None);
        rl.record(ms(100));
        // two stamps, zero span, below spike threshold
        assert_eq!(rl.check(ms(100)), Throttle::None);
        assert_eq!(rl.len(), 2);
    }
}
