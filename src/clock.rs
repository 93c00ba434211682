use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Time as a `Duration` since the clock's own origin. The engine reads and
/// sleeps through it, so a `ManualClock` makes a session deterministic.
pub trait Clock: Send + Sync + 'static {
    /// Time elapsed since the clock's origin
    fn now(&self) -> Duration;

    /// Block (or advance virtual time) for `d`
    fn sleep(&self, d: Duration);
}

/// Wall clock backed by [`Instant`] and `thread::sleep`
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, d: Duration) {
        if !d.is_zero() {
            std::thread::sleep(d);
        }
    }
}

/// Virtual clock; `sleep` advances it instantly. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    micros: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, d: Duration) {
        self.micros
            .fetch_add(d.as_micros() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, t: Duration) {
        self.micros.store(t.as_micros() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_micros(self.micros.load(Ordering::SeqCst))
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}

pub type SharedClock = Arc<dyn Clock>;

/// Milliseconds (fractional) to a microsecond-resolution duration.
/// Negative and non-finite inputs map to zero.
pub fn from_millis_f64(ms: f64) -> Duration {
    if ms.is_finite() && ms > 0.0 {
        Duration::from_micros((ms * 1000.0).round() as u64)
    } else {
        Duration::ZERO
    }
}

pub fn as_millis_f64(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_sleep_advances_time() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), Duration::ZERO);
        clock.sleep(Duration::from_millis(250));
        assert_eq!(clock.now(), Duration::from_millis(250));
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let a = ManualClock::new();
        let b = a.clone();
        a.advance(Duration::from_secs(3));
        assert_eq!(b.now(), Duration::from_secs(3));
        b.set(Duration::from_millis(10));
        assert_eq!(a.now(), Duration::from_millis(10));
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        clock.sleep(Duration::from_millis(1));
        assert!(clock.now() > a);
    }

    #[test]
    fn millis_conversions() {
        assert_eq!(from_millis_f64(100.0), Duration::from_millis(100));
        assert_eq!(from_millis_f64(0.5), Duration::from_micros(500));
        assert_eq!(from_millis_f64(-3.0), Duration::ZERO);
        assert_eq!(from_millis_f64(f64::NAN), Duration::ZERO);
        assert!((as_millis_f64(Duration::from_micros(70_000)) - 70.0).abs() < 1e-9);
    }
}
