use crate::clock::SharedClock;
use crate::config::MinSamples;
use crate::error::Result;
use crate::outlier::OutlierKind;
use crate::stats::{summarize, AggregatedStats, LiveFigures, SessionDurations};
use crate::technique::Technique;
use crate::time_series::RatePoint;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

/// Number of rate points kept for display
pub const RATE_HISTORY_LEN: usize = 60;

/// Which path of the pipeline produced an interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "path", content = "detail", rename_all = "snake_case")]
pub enum EmissionKind {
    Technique(Technique),
    Burst,
    Pause,
    Outlier(OutlierKind),
}

impl EmissionKind {
    pub fn is_outlier(&self) -> bool {
        matches!(self, EmissionKind::Outlier(_))
    }
}

impl std::fmt::Display for EmissionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmissionKind::Technique(t) => write!(f, "{t}"),
            EmissionKind::Burst => f.write_str("burst"),
            EmissionKind::Pause => f.write_str("pause"),
            EmissionKind::Outlier(k) => write!(f, "{k}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecordedInterval {
    /// 1-based position in the session
    pub index: usize,
    pub interval_ms: f64,
    /// engine-clock time of the click
    pub offset: Duration,
    pub kind: EmissionKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCounters {
    pub bursts: u64,
    pub pauses: u64,
    pub outliers: u64,
    pub pattern_breaks: u64,
    pub variance_adjustments: u64,
    pub throttles: u64,
}

/// Bounded, insertion-ordered window of the most recent intervals
#[derive(Debug, Clone)]
pub struct HistoryWindow {
    values: VecDeque<f64>,
    capacity: usize,
}

impl HistoryWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: f64) {
        self.values.push_back(value);
        while self.values.len() > self.capacity {
            self.values.pop_front();
        }
    }

    /// Oldest-first contiguous view
    pub fn values(&mut self) -> &[f64] {
        self.values.make_contiguous()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Append-only record of everything emitted in a session
#[derive(Debug, Clone)]
pub struct SessionLog {
    intervals: Vec<RecordedInterval>,
    counters: EventCounters,
    rates: VecDeque<RatePoint>,
    live: LiveFigures,
    started_wall: DateTime<Local>,
}

impl SessionLog {
    pub fn new(started_wall: DateTime<Local>) -> Self {
        Self {
            intervals: Vec::new(),
            counters: EventCounters::default(),
            rates: VecDeque::with_capacity(RATE_HISTORY_LEN),
            live: LiveFigures::default(),
            started_wall,
        }
    }

    /// A log made of plain intervals, spaced back to back from time zero
    pub fn from_intervals(intervals: &[f64]) -> Self {
        let mut log = Self::new(Local::now());
        let mut offset = Duration::ZERO;
        for &ms in intervals {
            log.append(ms, offset, EmissionKind::Technique(Technique::Steady));
            offset += crate::clock::from_millis_f64(ms);
        }
        log
    }

    pub fn append(&mut self, interval_ms: f64, offset: Duration, kind: EmissionKind) {
        let index = self.intervals.len() + 1;
        self.intervals.push(RecordedInterval {
            index,
            interval_ms,
            offset,
            kind,
        });
    }

    pub fn publish(&mut self, counters: EventCounters, live: LiveFigures) {
        self.counters = counters;
        self.live = live;
    }

    pub fn push_rate(&mut self, point: RatePoint) {
        self.rates.push_back(point);
        while self.rates.len() > RATE_HISTORY_LEN {
            self.rates.pop_front();
        }
    }

    pub fn intervals(&self) -> &[RecordedInterval] {
        &self.intervals
    }

    pub fn values(&self) -> Vec<f64> {
        self.intervals.iter().map(|r| r.interval_ms).collect()
    }

    pub fn counters(&self) -> EventCounters {
        self.counters
    }

    pub fn rates(&self) -> impl Iterator<Item = &RatePoint> {
        self.rates.iter()
    }

    pub fn live(&self) -> LiveFigures {
        self.live
    }

    pub fn started_wall(&self) -> DateTime<Local> {
        self.started_wall
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}

/// Active-duration accounting across several start/stop cycles
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveSpans {
    current: Option<Duration>,
    accumulated: Duration,
}

impl ActiveSpans {
    /// Returns false if a span was already running
    pub fn start(&mut self, now: Duration) -> bool {
        if self.current.is_some() {
            return false;
        }
        self.current = Some(now);
        true
    }

    /// Returns false if no span was running
    pub fn stop(&mut self, now: Duration) -> bool {
        match self.current.take() {
            Some(started) => {
                self.accumulated += now.saturating_sub(started);
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    /// Accumulated active time, including a running span
    pub fn active_time(&self, now: Duration) -> Duration {
        self.accumulated
            + self
                .current
                .map(|started| now.saturating_sub(started))
                .unwrap_or_default()
    }
}

/// Commands queued for the engine by lifecycle callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Started,
    Stopped,
}

/// Cloneable, thread-safe view of one engine's session
#[derive(Clone)]
pub struct SessionHandle {
    log: Arc<RwLock<SessionLog>>,
    spans: Arc<Mutex<ActiveSpans>>,
    clock: SharedClock,
    origin: Duration,
    commands: Sender<Lifecycle>,
    min_samples: MinSamples,
}

impl SessionHandle {
    pub(crate) fn new(
        clock: SharedClock,
        commands: Sender<Lifecycle>,
        min_samples: MinSamples,
    ) -> Self {
        let origin = clock.now();
        Self {
            log: Arc::new(RwLock::new(SessionLog::new(Local::now()))),
            spans: Arc::new(Mutex::new(ActiveSpans::default())),
            clock,
            origin,
            commands,
            min_samples,
        }
    }

    /// A handle over an already recorded log with no engine behind it.
    /// Span hooks still account time; their commands go nowhere.
    pub fn replay(clock: SharedClock, log: SessionLog, min_samples: MinSamples) -> Self {
        let (commands, _) = mpsc::channel();
        let origin = clock.now();
        Self {
            log: Arc::new(RwLock::new(log)),
            spans: Arc::new(Mutex::new(ActiveSpans::default())),
            clock,
            origin,
            commands,
            min_samples,
        }
    }

    /// Begin an active span. Idempotent.
    pub fn start_active_span(&self) {
        let now = self.clock.now();
        let started = self
            .spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .start(now);
        if started {
            tracing::info!(at_ms = now.as_millis() as u64, "active span started");
            // the engine may already be gone; spans are still accounted
            let _ = self.commands.send(Lifecycle::Started);
        }
    }

    /// End the active span, accumulating its duration. Idempotent.
    pub fn stop_active_span(&self) {
        let now = self.clock.now();
        let stopped = self
            .spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stop(now);
        if stopped {
            tracing::info!(at_ms = now.as_millis() as u64, "active span stopped");
            let _ = self.commands.send(Lifecycle::Stopped);
        }
    }

    pub fn is_active(&self) -> bool {
        self.spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_active()
    }

    pub fn durations(&self) -> SessionDurations {
        let now = self.clock.now();
        let active = self
            .spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .active_time(now);
        SessionDurations {
            session: now.saturating_sub(self.origin),
            active,
        }
    }

    /// Copy of the log as it is right now
    pub fn snapshot_log(&self) -> SessionLog {
        self.log
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Aggregated statistics, `None` below the snapshot minimum
    pub fn snapshot_stats(&self) -> Option<AggregatedStats> {
        let log = self.snapshot_log();
        summarize(
            &log.values(),
            log.counters(),
            self.durations(),
            log.live(),
            &self.min_samples,
        )
    }

    pub fn len(&self) -> usize {
        self.log.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write every recorded interval as CSV; engine state is untouched on failure
    pub fn export_csv<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let log = self.snapshot_log();
        crate::export::write_session_csv(path, &log)
    }

    pub(crate) fn with_log<T>(&self, f: impl FnOnce(&mut SessionLog) -> T) -> T {
        let mut guard = self.log.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub(crate) fn origin(&self) -> Duration {
        self.origin
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("len", &self.len())
            .field("active", &self.is_active())
            .finish()
    }
}
