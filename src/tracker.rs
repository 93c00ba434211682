use crate::clock::{as_millis_f64, SharedClock};
use crate::config::MinSamples;
use crate::error::{CadenceError, Result};
use crate::session::EventCounters;
use crate::stats::{summarize, AggregatedStats, LiveFigures, SessionDurations};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Delays at or above this are breaks, not clicks
pub const MAX_HUMAN_DELAY_MS: f64 = 500.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingStats {
    pub training_type: String,
    pub total_clicks: u64,
    pub stats: AggregatedStats,
}

/// Records real clicks; gaps of half a second or more are breaks and dropped
pub struct HumanTracker {
    clock: SharedClock,
    min_samples: MinSamples,
    training_type: String,
    tracking: bool,
    started: Duration,
    last_click: Option<Duration>,
    total_clicks: u64,
    delays: Vec<f64>,
}

impl HumanTracker {
    pub fn new(clock: SharedClock, min_samples: MinSamples) -> Self {
        Self {
            clock,
            min_samples,
            training_type: String::from("normal"),
            tracking: false,
            started: Duration::ZERO,
            last_click: None,
            total_clicks: 0,
            delays: Vec::new(),
        }
    }

    /// Begin a fresh recording; previous data is discarded
    pub fn start(&mut self, training_type: &str) {
        self.training_type = training_type.to_string();
        self.tracking = true;
        self.started = self.clock.now();
        self.last_click = None;
        self.total_clicks = 0;
        self.delays.clear();
        tracing::info!(training_type, "training started");
    }

    pub fn stop(&mut self) {
        if self.tracking {
            self.tracking = false;
            tracing::info!(
                training_type = %self.training_type,
                delays = self.delays.len(),
                "training stopped"
            );
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    /// Register one real click; ignored while not tracking
    pub fn record_click(&mut self) {
        if !self.tracking {
            return;
        }
        let now = self.clock.now();
        self.total_clicks += 1;
        if let Some(last) = self.last_click {
            let delay = as_millis_f64(now.saturating_sub(last));
            if delay < MAX_HUMAN_DELAY_MS {
                self.delays.push(delay);
            }
        }
        self.last_click = Some(now);
    }

    pub fn delays(&self) -> &[f64] {
        &self.delays
    }

    pub fn training_type(&self) -> &str {
        &self.training_type
    }

    /// Statistics over the kept delays, `None` below the tracker minimum
    pub fn stats(&self) -> Option<TrainingStats> {
        let min = MinSamples {
            snapshot: self.min_samples.tracker,
            ..self.min_samples
        };
        let elapsed = self.clock.now().saturating_sub(self.started);
        let stats = summarize(
            &self.delays,
            EventCounters::default(),
            SessionDurations {
                session: elapsed,
                active: elapsed,
            },
            LiveFigures::default(),
            &min,
        )?;
        Some(TrainingStats {
            training_type: self.training_type.clone(),
            total_clicks: self.total_clicks,
            stats,
        })
    }

    pub fn export_csv<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        if self.delays.len() < self.min_samples.tracker {
            return Err(CadenceError::InsufficientData {
                what: "training export",
                needed: self.min_samples.tracker,
                have: self.delays.len(),
            });
        }
        crate::export::write_training_csv(path, &self.delays, &self.training_type)
    }
}
