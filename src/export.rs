use crate::error::Result;
use crate::session::SessionLog;
use crate::util::rate_of;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
struct SessionRow {
    #[serde(rename = "Click_Number")]
    click_number: usize,
    #[serde(rename = "Delay_MS")]
    delay_ms: String,
    #[serde(rename = "CPS")]
    rate: String,
    #[serde(rename = "Timestamp")]
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct TrainingRow<'a> {
    #[serde(rename = "Click_Number")]
    click_number: usize,
    #[serde(rename = "Delay_MS")]
    delay_ms: String,
    #[serde(rename = "CPS")]
    rate: String,
    #[serde(rename = "Training_Type")]
    training_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct DelayRow {
    #[serde(rename = "Delay_MS")]
    delay_ms: f64,
}

fn two_decimals(v: f64) -> String {
    format!("{v:.2}")
}

fn rate_cell(interval_ms: f64) -> String {
    two_decimals(rate_of(interval_ms).unwrap_or(0.0))
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Write one row per recorded interval. Returns the number of rows.
pub fn write_session_csv<P: AsRef<Path>>(path: P, log: &SessionLog) -> Result<usize> {
    let path = path.as_ref();
    create_parent(path)?;
    let mut w = csv::Writer::from_path(path)?;
    let origin = log.started_wall();

    for r in log.intervals() {
        let timestamp = chrono::Duration::from_std(r.offset)
            .ok()
            .and_then(|d| origin.checked_add_signed(d))
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        w.serialize(SessionRow {
            click_number: r.index,
            delay_ms: two_decimals(r.interval_ms),
            rate: rate_cell(r.interval_ms),
            timestamp,
        })?;
    }
    w.flush()?;

    tracing::info!(path = %path.display(), rows = log.len(), "session exported");
    Ok(log.len())
}

/// Write a human training series with its training label
pub fn write_training_csv<P: AsRef<Path>>(
    path: P,
    delays: &[f64],
    training_type: &str,
) -> Result<usize> {
    let path = path.as_ref();
    create_parent(path)?;
    let mut w = csv::Writer::from_path(path)?;
    for (i, &d) in delays.iter().enumerate() {
        w.serialize(TrainingRow {
            click_number: i + 1,
            delay_ms: two_decimals(d),
            rate: rate_cell(d),
            training_type,
        })?;
    }
    w.flush()?;

    tracing::info!(path = %path.display(), rows = delays.len(), "training exported");
    Ok(delays.len())
}

/// Read the `Delay_MS` column of a CSV written by either exporter
pub fn read_delays<P: AsRef<Path>>(path: P) -> Result<Vec<f64>> {
    let mut r = csv::Reader::from_path(path.as_ref())?;
    let delays = r
        .deserialize::<DelayRow>()
        .map(|row| row.map(|row| row.delay_ms))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    tracing::debug!(path = %path.as_ref().display(), rows = delays.len(), "delays imported");
    Ok(delays)
}

/// `dir/<prefix>_YYYYmmdd_HHMMSS.csv`
pub fn timestamped_path(dir: &Path, prefix: &str, at: DateTime<Local>) -> PathBuf {
    dir.join(format!("{prefix}_{}.csv", at.format("%Y%m%d_%H%M%S")))
}
