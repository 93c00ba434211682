/// Instantaneous rate sampled after an emission, for display
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RatePoint {
    /// seconds since the session started
    pub t: f64,
    /// events per second
    pub rate: f64,
}

impl RatePoint {
    pub fn new(t: f64, rate: f64) -> Self {
        Self { t, rate }
    }
}
