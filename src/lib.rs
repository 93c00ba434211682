// Library surface shared by the binary and the integration tests.
pub mod app_dirs;
pub mod assess;
pub mod clock;
pub mod compare;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod feedback;
pub mod modulator;
pub mod outlier;
pub mod pattern;
pub mod rate_limit;
pub mod runtime;
pub mod sampler;
pub mod session;
pub mod stats;
pub mod technique;
pub mod time_series;
pub mod tracker;
pub mod util;

pub use assess::{assess, Assessment, ThresholdsProfile, Verdict};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{EngineConfig, TechniqueSet, VarianceMode};
pub use engine::{Actuator, Emission, Engine};
pub use error::{CadenceError, ConfigError, Result};
pub use session::SessionHandle;
pub use stats::AggregatedStats;
