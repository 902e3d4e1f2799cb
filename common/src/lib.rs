pub mod config;
pub mod history;
pub mod predictor;
pub mod state;
pub mod telemetry;
pub mod types;

pub use config::StationConfig;
pub use history::HistoryStore;
pub use predictor::{ComfortPredictor, LearningStats};
pub use state::StationState;
pub use telemetry::TelemetrySample;
pub use types::{ComfortLevel, SignalQuality};
