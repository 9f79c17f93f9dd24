// Typed domain errors
// Soft per-record failures degrade to fallback values; only these are fatal

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to parse file: no events could be extracted")]
    ParseFailure,
    #[error("too many invalid records: {percent:.1}% ({invalid}/{total})")]
    ValidationGate {
        invalid: usize,
        total: usize,
        percent: f64,
    },
}

impl NormalizeError {
    pub fn validation_gate(invalid: usize, total: usize) -> Self {
        let percent = if total == 0 {
            0.0
        } else {
            invalid as f64 / total as f64 * 100.0
        };
        NormalizeError::ValidationGate {
            invalid,
            total,
            percent,
        }
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("not enough events for anomaly detection: have {have}, need {need}")]
    InsufficientData { have: usize, need: usize },
    #[error("training dataset too small: have {have}, need {need}")]
    TrainingDataTooSmall { have: usize, need: usize },
}
