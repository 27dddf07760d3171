pub mod confidence;
pub mod config;

pub use confidence::{
    ConfidenceAdvice, ConfidenceBreakdown, ConfidenceInputs, ConfidenceLevel, ConfidenceReport,
    ConfidenceScorer,
};
pub use config::ConfidenceWeights;
