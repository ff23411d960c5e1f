use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScoringError>;

#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("Invalid scoring configuration: {0}")]
    InvalidConfig(String),

    /// Cluster totals disagree with totals recomputed from the observations
    #[error("Conservation violated for {metric}: clusters sum to {clusters}, observations sum to {expected}")]
    ConservationViolation {
        metric: &'static str,
        clusters: f64,
        expected: f64,
    },

    #[error("Partition does not match the keyword index: {0}")]
    PartitionMismatch(String),
}

impl ScoringError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
