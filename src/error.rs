// Error taxonomy shared by the encoders, the partitioner and the data-access layer
use chrono::{DateTime, Utc};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DashboardError>;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("power transform requires strictly positive values, got {value}")]
    Domain { value: f64 },

    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("point budget must be at least 1")]
    InvalidBudget,

    #[error("missing credential: environment variable {0} is not set")]
    MissingCredential(String),

    #[error("could not build cache key: {0}")]
    CacheKey(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("upstream fetch failed: {0:#}")]
    Upstream(#[from] anyhow::Error),
}

impl DashboardError {
    /// True for errors the caller could have avoided by validating input.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            DashboardError::Domain { .. }
                | DashboardError::InvalidRange { .. }
                | DashboardError::InvalidBudget
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_keeps_context_chain() {
        let err: DashboardError = anyhow::anyhow!("connection reset")
            .context("Failed to send request to Db2")
            .into();

        assert_eq!(
            err.to_string(),
            "upstream fetch failed: Failed to send request to Db2: connection reset"
        );
        assert!(!err.is_caller_error());
    }

    #[test]
    fn test_caller_errors() {
        assert!(DashboardError::Domain { value: -1.0 }.is_caller_error());
        assert!(DashboardError::InvalidBudget.is_caller_error());
        assert!(!DashboardError::NotFound("parcel 7".to_string()).is_caller_error());
    }
}
