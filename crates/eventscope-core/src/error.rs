use serde::Serialize;
use thiserror::Error;

/// Failure conditions of the aggregation engine.
///
/// "No data" is never an error: an empty window yields empty or zeroed
/// results. Failures are either rejected input or an unreachable store, and a
/// failing call never returns partial results.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("event store unavailable: {0}")]
    StoreUnavailable(#[source] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    StoreUnavailable,
}

/// Structured error description handed to callers: kind plus human message.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDescription {
    pub kind: ErrorKind,
    pub message: String,
}

impl AnalyticsError {
    pub fn invalid(message: impl Into<String>) -> Self {
        AnalyticsError::InvalidArgument(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalyticsError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            AnalyticsError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
        }
    }

    pub fn describe(&self) -> ErrorDescription {
        ErrorDescription {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_serializes_kind_in_snake_case() {
        let err = AnalyticsError::invalid("limit must not be negative");
        let json = serde_json::to_value(err.describe()).unwrap();
        assert_eq!(json["kind"], "invalid_argument");
        assert_eq!(json["message"], "invalid argument: limit must not be negative");
    }

    #[test]
    fn store_failure_keeps_its_source() {
        let err = AnalyticsError::StoreUnavailable(anyhow::anyhow!("database is locked"));
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
        assert!(err.to_string().contains("database is locked"));
    }
}
