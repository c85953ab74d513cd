use thiserror::Error;

/// Failures of one refresh cycle, from fetch to aggregation.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fetch failed: {0}")]
    FetchFailure(String),
    #[error("malformed source {source_name}: {reason}")]
    MalformedSource { source_name: String, reason: String },
    #[error("unparseable timestamp {value:?} in {source_name}")]
    UnparseableTimestamp { source_name: String, value: String },
    #[error("source {0} contains no readings")]
    EmptySeries(String),
    #[error("I/O error on {path}: {error}")]
    Io {
        path: String,
        #[source]
        error: std::io::Error,
    },
}

impl PipelineError {
    pub fn malformed(source_name: &str, reason: impl Into<String>) -> Self {
        Self::MalformedSource {
            source_name: source_name.to_string(),
            reason: reason.into(),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
