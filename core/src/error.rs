use crate::types::Dataset;
use thiserror::Error;

/// Fatal pipeline errors. A division by zero is never one of these;
/// it surfaces as `Rate::NoData` instead.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to fetch {dataset} from {url}: {message}")]
    Fetch { dataset: Dataset, url: String, message: String },

    #[error("Timed out after {timeout_ms}ms fetching {dataset} from {url}")]
    Timeout { dataset: Dataset, url: String, timeout_ms: u64 },

    #[error("Fetching {dataset} from {url} returned HTTP {status}")]
    HttpStatus { dataset: Dataset, url: String, status: u16 },

    #[error("Response for {dataset} exceeds {limit} bytes")]
    ResponseTooLarge { dataset: Dataset, limit: usize },

    #[error("Cannot parse {dataset}: {message}")]
    Parse { dataset: Dataset, message: String },

    #[error("Schema mismatch in {dataset}: expected columns [{expected}], found [{found}]")]
    SchemaMismatch { dataset: Dataset, expected: String, found: String },

    #[error("{dataset} has {found} selectable rows, expected at least {expected}")]
    InsufficientRows { dataset: Dataset, expected: usize, found: usize },

    #[error("Malformed value '{value}' in {dataset} column '{column}' at line {line}")]
    MalformedField { dataset: Dataset, line: u64, column: String, value: String },

    #[error("State '{name}' in {dataset} has no matching row in {other}")]
    UnmatchedKey { dataset: Dataset, other: Dataset, name: String },

    #[error("State '{name}' appears more than once in {dataset}")]
    DuplicateKey { dataset: Dataset, name: String },

    #[error("Invalid as-of-date '{value}' in {dataset}")]
    InvalidDate { dataset: Dataset, value: String },

    #[error("{dataset} has no rows to derive a report date from")]
    MissingDate { dataset: Dataset },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    /// The source that failed, when the error is attributable to one.
    pub fn dataset(&self) -> Option<Dataset> {
        match self {
            PipelineError::Fetch { dataset, .. }
            | PipelineError::Timeout { dataset, .. }
            | PipelineError::HttpStatus { dataset, .. }
            | PipelineError::ResponseTooLarge { dataset, .. }
            | PipelineError::Parse { dataset, .. }
            | PipelineError::SchemaMismatch { dataset, .. }
            | PipelineError::InsufficientRows { dataset, .. }
            | PipelineError::MalformedField { dataset, .. }
            | PipelineError::UnmatchedKey { dataset, .. }
            | PipelineError::DuplicateKey { dataset, .. }
            | PipelineError::InvalidDate { dataset, .. }
            | PipelineError::MissingDate { dataset } => Some(*dataset),
            PipelineError::Serialization(_) | PipelineError::Other(_) => None,
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
