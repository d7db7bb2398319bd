use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenomeError {
    #[error("Add node {target}: input shape mismatch, expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        target: usize,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Connecting {from} -> {to} would create a cycle")]
    CycleDetected { from: usize, to: usize },

    #[error("Node index {0} out of range")]
    UnknownNode(usize),

    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<config::ConfigError> for GenomeError {
    fn from(err: config::ConfigError) -> Self {
        GenomeError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GenomeError>;
