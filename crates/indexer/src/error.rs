use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Chunker error: {0}")]
    ChunkerError(#[from] review_code_chunker::ChunkerError),

    #[error("Invalid glob `{glob}`: {source}")]
    InvalidPattern {
        glob: String,
        #[source]
        source: globset::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid project path: {0}")]
    InvalidPath(String),

    /// Storage collaborator rejected a batch; fatal for the run
    #[error("Sink error: {0:#}")]
    Sink(anyhow::Error),
}
