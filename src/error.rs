use thiserror::Error;

pub type MergeResult<T> = Result<T, MergeError>;

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Import error: {0}")]
    Import(String),

    #[error("Missing header: {table} has no header at row {}", .row + 1)]
    MissingHeader { table: String, row: usize },

    #[error("Export error: {0}")]
    Export(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),
}
