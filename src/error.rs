use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("line {line}: unparsable timestamp '{value}'")]
    UnparsableTimestamp { line: u64, value: String },

    #[error("read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing column '{0}' in metrics export")]
    MissingColumn(&'static str),

    #[error("line {line}: bad value '{value}' in column '{column}'")]
    BadValue {
        line: u64,
        column: &'static str,
        value: String,
    },
}
