use crate::analyzer::AnalyzerError;
use crate::store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from the train / recognize / validate operations.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
    #[error("{path}: analyzer returned {encodings} encodings for {locations} faces")]
    Misaligned {
        path: PathBuf,
        locations: usize,
        encodings: usize,
    },
}
