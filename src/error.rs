use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed xml: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("failed to parse {0}")]
    Parse(String),
    #[error("failed to serialize xml: {0}")]
    Serialize(#[from] quick_xml::SeError),
    #[error("malformed person attribute json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not open file at {path:?}: {source}")]
    OpenFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{0}")]
    InvalidInput(String),
}
