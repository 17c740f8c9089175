use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BamError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("File not found: {}", path.display())]
    MissingFile { path: PathBuf },
    #[error("Bad signature: expected {expected:?}, found {found:?}")]
    BadSignature {
        expected: &'static str,
        found: String,
    },
    #[error("Bad version: expected \"V2  \", found {found:?}")]
    BadVersion { found: String },
    #[error("Truncated input reading {field} at offset {offset:#x}: need {needed} bytes, buffer holds {len}")]
    TruncatedInput {
        field: &'static str,
        offset: usize,
        needed: usize,
        len: usize,
    },
    #[error("Unsupported {field}: {value}")]
    UnsupportedFormat { field: &'static str, value: u64 },
    #[error("Codec error: {0}")]
    Codec(String),
    #[error("Destination page already exists: {}", path.display())]
    Collision { path: PathBuf },
    #[error("External tool {tool} failed with {status}: {stderr}")]
    ExternalToolFailure {
        tool: String,
        status: String,
        stderr: String,
    },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, BamError>;
