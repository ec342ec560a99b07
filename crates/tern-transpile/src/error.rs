use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = TranspileError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum TranspileError {
    #[error("unsupported source extension: {}", .0.display())]
    UnsupportedExtension(PathBuf),

    #[error("syntax error in {}:\n{}", .file.display(), .errors.join("\n"))]
    Syntax { file: PathBuf, errors: Vec<String> },

    #[error("unsupported target '{target}': {message}")]
    Target { target: String, message: String },

    #[error("transform failed for {}:\n{}", .file.display(), .errors.join("\n"))]
    Transform { file: PathBuf, errors: Vec<String> },
}
