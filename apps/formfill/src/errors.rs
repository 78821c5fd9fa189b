use thiserror::Error;

use crate::docx::DocxError;

/// Errors that cross the pipeline boundary.
///
/// Inference failures are not represented here: every external call degrades
/// to "no data" inside the pipeline. What remains is structurally bad input
/// and output serialization.
#[derive(Debug, Error)]
pub enum FillError {
    #[error("Invalid document: {0}")]
    InvalidDocument(#[source] DocxError),

    #[error("Invalid photo: {0}")]
    InvalidPhoto(String),

    #[error("Failed to write document: {0}")]
    Output(#[source] DocxError),
}

impl FillError {
    /// True when the caller supplied input the core cannot work with, as
    /// opposed to a failure while producing output.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, FillError::InvalidDocument(_) | FillError::InvalidPhoto(_))
    }
}
