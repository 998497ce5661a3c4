//! Error types shared by the diagnosis pipeline.

use std::time::Duration;
use thiserror::Error;

/// Batch-level failures. All of these are terminal for the submitted batch
/// and are surfaced to the caller as distinct outcomes.
#[derive(Debug, Error)]
pub enum DiagnosisError {
    /// No classifier is loaded; every classification request is refused.
    #[error("classifier model is not loaded")]
    ModelUnavailable,

    /// Zero usable images were submitted, or more than the allowed maximum.
    #[error("invalid batch size: {submitted} image(s) submitted, allowed 1..={max}")]
    InvalidBatchSize { submitted: usize, max: usize },

    /// Every image in the batch failed processing.
    #[error("none of the {submitted} submitted image(s) could be processed")]
    EmptyResultSet { submitted: usize },

    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Failure while processing one image. Recovered at the runner boundary:
/// the image is logged and excluded, the batch continues.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("upload has no file name")]
    Unnamed,

    #[error("failed to read upload: {0}")]
    Unreadable(String),

    #[error("failed to store image: {0}")]
    Store(#[from] std::io::Error),

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("classifier output rejected: {0}")]
    InvalidOutput(String),

    #[error("processing exceeded {0:?}")]
    Timeout(Duration),

    #[error("image worker failed: {0}")]
    Worker(String),
}

/// Rejections produced by user administration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UserError {
    #[error("only administrators may manage users")]
    Forbidden,

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("username '{0}' already exists")]
    UsernameTaken(String),

    #[error("user {0} not found")]
    NotFound(u64),

    #[error("you cannot delete your own account")]
    SelfDeletion,

    #[error("the last administrator cannot be removed or demoted")]
    LastAdministrator,
}

pub type Result<T, E = DiagnosisError> = std::result::Result<T, E>;
