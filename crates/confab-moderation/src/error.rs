use thiserror::Error;

/// Errors produced while asking the classifier for a verdict.
#[derive(Error, Debug)]
pub enum ModerationError {
    /// Transport-level failure reaching the classification endpoint.
    #[error("Moderation request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a shape we cannot read a label from.
    #[error("Malformed moderation response: {0}")]
    BadResponse(String),
}
