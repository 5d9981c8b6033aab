use thiserror::Error;

/// Errors raised before any numerical work happens.
///
/// Numerical trouble during evaluation or integration is never reported
/// through this type: it shows up as NaN/Inf in the affected outputs so that
/// one bad element does not abort a batch.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TidalError {
    /// Invalid parameters, shapes, units or settings at construction time.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Inputs of the wrong shape or rank at a call site.
    #[error("usage error: {0}")]
    Usage(String),
}

impl TidalError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, TidalError>;

#[cfg(test)]
pub(crate) fn assert_err_contains<T: std::fmt::Debug>(result: Result<T>, needle: &str) {
    let err = result.expect_err("expected error");
    let message = format!("{err}");
    assert!(
        message.contains(needle),
        "expected error to contain \"{needle}\", got \"{message}\""
    );
}
