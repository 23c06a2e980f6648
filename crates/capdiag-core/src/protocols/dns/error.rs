use thiserror::Error;

/// Errors returned by DNS parsing and reading.
///
/// Note: this error type lives in an internal module; the example is
/// illustrative and not compiled as a public doctest.
///
/// # Examples
/// ```text
/// use capdiag_core::protocols::dns::error::DnsError;
///
/// let err = DnsError::PointerLoop;
/// assert!(err.to_string().contains("pointer"));
/// ```
#[derive(Debug, Error)]
pub enum DnsError {
    #[error("payload too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error("name exceeds wire length limit")]
    NameTooLong,
    #[error("compression pointer loop")]
    PointerLoop,
    #[error("truncated resource record")]
    TruncatedRecord,
}
