use thiserror::Error;

pub type CaskResult<T> = Result<T, CaskError>;

/// Error taxonomy for the sealed-envelope subsystem.
///
/// `BufferTooSmall` is the only variant a caller is expected to act on
/// programmatically (reallocate with the reported capacity and retry); every
/// other variant is final for the call that produced it.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CaskError {
    /// Malformed or empty input, unsupported algorithm id, mismatched key size.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The output buffer cannot hold the result; `required` is exact.
    #[error("output buffer too small: {required} bytes required")]
    BufferTooSmall { required: usize },

    /// Authentication tag or length mismatch. No plaintext was released.
    #[error("data corrupt: {0}")]
    DataCorrupt(String),

    /// A recognized frame asking for something this build cannot do.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Underlying primitive failure (derivation, AEAD, RNG).
    #[error("crypto engine failure: {0}")]
    Fail(String),
}

impl CaskError {
    /// Exact capacity to retry with, if this error is recoverable.
    pub fn required_capacity(&self) -> Option<usize> {
        match self {
            CaskError::BufferTooSmall { required } => Some(*required),
            _ => None,
        }
    }
}
