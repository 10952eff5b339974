//! Error types for the view engine.

use thiserror::Error;

use crate::tree::Anchor;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, ViewError>;

/// Coarse status code a surrounding RPC layer can translate into its own
/// status representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidArgument,
    PermissionDenied,
    FailedPrecondition,
    Aborted,
    Internal,
    Unavailable,
}

/// Errors that terminate an engine operation.
#[derive(Clone, Debug, Error)]
pub enum ViewError {
    // ═══════════════════════════════════════════════════════════════════════════════
    // CALLER CONTRACT
    // ═══════════════════════════════════════════════════════════════════════════════

    #[error("no transaction plan supplied")]
    PlanMissing,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // ═══════════════════════════════════════════════════════════════════════════════
    // AUTHORIZATION
    // ═══════════════════════════════════════════════════════════════════════════════

    #[error("security violation: {0}")]
    SecurityViolation(String),

    #[error("authorization data does not match plan: {0}")]
    AuthorizationMismatch(String),

    #[error("authorization rejected: {0}")]
    AuthorizationRejected(#[from] AuthorizationError),

    // ═══════════════════════════════════════════════════════════════════════════════
    // WITNESS & BUILD
    // ═══════════════════════════════════════════════════════════════════════════════

    #[error("stale witness: witnessed against anchor {witnessed}, tree is now at {current}")]
    WitnessStale { witnessed: Anchor, current: Anchor },

    #[error("build aborted: {0}")]
    BuildAborted(#[from] BuildError),

    // ═══════════════════════════════════════════════════════════════════════════════
    // COLLABORATORS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[error("local store error: {0}")]
    Store(#[from] StoreError),
}

impl ViewError {
    /// Status code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::PlanMissing | Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::SecurityViolation(_) | Self::AuthorizationRejected(_) => {
                ErrorCode::PermissionDenied
            }
            Self::AuthorizationMismatch(_) => ErrorCode::FailedPrecondition,
            Self::WitnessStale { .. } => ErrorCode::Aborted,
            Self::BuildAborted(_) => ErrorCode::Internal,
            Self::Store(_) => ErrorCode::Unavailable,
        }
    }

    /// Whether a caller may reasonably re-issue the same request.
    ///
    /// Only a stale witness qualifies: the caller re-requests against a fresh
    /// tree snapshot. The engine itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::WitnessStale { .. })
    }
}

/// The custody capability declined to produce authorization data.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("user declined to sign")]
    Declined,
    #[error("custody backend failed: {0}")]
    Backend(String),
}

/// Unrecoverable fault reported by the build capability.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("missing witness for note commitment {0}")]
    MissingWitness(String),
    #[error("witness path for {commitment} does not verify against anchor {anchor}")]
    InvalidWitness { commitment: String, anchor: String },
    #[error("action {index} could not be built: {reason}")]
    Action { index: usize, reason: String },
    #[error("{0}")]
    Internal(String),
}

/// Failure of the local indexed store.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("state commitment tree is full")]
    TreeFull,
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Failure of a single live chain query.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("live query timed out after {0} ms")]
    Timeout(u64),
    #[error("live query failed: {0}")]
    Transport(String),
}

/// Bech32m and denomination decoding failures.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("bech32 error: {0}")]
    Bech32(String),
    #[error("unexpected prefix: expected {expected}, found {found}")]
    Prefix { expected: &'static str, found: String },
    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("encoding failed: {0}")]
    Encoding(String),
}

impl From<bech32::DecodeError> for CodecError {
    fn from(e: bech32::DecodeError) -> Self {
        CodecError::Bech32(e.to_string())
    }
}
