//! Error types for flashctl.

use thiserror::Error;

/// Errors raised while planning partitions or managing per-rank buffers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlashError {
    /// Construction parameters violate a precondition (zero world size,
    /// rank out of range, zero tables or probes).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A buffer size overflowed or its allocation could not be satisfied.
    #[error("resource exhaustion: cannot allocate {requested} elements for {buffer}")]
    ResourceExhaustion {
        buffer: &'static str,
        requested: usize,
    },

    /// Sparse aggregation buffers only exist on the coordinator rank.
    #[error("rank {rank} is not the coordinator; sparse buffers live on rank 0")]
    NotCoordinator { rank: usize },

    /// Ingestion input disagrees with the partition plan.
    #[error("length mismatch for {what}: expected {expected}, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl FlashError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub(crate) fn exhausted(buffer: &'static str, requested: usize) -> Self {
        Self::ResourceExhaustion { buffer, requested }
    }
}

pub type Result<T> = std::result::Result<T, FlashError>;
