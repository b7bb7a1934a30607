//! Fatal error types for the firm resolution core.
//!
//! Row-level problems (missing names, names that standardize to nothing) are
//! never errors; they are counted and routed to a null firm. Everything here
//! aborts a run, because a partially wrong partition is worse than none.

use thiserror::Error;

use crate::models::core::NameId;

#[derive(Debug, Error)]
pub enum ResolveError {
    /// The distinct weak-name set no longer fits the configured memory model.
    #[error("capacity exceeded: {unique_names} unique names seen, limit is {limit}")]
    CapacityExceeded { limit: usize, unique_names: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("name id {name_id} inserted twice during {stage}")]
    DuplicateNameId { name_id: NameId, stage: &'static str },

    #[error("name id {name_id} is outside the registered universe during {stage}")]
    UnknownNameId { name_id: NameId, stage: &'static str },

    #[error("firm base offset {base_offset} collides with name id {max_name_id}")]
    OffsetCollision { base_offset: u64, max_name_id: u64 },

    #[error("partition mismatch: union-find produced {union_find} components, graph traversal produced {graph}")]
    InconsistentPartition { union_find: usize, graph: usize },

    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),
}

impl ResolveError {
    pub fn invalid_config(msg: impl std::fmt::Display) -> Self {
        Self::InvalidConfig(msg.to_string())
    }

    /// Structural errors point at corrupted internal state rather than bad input.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ResolveError::DuplicateNameId { .. }
                | ResolveError::UnknownNameId { .. }
                | ResolveError::InconsistentPartition { .. }
        )
    }
}
