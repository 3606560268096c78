use serde::Serialize;
use uuid::Uuid;

use crate::entities::driver_instruction::InstructionStatus;

/// Unified error type for the ledger and alerting engine.
///
/// Errors are scoped to the key they occurred on; nothing here is retried
/// automatically and a failure on one (customer, equipment) pair never blocks
/// processing of another.
#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        sea_orm::error::DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The same movement tuple was recorded within the idempotency window.
    /// Safe to retry from the caller's perspective; no new state was created.
    #[error("Duplicate movement: identical tuple recorded {seconds_ago}s ago as {existing_id}")]
    DuplicateMovement {
        existing_id: Uuid,
        seconds_ago: i64,
    },

    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),

    /// A non-terminal instruction already exists for the key.
    #[error("Duplicate instruction: {existing_id} is still live in state {status}")]
    DuplicateInstruction {
        existing_id: Uuid,
        status: InstructionStatus,
    },

    /// A state-machine transition was attempted from an invalid source state.
    /// Both states are named so the dispatch UI can re-fetch and recover.
    #[error("Invalid transition for instruction {instruction_id}: {attempted} is not legal from {from}")]
    InvalidTransition {
        instruction_id: Uuid,
        from: InstructionStatus,
        attempted: &'static str,
    },

    /// The stored balance could not be reproduced from movement history.
    /// Fatal for this key only; recomputation refuses to guess.
    #[error("Inconsistent balance for customer {customer_id} / {equipment_type}: {detail}")]
    InconsistentBalance {
        customer_id: Uuid,
        equipment_type: String,
        detail: String,
    },

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Whether the caller can safely retry the operation unchanged.
    /// Only the idempotency conflict qualifies; everything else needs an
    /// explicit decision first.
    pub fn is_retry_safe(&self) -> bool {
        matches!(self, ServiceError::DuplicateMovement { .. })
    }
}

/// Alias kept for symmetry with service signatures.
pub type EngineResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_names_both_states() {
        let id = Uuid::new_v4();
        let err = ServiceError::InvalidTransition {
            instruction_id: id,
            from: InstructionStatus::Pending,
            attempted: "complete",
        };
        let msg = err.to_string();
        assert!(msg.contains("pending"));
        assert!(msg.contains("complete"));
        assert!(msg.contains(&id.to_string()));
    }

    #[test]
    fn errors_serialize_for_api_surfaces() {
        let err = ServiceError::InvalidThreshold("threshold must be non-negative".into());
        let json = serde_json::to_value(&err).expect("serialize");
        assert!(json.to_string().contains("InvalidThreshold"));
    }

    #[test]
    fn duplicate_movement_is_retry_safe() {
        let err = ServiceError::DuplicateMovement {
            existing_id: Uuid::new_v4(),
            seconds_ago: 12,
        };
        assert!(err.is_retry_safe());
        assert!(!ServiceError::NotFound("x".into()).is_retry_safe());
    }
}
