//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use thiserror::Error;
use uuid::Uuid;

use super::ApplicationStatus;

/// Failure kinds reported by the assignment, lifecycle and registration engines.
///
/// Every variant is recovered at the boundary that detects it and reported
/// to the caller as a structured failure; none of them crash the process.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// A referenced record does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Attempted transition out of a terminal application state
    #[error("Invalid transition: application is {from}, cannot become {to}")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },

    /// Room has no free slot left
    #[error("Room {room_id} is at capacity ({capacity})")]
    CapacityExceeded { room_id: Uuid, capacity: u32 },

    /// Student already holds a room, or already occupies this one
    #[error("Student {student_id} is already assigned to a room")]
    AlreadyAssigned { student_id: Uuid },

    /// Applicant already holds a room at approval time
    #[error("Student {student_id} is already assigned to a room")]
    StudentAlreadyAssigned { student_id: String },

    /// Student is not linked to the room on either side
    #[error("Student {student_id} is not assigned to room {room_id}")]
    NotAssigned { room_id: Uuid, student_id: Uuid },

    /// Another pending application exists for the same student id
    #[error("Student {student_id} already has a pending application")]
    DuplicatePendingApplication { student_id: String },

    /// Target room filled up between submission and approval
    #[error("Room {room_id} is no longer available")]
    RoomNoLongerAvailable { room_id: Uuid },

    /// Room still has occupants and cannot be removed
    #[error("Room {room_id} still has {occupants} occupant(s)")]
    RoomOccupied { room_id: Uuid, occupants: usize },

    /// Application code unknown or not usable with this email
    #[error("Invalid application code")]
    InvalidCode,

    /// Application code was already used to register an account
    #[error("Application code {code} has already been used")]
    CodeAlreadyConsumed { code: String },

    /// An account already exists for this email
    #[error("An account already exists for {email}")]
    EmailAlreadyRegistered { email: String },

    /// Unique key collision on a record write
    #[error("Duplicate value for {key}")]
    DuplicateRecord { key: String },

    /// Caller may not perform this operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Malformed input rejected at the boundary
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Room and student references disagreed. Engines repair this
    /// themselves; the variant is surfaced only by reconciliation reports.
    #[error("Consistency fault between room {room_id} and student {student_id}: {detail}")]
    ConsistencyFault {
        room_id: Uuid,
        student_id: Uuid,
        detail: String,
    },
}

impl DomainError {
    /// Create a not found error
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Create an invalid request error
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Stable machine-readable kind, independent of the transport
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::AlreadyAssigned { .. } | Self::StudentAlreadyAssigned { .. } => {
                "already_assigned"
            }
            Self::NotAssigned { .. } => "not_assigned",
            Self::DuplicatePendingApplication { .. } => "duplicate_pending_application",
            Self::RoomNoLongerAvailable { .. } => "room_no_longer_available",
            Self::RoomOccupied { .. } => "room_occupied",
            Self::InvalidCode => "invalid_code",
            Self::CodeAlreadyConsumed { .. } => "code_already_consumed",
            Self::EmailAlreadyRegistered { .. } => "email_already_registered",
            Self::DuplicateRecord { .. } => "duplicate_record",
            Self::Forbidden(_) => "forbidden",
            Self::InvalidRequest(_) => "invalid_request",
            Self::ConsistencyFault { .. } => "consistency_fault",
        }
    }

    /// Check if this is a conflict with current state (retrying unchanged won't help)
    pub fn is_conflict_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidTransition { .. }
                | Self::CapacityExceeded { .. }
                | Self::AlreadyAssigned { .. }
                | Self::StudentAlreadyAssigned { .. }
                | Self::DuplicatePendingApplication { .. }
                | Self::RoomNoLongerAvailable { .. }
                | Self::RoomOccupied { .. }
                | Self::CodeAlreadyConsumed { .. }
                | Self::EmailAlreadyRegistered { .. }
                | Self::DuplicateRecord { .. }
        )
    }
}
