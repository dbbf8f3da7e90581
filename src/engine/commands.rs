//! Command definitions
//!
//! Commands carry caller intent into the engines; results carry what the
//! engines hand back.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{ApplicantDetails, IdentityView, StudentSummary};

// =========================================================================
// Rooms and students
// =========================================================================

/// Command to create an empty room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomCommand {
    pub room_number: String,
    pub capacity: u32,
}

impl CreateRoomCommand {
    pub fn new(room_number: impl Into<String>, capacity: u32) -> Self {
        Self {
            room_number: room_number.into(),
            capacity,
        }
    }
}

/// Command to create a student record directly
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStudentCommand {
    pub student_id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub year_of_study: Option<u8>,
}

impl CreateStudentCommand {
    pub fn new(
        student_id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            name: name.into(),
            email: email.into(),
            phone: String::new(),
            program: None,
            year_of_study: None,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>, year_of_study: u8) -> Self {
        self.program = Some(program.into());
        self.year_of_study = Some(year_of_study);
        self
    }
}

// =========================================================================
// Applications
// =========================================================================

/// Command to submit a housing application for a room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitApplicationCommand {
    pub applicant: ApplicantDetails,
    pub room_id: Uuid,
}

impl SubmitApplicationCommand {
    pub fn new(applicant: ApplicantDetails, room_id: Uuid) -> Self {
        Self { applicant, room_id }
    }
}

// =========================================================================
// Registration
// =========================================================================

/// Command to register an account with an application code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterCommand {
    pub application_code: String,
    pub email: String,
    pub password: String,
}

impl RegisterCommand {
    pub fn new(
        application_code: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            application_code: application_code.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Result of a successful registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationResult {
    pub identity: IdentityView,
    pub student: StudentSummary,
    /// One-off token handed to the client. It is not stored, so nothing in
    /// this service can validate it later.
    pub session_token: String,
}
