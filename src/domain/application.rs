//! Application record and lifecycle state machine

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{validate_email, ApplicationCode, DomainError};

/// Application lifecycle status.
///
/// `Pending` is the only non-terminal state. The full transition table is
/// `pending -> approved | rejected | cancelled`; everything else is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApplicationStatus::Pending)
    }

    /// Whether the transition table allows `self -> to`
    pub fn can_transition_to(&self, to: ApplicationStatus) -> bool {
        !self.is_terminal() && to.is_terminal()
    }

    /// Validate `self -> to` against the transition table
    pub fn transition(self, to: ApplicationStatus) -> Result<ApplicationStatus, DomainError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(DomainError::InvalidTransition { from: self, to })
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ApplicationStatus::Pending),
            "approved" => Ok(ApplicationStatus::Approved),
            "rejected" => Ok(ApplicationStatus::Rejected),
            "cancelled" | "canceled" => Ok(ApplicationStatus::Cancelled),
            other => Err(DomainError::invalid(format!("unknown status '{other}'"))),
        }
    }
}

/// Applicant-supplied fields, copied onto the student record at approval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicantDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub student_id: String,
    pub program: String,
    pub year_of_study: u8,
}

impl ApplicantDetails {
    /// Trim and validate the applicant fields
    pub fn normalized(self) -> Result<Self, DomainError> {
        let name = self.name.trim().to_string();
        let student_id = self.student_id.trim().to_string();
        let program = self.program.trim().to_string();

        if name.is_empty() {
            return Err(DomainError::invalid("name must not be empty"));
        }
        if student_id.is_empty() {
            return Err(DomainError::invalid("student id must not be empty"));
        }
        if program.is_empty() {
            return Err(DomainError::invalid("program must not be empty"));
        }
        if !(1..=10).contains(&self.year_of_study) {
            return Err(DomainError::invalid("year of study must be between 1 and 10"));
        }

        Ok(Self {
            name,
            email: validate_email(&self.email)?,
            phone: self.phone.trim().to_string(),
            student_id,
            program,
            year_of_study: self.year_of_study,
        })
    }
}

/// Persisted application record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: Uuid,
    pub application_id: ApplicationCode,
    pub applicant: ApplicantDetails,
    pub room_id: Uuid,
    pub status: ApplicationStatus,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
    pub version: i64,
}

impl Application {
    /// Create a pending application with a freshly generated code
    pub fn submit(applicant: ApplicantDetails, room_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            application_id: ApplicationCode::generate(now.year()),
            applicant,
            room_id,
            status: ApplicationStatus::Pending,
            submitted_at: now,
            processed_at: None,
            version: 0,
        }
    }

    /// Copy of this application moved to `to`, validated against the table
    pub fn transitioned(&self, to: ApplicationStatus) -> Result<Self, DomainError> {
        let status = self.status.transition(to)?;
        let mut application = self.clone();
        application.status = status;
        application.processed_at = Some(Utc::now());
        Ok(application)
    }

    pub fn belongs_to(&self, email: &str) -> bool {
        self.applicant.email.eq_ignore_ascii_case(email.trim())
    }

    pub fn summary(&self) -> ApplicationSummary {
        ApplicationSummary {
            application_id: self.application_id.to_string(),
            name: self.applicant.name.clone(),
            email: self.applicant.email.clone(),
            student_id: self.applicant.student_id.clone(),
            program: self.applicant.program.clone(),
            year_of_study: self.applicant.year_of_study,
            status: self.status,
        }
    }
}

/// Fields returned to pre-fill registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSummary {
    pub application_id: String,
    pub name: String,
    pub email: String,
    pub student_id: String,
    pub program: String,
    pub year_of_study: u8,
    pub status: ApplicationStatus,
}
