//! Student record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{validate_email, DomainError};

/// Persisted student record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    /// Opaque external key, unique across students
    pub student_id: String,
    pub name: String,
    /// Stored lowercased, unique across students
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub year_of_study: Option<u8>,
    /// Back-reference to the room whose occupants contain this student
    #[serde(default)]
    pub assigned_room: Option<Uuid>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Student {
    /// Create an unassigned student
    pub fn new(
        student_id: impl Into<String>,
        name: impl Into<String>,
        email: &str,
        phone: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let student_id = student_id.into().trim().to_string();
        let name = name.into().trim().to_string();
        if student_id.is_empty() {
            return Err(DomainError::invalid("student id must not be empty"));
        }
        if name.is_empty() {
            return Err(DomainError::invalid("name must not be empty"));
        }
        let email = validate_email(email)?;

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            student_id,
            name,
            email,
            phone: phone.into(),
            program: None,
            year_of_study: None,
            assigned_room: None,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn with_program(mut self, program: Option<String>, year_of_study: Option<u8>) -> Self {
        self.program = program;
        self.year_of_study = year_of_study;
        self
    }

    /// Copy of this student linked to `room_id`
    pub fn assigned_to(&self, room_id: Uuid) -> Self {
        let mut student = self.clone();
        student.assigned_room = Some(room_id);
        student.updated_at = Utc::now();
        student
    }

    /// Copy of this student with the room link cleared
    pub fn unassigned(&self) -> Self {
        let mut student = self.clone();
        student.assigned_room = None;
        student.updated_at = Utc::now();
        student
    }

    pub fn summary(&self) -> StudentSummary {
        StudentSummary {
            id: self.id,
            student_id: self.student_id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Occupant details shown alongside a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentSummary {
    pub id: Uuid,
    pub student_id: String,
    pub name: String,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_student_normalizes_email() {
        let student = Student::new("S-1", "Ada", "Ada@Example.COM", "555").unwrap();
        assert_eq!(student.email, "ada@example.com");
        assert!(student.assigned_room.is_none());
    }

    #[test]
    fn test_assignment_copies() {
        let student = Student::new("S-1", "Ada", "ada@example.com", "555").unwrap();
        let room_id = Uuid::new_v4();

        let assigned = student.assigned_to(room_id);
        assert_eq!(assigned.assigned_room, Some(room_id));
        assert!(student.assigned_room.is_none());

        assert!(assigned.unassigned().assigned_room.is_none());
    }

    #[test]
    fn test_blank_fields_rejected() {
        assert!(Student::new("", "Ada", "ada@example.com", "").is_err());
        assert!(Student::new("S-1", " ", "ada@example.com", "").is_err());
        assert!(Student::new("S-1", "Ada", "not-an-email", "").is_err());
    }
}
