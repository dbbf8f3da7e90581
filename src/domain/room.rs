//! Room record
//!
//! A room owns its occupant list. The availability flag is always derived
//! from the occupant count and is never set directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DomainError, StudentSummary};

/// Persisted room record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    /// Human key, unique across rooms
    pub room_number: String,
    pub capacity: u32,
    /// Student record ids, in assignment order, no duplicates
    pub occupants: Vec<Uuid>,
    pub is_available: bool,
    /// Store version for compare-and-swap writes
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Room {
    /// Create an empty, available room
    pub fn new(room_number: impl Into<String>, capacity: u32) -> Result<Self, DomainError> {
        let room_number = room_number.into().trim().to_string();
        if room_number.is_empty() {
            return Err(DomainError::invalid("room number must not be empty"));
        }
        if capacity == 0 {
            return Err(DomainError::invalid("room capacity must be at least 1"));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            room_number,
            capacity,
            occupants: Vec::new(),
            is_available: true,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn has_free_slot(&self) -> bool {
        self.occupants.len() < self.capacity as usize
    }

    pub fn contains(&self, student_id: Uuid) -> bool {
        self.occupants.contains(&student_id)
    }

    /// Copy of this room with `student_id` appended to the occupants
    pub fn with_occupant(&self, student_id: Uuid) -> Self {
        let mut room = self.clone();
        if !room.contains(student_id) {
            room.occupants.push(student_id);
        }
        room.refresh();
        room
    }

    /// Copy of this room with `student_id` removed from the occupants
    pub fn without_occupant(&self, student_id: Uuid) -> Self {
        let mut room = self.clone();
        room.occupants.retain(|id| *id != student_id);
        room.refresh();
        room
    }

    /// Recompute the derived availability flag
    pub fn refresh(&mut self) {
        self.is_available = self.has_free_slot();
        self.updated_at = Utc::now();
    }

    /// Whether the availability flag agrees with the occupant count
    pub fn availability_consistent(&self) -> bool {
        self.is_available == self.has_free_slot()
    }
}

/// Room with occupant details resolved for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomView {
    pub id: Uuid,
    pub room_number: String,
    pub capacity: u32,
    pub is_available: bool,
    pub occupants: Vec<StudentSummary>,
}

impl RoomView {
    pub fn new(room: &Room, occupants: Vec<StudentSummary>) -> Self {
        Self {
            id: room.id,
            room_number: room.room_number.clone(),
            capacity: room.capacity,
            is_available: room.is_available,
            occupants,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_room_is_empty_and_available() {
        let room = Room::new("R101", 2).unwrap();
        assert!(room.is_available);
        assert!(room.occupants.is_empty());
        assert!(room.availability_consistent());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            Room::new("R101", 0),
            Err(DomainError::InvalidRequest(_))
        ));
        assert!(Room::new("   ", 1).is_err());
    }

    #[test]
    fn test_occupant_changes_recompute_availability() {
        let room = Room::new("R101", 1).unwrap();
        let student = Uuid::new_v4();

        let full = room.with_occupant(student);
        assert_eq!(full.occupants, vec![student]);
        assert!(!full.is_available);

        // Adding the same student twice keeps set semantics
        let again = full.with_occupant(student);
        assert_eq!(again.occupants.len(), 1);

        let empty = full.without_occupant(student);
        assert!(empty.occupants.is_empty());
        assert!(empty.is_available);
    }
}
