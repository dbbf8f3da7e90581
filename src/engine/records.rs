//! Admin record management
//!
//! Creating and deleting rooms and students. None of these operations touch
//! an assignment link, so they sit outside the assignment machinery.

use uuid::Uuid;

use crate::domain::{DomainError, Room, RoomView, Student};
use crate::error::AppResult;
use crate::store::{StoreError, Stores};

use super::commands::{CreateRoomCommand, CreateStudentCommand};
use super::locks::{LockRegistry, LockScope};

#[derive(Debug, Clone)]
pub struct RecordService {
    stores: Stores,
    locks: LockRegistry,
}

impl RecordService {
    pub fn new(stores: Stores, locks: LockRegistry) -> Self {
        Self { stores, locks }
    }

    /// Create an empty, available room
    pub async fn create_room(&self, command: CreateRoomCommand) -> AppResult<RoomView> {
        let room = Room::new(command.room_number, command.capacity)?;
        let room = self
            .stores
            .rooms
            .insert(room)
            .await
            .map_err(duplicate_record)?;

        tracing::info!(room_id = %room.id, room_number = %room.room_number, capacity = room.capacity, "Room created");
        Ok(RoomView::new(&room, Vec::new()))
    }

    /// Delete a room that has no occupants
    pub async fn delete_room(&self, room_id: Uuid) -> AppResult<()> {
        let _guard = self.locks.lock(LockScope::Room, room_id).await;

        let room = self
            .stores
            .rooms
            .get(room_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Room", room_id))?;

        if !room.occupants.is_empty() {
            return Err(DomainError::RoomOccupied {
                room_id,
                occupants: room.occupants.len(),
            }
            .into());
        }

        self.stores.rooms.delete(room_id).await?;
        tracing::info!(room_id = %room_id, room_number = %room.room_number, "Room deleted");
        Ok(())
    }

    /// Create a student with no room
    pub async fn create_student(&self, command: CreateStudentCommand) -> AppResult<Student> {
        let student = Student::new(command.student_id, command.name, &command.email, command.phone)?
            .with_program(command.program, command.year_of_study);

        let _guard = self
            .locks
            .lock(LockScope::Applicant, &student.student_id)
            .await;

        let student = self
            .stores
            .students
            .insert(student)
            .await
            .map_err(duplicate_record)?;

        tracing::info!(student_id = %student.id, external_id = %student.student_id, "Student created");
        Ok(student)
    }

    pub async fn get_student(&self, student_id: Uuid) -> AppResult<Student> {
        Ok(self
            .stores
            .students
            .get(student_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Student", student_id))?)
    }
}

/// Map a unique key collision to the caller-facing duplicate kind
pub(crate) fn duplicate_record(err: StoreError) -> crate::error::AppError {
    match err {
        StoreError::UniqueViolation { key, .. } => DomainError::DuplicateRecord { key }.into(),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> (RecordService, Stores) {
        let stores = Stores::in_memory();
        (RecordService::new(stores.clone(), LockRegistry::new()), stores)
    }

    #[tokio::test]
    async fn test_room_number_is_unique() {
        let (records, _) = service();
        records
            .create_room(CreateRoomCommand::new("R101", 2))
            .await
            .unwrap();

        let err = records
            .create_room(CreateRoomCommand::new("R101", 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "duplicate_record");
    }

    #[tokio::test]
    async fn test_delete_occupied_room_is_refused() {
        let (records, stores) = service();
        let room = records
            .create_room(CreateRoomCommand::new("R101", 2))
            .await
            .unwrap();
        let stored = stores.rooms.get(room.id).await.unwrap().unwrap();
        stores
            .rooms
            .save(stored.with_occupant(Uuid::new_v4()))
            .await
            .unwrap();

        let err = records.delete_room(room.id).await.unwrap_err();
        assert!(matches!(
            err.domain(),
            Some(DomainError::RoomOccupied { occupants: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_empty_room() {
        let (records, stores) = service();
        let room = records
            .create_room(CreateRoomCommand::new("R101", 2))
            .await
            .unwrap();

        records.delete_room(room.id).await.unwrap();
        assert!(stores.rooms.get(room.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_student_email_is_unique() {
        let (records, _) = service();
        records
            .create_student(CreateStudentCommand::new("S-1", "Ada", "ada@example.com"))
            .await
            .unwrap();

        let err = records
            .create_student(CreateStudentCommand::new("S-2", "Ada L", "ADA@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.domain(),
            Some(DomainError::DuplicateRecord { key }) if key == "email"
        ));
    }
}
