//! Assignment Engine
//!
//! Sole writer of `Room.occupants`, `Room.is_available` and
//! `Student.assigned_room`. Each operation runs inside the room then student
//! critical sections, writes the room first and the student second, and
//! undoes the room write if the student write fails.

use uuid::Uuid;

use crate::domain::{DomainError, Room, RoomView, Student};
use crate::error::{AppError, AppResult};
use crate::store::{Filter, Stores};

use super::locks::{LockRegistry, LockScope};

/// Attempts made to write a compensating room update
const MAX_COMPENSATION_ATTEMPTS: u32 = 3;

/// Binds students to room occupant slots
#[derive(Debug, Clone)]
pub struct AssignmentEngine {
    stores: Stores,
    locks: LockRegistry,
}

impl AssignmentEngine {
    pub fn new(stores: Stores, locks: LockRegistry) -> Self {
        Self { stores, locks }
    }

    // =========================================================================
    // assign
    // =========================================================================

    /// Add `student_id` to the room's occupants and link the student back
    pub async fn assign(&self, room_id: Uuid, student_id: Uuid) -> AppResult<RoomView> {
        let _room_guard = self.locks.lock(LockScope::Room, room_id).await;
        let _student_guard = self.locks.lock(LockScope::Student, student_id).await;

        let room = self.assign_locked(room_id, student_id).await?;
        self.view(&room).await
    }

    async fn assign_locked(&self, room_id: Uuid, student_id: Uuid) -> AppResult<Room> {
        let room = self.load_room(room_id).await?;
        let student = self.load_student(student_id).await?;

        if student.assigned_room.is_some() {
            return Err(DomainError::AlreadyAssigned { student_id }.into());
        }

        // Half-written assignment from an earlier failure: settle it to
        // "not assigned" before evaluating capacity.
        let room = if room.contains(student_id) {
            tracing::error!(
                room_id = %room_id,
                student_id = %student_id,
                "Consistency fault: room lists student without back-reference, removing occupant"
            );
            self.stores
                .rooms
                .save(room.without_occupant(student_id))
                .await?
        } else {
            room
        };

        if !room.is_available || !room.has_free_slot() {
            return Err(DomainError::CapacityExceeded {
                room_id,
                capacity: room.capacity,
            }
            .into());
        }

        let saved_room = self.stores.rooms.save(room.with_occupant(student_id)).await?;

        if let Err(e) = self.stores.students.save(student.assigned_to(room_id)).await {
            tracing::warn!(
                room_id = %room_id,
                student_id = %student_id,
                error = %e,
                "Student write failed after room write, rolling back occupant"
            );
            self.compensate(saved_room, |room| room.without_occupant(student_id))
                .await;
            return Err(e.into());
        }

        tracing::info!(
            room_id = %room_id,
            student_id = %student_id,
            occupants = saved_room.occupants.len(),
            capacity = saved_room.capacity,
            "Student assigned to room"
        );

        Ok(saved_room)
    }

    // =========================================================================
    // unassign
    // =========================================================================

    /// Remove `student_id` from the room and clear the student's link.
    ///
    /// If only one side references the other, the fault is logged and both
    /// sides are settled to "not assigned" instead of failing the caller.
    pub async fn unassign(&self, room_id: Uuid, student_id: Uuid) -> AppResult<RoomView> {
        let _room_guard = self.locks.lock(LockScope::Room, room_id).await;
        let _student_guard = self.locks.lock(LockScope::Student, student_id).await;

        let room = self.unassign_locked(room_id, student_id).await?;
        self.view(&room).await
    }

    pub(crate) async fn unassign_locked(&self, room_id: Uuid, student_id: Uuid) -> AppResult<Room> {
        let room = self.load_room(room_id).await?;
        let student = self.load_student(student_id).await?;

        let in_room = room.contains(student_id);
        let linked = student.assigned_room == Some(room_id);

        match (in_room, linked) {
            (false, false) => {
                return Err(DomainError::NotAssigned {
                    room_id,
                    student_id,
                }
                .into());
            }
            (true, true) => {}
            _ => {
                let fault = DomainError::ConsistencyFault {
                    room_id,
                    student_id,
                    detail: format!(
                        "room lists student: {in_room}, student references room: {linked}"
                    ),
                };
                tracing::error!(
                    room_id = %room_id,
                    student_id = %student_id,
                    student_room = ?student.assigned_room,
                    "{fault}; reconciling to not assigned"
                );
            }
        }

        let room = if in_room {
            self.stores
                .rooms
                .save(room.without_occupant(student_id))
                .await?
        } else if !room.availability_consistent() {
            self.stores.rooms.save(refreshed(&room)).await?
        } else {
            room
        };

        if linked {
            if let Err(e) = self.stores.students.save(student.unassigned()).await {
                if in_room {
                    tracing::warn!(
                        room_id = %room_id,
                        student_id = %student_id,
                        error = %e,
                        "Student write failed after room write, restoring occupant"
                    );
                    self.compensate(room, |room| room.with_occupant(student_id))
                        .await;
                }
                return Err(e.into());
            }
        }

        tracing::info!(
            room_id = %room_id,
            student_id = %student_id,
            occupants = room.occupants.len(),
            "Student removed from room"
        );

        Ok(room)
    }

    // =========================================================================
    // Compensation
    // =========================================================================

    /// Write `undo(room)`, reloading on version conflicts. A compensation
    /// that cannot be written is logged and left for the reconciliation job.
    async fn compensate<F>(&self, mut room: Room, undo: F)
    where
        F: Fn(&Room) -> Room,
    {
        for attempt in 1..=MAX_COMPENSATION_ATTEMPTS {
            match self.stores.rooms.save(undo(&room)).await {
                Ok(_) => return,
                Err(e) => {
                    tracing::warn!(
                        room_id = %room.id,
                        attempt,
                        error = %e,
                        "Compensating room write failed"
                    );
                    if !e.is_retryable() {
                        break;
                    }
                    if e.is_version_conflict() {
                        match self.stores.rooms.get(room.id).await {
                            Ok(Some(latest)) => room = latest,
                            _ => break,
                        }
                    }
                }
            }
        }

        tracing::error!(
            room_id = %room.id,
            "Room left inconsistent after failed compensation; reconciliation will repair it"
        );
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Room with occupant details resolved
    pub async fn room_view(&self, room_id: Uuid) -> AppResult<RoomView> {
        let room = self.load_room(room_id).await?;
        self.view(&room).await
    }

    /// All rooms, ordered by room number
    pub async fn list_rooms(&self) -> AppResult<Vec<RoomView>> {
        let mut rooms = self.stores.rooms.find(&Filter::new()).await?;
        rooms.sort_by(|a, b| a.room_number.cmp(&b.room_number));

        let mut views = Vec::with_capacity(rooms.len());
        for room in &rooms {
            views.push(self.view(room).await?);
        }
        Ok(views)
    }

    async fn view(&self, room: &Room) -> AppResult<RoomView> {
        let mut occupants = Vec::with_capacity(room.occupants.len());
        for id in &room.occupants {
            match self.stores.students.get(*id).await? {
                Some(student) => occupants.push(student.summary()),
                None => tracing::warn!(
                    room_id = %room.id,
                    student_id = %id,
                    "Room lists a student that does not exist"
                ),
            }
        }
        Ok(RoomView::new(room, occupants))
    }

    async fn load_room(&self, room_id: Uuid) -> Result<Room, AppError> {
        self.stores
            .rooms
            .get(room_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Room", room_id).into())
    }

    async fn load_student(&self, student_id: Uuid) -> Result<Student, AppError> {
        self.stores
            .students
            .get(student_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Student", student_id).into())
    }
}

fn refreshed(room: &Room) -> Room {
    let mut room = room.clone();
    room.refresh();
    room
}
