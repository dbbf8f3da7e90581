//! Scheduled Jobs
//!
//! Background maintenance. The occupancy reconciler repairs room/student
//! disagreements that a failed compensation (or a process crash between the
//! room write and the student write) can leave behind. Every repair settles
//! on "not assigned", the same rule the assignment engine applies.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::interval;
use uuid::Uuid;

use crate::engine::{LockRegistry, LockScope};
use crate::store::{Filter, StoreError, Stores};

// =========================================================================
// Occupancy reconciliation
// =========================================================================

/// Sweep all rooms, then all assigned students, repairing each side
pub async fn reconcile_occupancy(
    stores: &Stores,
    locks: &LockRegistry,
) -> Result<ReconcileReport, JobError> {
    let mut report = ReconcileReport::default();

    let room_ids: Vec<Uuid> = stores
        .rooms
        .find(&Filter::new())
        .await?
        .into_iter()
        .map(|room| room.id)
        .collect();

    for room_id in room_ids {
        if let Err(e) = reconcile_room(stores, locks, room_id, &mut report).await {
            tracing::error!(room_id = %room_id, error = %e, "Room reconciliation failed");
            report.errors.push(format!("room {room_id}: {e}"));
        }
    }

    let student_ids: Vec<Uuid> = stores
        .students
        .find(&Filter::new())
        .await?
        .into_iter()
        .filter(|student| student.assigned_room.is_some())
        .map(|student| student.id)
        .collect();

    for student_id in student_ids {
        if let Err(e) = reconcile_student(stores, locks, student_id, &mut report).await {
            tracing::error!(student_id = %student_id, error = %e, "Student reconciliation failed");
            report.errors.push(format!("student {student_id}: {e}"));
        }
    }

    report.completed_at = Utc::now();

    if report.repairs() > 0 {
        tracing::warn!(
            occupants_removed = report.occupants_removed,
            links_cleared = report.links_cleared,
            availability_fixed = report.availability_fixed,
            "Occupancy reconciliation repaired inconsistencies"
        );
    } else {
        tracing::debug!(
            rooms_checked = report.rooms_checked,
            students_checked = report.students_checked,
            "Occupancy consistent"
        );
    }

    Ok(report)
}

/// Drop occupants whose student does not point back at this room
async fn reconcile_room(
    stores: &Stores,
    locks: &LockRegistry,
    room_id: Uuid,
    report: &mut ReconcileReport,
) -> Result<(), JobError> {
    let _room_guard = locks.lock(LockScope::Room, room_id).await;

    let Some(mut room) = stores.rooms.get(room_id).await? else {
        return Ok(());
    };
    report.rooms_checked += 1;

    let mut removed = 0;
    for student_id in room.occupants.clone() {
        let _student_guard = locks.lock(LockScope::Student, student_id).await;
        let linked = stores
            .students
            .get(student_id)
            .await?
            .is_some_and(|student| student.assigned_room == Some(room_id));

        if !linked {
            tracing::error!(
                room_id = %room_id,
                student_id = %student_id,
                "Consistency fault: occupant without back-reference, removing"
            );
            room = room.without_occupant(student_id);
            removed += 1;
        }
    }

    if removed > 0 {
        report.occupants_removed += removed;
        stores.rooms.save(room).await?;
    } else if !room.availability_consistent() {
        tracing::warn!(room_id = %room_id, "Room availability flag out of date, recomputing");
        room.refresh();
        stores.rooms.save(room).await?;
        report.availability_fixed += 1;
    }

    Ok(())
}

/// Clear a student's room link when the room does not list them
async fn reconcile_student(
    stores: &Stores,
    locks: &LockRegistry,
    student_id: Uuid,
    report: &mut ReconcileReport,
) -> Result<(), JobError> {
    // Peek for the room id so locks can be taken in room, student order
    let Some(room_id) = stores
        .students
        .get(student_id)
        .await?
        .and_then(|student| student.assigned_room)
    else {
        return Ok(());
    };

    let _room_guard = locks.lock(LockScope::Room, room_id).await;
    let _student_guard = locks.lock(LockScope::Student, student_id).await;

    let Some(student) = stores.students.get(student_id).await? else {
        return Ok(());
    };
    if student.assigned_room != Some(room_id) {
        // Moved since the peek; the next sweep sees the new link
        return Ok(());
    }
    report.students_checked += 1;

    let listed = stores
        .rooms
        .get(room_id)
        .await?
        .is_some_and(|room| room.contains(student_id));

    if !listed {
        tracing::error!(
            room_id = %room_id,
            student_id = %student_id,
            "Consistency fault: student references a room that does not list them, clearing link"
        );
        stores.students.save(student.unassigned()).await?;
        report.links_cleared += 1;
    }

    Ok(())
}

/// Outcome of one reconciliation sweep
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub rooms_checked: u64,
    pub students_checked: u64,
    pub occupants_removed: u64,
    pub links_cleared: u64,
    pub availability_fixed: u64,
    pub errors: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

impl ReconcileReport {
    /// Total number of records rewritten
    pub fn repairs(&self) -> u64 {
        self.occupants_removed + self.links_cleared + self.availability_fixed
    }
}

// =========================================================================
// Job Scheduler
// =========================================================================

/// Runs reconciliation on a fixed interval
pub struct JobScheduler {
    stores: Stores,
    locks: LockRegistry,
    reconcile_interval: Duration,
}

impl JobScheduler {
    pub fn new(stores: Stores, locks: LockRegistry, reconcile_interval: Duration) -> Self {
        Self {
            stores,
            locks,
            reconcile_interval,
        }
    }

    /// Start the scheduler in the background.
    /// Returns a handle that can be used to abort it.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        tracing::info!(
            interval_secs = self.reconcile_interval.as_secs(),
            "Job scheduler started"
        );

        let mut reconcile = interval(self.reconcile_interval);
        loop {
            reconcile.tick().await;
            if let Err(e) = reconcile_occupancy(&self.stores, &self.locks).await {
                tracing::error!(error = %e, "Occupancy reconciliation failed");
            }
        }
    }

    /// Run every job once (manual trigger or tests)
    pub async fn run_all_once(&self) -> Result<ReconcileReport, JobError> {
        reconcile_occupancy(&self.stores, &self.locks).await
    }
}

/// Job execution errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Room, Student};

    async fn room_and_student(stores: &Stores) -> (Room, Student) {
        let room = stores
            .rooms
            .insert(Room::new("R101", 2).unwrap())
            .await
            .unwrap();
        let student = stores
            .students
            .insert(Student::new("S-1", "Ada", "ada@example.com", "").unwrap())
            .await
            .unwrap();
        (room, student)
    }

    #[tokio::test]
    async fn test_consistent_state_is_untouched() {
        let stores = Stores::in_memory();
        let (room, student) = room_and_student(&stores).await;
        let room = stores.rooms.save(room.with_occupant(student.id)).await.unwrap();
        stores.students.save(student.assigned_to(room.id)).await.unwrap();

        let report = reconcile_occupancy(&stores, &LockRegistry::new()).await.unwrap();
        assert_eq!(report.repairs(), 0);
        assert_eq!(report.rooms_checked, 1);
        assert_eq!(report.students_checked, 1);

        let stored = stores.rooms.get(room.id).await.unwrap().unwrap();
        assert_eq!(stored.version, room.version);
    }

    #[tokio::test]
    async fn test_orphan_occupant_is_removed() {
        let stores = Stores::in_memory();
        let (room, student) = room_and_student(&stores).await;
        stores
            .rooms
            .save(room.with_occupant(student.id).with_occupant(Uuid::new_v4()))
            .await
            .unwrap();

        let report = reconcile_occupancy(&stores, &LockRegistry::new()).await.unwrap();
        assert_eq!(report.occupants_removed, 2);

        let room = stores.rooms.get(room.id).await.unwrap().unwrap();
        assert!(room.occupants.is_empty());
        assert!(room.is_available);
    }

    #[tokio::test]
    async fn test_dangling_link_is_cleared() {
        let stores = Stores::in_memory();
        let (room, student) = room_and_student(&stores).await;
        stores.students.save(student.assigned_to(room.id)).await.unwrap();

        let report = reconcile_occupancy(&stores, &LockRegistry::new()).await.unwrap();
        assert_eq!(report.links_cleared, 1);

        let student = stores.students.get(student.id).await.unwrap().unwrap();
        assert!(student.assigned_room.is_none());
    }

    #[tokio::test]
    async fn test_stale_availability_is_recomputed() {
        let stores = Stores::in_memory();
        let (room, _) = room_and_student(&stores).await;
        let mut stale = room.clone();
        stale.is_available = false;
        stores.rooms.save(stale).await.unwrap();

        let report = reconcile_occupancy(&stores, &LockRegistry::new()).await.unwrap();
        assert_eq!(report.availability_fixed, 1);
        assert!(stores.rooms.get(room.id).await.unwrap().unwrap().is_available);
    }
}
