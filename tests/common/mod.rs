//! Common test utilities
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use student_housing::domain::{ApplicantDetails, Room, Student};
use student_housing::engine::Engines;
use student_housing::notify::{Notifier, NotifyError};
use student_housing::store::{Collection, Document, Filter, StoreError, Stores};

// =========================================================================
// Notifications
// =========================================================================

/// Notifier that keeps every message it is asked to send
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String, String)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Wait for background dispatch to deliver at least `count` messages
    pub async fn wait_for(&self, count: usize) -> Vec<(String, String, String)> {
        for _ in 0..100 {
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {count} notifications, got {:?}", self.sent());
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

/// Notifier whose transport is always down
pub struct DownNotifier;

#[async_trait]
impl Notifier for DownNotifier {
    async fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("connection refused".to_string()))
    }
}

// =========================================================================
// Fault injection
// =========================================================================

/// Collection wrapper whose saves can be made to fail on demand
pub struct FlakyCollection<T: Document> {
    inner: Arc<dyn Collection<T>>,
    passing_saves: AtomicUsize,
    failing_saves: AtomicUsize,
}

impl<T: Document> FlakyCollection<T> {
    pub fn new(inner: Arc<dyn Collection<T>>) -> Self {
        Self {
            inner,
            passing_saves: AtomicUsize::new(0),
            failing_saves: AtomicUsize::new(0),
        }
    }

    /// Fail the next `n` saves
    pub fn fail_next_saves(&self, n: usize) {
        self.fail_saves_after(0, n);
    }

    /// Let `pass` saves through, then fail the following `fail`
    pub fn fail_saves_after(&self, pass: usize, fail: usize) {
        self.passing_saves.store(pass, Ordering::SeqCst);
        self.failing_saves.store(fail, Ordering::SeqCst);
    }

    fn take_failure(&self) -> bool {
        let decrement = |n: usize| n.checked_sub(1);
        if self
            .passing_saves
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, decrement)
            .is_ok()
        {
            return false;
        }
        self.failing_saves
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, decrement)
            .is_ok()
    }
}

#[async_trait]
impl<T: Document> Collection<T> for FlakyCollection<T> {
    async fn get(&self, id: Uuid) -> Result<Option<T>, StoreError> {
        self.inner.get(id).await
    }

    async fn find_one(&self, filter: &Filter) -> Result<Option<T>, StoreError> {
        self.inner.find_one(filter).await
    }

    async fn find(&self, filter: &Filter) -> Result<Vec<T>, StoreError> {
        self.inner.find(filter).await
    }

    async fn insert(&self, doc: T) -> Result<T, StoreError> {
        self.inner.insert(doc).await
    }

    async fn save(&self, doc: T) -> Result<T, StoreError> {
        if self.take_failure() {
            return Err(StoreError::Unavailable(format!(
                "injected {} write failure",
                T::COLLECTION
            )));
        }
        self.inner.save(doc).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        self.inner.delete(id).await
    }
}

// =========================================================================
// Setup
// =========================================================================

pub struct TestApp {
    pub engines: Engines,
    pub stores: Stores,
    pub notifier: Arc<RecordingNotifier>,
}

/// Engines over fresh in-memory collections
pub fn setup() -> TestApp {
    setup_with(Stores::in_memory())
}

pub fn setup_with(stores: Stores) -> TestApp {
    let notifier = Arc::new(RecordingNotifier::default());
    TestApp {
        engines: Engines::new(stores.clone(), notifier.clone()),
        stores,
        notifier,
    }
}

pub async fn room(stores: &Stores, number: &str, capacity: u32) -> Room {
    stores
        .rooms
        .insert(Room::new(number, capacity).unwrap())
        .await
        .unwrap()
}

pub async fn student(stores: &Stores, student_id: &str) -> Student {
    let email = format!("{}@example.com", student_id.to_lowercase());
    stores
        .students
        .insert(Student::new(student_id, format!("Student {student_id}"), &email, "").unwrap())
        .await
        .unwrap()
}

pub fn applicant(student_id: &str) -> ApplicantDetails {
    ApplicantDetails {
        name: format!("Applicant {student_id}"),
        email: format!("{}@example.com", student_id.to_lowercase()),
        phone: "555-0100".to_string(),
        student_id: student_id.to_string(),
        program: "Computer Science".to_string(),
        year_of_study: 1,
    }
}

/// Occupancy invariants over the whole store
pub async fn assert_consistent(stores: &Stores) {
    let rooms = stores.rooms.find(&Filter::new()).await.unwrap();
    for room in &rooms {
        assert!(room.occupants.len() <= room.capacity as usize, "{room:?}");
        assert_eq!(room.is_available, room.occupants.len() < room.capacity as usize);
        for id in &room.occupants {
            let student = stores.students.get(*id).await.unwrap().unwrap();
            assert_eq!(student.assigned_room, Some(room.id), "{student:?}");
        }
    }

    let students = stores.students.find(&Filter::new()).await.unwrap();
    for student in students {
        if let Some(room_id) = student.assigned_room {
            let room = stores.rooms.get(room_id).await.unwrap().unwrap();
            assert!(room.contains(student.id), "{student:?} not in {room:?}");
        }
    }
}
