//! In-memory collections
//!
//! Each write holds the collection lock only for the duration of a single
//! document check-and-store, which gives per-document atomicity and nothing
//! more. Cross-document consistency is the engines' responsibility.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use super::{Collection, Document, Filter, StoreError};

/// Collection backed by a process-local map
#[derive(Debug)]
pub struct MemoryCollection<T> {
    docs: RwLock<HashMap<Uuid, T>>,
}

impl<T: Document> MemoryCollection<T> {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
        }
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable(format!("{} lock poisoned", T::COLLECTION))
    }

    /// First unique key of `doc` already claimed by a different document
    fn conflicting_key(docs: &HashMap<Uuid, T>, doc: &T) -> Option<String> {
        let claimed = doc.unique_keys();
        docs.values()
            .filter(|other| other.id() != doc.id())
            .flat_map(|other| other.unique_keys())
            .find(|key| claimed.contains(key))
            .map(|key| key.name.to_string())
    }

    fn matching(&self, filter: &Filter, limit: Option<usize>) -> Result<Vec<T>, StoreError> {
        let docs = self.docs.read().map_err(|_| Self::poisoned())?;
        let mut found = Vec::new();
        for doc in docs.values() {
            if limit.is_some_and(|limit| found.len() >= limit) {
                break;
            }
            if filter.matches(&serde_json::to_value(doc)?) {
                found.push(doc.clone());
            }
        }
        Ok(found)
    }
}

impl<T: Document> Default for MemoryCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Document> Collection<T> for MemoryCollection<T> {
    async fn get(&self, id: Uuid) -> Result<Option<T>, StoreError> {
        let docs = self.docs.read().map_err(|_| Self::poisoned())?;
        Ok(docs.get(&id).cloned())
    }

    async fn find_one(&self, filter: &Filter) -> Result<Option<T>, StoreError> {
        Ok(self.matching(filter, Some(1))?.into_iter().next())
    }

    async fn find(&self, filter: &Filter) -> Result<Vec<T>, StoreError> {
        self.matching(filter, None)
    }

    async fn insert(&self, mut doc: T) -> Result<T, StoreError> {
        let mut docs = self.docs.write().map_err(|_| Self::poisoned())?;

        if docs.contains_key(&doc.id()) {
            return Err(StoreError::UniqueViolation {
                collection: T::COLLECTION,
                key: "id".to_string(),
            });
        }
        if let Some(key) = Self::conflicting_key(&docs, &doc) {
            return Err(StoreError::UniqueViolation {
                collection: T::COLLECTION,
                key,
            });
        }

        doc.set_version(1);
        docs.insert(doc.id(), doc.clone());
        Ok(doc)
    }

    async fn save(&self, mut doc: T) -> Result<T, StoreError> {
        let mut docs = self.docs.write().map_err(|_| Self::poisoned())?;

        let actual = docs
            .get(&doc.id())
            .map(|stored| stored.version())
            .ok_or(StoreError::NotFound {
                collection: T::COLLECTION,
                id: doc.id(),
            })?;

        if actual != doc.version() {
            return Err(StoreError::VersionConflict {
                collection: T::COLLECTION,
                id: doc.id(),
                expected: doc.version(),
                actual,
            });
        }
        if let Some(key) = Self::conflicting_key(&docs, &doc) {
            return Err(StoreError::UniqueViolation {
                collection: T::COLLECTION,
                key,
            });
        }

        doc.set_version(actual + 1);
        docs.insert(doc.id(), doc.clone());
        Ok(doc)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut docs = self.docs.write().map_err(|_| Self::poisoned())?;
        Ok(docs.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Room, Student};

    #[tokio::test]
    async fn test_insert_and_get() {
        let rooms = MemoryCollection::<Room>::new();
        let room = rooms.insert(Room::new("R101", 2).unwrap()).await.unwrap();

        assert_eq!(room.version, 1);
        let loaded = rooms.get(room.id).await.unwrap().unwrap();
        assert_eq!(loaded, room);
        assert!(rooms.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_key_enforced() {
        let rooms = MemoryCollection::<Room>::new();
        rooms.insert(Room::new("R101", 2).unwrap()).await.unwrap();

        let err = rooms
            .insert(Room::new("R101", 1).unwrap())
            .await
            .unwrap_err();
        assert!(err.is_unique_violation_on("room_number"));
    }

    #[tokio::test]
    async fn test_save_is_compare_and_swap() {
        let rooms = MemoryCollection::<Room>::new();
        let room = rooms.insert(Room::new("R101", 2).unwrap()).await.unwrap();

        let first = rooms.save(room.with_occupant(Uuid::new_v4())).await.unwrap();
        assert_eq!(first.version, 2);

        // A second writer holding the stale copy loses
        let err = rooms
            .save(room.with_occupant(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(err.is_version_conflict());

        let stored = rooms.get(room.id).await.unwrap().unwrap();
        assert_eq!(stored.occupants.len(), 1);
    }

    #[tokio::test]
    async fn test_save_missing_document() {
        let rooms = MemoryCollection::<Room>::new();
        let err = rooms.save(Room::new("R1", 1).unwrap()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_find_by_filter_and_delete() {
        let students = MemoryCollection::<Student>::new();
        let ada = students
            .insert(Student::new("S-1", "Ada", "ada@example.com", "").unwrap())
            .await
            .unwrap();
        students
            .insert(Student::new("S-2", "Alan", "alan@example.com", "").unwrap())
            .await
            .unwrap();

        let found = students
            .find_one(&Filter::new().eq_ignore_case("email", "ADA@example.com"))
            .await
            .unwrap();
        assert_eq!(found.map(|s| s.id), Some(ada.id));
        assert_eq!(students.find(&Filter::new()).await.unwrap().len(), 2);

        assert!(students.delete(ada.id).await.unwrap());
        assert!(!students.delete(ada.id).await.unwrap());
    }
}
