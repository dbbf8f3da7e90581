//! Document definitions
//!
//! Binds each domain record to its collection and declares the unique keys
//! the store enforces on every write.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::{Application, ApplicationStatus, Identity, Room, Student};

/// A record stored as one atomically-written document
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection (table) name
    const COLLECTION: &'static str;

    fn id(&self) -> Uuid;

    /// Version observed when the document was read; 0 before first insert
    fn version(&self) -> i64;

    fn set_version(&mut self, version: i64);

    /// Unique keys this document currently claims
    fn unique_keys(&self) -> Vec<UniqueKey>;
}

/// A named unique value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueKey {
    pub name: &'static str,
    pub value: String,
}

impl UniqueKey {
    pub fn new(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

/// Equality conditions over document fields.
///
/// Fields are dotted paths into the serialized document
/// (`"applicant.student_id"`). Values compare as strings.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    conditions: Vec<Condition>,
}

#[derive(Debug, Clone)]
pub struct Condition {
    pub path: &'static str,
    pub value: String,
    pub ignore_case: bool,
}

impl Condition {
    /// Path segments, e.g. `["applicant", "student_id"]`
    pub fn segments(&self) -> Vec<String> {
        self.path.split('.').map(str::to_string).collect()
    }
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, path: &'static str, value: impl Into<String>) -> Self {
        self.conditions.push(Condition {
            path,
            value: value.into(),
            ignore_case: false,
        });
        self
    }

    pub fn eq_ignore_case(mut self, path: &'static str, value: impl Into<String>) -> Self {
        self.conditions.push(Condition {
            path,
            value: value.into(),
            ignore_case: true,
        });
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Evaluate against a serialized document
    pub fn matches(&self, doc: &Value) -> bool {
        self.conditions.iter().all(|condition| {
            let found = condition
                .path
                .split('.')
                .try_fold(doc, |node, segment| node.get(segment))
                .and_then(scalar_text);

            match found {
                Some(text) if condition.ignore_case => text.eq_ignore_ascii_case(&condition.value),
                Some(text) => text == condition.value,
                None => false,
            }
        })
    }
}

/// Text form of a scalar JSON value, matching Postgres `#>>`
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl Document for Room {
    const COLLECTION: &'static str = "rooms";

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new("room_number", &self.room_number)]
    }
}

impl Document for Student {
    const COLLECTION: &'static str = "students";

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![
            UniqueKey::new("student_id", &self.student_id),
            UniqueKey::new("email", self.email.to_ascii_lowercase()),
        ]
    }
}

impl Document for Application {
    const COLLECTION: &'static str = "applications";

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        let mut keys = vec![UniqueKey::new("application_id", self.application_id.as_str())];
        // Partial key: only pending applications compete for it
        if self.status == ApplicationStatus::Pending {
            keys.push(UniqueKey::new(
                "pending_student_id",
                &self.applicant.student_id,
            ));
        }
        keys
    }
}

impl Document for Identity {
    const COLLECTION: &'static str = "identities";

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        let mut keys = vec![UniqueKey::new("email", self.email.to_ascii_lowercase())];
        if let Some(code) = &self.application_code {
            keys.push(UniqueKey::new("application_code", code));
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ApplicantDetails;
    use serde_json::json;

    #[test]
    fn test_filter_nested_paths() {
        let doc = json!({
            "status": "pending",
            "applicant": { "student_id": "S-1", "email": "ada@example.com" },
            "capacity": 2
        });

        assert!(Filter::new()
            .eq("status", "pending")
            .eq("applicant.student_id", "S-1")
            .matches(&doc));
        assert!(Filter::new().eq("capacity", "2").matches(&doc));
        assert!(!Filter::new().eq("applicant.student_id", "S-2").matches(&doc));
        assert!(!Filter::new().eq("missing.path", "x").matches(&doc));
    }

    #[test]
    fn test_filter_ignore_case() {
        let doc = json!({ "email": "ada@example.com" });

        assert!(Filter::new().eq_ignore_case("email", "ADA@example.com").matches(&doc));
        assert!(!Filter::new().eq("email", "ADA@example.com").matches(&doc));
    }

    #[test]
    fn test_pending_key_only_while_pending() {
        let applicant = ApplicantDetails {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            phone: String::new(),
            student_id: "S-1".to_string(),
            program: "CS".to_string(),
            year_of_study: 1,
        };
        let application = Application::submit(applicant, Uuid::new_v4());

        let names: Vec<_> = application.unique_keys().iter().map(|k| k.name).collect();
        assert_eq!(names, vec!["application_id", "pending_student_id"]);

        let approved = application
            .transitioned(ApplicationStatus::Approved)
            .unwrap();
        let names: Vec<_> = approved.unique_keys().iter().map(|k| k.name).collect();
        assert_eq!(names, vec!["application_id"]);
    }
}
