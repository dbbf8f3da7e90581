//! Identity (user account) record

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use super::{validate_email, ApplicationCode, DomainError};

/// Minimum accepted password length
const MIN_PASSWORD_LEN: usize = 8;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Admin,
}

/// Persisted account record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    /// Stored lowercased, unique across identities
    pub email: String,
    pub role: Role,
    /// Consumed application code, unique across identities
    #[serde(default)]
    pub application_code: Option<String>,
    #[serde(default)]
    pub student_id: Option<Uuid>,
    pub password_salt: String,
    pub password_hash: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    /// Create a student account bound to a consumed application code
    pub fn student(
        email: &str,
        password: &str,
        code: &ApplicationCode,
        student_id: Uuid,
    ) -> Result<Self, DomainError> {
        let email = validate_email(email)?;
        let (password_salt, password_hash) = hash_password(password)?;

        Ok(Self {
            id: Uuid::new_v4(),
            email,
            role: Role::Student,
            application_code: Some(code.to_string()),
            student_id: Some(student_id),
            password_salt,
            password_hash,
            version: 0,
            created_at: Utc::now(),
        })
    }

    pub fn verify_password(&self, password: &str) -> bool {
        let Ok(stored) = hex::decode(&self.password_hash) else {
            return false;
        };
        let candidate = salted_digest(&self.password_salt, password);
        stored.as_slice().ct_eq(candidate.as_slice()).into()
    }

    /// Public view without credential material
    pub fn view(&self) -> IdentityView {
        IdentityView {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
            application_code: self.application_code.clone(),
            student_id: self.student_id,
            created_at: self.created_at,
        }
    }
}

/// Identity as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityView {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Reject passwords that do not meet the length policy
pub fn check_password(password: &str) -> Result<(), DomainError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(DomainError::invalid(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Derive `(salt, hash)` for a new password
fn hash_password(password: &str) -> Result<(String, String), DomainError> {
    check_password(password)?;

    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt = hex::encode(salt);
    let hash = hex::encode(salted_digest(&salt, password));
    Ok((salt, hash))
}

fn salted_digest(salt: &str, password: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}

/// Random session token returned after registration.
///
/// The token is not persisted; session validation belongs to the upstream
/// gateway that issues the actor headers.
pub fn new_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code() -> ApplicationCode {
        "APP-2026-ABCDE".parse().unwrap()
    }

    #[test]
    fn test_student_identity_binds_code() {
        let student_id = Uuid::new_v4();
        let identity =
            Identity::student("New@Example.com", "correct horse", &code(), student_id).unwrap();

        assert_eq!(identity.email, "new@example.com");
        assert_eq!(identity.role, Role::Student);
        assert_eq!(identity.application_code.as_deref(), Some("APP-2026-ABCDE"));
        assert_eq!(identity.student_id, Some(student_id));
    }

    #[test]
    fn test_password_hashing() {
        let identity =
            Identity::student("a@example.com", "correct horse", &code(), Uuid::new_v4()).unwrap();

        assert_eq!(identity.password_hash.len(), 64);
        assert!(identity.verify_password("correct horse"));
        assert!(!identity.verify_password("battery staple"));
    }

    #[test]
    fn test_verify_password_rejects_damaged_hash() {
        let mut identity =
            Identity::student("a@example.com", "correct horse", &code(), Uuid::new_v4()).unwrap();

        identity.password_hash.truncate(62);
        assert!(!identity.verify_password("correct horse"));

        identity.password_hash = "not hex".to_string();
        assert!(!identity.verify_password("correct horse"));
    }

    #[test]
    fn test_short_password_rejected() {
        let result = Identity::student("a@example.com", "short", &code(), Uuid::new_v4());
        assert!(matches!(result, Err(DomainError::InvalidRequest(_))));
    }

    #[test]
    fn test_view_hides_credentials() {
        let identity =
            Identity::student("a@example.com", "correct horse", &code(), Uuid::new_v4()).unwrap();
        let json = serde_json::to_value(identity.view()).unwrap();

        assert!(json.get("password_hash").is_none());
        assert!(json.get("password_salt").is_none());
        assert_eq!(json["role"], "student");
    }

    #[test]
    fn test_session_tokens_are_random() {
        let a = new_session_token();
        let b = new_session_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }
}
