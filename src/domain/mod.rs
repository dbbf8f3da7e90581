//! Domain module
//!
//! Core record types, the application state machine and the error taxonomy.

pub mod application;
pub mod code;
pub mod context;
pub mod error;
pub mod identity;
pub mod room;
pub mod student;

pub use application::{Application, ApplicantDetails, ApplicationStatus, ApplicationSummary};
pub use code::{ApplicationCode, CodeFormatError};
pub use context::{Actor, OperationContext};
pub use error::DomainError;
pub use identity::{check_password, new_session_token, Identity, IdentityView, Role};
pub use room::{Room, RoomView};
pub use student::{Student, StudentSummary};

/// Trim, lowercase and sanity-check an email address
pub fn validate_email(raw: &str) -> Result<String, DomainError> {
    let email = raw.trim().to_ascii_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };

    if valid && !email.contains(char::is_whitespace) {
        Ok(email)
    } else {
        Err(DomainError::invalid(format!("invalid email address '{}'", raw.trim())))
    }
}
