//! Registration Binding Engine
//!
//! An application code can be consumed by one identity, ever. `verify_code`
//! only reads; consumption happens in `register`, where the identity insert
//! itself claims the code through the store's unique key on
//! `application_code`. A second registration racing past the pre-checks
//! loses at that insert and is reported as `CodeAlreadyConsumed`.

use crate::domain::{
    check_password, new_session_token, validate_email, Application, ApplicationCode,
    ApplicationStatus, ApplicationSummary, DomainError, Identity, Student,
};
use crate::error::{AppError, AppResult};
use crate::store::{Filter, Stores};

use super::commands::{RegisterCommand, RegistrationResult};
use super::locks::{LockRegistry, LockScope};
use super::records::duplicate_record;

#[derive(Debug, Clone)]
pub struct RegistrationBinding {
    stores: Stores,
    locks: LockRegistry,
}

impl RegistrationBinding {
    pub fn new(stores: Stores, locks: LockRegistry) -> Self {
        Self { stores, locks }
    }

    /// Check a code and email pair without consuming the code
    pub async fn verify_code(&self, code: &str, email: &str) -> AppResult<ApplicationSummary> {
        let code = parse_code(code)?;
        let application = self.usable_application(&code, email).await?;
        Ok(application.summary())
    }

    /// Consume the code and create the account bound to the applicant's
    /// student record
    pub async fn register(&self, command: RegisterCommand) -> AppResult<RegistrationResult> {
        let code = parse_code(&command.application_code)?;
        let email = validate_email(&command.email)?;
        check_password(&command.password)?;

        let application = self.usable_application(&code, &email).await?;

        let _applicant_guard = self
            .locks
            .lock(LockScope::Applicant, &application.applicant.student_id)
            .await;
        let _code_guard = self.locks.lock(LockScope::Code, code.as_str()).await;

        // Same checks again, now inside the critical section
        let application = self.usable_application(&code, &email).await?;
        if self
            .stores
            .identities
            .find_one(&Filter::new().eq_ignore_case("email", &email))
            .await?
            .is_some()
        {
            return Err(DomainError::EmailAlreadyRegistered { email }.into());
        }

        let student = self.resolve_student(&application).await?;
        let identity = Identity::student(&email, &command.password, &code, student.id)?;

        let identity = self
            .stores
            .identities
            .insert(identity)
            .await
            .map_err(|e| -> AppError {
                if e.is_unique_violation_on("application_code") {
                    DomainError::CodeAlreadyConsumed {
                        code: code.to_string(),
                    }
                    .into()
                } else if e.is_unique_violation_on("email") {
                    DomainError::EmailAlreadyRegistered {
                        email: email.clone(),
                    }
                    .into()
                } else {
                    e.into()
                }
            })?;

        tracing::info!(
            identity_id = %identity.id,
            application_id = %code,
            student_id = %student.id,
            "Account registered with application code"
        );

        Ok(RegistrationResult {
            identity: identity.view(),
            student: student.summary(),
            session_token: new_session_token(),
        })
    }

    /// Application for `code` that `email` may still register with
    async fn usable_application(
        &self,
        code: &ApplicationCode,
        email: &str,
    ) -> AppResult<Application> {
        let application = self
            .stores
            .applications
            .find_one(&Filter::new().eq("application_id", code.as_str()))
            .await?
            .filter(|application| application.belongs_to(email))
            .ok_or(DomainError::InvalidCode)?;

        if matches!(
            application.status,
            ApplicationStatus::Rejected | ApplicationStatus::Cancelled
        ) {
            return Err(DomainError::InvalidCode.into());
        }

        if self
            .stores
            .identities
            .find_one(&Filter::new().eq("application_code", code.as_str()))
            .await?
            .is_some()
        {
            return Err(DomainError::CodeAlreadyConsumed {
                code: code.to_string(),
            }
            .into());
        }

        Ok(application)
    }

    /// The student created at approval, or a new unassigned one for an
    /// application still pending
    async fn resolve_student(&self, application: &Application) -> AppResult<Student> {
        let applicant = &application.applicant;

        if let Some(student) = self
            .stores
            .students
            .find_one(&Filter::new().eq("student_id", &applicant.student_id))
            .await?
        {
            return Ok(student);
        }
        if let Some(student) = self
            .stores
            .students
            .find_one(&Filter::new().eq_ignore_case("email", &applicant.email))
            .await?
        {
            return Ok(student);
        }

        let student = Student::new(
            &applicant.student_id,
            &applicant.name,
            &applicant.email,
            &applicant.phone,
        )?
        .with_program(
            Some(applicant.program.clone()),
            Some(applicant.year_of_study),
        );

        let student = self
            .stores
            .students
            .insert(student)
            .await
            .map_err(duplicate_record)?;

        tracing::debug!(
            student_id = %student.id,
            application_id = %application.application_id,
            "Student created at registration"
        );
        Ok(student)
    }
}

fn parse_code(raw: &str) -> Result<ApplicationCode, DomainError> {
    raw.parse().map_err(|_| DomainError::InvalidCode)
}
