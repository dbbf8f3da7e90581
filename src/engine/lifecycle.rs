//! Application Lifecycle Engine
//!
//! Drives an application from `pending` to exactly one terminal status.
//! Approval is the only transition with side effects: it resolves or
//! creates the applicant's student record and hands the room binding to the
//! assignment engine. The status flips to `approved` only after that
//! binding succeeded, and the binding is undone if the flip cannot be
//! written.

use uuid::Uuid;

use crate::domain::{
    Application, ApplicantDetails, ApplicationCode, ApplicationStatus, DomainError,
    OperationContext, Room, Student,
};
use crate::error::{AppError, AppResult};
use crate::notify::{Notification, NotificationDispatcher};
use crate::store::{Filter, Stores};

use super::assignment::AssignmentEngine;
use super::commands::SubmitApplicationCommand;
use super::locks::{LockRegistry, LockScope};

/// Attempts at drawing an unused application code
const MAX_CODE_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone)]
pub struct ApplicationLifecycle {
    stores: Stores,
    locks: LockRegistry,
    assignments: AssignmentEngine,
    dispatcher: NotificationDispatcher,
}

impl ApplicationLifecycle {
    pub fn new(
        stores: Stores,
        locks: LockRegistry,
        assignments: AssignmentEngine,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            stores,
            locks,
            assignments,
            dispatcher,
        }
    }

    // =========================================================================
    // submit
    // =========================================================================

    /// Validate and store a new pending application
    pub async fn submit(
        &self,
        command: SubmitApplicationCommand,
        context: &OperationContext,
    ) -> AppResult<Application> {
        let applicant = command.applicant.normalized()?;
        let room_id = command.room_id;

        let application = {
            let _applicant_guard = self
                .locks
                .lock(LockScope::Applicant, &applicant.student_id)
                .await;

            let room = self.load_room(room_id).await?;
            if !room.is_available || !room.has_free_slot() {
                return Err(DomainError::RoomNoLongerAvailable { room_id }.into());
            }

            if self.pending_for(&applicant.student_id).await?.is_some() {
                return Err(DomainError::DuplicatePendingApplication {
                    student_id: applicant.student_id,
                }
                .into());
            }

            self.insert_pending(applicant, room_id).await?
        };

        tracing::info!(
            application_id = %application.application_id,
            room_id = %room_id,
            student_id = %application.applicant.student_id,
            correlation_id = ?context.correlation_id,
            "Application submitted"
        );

        self.dispatcher
            .dispatch(Notification::application_submitted(&application));

        Ok(application)
    }

    /// Insert, redrawing the code on collision. The partial unique key on
    /// pending applications catches a racing submit from another process.
    async fn insert_pending(
        &self,
        applicant: ApplicantDetails,
        room_id: Uuid,
    ) -> AppResult<Application> {
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let application = Application::submit(applicant.clone(), room_id);
            match self.stores.applications.insert(application).await {
                Ok(application) => return Ok(application),
                Err(e) if e.is_unique_violation_on("application_id") => {
                    tracing::debug!(attempt, "Application code collision, drawing again");
                }
                Err(e) if e.is_unique_violation_on("pending_student_id") => {
                    return Err(DomainError::DuplicatePendingApplication {
                        student_id: applicant.student_id,
                    }
                    .into());
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Internal(format!(
            "no unused application code after {MAX_CODE_ATTEMPTS} attempts"
        )))
    }

    // =========================================================================
    // updateStatus
    // =========================================================================

    /// Move an application, addressed by id or code, to `status`
    pub async fn update_status(
        &self,
        reference: &str,
        status: ApplicationStatus,
        context: &OperationContext,
    ) -> AppResult<Application> {
        match status {
            ApplicationStatus::Approved | ApplicationStatus::Rejected if !context.is_admin() => {
                return Err(DomainError::Forbidden(format!(
                    "only an administrator may set status {status}"
                ))
                .into());
            }
            _ => {}
        }

        let id = self.get(reference).await?.id;
        let application_guard = self.locks.lock(LockScope::Application, id).await;

        // Reload inside the critical section
        let application = self.load(id).await?;
        if status == ApplicationStatus::Cancelled {
            ensure_owner(&application, context)?;
        }
        // Terminal states and pending -> pending are refused before any side effect
        application.status.transition(status)?;

        let (application, notification) = match status {
            ApplicationStatus::Approved => {
                let (application, room) = self.approve(application).await?;
                let notification = Notification::application_approved(&application, &room);
                (application, Some(notification))
            }
            ApplicationStatus::Rejected => {
                let application = self.flip(&application, status).await?;
                let notification = Notification::application_rejected(&application);
                (application, Some(notification))
            }
            _ => (self.flip(&application, status).await?, None),
        };

        drop(application_guard);

        tracing::info!(
            application_id = %application.application_id,
            status = %application.status,
            correlation_id = ?context.correlation_id,
            "Application status updated"
        );

        if let Some(notification) = notification {
            self.dispatcher.dispatch(notification);
        }

        Ok(application)
    }

    /// Applicant-side cancellation
    pub async fn cancel(&self, reference: &str, context: &OperationContext) -> AppResult<Application> {
        self.update_status(reference, ApplicationStatus::Cancelled, context)
            .await
    }

    async fn flip(&self, application: &Application, to: ApplicationStatus) -> AppResult<Application> {
        let updated = application.transitioned(to)?;
        Ok(self.stores.applications.save(updated).await?)
    }

    /// Approval steps, run inside the application critical section
    async fn approve(&self, application: Application) -> AppResult<(Application, Room)> {
        let _applicant_guard = self
            .locks
            .lock(LockScope::Applicant, &application.applicant.student_id)
            .await;

        let room_id = application.room_id;
        let room = self.load_room(room_id).await?;
        if !room.is_available || !room.has_free_slot() {
            tracing::info!(
                application_id = %application.application_id,
                room_id = %room_id,
                "Approval refused, room is full"
            );
            return Err(DomainError::RoomNoLongerAvailable { room_id }.into());
        }

        let student = self.resolve_student(&application.applicant).await?;

        self.assignments
            .assign(room_id, student.id)
            .await
            .map_err(|e| match e.domain() {
                Some(DomainError::CapacityExceeded { .. }) => {
                    DomainError::RoomNoLongerAvailable { room_id }.into()
                }
                Some(DomainError::AlreadyAssigned { .. }) => DomainError::StudentAlreadyAssigned {
                    student_id: student.student_id.clone(),
                }
                .into(),
                _ => e,
            })?;

        let approved = application.transitioned(ApplicationStatus::Approved)?;
        match self.stores.applications.save(approved).await {
            Ok(approved) => Ok((approved, room)),
            Err(e) => {
                tracing::warn!(
                    application_id = %application.application_id,
                    room_id = %room_id,
                    student_id = %student.id,
                    error = %e,
                    "Approval write failed after assignment, releasing room"
                );
                if let Err(undo) = self.assignments.unassign(room_id, student.id).await {
                    tracing::error!(
                        application_id = %application.application_id,
                        room_id = %room_id,
                        student_id = %student.id,
                        error = %undo,
                        "Could not release room after failed approval"
                    );
                }
                Err(e.into())
            }
        }
    }

    /// Find the applicant's student record by external id or email, creating
    /// it when absent and refreshing the profile fields when present
    async fn resolve_student(&self, applicant: &ApplicantDetails) -> AppResult<Student> {
        let existing = match self
            .stores
            .students
            .find_one(&Filter::new().eq("student_id", &applicant.student_id))
            .await?
        {
            Some(student) => Some(student),
            None => {
                self.stores
                    .students
                    .find_one(&Filter::new().eq_ignore_case("email", &applicant.email))
                    .await?
            }
        };

        match existing {
            Some(student) if student.assigned_room.is_some() => {
                Err(DomainError::StudentAlreadyAssigned {
                    student_id: applicant.student_id.clone(),
                }
                .into())
            }
            Some(student) => {
                let mut updated = student.clone();
                updated.name = applicant.name.clone();
                if !applicant.phone.is_empty() {
                    updated.phone = applicant.phone.clone();
                }
                updated.program = Some(applicant.program.clone());
                updated.year_of_study = Some(applicant.year_of_study);

                if updated == student {
                    return Ok(student);
                }
                updated.updated_at = chrono::Utc::now();
                Ok(self.stores.students.save(updated).await?)
            }
            None => {
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
                    .map_err(super::records::duplicate_record)?;

                tracing::info!(
                    student_id = %student.id,
                    external_id = %student.student_id,
                    "Student created from application"
                );
                Ok(student)
            }
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Application by record id or by application code
    pub async fn get(&self, reference: &str) -> AppResult<Application> {
        let reference = reference.trim();
        if let Ok(id) = Uuid::parse_str(reference) {
            return self.load(id).await;
        }

        let code: ApplicationCode = reference
            .parse()
            .map_err(|_| DomainError::not_found("Application", reference))?;
        self.stores
            .applications
            .find_one(&Filter::new().eq("application_id", code.as_str()))
            .await?
            .ok_or_else(|| DomainError::not_found("Application", reference).into())
    }

    async fn load(&self, id: Uuid) -> AppResult<Application> {
        self.stores
            .applications
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Application", id).into())
    }

    async fn load_room(&self, room_id: Uuid) -> AppResult<Room> {
        self.stores
            .rooms
            .get(room_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Room", room_id).into())
    }

    async fn pending_for(&self, student_id: &str) -> AppResult<Option<Application>> {
        Ok(self
            .stores
            .applications
            .find_one(
                &Filter::new()
                    .eq("applicant.student_id", student_id)
                    .eq("status", ApplicationStatus::Pending.as_str()),
            )
            .await?)
    }
}

fn ensure_owner(application: &Application, context: &OperationContext) -> Result<(), DomainError> {
    match context.applicant_email() {
        Some(email) if application.belongs_to(email) => Ok(()),
        _ => Err(DomainError::Forbidden(
            "only the applicant may cancel this application".to_string(),
        )),
    }
}
