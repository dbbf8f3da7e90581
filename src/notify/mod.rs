//! Notification dispatch
//!
//! Best-effort email notifications for application events. Delivery runs
//! on a spawned task; its outcome is logged and never reaches the caller.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::domain::{Application, Room};

/// Notification delivery error
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Outbound email transport
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// A rendered message ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Notification {
    /// Confirmation sent after submission, carrying the application code
    pub fn application_submitted(application: &Application) -> Self {
        Self {
            to: application.applicant.email.clone(),
            subject: "Your housing application was received".to_string(),
            body: format!(
                "Hello {},\n\nWe received your housing application. Your application code is {}.\nKeep it: you will need it to register once your application is approved.",
                application.applicant.name, application.application_id
            ),
        }
    }

    /// Approval notice, carrying the code used at registration
    pub fn application_approved(application: &Application, room: &Room) -> Self {
        Self {
            to: application.applicant.email.clone(),
            subject: "Your housing application was approved".to_string(),
            body: format!(
                "Hello {},\n\nYour application {} was approved and you have been assigned room {}.\nRegister your account with application code {} and this email address.",
                application.applicant.name,
                application.application_id,
                room.room_number,
                application.application_id
            ),
        }
    }

    pub fn application_rejected(application: &Application) -> Self {
        Self {
            to: application.applicant.email.clone(),
            subject: "Your housing application was not approved".to_string(),
            body: format!(
                "Hello {},\n\nWe are sorry, your application {} was not approved.",
                application.applicant.name, application.application_id
            ),
        }
    }
}

/// Notifier that writes messages to the log instead of sending them
#[derive(Debug, Clone)]
pub struct LogNotifier {
    from: String,
}

impl LogNotifier {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        tracing::info!(
            from = %self.from,
            to = %to,
            subject = %subject,
            body_len = body.len(),
            "Email notification"
        );
        Ok(())
    }
}

/// Fire-and-forget front of a `Notifier`
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Deliver on a background task. Callers must not hold any engine lock.
    pub fn dispatch(&self, notification: Notification) -> JoinHandle<()> {
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            match notifier
                .send(&notification.to, &notification.subject, &notification.body)
                .await
            {
                Ok(()) => tracing::debug!(to = %notification.to, "Notification delivered"),
                Err(e) => tracing::warn!(
                    to = %notification.to,
                    subject = %notification.subject,
                    error = %e,
                    "Notification delivery failed"
                ),
            }
        })
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ApplicantDetails;
    use std::sync::Mutex;
    use uuid::Uuid;

    struct Recording(Mutex<Vec<String>>);

    #[async_trait]
    impl Notifier for Recording {
        async fn send(&self, to: &str, _subject: &str, _body: &str) -> Result<(), NotifyError> {
            self.0.lock().unwrap().push(to.to_string());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl Notifier for Failing {
        async fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<(), NotifyError> {
            Err(NotifyError::Transport("smtp down".to_string()))
        }
    }

    fn application() -> Application {
        Application::submit(
            ApplicantDetails {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                phone: String::new(),
                student_id: "S-1".to_string(),
                program: "CS".to_string(),
                year_of_study: 1,
            },
            Uuid::new_v4(),
        )
    }

    #[test]
    fn test_templates_carry_code() {
        let application = application();
        let room = Room::new("R101", 1).unwrap();

        let submitted = Notification::application_submitted(&application);
        assert_eq!(submitted.to, "ada@example.com");
        assert!(submitted.body.contains(application.application_id.as_str()));

        let approved = Notification::application_approved(&application, &room);
        assert!(approved.body.contains("R101"));
        assert!(approved.body.contains(application.application_id.as_str()));
    }

    #[tokio::test]
    async fn test_dispatch_delivers() {
        let recording = Arc::new(Recording(Mutex::new(Vec::new())));
        let dispatcher = NotificationDispatcher::new(recording.clone());

        dispatcher
            .dispatch(Notification::application_rejected(&application()))
            .await
            .unwrap();

        assert_eq!(*recording.0.lock().unwrap(), vec!["ada@example.com"]);
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_contained() {
        let dispatcher = NotificationDispatcher::new(Arc::new(Failing));

        let handle = dispatcher.dispatch(Notification::application_submitted(&application()));
        // The task completes normally even though delivery failed
        assert!(handle.await.is_ok());
    }
}
