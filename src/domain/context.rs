//! Operation Context
//!
//! Contains metadata about the current operation for authorization and tracing.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use uuid::Uuid;

/// Who is performing the operation.
///
/// Populated from headers set by the upstream gateway; token verification
/// happens before requests reach this service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Actor {
    Admin,
    Applicant { email: String },
}

/// Context for an operation, used for authorization and tracing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationContext {
    /// Caller identity, if the gateway supplied one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<Actor>,

    /// Correlation ID for request tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,

    /// Client IP address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<IpAddr>,
}

impl OperationContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self {
            actor: None,
            correlation_id: None,
            client_ip: None,
        }
    }

    /// Context for an administrator
    pub fn admin() -> Self {
        Self::new().with_actor(Actor::Admin)
    }

    /// Context for an applicant identified by email
    pub fn applicant(email: impl Into<String>) -> Self {
        Self::new().with_actor(Actor::Applicant {
            email: email.into(),
        })
    }

    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Create context with correlation ID
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Create context with client IP
    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }

    /// Generate a new correlation ID if not present
    pub fn ensure_correlation_id(&mut self) -> Uuid {
        *self.correlation_id.get_or_insert_with(Uuid::new_v4)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.actor, Some(Actor::Admin))
    }

    /// Email of the applicant performing the operation, if any
    pub fn applicant_email(&self) -> Option<&str> {
        match &self.actor {
            Some(Actor::Applicant { email }) => Some(email.as_str()),
            _ => None,
        }
    }
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::new()
    }
}
