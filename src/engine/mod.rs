//! Consistency engines
//!
//! The assignment, application lifecycle and registration engines, plus the
//! shared lock registry they serialize on. All engines built by
//! `Engines::new` share one `LockRegistry`, which is what makes their
//! critical sections mutually exclusive.

pub mod assignment;
pub mod commands;
pub mod lifecycle;
pub mod locks;
pub mod records;
pub mod registration;

use std::sync::Arc;

use crate::notify::{Notifier, NotificationDispatcher};
use crate::store::Stores;

pub use assignment::AssignmentEngine;
pub use commands::*;
pub use lifecycle::ApplicationLifecycle;
pub use locks::{EntityGuard, LockRegistry, LockScope};
pub use records::RecordService;
pub use registration::RegistrationBinding;

/// Every engine, wired to the same stores and locks
#[derive(Debug, Clone)]
pub struct Engines {
    pub stores: Stores,
    pub locks: LockRegistry,
    pub assignments: AssignmentEngine,
    pub applications: ApplicationLifecycle,
    pub registration: RegistrationBinding,
    pub records: RecordService,
}

impl Engines {
    pub fn new(stores: Stores, notifier: Arc<dyn Notifier>) -> Self {
        let locks = LockRegistry::new();
        let assignments = AssignmentEngine::new(stores.clone(), locks.clone());
        let applications = ApplicationLifecycle::new(
            stores.clone(),
            locks.clone(),
            assignments.clone(),
            NotificationDispatcher::new(notifier),
        );

        Self {
            registration: RegistrationBinding::new(stores.clone(), locks.clone()),
            records: RecordService::new(stores.clone(), locks.clone()),
            assignments,
            applications,
            stores,
            locks,
        }
    }
}
