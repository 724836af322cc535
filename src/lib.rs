//! Letter approval server - role-gated routing of documents through a fixed approval chain

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod store;
pub mod workflow;

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::workflow::{NotificationHub, Workflow};

/// Application state shared across handlers
pub struct AppState {
    pub workflow: Workflow,
    pub notifications: Arc<NotificationHub>,
}

impl AppState {
    pub fn new(pool: SqlitePool) -> Arc<Self> {
        Self::with_notifications(pool, NotificationHub::default())
    }

    pub fn with_notifications(pool: SqlitePool, hub: NotificationHub) -> Arc<Self> {
        let notifications = Arc::new(hub);
        Arc::new(Self {
            workflow: Workflow::new(store::Store::new(pool), notifications.clone()),
            notifications,
        })
    }
}
