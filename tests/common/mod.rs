//! Shared test setup

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use approval::store::{self, Store};
use approval::workflow::{Notifier, RejectionNotice, Workflow};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

/// Single-connection in-memory database with the schema applied
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");

    store::migrate(&pool).await.expect("Failed to run migrations");
    pool
}

/// On-disk database shared by several connections; removed on drop
pub struct FileDb {
    pub pool: SqlitePool,
    path: PathBuf,
}

impl FileDb {
    pub async fn new(tag: &str) -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "approval-{}-{}-{}.db",
            tag,
            std::process::id(),
            nanos
        ));

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .busy_timeout(std::time::Duration::from_secs(10));
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .expect("Failed to open file database");

        store::migrate(&pool).await.expect("Failed to run migrations");
        Self { pool, path }
    }
}

impl Drop for FileDb {
    fn drop(&mut self) {
        for suffix in ["", "-journal", "-wal", "-shm"] {
            let mut p = self.path.clone().into_os_string();
            p.push(suffix);
            let _ = std::fs::remove_file(p);
        }
    }
}

/// Notifier that keeps every notice for inspection
#[derive(Default)]
pub struct RecordingNotifier {
    pub notices: std::sync::Mutex<Vec<RejectionNotice>>,
}

impl RecordingNotifier {
    pub fn take(&self) -> Vec<RejectionNotice> {
        std::mem::take(&mut *self.notices.lock().unwrap())
    }
}

impl Notifier for RecordingNotifier {
    fn on_reject(&self, notice: RejectionNotice) {
        self.notices.lock().unwrap().push(notice);
    }
}

pub async fn workflow() -> (Workflow, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let workflow = Workflow::new(Store::new(memory_pool().await), notifier.clone());
    (workflow, notifier)
}
