//! Transactional store used by an import
//!
//! [`ImportStore`] owns the single transaction of one import invocation.
//! Every lookup and write runs inside it and executes immediately, so ids
//! generated by earlier rows are visible to later ones. Nothing is visible
//! outside the transaction until [`ImportStore::commit`]; dropping the store
//! without committing rolls everything back.

pub mod analyses;
pub mod details;
pub mod entities;
pub mod spikes;

pub use details::DetailTable;

use sqlx::sqlite::SqliteConnection;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::time::Instant;
use tracing::{debug, warn};

pub struct ImportStore {
    tx: Option<Transaction<'static, Sqlite>>,
    audit_user: String,
    begun_at: Instant,
}

impl ImportStore {
    /// Begin the import transaction
    pub async fn begin(pool: &SqlitePool, audit_user: &str) -> Result<Self, sqlx::Error> {
        let tx = pool.begin().await?;
        debug!(audit_user, "Import transaction started");

        Ok(Self {
            tx: Some(tx),
            audit_user: audit_user.to_string(),
            begun_at: Instant::now(),
        })
    }

    /// Name written to created_by / updated_by
    pub fn audit_user(&self) -> &str {
        &self.audit_user
    }

    /// Connection of the open transaction
    pub(crate) fn conn(&mut self) -> Result<&mut SqliteConnection, sqlx::Error> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| sqlx::Error::Protocol("import transaction already finished".into()))
    }

    pub async fn commit(mut self) -> Result<(), sqlx::Error> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
            debug!(
                held_ms = self.begun_at.elapsed().as_millis() as u64,
                "Import transaction committed"
            );
        }
        Ok(())
    }

    pub async fn rollback(mut self) -> Result<(), sqlx::Error> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
            debug!(
                held_ms = self.begun_at.elapsed().as_millis() as u64,
                "Import transaction rolled back"
            );
        }
        Ok(())
    }
}

impl Drop for ImportStore {
    fn drop(&mut self) {
        // Transaction's own Drop issues the rollback
        if self.tx.is_some() {
            warn!(
                held_ms = self.begun_at.elapsed().as_millis() as u64,
                "Import transaction dropped without commit, rolling back"
            );
        }
    }
}

/// Decode failure for a stored value that no longer parses
pub(crate) fn decode_error(column: &str, value: &str) -> sqlx::Error {
    sqlx::Error::Decode(format!("unexpected value '{}' in column {}", value, column).into())
}
