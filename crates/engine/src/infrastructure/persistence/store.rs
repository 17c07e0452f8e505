//! SQLite store and unit-of-work boundaries.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use taleweaver_domain::OwnerId;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::schema;
use crate::infrastructure::ports::RepoError;

/// Connection pool plus the single writer lock.
///
/// Write units of work are serialized by the lock; read units of work only
/// take a connection.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    writer: Arc<Mutex<()>>,
}

impl SqliteStore {
    /// Open (creating if needed) a database file and ensure the schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, RepoError> {
        let path = path.as_ref();
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| RepoError::transaction("open", e))?;

        let store = Self::from_pool(pool).await?;
        tracing::info!(path = %path.display(), "Opened relational store");
        Ok(store)
    }

    /// A private in-memory database. Everything shares one connection, so the
    /// database lives as long as the store.
    pub async fn in_memory() -> Result<Self, RepoError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| RepoError::transaction("open", e))?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| RepoError::transaction("open", e))?;
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self, RepoError> {
        schema::ensure_schema(&pool).await?;
        Ok(Self {
            pool,
            writer: Arc::new(Mutex::new(())),
        })
    }

    pub async fn begin_write(&self) -> Result<UnitOfWork, RepoError> {
        let guard = self.writer.clone().lock_owned().await;
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::transaction("begin", e))?;
        Ok(UnitOfWork {
            tx,
            _writer: Some(guard),
        })
    }

    pub async fn begin_read(&self) -> Result<UnitOfWork, RepoError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::transaction("begin", e))?;
        Ok(UnitOfWork { tx, _writer: None })
    }

    /// Durable counters `(prefix, owner, last_numeric)` for seeding the allocator.
    pub async fn load_counters(&self) -> Result<Vec<(String, OwnerId, u64)>, RepoError> {
        let rows: Vec<(String, i64, i64)> =
            sqlx::query_as("SELECT prefix, owner, last_numeric FROM id_counters")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| RepoError::transaction("load_counters", e))?;

        rows.into_iter()
            .map(|(prefix, owner, last)| {
                let owner = OwnerId::new(owner).map_err(RepoError::serialization)?;
                let last = u64::try_from(last).map_err(RepoError::serialization)?;
                Ok::<_, RepoError>((prefix, owner, last))
            })
            .collect()
    }
}

/// One transaction. Dropping it without [`UnitOfWork::commit`] rolls back.
pub struct UnitOfWork {
    // Declared before the guard so the transaction ends before the lock is released.
    tx: Transaction<'static, Sqlite>,
    _writer: Option<OwnedMutexGuard<()>>,
}

impl UnitOfWork {
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    pub async fn commit(self) -> Result<(), RepoError> {
        self.tx
            .commit()
            .await
            .map_err(|e| RepoError::transaction("commit", e))
    }

    pub async fn rollback(self) -> Result<(), RepoError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| RepoError::transaction("rollback", e))
    }

    /// Commit on success, roll back on failure. A failed rollback is logged and
    /// the original error returned.
    pub async fn finish<T>(self, result: Result<T, RepoError>) -> Result<T, RepoError> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback().await {
                    tracing::error!(error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }
}
