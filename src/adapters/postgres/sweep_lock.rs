//! Cross-process sweep lock on a PostgreSQL advisory lock.
//!
//! Advisory locks belong to a session, so the connection that took the lock
//! is kept out of the pool until it is released.

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};
use tokio::sync::Mutex;

use crate::domain::foundation::DomainError;
use crate::ports::SweepLock;

/// Advisory lock key shared by every instance of the service.
const SWEEP_LOCK_KEY: i64 = 0x5347_5357_4545_5001;

pub struct PgSweepLock {
    pool: PgPool,
    held: Mutex<Option<PoolConnection<Postgres>>>,
}

impl PgSweepLock {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            held: Mutex::new(None),
        }
    }
}

#[async_trait]
impl SweepLock for PgSweepLock {
    async fn try_acquire(&self) -> Result<bool, DomainError> {
        let mut held = self.held.lock().await;
        if held.is_some() {
            return Ok(false);
        }

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| DomainError::database(format!("Failed to acquire connection: {}", e)))?;
        let (acquired,): (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
            .bind(SWEEP_LOCK_KEY)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| DomainError::database(format!("Failed to take sweep lock: {}", e)))?;

        if acquired {
            *held = Some(conn);
        }
        Ok(acquired)
    }

    async fn release(&self) -> Result<(), DomainError> {
        let Some(mut conn) = self.held.lock().await.take() else {
            return Ok(());
        };
        let unlocked = sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(SWEEP_LOCK_KEY)
            .execute(&mut *conn)
            .await;
        if let Err(e) = unlocked {
            // Closing the session drops the lock with it.
            drop(conn.detach());
            return Err(DomainError::database(format!(
                "Failed to release sweep lock: {}",
                e
            )));
        }
        Ok(())
    }
}
