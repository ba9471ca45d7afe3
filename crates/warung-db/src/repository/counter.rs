//! # Counter Repository
//!
//! Atomic monotonic counters for sequential ID generation.
//!
//! ## Why Not Read-Then-Write?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ❌ WRONG: read-increment-write (duplicate IDs under two writers)      │
//! │     SELECT value FROM counters WHERE name = ?                          │
//! │     UPDATE counters SET value = ? + 1                                  │
//! │                                                                         │
//! │  ✅ CORRECT: single-statement UPSERT with RETURNING                    │
//! │     INSERT INTO counters (name, value) VALUES (?, 1)                   │
//! │     ON CONFLICT (name) DO UPDATE SET value = value + 1                 │
//! │     RETURNING value                                                    │
//! │                                                                         │
//! │  The increment and the read happen in one statement, so two           │
//! │  concurrent writers can never observe the same value.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;

/// Counter name used for sequential audit report IDs.
pub const AUDIT_REPORT_COUNTER: &str = "audit_report";

/// Repository for monotonic counter operations.
#[derive(Debug, Clone)]
pub struct CounterRepository {
    pool: SqlitePool,
}

impl CounterRepository {
    /// Creates a new CounterRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CounterRepository { pool }
    }

    /// Atomically increments a counter and returns the new value.
    ///
    /// The first call for a name returns 1.
    pub async fn next(&self, name: &str) -> DbResult<i64> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO counters (name, value) VALUES (?1, 1)
            ON CONFLICT (name) DO UPDATE SET value = value + 1
            RETURNING value
            "#,
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        debug!(name = %name, value = %value, "Counter incremented");
        Ok(value)
    }

    /// Reads a counter without incrementing. Returns 0 if never used.
    pub async fn current(&self, name: &str) -> DbResult<i64> {
        let value: Option<i64> =
            sqlx::query_scalar("SELECT value FROM counters WHERE name = ?1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;

        Ok(value.unwrap_or(0))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
