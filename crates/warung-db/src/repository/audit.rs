//! # Audit Repository
//!
//! Database operations for audit sessions, per-product results, and
//! numbered report exports.
//!
//! ## Two Kinds of Audit Records
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  audit_sessions / audit_results    LIVE, keyed by calendar date        │
//! │    - at most one session per date                                      │
//! │    - results upserted on every scan (durability per scan)              │
//! │    - resumable indefinitely                                            │
//! │                                                                         │
//! │  audit_reports                     FROZEN, keyed by sequential ID      │
//! │    - point-in-time JSON snapshot of classified lines                   │
//! │    - written once at session closure, never touched again              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use warung_core::{AuditLine, AuditReport, AuditResult, AuditStatus, StockMode};

/// Session metadata row (results are loaded separately).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRow {
    pub session_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw result row; `scanned_unit_ids` is stored as a JSON array.
#[derive(Debug, sqlx::FromRow)]
struct ResultRow {
    product_id: String,
    product_name: String,
    stock_mode: StockMode,
    system_stock: i64,
    min_stock: i64,
    physical_stock: Option<i64>,
    scanned_unit_ids: String,
    status: AuditStatus,
    updated_at: DateTime<Utc>,
}

impl ResultRow {
    fn into_result(self) -> DbResult<AuditResult> {
        let scanned_unit_ids: Vec<String> = serde_json::from_str(&self.scanned_unit_ids)?;
        Ok(AuditResult {
            product_id: self.product_id,
            product_name: self.product_name,
            stock_mode: self.stock_mode,
            system_stock: self.system_stock,
            min_stock: self.min_stock,
            physical_stock: self.physical_stock,
            scanned_unit_ids,
            status: self.status,
            updated_at: self.updated_at,
        })
    }
}

/// Raw report row; `snapshot` is the frozen JSON line array.
#[derive(Debug, sqlx::FromRow)]
struct ReportRow {
    id: i64,
    report_number: String,
    session_date: NaiveDate,
    snapshot: String,
    created_at: DateTime<Utc>,
}

impl ReportRow {
    fn into_report(self) -> DbResult<AuditReport> {
        let lines: Vec<AuditLine> = serde_json::from_str(&self.snapshot)?;
        Ok(AuditReport {
            id: self.id,
            report_number: self.report_number,
            session_date: self.session_date,
            created_at: self.created_at,
            lines,
        })
    }
}

const RESULT_COLUMNS: &str = "product_id, product_name, stock_mode, system_stock, \
     min_stock, physical_stock, scanned_unit_ids, status, updated_at";

/// Repository for audit session database operations.
#[derive(Debug, Clone)]
pub struct AuditRepository {
    pool: SqlitePool,
}

impl AuditRepository {
    /// Creates a new AuditRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AuditRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Sessions
    // -------------------------------------------------------------------------

    /// Gets session metadata for a date, if a session exists.
    pub async fn get_session(&self, date: NaiveDate) -> DbResult<Option<SessionRow>> {
        let session = sqlx::query_as::<_, SessionRow>(
            "SELECT session_date, created_at, updated_at \
             FROM audit_sessions WHERE session_date = ?1",
        )
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// Creates a new session for a date.
    pub async fn insert_session(&self, date: NaiveDate, now: DateTime<Utc>) -> DbResult<()> {
        debug!(date = %date, "Creating audit session");

        sqlx::query(
            "INSERT INTO audit_sessions (session_date, created_at, updated_at) \
             VALUES (?1, ?2, ?2)",
        )
        .bind(date)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Stamps the session's `updated_at`.
    pub async fn touch_session(&self, date: NaiveDate, now: DateTime<Utc>) -> DbResult<()> {
        sqlx::query("UPDATE audit_sessions SET updated_at = ?2 WHERE session_date = ?1")
            .bind(date)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Results
    // -------------------------------------------------------------------------

    /// Loads all stored results for a session, ordered by product name.
    pub async fn get_results(&self, date: NaiveDate) -> DbResult<Vec<AuditResult>> {
        let rows = sqlx::query_as::<_, ResultRow>(&format!(
            "SELECT {RESULT_COLUMNS} FROM audit_results \
             WHERE session_date = ?1 ORDER BY product_name, product_id"
        ))
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ResultRow::into_result).collect()
    }

    /// Loads one product's result within a session.
    pub async fn get_result(
        &self,
        date: NaiveDate,
        product_id: &str,
    ) -> DbResult<Option<AuditResult>> {
        let row = sqlx::query_as::<_, ResultRow>(&format!(
            "SELECT {RESULT_COLUMNS} FROM audit_results \
             WHERE session_date = ?1 AND product_id = ?2"
        ))
        .bind(date)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ResultRow::into_result).transpose()
    }

    /// Inserts or replaces one product's result within a session.
    ///
    /// Called on every scan: durability per scan is a deliberate design
    /// choice so an interrupted session loses at most one scan.
    pub async fn upsert_result(&self, date: NaiveDate, result: &AuditResult) -> DbResult<()> {
        let scanned = serde_json::to_string(&result.scanned_unit_ids)?;

        sqlx::query(
            r#"
            INSERT INTO audit_results (
                session_date, product_id, product_name, stock_mode,
                system_stock, min_stock, physical_stock, scanned_unit_ids,
                status, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT (session_date, product_id) DO UPDATE SET
                physical_stock = excluded.physical_stock,
                scanned_unit_ids = excluded.scanned_unit_ids,
                status = excluded.status,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(date)
        .bind(&result.product_id)
        .bind(&result.product_name)
        .bind(result.stock_mode)
        .bind(result.system_stock)
        .bind(result.min_stock)
        .bind(result.physical_stock)
        .bind(scanned)
        .bind(result.status)
        .bind(result.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Reports
    // -------------------------------------------------------------------------

    /// Persists an immutable numbered report snapshot.
    pub async fn insert_report(&self, report: &AuditReport) -> DbResult<()> {
        debug!(id = %report.id, number = %report.report_number, "Persisting audit report");

        let snapshot = serde_json::to_string(&report.lines)?;

        sqlx::query(
            r#"
            INSERT INTO audit_reports (id, report_number, session_date, snapshot, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(report.id)
        .bind(&report.report_number)
        .bind(report.session_date)
        .bind(snapshot)
        .bind(report.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a report by its sequential ID.
    pub async fn get_report(&self, id: i64) -> DbResult<Option<AuditReport>> {
        let row = sqlx::query_as::<_, ReportRow>(
            "SELECT id, report_number, session_date, snapshot, created_at \
             FROM audit_reports WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ReportRow::into_report).transpose()
    }

    /// Lists recent reports, newest first.
    pub async fn list_reports(&self, limit: i64) -> DbResult<Vec<AuditReport>> {
        let rows = sqlx::query_as::<_, ReportRow>(
            "SELECT id, report_number, session_date, snapshot, created_at \
             FROM audit_reports ORDER BY id DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ReportRow::into_report).collect()
    }
}
