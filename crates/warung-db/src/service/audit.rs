//! # Audit Session Engine
//!
//! Calendar-day reconciliation sessions: start or resume, scan units,
//! enter manual counts, finalize items, and export immutable numbered
//! reports.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  start_or_resume(date)                                                  │
//! │    - at most one session per calendar date                             │
//! │    - new products entering an existing session get a fresh             │
//! │      system_stock snapshot; prior results are never overwritten        │
//! │                                                                         │
//! │  per item:   PENDING ──(finalize / manual count)──► COMPLETED          │
//! │              COMPLETED ──(reopen, explicit policy)──► PENDING          │
//! │                                                                         │
//! │  every scan upserts the result row: an interrupted session loses       │
//! │  at most one scan                                                      │
//! │                                                                         │
//! │  close_session(date)                                                   │
//! │    - exports a frozen, sequentially numbered report                    │
//! │    - the by-date session itself stays live and resumable               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Semantics
//! `system_stock` is captured when a product enters the session and is
//! deliberately NOT refreshed by concurrent sales. The audit answers
//! "does the shelf match what the system believed when counting began",
//! not "what is the system count right now". Sold units are still kept
//! out of the physical count: scanning a unit that was sold after the
//! snapshot is rejected as `UnitNotAvailable`.

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;
use crate::repository::audit::AuditRepository;
use crate::repository::counter::{CounterRepository, AUDIT_REPORT_COUNTER};
use crate::service::stock::StockService;
use warung_core::validation::{validate_manual_count, validate_tag};
use warung_core::{
    variance, AuditFilter, AuditLine, AuditReport, AuditResult, AuditSession, AuditStatus,
    CoreError, ReopenPolicy, StockMode, UnitStatus, REPORT_NUMBER_WIDTH,
};

/// Runs audit sessions and report exports.
#[derive(Debug, Clone)]
pub struct AuditEngine {
    audits: AuditRepository,
    counters: CounterRepository,
    stock: StockService,
}

impl AuditEngine {
    /// Creates a new AuditEngine over a connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        AuditEngine {
            audits: AuditRepository::new(pool.clone()),
            counters: CounterRepository::new(pool.clone()),
            stock: StockService::new(pool),
        }
    }

    // -------------------------------------------------------------------------
    // Session Lifecycle
    // -------------------------------------------------------------------------

    /// Starts a session for a date, or resumes the existing one.
    ///
    /// Every active product missing from the session gets a result row
    /// with a fresh ready-stock snapshot; rows that already exist keep
    /// their accumulated scans, counts, and statuses untouched.
    pub async fn start_or_resume(&self, date: NaiveDate) -> DbResult<AuditSession> {
        let now = Utc::now();

        let existing = self.audits.get_session(date).await?;
        let created_at = match &existing {
            Some(session) => session.created_at,
            None => {
                self.audits.insert_session(date, now).await?;
                now
            }
        };

        let known: Vec<String> = self
            .audits
            .get_results(date)
            .await?
            .into_iter()
            .map(|r| r.product_id)
            .collect();

        let mut added = 0usize;
        for entry in self.stock.products_with_stock().await? {
            if known.contains(&entry.product.id) {
                continue;
            }
            let result = AuditResult {
                product_id: entry.product.id.clone(),
                product_name: entry.product.name.clone(),
                stock_mode: entry.product.stock_mode,
                system_stock: entry.ready_stock,
                min_stock: entry.product.min_stock,
                physical_stock: None,
                scanned_unit_ids: Vec::new(),
                status: AuditStatus::Pending,
                updated_at: now,
            };
            self.audits.upsert_result(date, &result).await?;
            added += 1;
        }

        let results = self.audits.get_results(date).await?;
        info!(
            date = %date,
            resumed = existing.is_some(),
            products = results.len(),
            added = added,
            "Audit session ready"
        );

        Ok(AuditSession {
            date,
            created_at,
            updated_at: existing.map(|s| s.updated_at).unwrap_or(now),
            results,
        })
    }

    /// Loads a session without modifying it.
    pub async fn get_session(&self, date: NaiveDate) -> DbResult<AuditSession> {
        let session = self
            .audits
            .get_session(date)
            .await?
            .ok_or_else(|| CoreError::SessionNotFound(date.to_string()))?;

        let results = self.audits.get_results(date).await?;
        Ok(AuditSession {
            date,
            created_at: session.created_at,
            updated_at: session.updated_at,
            results,
        })
    }

    // -------------------------------------------------------------------------
    // Counting
    // -------------------------------------------------------------------------

    /// Records one scanned unit against a product under audit.
    ///
    /// ## Rejections
    /// * `TagNotFound` - no unit carries the tag
    /// * `TagMismatch` - tag belongs to a different product
    /// * `UnitNotAvailable` - unit was sold (even mid-session)
    /// * `DuplicateScan` - unit already counted in this session
    /// * `InvalidAuditTransition` - item already completed; reopen first
    ///
    /// The updated result is persisted before returning, so a crash
    /// after this call loses nothing.
    pub async fn record_scan(
        &self,
        date: NaiveDate,
        product_id: &str,
        tag: &str,
    ) -> DbResult<AuditResult> {
        let tag = validate_tag(tag).map_err(CoreError::from)?;
        self.require_session(date).await?;

        let mut result = self.require_result(date, product_id).await?;
        if result.stock_mode != StockMode::UnitTracked {
            return Err(CoreError::NotUnitTracked {
                product_id: product_id.to_string(),
            }
            .into());
        }
        if result.status == AuditStatus::Completed {
            return Err(CoreError::InvalidAuditTransition {
                product_id: product_id.to_string(),
                status: result.status.as_str().to_string(),
                operation: "record a scan".to_string(),
            }
            .into());
        }

        let (owner, unit) = self
            .stock
            .find_by_tag(&tag)
            .await?
            .ok_or_else(|| CoreError::TagNotFound { tag: tag.clone() })?;

        if owner.id != product_id {
            return Err(CoreError::TagMismatch {
                tag,
                expected_product_id: product_id.to_string(),
                actual_product_id: owner.id,
            }
            .into());
        }
        if unit.status != UnitStatus::InStock {
            return Err(CoreError::UnitNotAvailable {
                unit_id: unit.id,
                status: unit.status.as_str().to_string(),
            }
            .into());
        }
        if result.scanned_unit_ids.contains(&unit.id) {
            return Err(CoreError::DuplicateScan { unit_id: unit.id }.into());
        }

        result.scanned_unit_ids.push(unit.id);
        result.physical_stock = Some(result.scanned_unit_ids.len() as i64);
        result.updated_at = Utc::now();
        self.audits.upsert_result(date, &result).await?;

        debug!(
            date = %date,
            product_id = %product_id,
            tag = %tag,
            counted = result.scanned_unit_ids.len(),
            "Scan recorded"
        );
        Ok(result)
    }

    /// Records a manually entered physical count and completes the item.
    ///
    /// Works for both stock modes: it is the only counting path for
    /// manual products and the fallback for unit-tracked ones. The entry
    /// replaces any accumulated scan count.
    pub async fn record_manual_count(
        &self,
        date: NaiveDate,
        product_id: &str,
        count: i64,
    ) -> DbResult<AuditResult> {
        validate_manual_count(count).map_err(CoreError::from)?;
        self.require_session(date).await?;

        let mut result = self.require_result(date, product_id).await?;
        result.physical_stock = Some(count);
        result.status = AuditStatus::Completed;
        result.updated_at = Utc::now();
        self.audits.upsert_result(date, &result).await?;

        debug!(date = %date, product_id = %product_id, count = count, "Manual count recorded");
        Ok(result)
    }

    /// Freezes a scan-based count: physical stock becomes the number of
    /// scanned units (possibly zero) and the item completes.
    pub async fn finalize_item(&self, date: NaiveDate, product_id: &str) -> DbResult<AuditResult> {
        self.require_session(date).await?;

        let mut result = self.require_result(date, product_id).await?;
        if result.stock_mode != StockMode::UnitTracked {
            return Err(CoreError::NotUnitTracked {
                product_id: product_id.to_string(),
            }
            .into());
        }
        if result.status == AuditStatus::Completed {
            return Err(CoreError::InvalidAuditTransition {
                product_id: product_id.to_string(),
                status: result.status.as_str().to_string(),
                operation: "finalize".to_string(),
            }
            .into());
        }

        result.physical_stock = Some(result.scanned_unit_ids.len() as i64);
        result.status = AuditStatus::Completed;
        result.updated_at = Utc::now();
        self.audits.upsert_result(date, &result).await?;

        info!(
            date = %date,
            product_id = %product_id,
            physical = result.physical_stock,
            "Audit item finalized"
        );
        Ok(result)
    }

    /// Re-opens a completed item for re-counting.
    pub async fn reopen_item(
        &self,
        date: NaiveDate,
        product_id: &str,
        policy: ReopenPolicy,
    ) -> DbResult<AuditResult> {
        self.require_session(date).await?;

        let mut result = self.require_result(date, product_id).await?;
        if result.status != AuditStatus::Completed {
            return Err(CoreError::InvalidAuditTransition {
                product_id: product_id.to_string(),
                status: result.status.as_str().to_string(),
                operation: "reopen".to_string(),
            }
            .into());
        }

        match policy {
            ReopenPolicy::KeepScans => {}
            ReopenPolicy::ResetScans => {
                result.scanned_unit_ids.clear();
                result.physical_stock = None;
            }
        }
        result.status = AuditStatus::Pending;
        result.updated_at = Utc::now();
        self.audits.upsert_result(date, &result).await?;

        info!(date = %date, product_id = %product_id, policy = ?policy, "Audit item reopened");
        Ok(result)
    }

    // -------------------------------------------------------------------------
    // Overview & Reports
    // -------------------------------------------------------------------------

    /// Classified live view of a session, optionally filtered.
    pub async fn overview(&self, date: NaiveDate, filter: AuditFilter) -> DbResult<Vec<AuditLine>> {
        self.require_session(date).await?;

        let lines = self
            .audits
            .get_results(date)
            .await?
            .iter()
            .filter(|r| filter.matches(r))
            .map(variance::to_line)
            .collect();

        Ok(lines)
    }

    /// Exports an immutable numbered report from the session's current
    /// state. The session itself stays live and resumable; closing twice
    /// simply produces two reports with distinct numbers.
    pub async fn close_session(&self, date: NaiveDate) -> DbResult<AuditReport> {
        self.require_session(date).await?;

        let now = Utc::now();
        let results = self.audits.get_results(date).await?;
        let lines: Vec<AuditLine> = results.iter().map(variance::to_line).collect();

        let id = self.counters.next(AUDIT_REPORT_COUNTER).await?;
        let report = AuditReport {
            id,
            report_number: format!("{:0width$}", id, width = REPORT_NUMBER_WIDTH),
            session_date: date,
            created_at: now,
            lines,
        };

        self.audits.insert_report(&report).await?;
        self.audits.touch_session(date, now).await?;

        info!(
            date = %date,
            report_number = %report.report_number,
            lines = report.lines.len(),
            "Audit report exported"
        );
        Ok(report)
    }

    /// Gets a frozen report by its sequential ID.
    pub async fn get_report(&self, id: i64) -> DbResult<Option<AuditReport>> {
        self.audits.get_report(id).await
    }

    /// Lists recent reports, newest first.
    pub async fn list_reports(&self, limit: i64) -> DbResult<Vec<AuditReport>> {
        self.audits.list_reports(limit).await
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    async fn require_session(&self, date: NaiveDate) -> DbResult<()> {
        if self.audits.get_session(date).await?.is_none() {
            return Err(CoreError::SessionNotFound(date.to_string()).into());
        }
        Ok(())
    }

    async fn require_result(&self, date: NaiveDate, product_id: &str) -> DbResult<AuditResult> {
        self.audits
            .get_result(date, product_id)
            .await?
            .ok_or_else(|| {
                CoreError::AuditItemNotFound {
                    date: date.to_string(),
                    product_id: product_id.to_string(),
                }
                .into()
            })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};
    use crate::service::stock::NewProduct;
    use warung_core::{PaymentMethod, Product, SaleLine, VarianceLabel};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 28).unwrap()
    }

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn tracked_product(db: &Database, name: &str, tags: &[&str]) -> Product {
        let product = db
            .stock()
            .create_product(NewProduct {
                name: name.to_string(),
                category: "minuman".to_string(),
                price_cents: 500_000,
                min_stock: 1,
                stock_mode: StockMode::UnitTracked,
                initial_stock: 0,
            })
            .await
            .unwrap();
        for tag in tags {
            db.stock().assign_tag(&product.id, tag).await.unwrap();
        }
        product
    }

    async fn manual_product(db: &Database, name: &str, stock: i64) -> Product {
        db.stock()
            .create_product(NewProduct {
                name: name.to_string(),
                category: "makanan".to_string(),
                price_cents: 200_000,
                min_stock: 2,
                stock_mode: StockMode::Manual,
                initial_stock: stock,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_one_session_per_date_resumes() {
        let db = setup().await;
        let engine = db.audit_engine();
        let product = tracked_product(&db, "Teh Botol", &["T-1", "T-2"]).await;

        let session = engine.start_or_resume(today()).await.unwrap();
        assert_eq!(session.results.len(), 1);
        assert_eq!(session.result(&product.id).unwrap().system_stock, 2);

        engine.record_scan(today(), &product.id, "T-1").await.unwrap();

        // Resuming does not overwrite accumulated progress
        let resumed = engine.start_or_resume(today()).await.unwrap();
        let result = resumed.result(&product.id).unwrap();
        assert_eq!(result.scanned_unit_ids.len(), 1);
        assert_eq!(result.physical_stock, Some(1));
        assert_eq!(resumed.created_at, session.created_at);
    }

    #[tokio::test]
    async fn test_new_product_joins_resumed_session() {
        let db = setup().await;
        let engine = db.audit_engine();
        tracked_product(&db, "Aqua", &["A-1"]).await;

        engine.start_or_resume(today()).await.unwrap();

        // Product created after the session started
        let late = manual_product(&db, "Beras", 9).await;
        let resumed = engine.start_or_resume(today()).await.unwrap();

        let result = resumed.result(&late.id).unwrap();
        assert_eq!(result.system_stock, 9);
        assert_eq!(result.status, AuditStatus::Pending);
    }

    #[tokio::test]
    async fn test_scan_rejections() {
        let db = setup().await;
        let engine = db.audit_engine();
        let teh = tracked_product(&db, "Teh", &["T-1"]).await;
        let kopi = tracked_product(&db, "Kopi", &["K-1"]).await;

        engine.start_or_resume(today()).await.unwrap();

        // Unknown tag
        let err = engine.record_scan(today(), &teh.id, "GHOST").await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::TagNotFound { .. })));

        // Tag of a different product
        let err = engine.record_scan(today(), &teh.id, "K-1").await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::TagMismatch { .. })
        ));

        // Duplicate scan of the same unit leaves the count unchanged
        engine.record_scan(today(), &teh.id, "T-1").await.unwrap();
        let err = engine.record_scan(today(), &teh.id, "T-1").await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::DuplicateScan { .. })
        ));
        let session = engine.get_session(today()).await.unwrap();
        assert_eq!(session.result(&teh.id).unwrap().physical_stock, Some(1));

        // Manual products have no scannable units
        let beras = manual_product(&db, "Beras", 5).await;
        engine.start_or_resume(today()).await.unwrap();
        let err = engine.record_scan(today(), &beras.id, "T-1").await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::NotUnitTracked { .. })
        ));

        // No session on another date
        let other = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
        let err = engine.record_scan(other, &kopi.id, "K-1").await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_sold_unit_cannot_be_counted() {
        let db = setup().await;
        let engine = db.audit_engine();
        let product = tracked_product(&db, "Rokok", &["R-1", "R-2"]).await;

        // Snapshot taken with 2 ready units
        let session = engine.start_or_resume(today()).await.unwrap();
        assert_eq!(session.result(&product.id).unwrap().system_stock, 2);

        // One unit sells mid-session; the snapshot must not move
        db.sale_ledger()
            .create_sale(
                &[SaleLine {
                    product_id: product.id.clone(),
                    quantity: 1,
                }],
                PaymentMethod::Cash,
                &[],
            )
            .await
            .unwrap();

        let result = engine.record_scan(today(), &product.id, "R-2").await.unwrap();
        assert_eq!(result.system_stock, 2, "snapshot unchanged by the sale");

        // R-1 was consumed (oldest first), so scanning it is rejected
        let err = engine.record_scan(today(), &product.id, "R-1").await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::UnitNotAvailable { .. })
        ));

        // Finalize: one confirmed unit against a snapshot of two → Kurang
        engine.finalize_item(today(), &product.id).await.unwrap();
        let lines = engine.overview(today(), AuditFilter::All).await.unwrap();
        let line = lines.iter().find(|l| l.product_id == product.id).unwrap();
        assert_eq!(line.variance, Some(-1));
        assert_eq!(line.label, VarianceLabel::Kurang);
    }

    #[tokio::test]
    async fn test_finalize_and_reopen_transitions() {
        let db = setup().await;
        let engine = db.audit_engine();
        let product = tracked_product(&db, "Sabun", &["S-1", "S-2"]).await;

        engine.start_or_resume(today()).await.unwrap();
        engine.record_scan(today(), &product.id, "S-1").await.unwrap();

        let result = engine.finalize_item(today(), &product.id).await.unwrap();
        assert_eq!(result.status, AuditStatus::Completed);
        assert_eq!(result.physical_stock, Some(1));

        // Completed items reject further scans and a second finalize
        let err = engine.record_scan(today(), &product.id, "S-2").await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidAuditTransition { .. })
        ));
        assert!(engine.finalize_item(today(), &product.id).await.is_err());

        // Reopen keeping scans: counting continues from S-1
        let reopened = engine
            .reopen_item(today(), &product.id, ReopenPolicy::KeepScans)
            .await
            .unwrap();
        assert_eq!(reopened.status, AuditStatus::Pending);
        assert_eq!(reopened.scanned_unit_ids.len(), 1);

        let result = engine.record_scan(today(), &product.id, "S-2").await.unwrap();
        assert_eq!(result.physical_stock, Some(2));

        // Reopen resetting: back to a clean slate
        engine.finalize_item(today(), &product.id).await.unwrap();
        let reset = engine
            .reopen_item(today(), &product.id, ReopenPolicy::ResetScans)
            .await
            .unwrap();
        assert!(reset.scanned_unit_ids.is_empty());
        assert_eq!(reset.physical_stock, None);

        // Reopening a pending item is invalid
        assert!(engine
            .reopen_item(today(), &product.id, ReopenPolicy::KeepScans)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_finalize_with_zero_scans_records_zero() {
        let db = setup().await;
        let engine = db.audit_engine();
        let product = tracked_product(&db, "Korek", &["K-1"]).await;

        engine.start_or_resume(today()).await.unwrap();
        let result = engine.finalize_item(today(), &product.id).await.unwrap();
        assert_eq!(result.physical_stock, Some(0), "zero is a real count, not None");
        assert_eq!(result.variance(), Some(-1));
    }

    #[tokio::test]
    async fn test_manual_count_completes_directly() {
        let db = setup().await;
        let engine = db.audit_engine();
        let product = manual_product(&db, "Gula", 10).await;

        engine.start_or_resume(today()).await.unwrap();
        let result = engine
            .record_manual_count(today(), &product.id, 7)
            .await
            .unwrap();
        assert_eq!(result.status, AuditStatus::Completed);
        assert_eq!(result.variance(), Some(-3));

        // Manual items cannot be finalized; they complete on entry
        let err = engine.finalize_item(today(), &product.id).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::NotUnitTracked { .. })
        ));
    }

    #[tokio::test]
    async fn test_overview_filters() {
        let db = setup().await;
        let engine = db.audit_engine();
        let balanced = manual_product(&db, "Beras", 5).await;
        let short = manual_product(&db, "Minyak", 8).await;
        let pending = manual_product(&db, "Telur", 12).await;

        engine.start_or_resume(today()).await.unwrap();
        engine
            .record_manual_count(today(), &balanced.id, 5)
            .await
            .unwrap();
        engine
            .record_manual_count(today(), &short.id, 6)
            .await
            .unwrap();

        let all = engine.overview(today(), AuditFilter::All).await.unwrap();
        assert_eq!(all.len(), 3);

        let balanced_only = engine
            .overview(today(), AuditFilter::Balanced)
            .await
            .unwrap();
        assert_eq!(balanced_only.len(), 1);
        assert_eq!(balanced_only[0].product_id, balanced.id);

        let variance_only = engine
            .overview(today(), AuditFilter::HasVariance)
            .await
            .unwrap();
        assert_eq!(variance_only.len(), 1);
        assert_eq!(variance_only[0].product_id, short.id);
        assert_eq!(variance_only[0].variance, Some(-2));

        // The never-counted item appears only under All
        let pending_line = all.iter().find(|l| l.product_id == pending.id).unwrap();
        assert_eq!(pending_line.label, VarianceLabel::BelumDiaudit);
    }

    #[tokio::test]
    async fn test_reports_are_numbered_and_frozen() {
        let db = setup().await;
        let engine = db.audit_engine();
        let product = manual_product(&db, "Kecap", 4).await;

        engine.start_or_resume(today()).await.unwrap();
        engine
            .record_manual_count(today(), &product.id, 4)
            .await
            .unwrap();

        let first = engine.close_session(today()).await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(first.report_number, "0000001");

        // The session stays live; counting continues and a second close
        // yields a distinct report
        engine
            .record_manual_count(today(), &product.id, 2)
            .await
            .unwrap();
        let second = engine.close_session(today()).await.unwrap();
        assert_eq!(second.id, 2);
        assert_eq!(second.report_number, "0000002");

        // The first report still holds the old observation
        let frozen = engine.get_report(first.id).await.unwrap().unwrap();
        assert_eq!(frozen.lines[0].physical_stock, Some(4));
        assert_eq!(frozen.lines[0].label, VarianceLabel::Sesuai);

        let reports = engine.list_reports(10).await.unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].id, 2, "newest first");
    }

    #[tokio::test]
    async fn test_balanced_but_low_stock_reports_stok_rendah() {
        let db = setup().await;
        let engine = db.audit_engine();

        // min_stock 5, three tagged units on the shelf
        let product = db
            .stock()
            .create_product(NewProduct {
                name: "Pocari Sweat".to_string(),
                category: "minuman".to_string(),
                price_cents: 800_000,
                min_stock: 5,
                stock_mode: StockMode::UnitTracked,
                initial_stock: 0,
            })
            .await
            .unwrap();
        for tag in ["A", "B", "C"] {
            db.stock().assign_tag(&product.id, tag).await.unwrap();
        }

        // One sells before the audit starts: snapshot is 2
        db.sale_ledger()
            .create_sale(
                &[SaleLine {
                    product_id: product.id.clone(),
                    quantity: 1,
                }],
                PaymentMethod::Cash,
                &[],
            )
            .await
            .unwrap();

        let session = engine.start_or_resume(today()).await.unwrap();
        assert_eq!(session.result(&product.id).unwrap().system_stock, 2);

        // The sold unit ("A", oldest) cannot be counted
        let err = engine.record_scan(today(), &product.id, "A").await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::UnitNotAvailable { .. })
        ));

        engine.record_scan(today(), &product.id, "B").await.unwrap();
        engine.record_scan(today(), &product.id, "C").await.unwrap();
        engine.finalize_item(today(), &product.id).await.unwrap();

        // Balanced (2 = 2) but at/below min_stock: low stock takes
        // precedence over Sesuai
        let lines = engine.overview(today(), AuditFilter::All).await.unwrap();
        let line = lines.iter().find(|l| l.product_id == product.id).unwrap();
        assert_eq!(line.variance, Some(0));
        assert_eq!(line.label, VarianceLabel::StokRendah);
    }

    #[tokio::test]
    async fn test_full_audit_day() {
        let db = setup().await;
        let engine = db.audit_engine();

        // Shelf: 3 tagged bottles, a manual rice sack, and an untouched SKU
        let teh = tracked_product(&db, "Teh Botol", &["TB-1", "TB-2", "TB-3"]).await;
        let beras = manual_product(&db, "Beras", 20).await;
        let telur = manual_product(&db, "Telur", 1).await;

        engine.start_or_resume(today()).await.unwrap();

        // Operator finds only two bottles on the shelf
        engine.record_scan(today(), &teh.id, "TB-1").await.unwrap();
        engine.record_scan(today(), &teh.id, "TB-3").await.unwrap();
        engine.finalize_item(today(), &teh.id).await.unwrap();

        // Counts 22 sacks (supplier over-delivered)
        engine
            .record_manual_count(today(), &beras.id, 22)
            .await
            .unwrap();

        let report = engine.close_session(today()).await.unwrap();
        assert_eq!(report.lines.len(), 3);

        let teh_line = report.lines.iter().find(|l| l.product_id == teh.id).unwrap();
        assert_eq!(teh_line.variance, Some(-1));
        assert_eq!(teh_line.label, VarianceLabel::Kurang);
        assert_eq!(variance::signed(teh_line.variance.unwrap()), "-1");

        let beras_line = report
            .lines
            .iter()
            .find(|l| l.product_id == beras.id)
            .unwrap();
        assert_eq!(beras_line.variance, Some(2));
        assert_eq!(beras_line.label, VarianceLabel::Lebih);

        // Never counted, stock at/below minimum → low stock wins
        let telur_line = report
            .lines
            .iter()
            .find(|l| l.product_id == telur.id)
            .unwrap();
        assert_eq!(telur_line.physical_stock, None);
        assert_eq!(telur_line.label, VarianceLabel::StokRendah);
    }
}
