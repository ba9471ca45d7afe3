//! # warung-db: Database Layer for Warung POS
//!
//! This crate provides SQLite persistence and the three stock engines for
//! the Warung POS system.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Warung POS Data Flow                              │
//! │                                                                         │
//! │  Caller (UI / terminal)                                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    warung-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────────┐   ┌───────────────┐   ┌──────────────────┐  │   │
//! │  │   │   services   │   │  repositories │   │    Database      │  │   │
//! │  │   │ StockService │──►│ ProductRepo   │──►│   (pool.rs)      │  │   │
//! │  │   │ SaleLedger   │   │ UnitRepo      │   │   SqlitePool     │  │   │
//! │  │   │ AuditEngine  │   │ AuditRepo ... │   │   + migrations   │  │   │
//! │  │   └──────────────┘   └───────────────┘   └──────────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database (WAL mode)                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Row-level data access (products, units, sales, ...)
//! - [`service`] - Stock aggregator, sale ledger, audit session engine
//!
//! ## Usage
//!
//! ```rust,ignore
//! use warung_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/warung.db")).await?;
//!
//! // Tag a unit, then sell it
//! db.stock().assign_tag(&product_id, "8991002").await?;
//! db.sale_ledger().create_sale(&lines, PaymentMethod::Cash, &[]).await?;
//!
//! // Reconcile tonight
//! let session = db.audit_engine().start_or_resume(today).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::audit::AuditRepository;
pub use repository::counter::CounterRepository;
pub use repository::movement::MovementRepository;
pub use repository::product::ProductRepository;
pub use repository::sale::SaleRepository;
pub use repository::unit::UnitRepository;

// Service re-exports
pub use service::audit::AuditEngine;
pub use service::sale_ledger::SaleLedger;
pub use service::stock::StockService;
