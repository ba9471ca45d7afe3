//! # Repository Module
//!
//! Row-level data access for Warung POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  Service (e.g., AuditEngine)                                           │
//! │       │                                                                 │
//! │       │  audits.get_result(date, product_id)                           │
//! │       ▼                                                                 │
//! │  AuditRepository                                                       │
//! │  ├── get_session / insert_session                                      │
//! │  ├── get_results / upsert_result                                       │
//! │  └── insert_report / get_report                                        │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Benefits:                                                              │
//! │  • SQL is isolated in one place                                        │
//! │  • Services express the ledger/audit algorithms, not row plumbing      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Catalog CRUD and mirror recompute
//! - [`unit::UnitRepository`] - Unit store: tags, CAS consume, bulk counts
//! - [`sale::SaleRepository`] - Sale read-back (writes go through SaleLedger)
//! - [`movement::MovementRepository`] - Append-only stock movements
//! - [`audit::AuditRepository`] - Sessions, results, numbered reports
//! - [`counter::CounterRepository`] - Atomic monotonic counters

pub mod audit;
pub mod counter;
pub mod movement;
pub mod product;
pub mod sale;
pub mod unit;
