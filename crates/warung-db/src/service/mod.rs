//! # Service Module
//!
//! The three engines of the stock ledger, built on the repositories:
//!
//! - [`stock::StockService`] - catalog maintenance, tag assignment, and
//!   the two-bulk-read stock aggregator
//! - [`sale_ledger::SaleLedger`] - transactional sale creation with
//!   race-free unit consumption
//! - [`audit::AuditEngine`] - calendar-day reconciliation sessions with
//!   per-scan durability and numbered report exports
//!
//! ## Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │   Catalog + Unit Store ──► StockService ──► sales screen / SaleLedger  │
//! │   SaleLedger mutates the Unit Store (CAS per unit, one transaction)    │
//! │   AuditEngine reads a stock snapshot at session start, then layers     │
//! │   physical-count observations on top, independent of concurrent sales │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod audit;
pub mod sale_ledger;
pub mod stock;
