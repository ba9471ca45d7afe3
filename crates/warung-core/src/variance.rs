//! # Variance Classification
//!
//! Pure classification rules for audit reconciliation, shared by the
//! live session overview and the exported report.
//!
//! ## Classification Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   Variance → Label Decision                             │
//! │                                                                         │
//! │  physical_stock = None (never counted)                                 │
//! │       ├── stock at/below min_stock  → Stok Rendah (low stock wins)     │
//! │       └── otherwise                 → Belum Diaudit                    │
//! │                                                                         │
//! │  physical_stock = Some(p), variance = p - system_stock                 │
//! │       ├── variance > 0              → Lebih                            │
//! │       ├── variance < 0              → Kurang                           │
//! │       └── variance = 0                                                 │
//! │              ├── p <= min_stock     → Stok Rendah (precedence)         │
//! │              └── otherwise          → Sesuai                           │
//! │                                                                         │
//! │  Low stock takes precedence ONLY when variance is zero or              │
//! │  undetermined - an actual discrepancy always shows as such.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::types::{AuditLine, AuditResult, AuditStatus};

// =============================================================================
// Variance Label
// =============================================================================

/// Operator-facing reconciliation status of one audited product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceLabel {
    /// Physical count exceeds system count.
    Lebih,
    /// Physical count falls short of system count.
    Kurang,
    /// Counts match and stock is above the low-stock threshold.
    Sesuai,
    /// Counts match (or no count yet) but stock is at/below `min_stock`.
    StokRendah,
    /// Product was never counted in this session.
    BelumDiaudit,
}

impl VarianceLabel {
    /// Display string as shown to the operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            VarianceLabel::Lebih => "Lebih",
            VarianceLabel::Kurang => "Kurang",
            VarianceLabel::Sesuai => "Sesuai",
            VarianceLabel::StokRendah => "Stok Rendah",
            VarianceLabel::BelumDiaudit => "Belum Diaudit",
        }
    }
}

impl std::fmt::Display for VarianceLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies one audit observation.
///
/// ## Arguments
/// * `system_stock` - ready stock snapshot taken at session start
/// * `physical_stock` - counted stock, `None` while never counted
/// * `min_stock` - low-stock threshold for this product
pub fn classify(system_stock: i64, physical_stock: Option<i64>, min_stock: i64) -> VarianceLabel {
    match physical_stock {
        None => {
            if system_stock <= min_stock {
                VarianceLabel::StokRendah
            } else {
                VarianceLabel::BelumDiaudit
            }
        }
        Some(physical) => {
            let variance = physical - system_stock;
            if variance > 0 {
                VarianceLabel::Lebih
            } else if variance < 0 {
                VarianceLabel::Kurang
            } else if physical <= min_stock {
                VarianceLabel::StokRendah
            } else {
                VarianceLabel::Sesuai
            }
        }
    }
}

/// Renders a signed variance for display: `+2`, `-3`, `0`.
pub fn signed(variance: i64) -> String {
    if variance > 0 {
        format!("+{variance}")
    } else {
        variance.to_string()
    }
}

/// Builds a classified display/export line from a stored result.
pub fn to_line(result: &AuditResult) -> AuditLine {
    AuditLine {
        product_id: result.product_id.clone(),
        product_name: result.product_name.clone(),
        system_stock: result.system_stock,
        min_stock: result.min_stock,
        physical_stock: result.physical_stock,
        variance: result.variance(),
        status: result.status,
        label: classify(result.system_stock, result.physical_stock, result.min_stock),
    }
}

// =============================================================================
// Result Filtering
// =============================================================================

/// Filter over a session's result set.
///
/// `Balanced` and `HasVariance` only ever include completed items;
/// pending items are visible only under `All`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditFilter {
    All,
    Balanced,
    HasVariance,
}

impl AuditFilter {
    /// Whether a result passes this filter.
    pub fn matches(&self, result: &AuditResult) -> bool {
        match self {
            AuditFilter::All => true,
            AuditFilter::Balanced => {
                result.status == AuditStatus::Completed && result.variance() == Some(0)
            }
            AuditFilter::HasVariance => {
                result.status == AuditStatus::Completed
                    && matches!(result.variance(), Some(v) if v != 0)
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
