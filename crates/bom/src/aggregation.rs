//! Material requirement rollup and availability classification.
//!
//! Pure functions of (forest, build quantity, inventory snapshot). Traversal is
//! pre-order over the roots in order, so identical inputs always produce
//! identical rows in identical order.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use forgeerp_core::{BomItemId, DomainError, DomainResult};

use crate::item::Quantity;
use crate::store::BomForest;

/// Separator used in requirement breadcrumbs.
pub const PATH_SEPARATOR: &str = "/";

/// Stock record supplied by the inventory collaborator (read-only here).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub reference_code: String,
    pub name: String,
    pub unit: String,
    pub stock_on_hand: Decimal,
    pub reorder_threshold: Decimal,
}

/// Inventory indexed by reference code, valid for one aggregation call.
///
/// When a code appears more than once the first record wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventorySnapshot {
    by_code: HashMap<String, InventoryItem>,
}

impl InventorySnapshot {
    pub fn new(items: impl IntoIterator<Item = InventoryItem>) -> Self {
        let mut by_code = HashMap::new();
        for item in items {
            by_code.entry(item.reference_code.clone()).or_insert(item);
        }
        Self { by_code }
    }

    pub fn get(&self, reference_code: &str) -> Option<&InventoryItem> {
        self.by_code.get(reference_code)
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

impl FromIterator<InventoryItem> for InventorySnapshot {
    fn from_iter<I: IntoIterator<Item = InventoryItem>>(iter: I) -> Self {
        Self::new(iter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityStatus {
    /// Stock does not cover the requirement.
    Critical,
    /// Requirement covered, but stock is below the reorder threshold.
    Warning,
    /// Requirement covered and stock at or above the reorder threshold.
    Available,
    /// No inventory record for the reference code.
    Unknown,
}

/// One row per material occurrence in the forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlattenedRequirement {
    pub item_id: BomItemId,
    pub reference_code: String,
    pub name: String,
    pub unit: String,
    /// Names from root to this item, `/`-joined.
    pub path: String,
    pub required_quantity: Decimal,
    pub available_stock: Option<Decimal>,
    pub status: AvailabilityStatus,
}

pub fn classify(required: Decimal, stock: Option<&InventoryItem>) -> AvailabilityStatus {
    let Some(stock) = stock else {
        return AvailabilityStatus::Unknown;
    };
    if stock.stock_on_hand < required {
        AvailabilityStatus::Critical
    } else if stock.stock_on_hand < stock.reorder_threshold {
        AvailabilityStatus::Warning
    } else {
        AvailabilityStatus::Available
    }
}

/// Roll quantities down every path and emit a row per material occurrence.
///
/// Non-material nodes only contribute their quantity to the multiplier. The
/// same reference code may produce several rows; see
/// [`summarize_by_reference`] for per-code totals.
pub fn aggregate(
    forest: &BomForest,
    build_quantity: Quantity,
    inventory: &InventorySnapshot,
) -> DomainResult<Vec<FlattenedRequirement>> {
    let mut rows = Vec::new();
    let mut path: Vec<&str> = Vec::new();
    // (node, multiplier above it, breadcrumb length above it)
    let mut stack: Vec<(BomItemId, Decimal, usize)> = forest
        .roots()
        .iter()
        .rev()
        .map(|root| (*root, build_quantity.value(), 0))
        .collect();

    while let Some((id, multiplier, depth)) = stack.pop() {
        let item = forest.get(id)?;
        let required = multiplier
            .checked_mul(item.quantity().value())
            .ok_or_else(|| DomainError::invariant(format!("quantity overflow below {id}")))?;

        path.truncate(depth);
        path.push(item.name());
        if item.is_material() {
            let stock = inventory.get(item.reference_code());
            rows.push(FlattenedRequirement {
                item_id: id,
                reference_code: item.reference_code().to_string(),
                name: item.name().to_string(),
                unit: item.unit().to_string(),
                path: path.join(PATH_SEPARATOR),
                required_quantity: required,
                available_stock: stock.map(|s| s.stock_on_hand),
                status: classify(required, stock),
            });
        }
        stack.extend(
            item.children()
                .iter()
                .rev()
                .map(|child| (*child, required, depth + 1)),
        );
    }
    Ok(rows)
}

/// Total demand for one reference code across all of its occurrences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialDemand {
    pub reference_code: String,
    pub name: String,
    pub unit: String,
    pub occurrences: usize,
    pub required_quantity: Decimal,
    pub available_stock: Option<Decimal>,
    pub status: AvailabilityStatus,
}

/// Sum rows by reference code (first-occurrence order) and reclassify the
/// totals against the same inventory.
pub fn summarize_by_reference(
    rows: &[FlattenedRequirement],
    inventory: &InventorySnapshot,
) -> DomainResult<Vec<MaterialDemand>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut out: Vec<MaterialDemand> = Vec::new();

    for row in rows {
        match index.get(row.reference_code.as_str()) {
            Some(&at) => {
                let demand = &mut out[at];
                demand.occurrences += 1;
                demand.required_quantity = demand
                    .required_quantity
                    .checked_add(row.required_quantity)
                    .ok_or_else(|| {
                        DomainError::invariant(format!(
                            "quantity overflow summing {}",
                            row.reference_code
                        ))
                    })?;
            }
            None => {
                index.insert(row.reference_code.as_str(), out.len());
                out.push(MaterialDemand {
                    reference_code: row.reference_code.clone(),
                    name: row.name.clone(),
                    unit: row.unit.clone(),
                    occurrences: 1,
                    required_quantity: row.required_quantity,
                    available_stock: None,
                    status: AvailabilityStatus::Unknown,
                });
            }
        }
    }

    for demand in &mut out {
        let stock = inventory.get(&demand.reference_code);
        demand.available_stock = stock.map(|s| s.stock_on_hand);
        demand.status = classify(demand.required_quantity, stock);
    }
    Ok(out)
}

/// Row counts per status, for summary cards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityBreakdown {
    pub critical: usize,
    pub warning: usize,
    pub available: usize,
    pub unknown: usize,
}

impl AvailabilityBreakdown {
    pub fn from_statuses(statuses: impl IntoIterator<Item = AvailabilityStatus>) -> Self {
        let mut breakdown = Self::default();
        for status in statuses {
            match status {
                AvailabilityStatus::Critical => breakdown.critical += 1,
                AvailabilityStatus::Warning => breakdown.warning += 1,
                AvailabilityStatus::Available => breakdown.available += 1,
                AvailabilityStatus::Unknown => breakdown.unknown += 1,
            }
        }
        breakdown
    }

    pub fn from_rows(rows: &[FlattenedRequirement]) -> Self {
        Self::from_statuses(rows.iter().map(|row| row.status))
    }

    pub fn total(&self) -> usize {
        self.critical + self.warning + self.available + self.unknown
    }

    pub fn has_shortages(&self) -> bool {
        self.critical > 0
    }
}
