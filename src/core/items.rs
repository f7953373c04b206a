//! Transaction line items and the per-drug arithmetic used by reconciliation.
//!
//! Item lists are not unique by drug name. Quantities are always summed per drug
//! before diffing, so a repeated name is never double-applied.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-drug quantities keyed by drug name.
pub type DrugQuantities = BTreeMap<String, i64>;

/// One `{drug_name, quantity}` entry of a purchase or sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Name of the referenced drug
    pub drug_name: String,
    /// Units moved
    pub quantity: i64,
}

impl LineItem {
    /// Convenience constructor.
    pub fn new(drug_name: impl Into<String>, quantity: i64) -> Self {
        Self {
            drug_name: drug_name.into(),
            quantity,
        }
    }
}

/// Rejects blank drug names and non-positive quantities.
pub fn validate_items(items: &[LineItem]) -> Result<()> {
    for (index, item) in items.iter().enumerate() {
        if item.drug_name.trim().is_empty() {
            return Err(Error::validation(format!(
                "item {index}: drug name cannot be empty"
            )));
        }
        if item.quantity <= 0 {
            return Err(Error::validation(format!(
                "item {index} ({}): quantity must be positive, got {}",
                item.drug_name, item.quantity
            )));
        }
    }
    Ok(())
}

/// Sums quantities per drug name.
#[must_use]
pub fn aggregate(items: &[LineItem]) -> DrugQuantities {
    let mut totals = DrugQuantities::new();
    for item in items {
        *totals.entry(item.drug_name.clone()).or_insert(0) += item.quantity;
    }
    totals
}

/// Net per-drug change needed to go from `old` to `new`.
///
/// Drugs only in `old` come out as `-old`. Unchanged drugs are omitted.
#[must_use]
pub fn diff(old: &DrugQuantities, new: &DrugQuantities) -> DrugQuantities {
    let mut changes = DrugQuantities::new();
    for (drug, &new_qty) in new {
        let old_qty = old.get(drug).copied().unwrap_or(0);
        if new_qty != old_qty {
            changes.insert(drug.clone(), new_qty - old_qty);
        }
    }
    for (drug, &old_qty) in old {
        if !new.contains_key(drug) && old_qty != 0 {
            changes.insert(drug.clone(), -old_qty);
        }
    }
    changes
}

/// Flips the sign of every quantity.
#[must_use]
pub fn negate(quantities: DrugQuantities) -> DrugQuantities {
    quantities
        .into_iter()
        .map(|(drug, qty)| (drug, -qty))
        .collect()
}
