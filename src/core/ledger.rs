//! Stock ledger - the per-drug on-hand quantity and its adjustment operations.
//!
//! Every adjustment is a single SQL `UPDATE ... SET quantity = quantity + delta`
//! so concurrent writers never lose each other's changes. No floor at zero is
//! applied by [`adjust`]; reversals may legitimately drive stock negative.
//! [`withdraw`] is the guarded variant used by sale creation.

use crate::{
    core::items::DrugQuantities,
    entities::{Drug, drug},
    errors::{Error, Result},
};
use sea_orm::{prelude::*, sea_query::Expr};
use serde::Serialize;
use tracing::debug;

/// Confirmation of one applied ledger adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockChange {
    /// Drug that was adjusted
    pub drug_name: String,
    /// Signed change applied
    pub delta: i64,
    /// On-hand quantity after the change
    pub quantity: i64,
}

async fn find_by_name<C>(conn: &C, drug_name: &str) -> Result<drug::Model>
where
    C: ConnectionTrait,
{
    Drug::find()
        .filter(drug::Column::Name.eq(drug_name))
        .one(conn)
        .await?
        .ok_or_else(|| Error::DrugNotFound {
            name: drug_name.to_string(),
        })
}

/// Atomically adds `delta` (which may be negative) to a drug's on-hand quantity.
///
/// # Errors
/// `DrugNotFound` when no drug has this name.
pub async fn adjust<C>(conn: &C, drug_name: &str, delta: i64) -> Result<StockChange>
where
    C: ConnectionTrait,
{
    let result = Drug::update_many()
        .col_expr(
            drug::Column::Quantity,
            Expr::col(drug::Column::Quantity).add(delta),
        )
        .col_expr(
            drug::Column::UpdatedAt,
            Expr::value(chrono::Utc::now().naive_utc()),
        )
        .filter(drug::Column::Name.eq(drug_name))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::DrugNotFound {
            name: drug_name.to_string(),
        });
    }

    let drug = find_by_name(conn, drug_name).await?;
    debug!(drug = drug_name, delta, quantity = drug.quantity, "stock adjusted");
    Ok(StockChange {
        drug_name: drug.name,
        delta,
        quantity: drug.quantity,
    })
}

/// Removes `quantity` units only if at least that many are on hand.
///
/// The check and the decrement are one conditional `UPDATE`, so two concurrent
/// withdrawals can never both succeed against stock that only covers one.
///
/// # Errors
/// `DrugNotFound` when no drug has this name, `InsufficientStock` when the
/// on-hand quantity is below `quantity`.
pub async fn withdraw<C>(conn: &C, drug_name: &str, quantity: i64) -> Result<StockChange>
where
    C: ConnectionTrait,
{
    let result = Drug::update_many()
        .col_expr(
            drug::Column::Quantity,
            Expr::col(drug::Column::Quantity).sub(quantity),
        )
        .col_expr(
            drug::Column::UpdatedAt,
            Expr::value(chrono::Utc::now().naive_utc()),
        )
        .filter(drug::Column::Name.eq(drug_name))
        .filter(drug::Column::Quantity.gte(quantity))
        .exec(conn)
        .await?;

    let drug = find_by_name(conn, drug_name).await?;
    if result.rows_affected == 0 {
        return Err(Error::InsufficientStock {
            drug: drug.name,
            available: drug.quantity,
            requested: quantity,
        });
    }

    debug!(drug = drug_name, withdrawn = quantity, quantity = drug.quantity, "stock withdrawn");
    Ok(StockChange {
        drug_name: drug.name,
        delta: -quantity,
        quantity: drug.quantity,
    })
}

/// Applies a per-drug delta map, skipping zero entries.
pub async fn apply<C>(conn: &C, deltas: &DrugQuantities) -> Result<Vec<StockChange>>
where
    C: ConnectionTrait,
{
    let mut changes = Vec::with_capacity(deltas.len());
    for (drug_name, &delta) in deltas {
        if delta != 0 {
            changes.push(adjust(conn, drug_name, delta).await?);
        }
    }
    Ok(changes)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_adjust_increments_and_decrements() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_drug(&db, "Paracetamol", 10).await?;

        let change = adjust(&db, "Paracetamol", 5).await?;
        assert_eq!(change.delta, 5);
        assert_eq!(change.quantity, 15);

        let change = adjust(&db, "Paracetamol", -7).await?;
        assert_eq!(change.quantity, 8);
        assert_eq!(stock_of(&db, "Paracetamol").await?, 8);

        Ok(())
    }

    #[tokio::test]
    async fn test_adjust_allows_negative_stock() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_drug(&db, "Ibuprofen", 2).await?;

        let change = adjust(&db, "Ibuprofen", -5).await?;
        assert_eq!(change.quantity, -3);

        Ok(())
    }

    #[tokio::test]
    async fn test_adjust_unknown_drug() -> Result<()> {
        let db = setup_test_db().await?;

        let result = adjust(&db, "Unobtainium", 1).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::DrugNotFound { name } if name == "Unobtainium"
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_withdraw_guards_stock() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_drug(&db, "Amoxicillin", 4).await?;

        let change = withdraw(&db, "Amoxicillin", 4).await?;
        assert_eq!(change.delta, -4);
        assert_eq!(change.quantity, 0);

        let result = withdraw(&db, "Amoxicillin", 1).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InsufficientStock {
                available: 0,
                requested: 1,
                ..
            }
        ));
        assert_eq!(stock_of(&db, "Amoxicillin").await?, 0);

        let result = withdraw(&db, "Unobtainium", 1).await;
        assert!(matches!(result.unwrap_err(), Error::DrugNotFound { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_withdraw_rejects_a_stale_stock_check() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_drug(&db, "Paracetamol", 10).await?;

        // Two sellers both saw 10 on hand before either withdrew
        let seen_by_first = stock_of(&db, "Paracetamol").await?;
        let seen_by_second = stock_of(&db, "Paracetamol").await?;
        assert!(seen_by_first >= 6 && seen_by_second >= 6);

        withdraw(&db, "Paracetamol", 6).await?;
        let result = withdraw(&db, "Paracetamol", 6).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InsufficientStock {
                available: 4,
                requested: 6,
                ..
            }
        ));
        assert_eq!(stock_of(&db, "Paracetamol").await?, 4);

        Ok(())
    }

    #[tokio::test]
    async fn test_apply_skips_zero_deltas() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_drug(&db, "A", 10).await?;
        create_test_drug(&db, "B", 10).await?;

        let deltas: DrugQuantities = [("A".to_string(), 3), ("B".to_string(), 0)]
            .into_iter()
            .collect();
        let changes = apply(&db, &deltas).await?;

        assert_eq!(changes.len(), 1);
        assert_eq!(stock_of(&db, "A").await?, 13);
        assert_eq!(stock_of(&db, "B").await?, 10);

        Ok(())
    }
}
