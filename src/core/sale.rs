//! Sale transaction manager - stock-out transactions.
//!
//! A sale takes its items out of stock from the moment it exists. Creation checks
//! every drug against current stock and then withdraws through the guarded ledger
//! operation, so a concurrent sale that passed the same check still cannot drive
//! stock below zero. Updates and deletes reconcile without re-checking stock.

use crate::{
    core::{
        calendar::BusinessCalendar,
        drug::{self, PriceBasis},
        invoice::{self, InvoiceKind},
        items::{self, LineItem},
        ledger::{self, StockChange},
    },
    entities::{Sale, SaleItem, sale, sale_item},
    errors::{Error, Result, required_text},
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    LoaderTrait, PaginatorTrait, QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*,
};
use serde::Serialize;
use tracing::{debug, info};

/// Input for [`create_sale`]
#[derive(Debug, Clone)]
pub struct NewSale {
    /// Transaction date
    pub date: DateTime<Utc>,
    /// Explicit invoice; `None` assigns the next one for the day
    pub invoice: Option<String>,
    /// Sold items
    pub items: Vec<LineItem>,
    /// Cashier
    pub username: String,
}

/// Partial update for [`update_sale`]. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct SaleChanges {
    /// New transaction date
    pub date: Option<DateTime<Utc>>,
    /// New invoice
    pub invoice: Option<String>,
    /// Replacement item list
    pub items: Option<Vec<LineItem>>,
    /// New cashier
    pub username: Option<String>,
}

/// A sale together with its items in their original order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleDetails {
    /// Sale record
    pub sale: sale::Model,
    /// Line items
    pub items: Vec<LineItem>,
}

/// Confirmation returned by [`delete_sale`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaleReversal {
    /// Id of the deleted sale
    pub id: i64,
    /// Its invoice
    pub invoice: String,
    /// Ledger adjustments that returned its items to stock
    pub stock_changes: Vec<StockChange>,
}

/// Sale counters for dashboards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesTotals {
    /// Number of sales
    pub sales_count: u64,
    /// Sum of stored sale totals
    pub total_income: f64,
}

fn to_line_items(mut rows: Vec<sale_item::Model>) -> Vec<LineItem> {
    rows.sort_by_key(|row| row.position);
    rows.into_iter()
        .map(|row| LineItem::new(row.drug_name, row.quantity))
        .collect()
}

async fn load_items<C>(conn: &C, sale_id: i64) -> Result<Vec<LineItem>>
where
    C: ConnectionTrait,
{
    let rows = SaleItem::find()
        .filter(sale_item::Column::SaleId.eq(sale_id))
        .order_by_asc(sale_item::Column::Position)
        .all(conn)
        .await?;
    Ok(to_line_items(rows))
}

async fn replace_items<C>(conn: &C, sale_id: i64, line_items: &[LineItem]) -> Result<()>
where
    C: ConnectionTrait,
{
    SaleItem::delete_many()
        .filter(sale_item::Column::SaleId.eq(sale_id))
        .exec(conn)
        .await?;

    for (position, item) in line_items.iter().enumerate() {
        let position = i32::try_from(position)
            .map_err(|_| Error::validation("a sale cannot hold that many items"))?;
        sale_item::ActiveModel {
            sale_id: Set(sale_id),
            position: Set(position),
            drug_name: Set(item.drug_name.clone()),
            quantity: Set(item.quantity),
            ..Default::default()
        }
        .insert(conn)
        .await?;
    }
    Ok(())
}

async fn find_sale<C>(conn: &C, sale_id: i64) -> Result<sale::Model>
where
    C: ConnectionTrait,
{
    Sale::find_by_id(sale_id)
        .one(conn)
        .await?
        .ok_or(Error::SaleNotFound { id: sale_id })
}

async fn try_create_sale(
    db: &DatabaseConnection,
    calendar: &BusinessCalendar,
    new_sale: &NewSale,
    username: &str,
) -> Result<SaleDetails> {
    let txn = db.begin().await?;

    let demand = items::aggregate(&new_sale.items);
    for (drug_name, &requested) in &demand {
        let drug = drug::require_drug_by_name(&txn, drug_name).await?;
        if drug.quantity < requested {
            return Err(Error::InsufficientStock {
                drug: drug.name,
                available: drug.quantity,
                requested,
            });
        }
    }

    let total_price = drug::price_items(&txn, &new_sale.items, PriceBasis::Selling).await?;
    let invoice = match new_sale.invoice.as_deref() {
        Some(invoice) => invoice.trim().to_string(),
        None => {
            invoice::next_invoice(&txn, calendar, InvoiceKind::Sale, new_sale.date)
                .await?
                .next
        }
    };

    let sale = sale::ActiveModel {
        invoice: Set(invoice),
        date: Set(new_sale.date),
        total_price: Set(total_price),
        username: Set(username.to_string()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    replace_items(&txn, sale.id, &new_sale.items).await?;

    let mut stock_changes = Vec::with_capacity(demand.len());
    for (drug_name, &requested) in &demand {
        stock_changes.push(ledger::withdraw(&txn, drug_name, requested).await?);
    }

    txn.commit().await?;

    debug!(?stock_changes, "sale withdrew stock");
    info!(invoice = %sale.invoice, total_price, "sale created");
    Ok(SaleDetails {
        sale,
        items: new_sale.items.clone(),
    })
}

/// Creates a sale and takes its items out of stock.
///
/// # Errors
/// `Validation` for malformed input, `DrugNotFound` for an unknown item,
/// `InsufficientStock` when any drug cannot cover its summed quantity,
/// `UniqueConstraintViolation` for a duplicate explicit invoice.
pub async fn create_sale(
    db: &DatabaseConnection,
    calendar: &BusinessCalendar,
    new_sale: NewSale,
) -> Result<SaleDetails> {
    items::validate_items(&new_sale.items)?;
    let username = required_text("Username", &new_sale.username)?;
    if let Some(invoice) = new_sale.invoice.as_deref() {
        required_text("Invoice", invoice)?;
    }

    invoice::with_invoice_retry(new_sale.invoice.is_none(), || {
        try_create_sale(db, calendar, &new_sale, &username)
    })
    .await
}

/// Applies a partial update. Replacing items moves the difference between the
/// old and new items through the ledger; stock is not re-checked.
///
/// `total_price` is recomputed at current selling prices only when items are
/// supplied.
///
/// # Errors
/// `SaleNotFound`, `DrugNotFound` for an unknown new item, `Validation`.
pub async fn update_sale(
    db: &DatabaseConnection,
    sale_id: i64,
    changes: SaleChanges,
) -> Result<SaleDetails> {
    if let Some(new_items) = changes.items.as_deref() {
        items::validate_items(new_items)?;
    }
    let invoice = changes
        .invoice
        .as_deref()
        .map(|invoice| required_text("Invoice", invoice))
        .transpose()?;
    let username = changes
        .username
        .as_deref()
        .map(|username| required_text("Username", username))
        .transpose()?;

    let txn = db.begin().await?;

    let existing = find_sale(&txn, sale_id).await?;
    let old_items = load_items(&txn, sale_id).await?;

    let mut model: sale::ActiveModel = existing.into();
    let mut stock_changes = Vec::new();
    if let Some(new_items) = changes.items.as_deref() {
        let total_price = drug::price_items(&txn, new_items, PriceBasis::Selling).await?;
        let sold_more = items::diff(&items::aggregate(&old_items), &items::aggregate(new_items));
        stock_changes = ledger::apply(&txn, &items::negate(sold_more)).await?;
        replace_items(&txn, sale_id, new_items).await?;
        model.total_price = Set(total_price);
    }
    if let Some(date) = changes.date {
        model.date = Set(date);
    }
    if let Some(invoice) = invoice {
        model.invoice = Set(invoice);
    }
    if let Some(username) = username {
        model.username = Set(username);
    }
    let sale = model.update(&txn).await?;

    txn.commit().await?;

    info!(
        invoice = %sale.invoice,
        adjusted = stock_changes.len(),
        "sale updated"
    );
    Ok(SaleDetails {
        sale,
        items: changes.items.unwrap_or(old_items),
    })
}

/// Deletes a sale and returns every item to stock.
///
/// # Errors
/// `SaleNotFound` when the id does not exist.
pub async fn delete_sale(db: &DatabaseConnection, sale_id: i64) -> Result<SaleReversal> {
    let txn = db.begin().await?;

    let existing = find_sale(&txn, sale_id).await?;
    let line_items = load_items(&txn, sale_id).await?;
    let stock_changes = ledger::apply(&txn, &items::aggregate(&line_items)).await?;

    SaleItem::delete_many()
        .filter(sale_item::Column::SaleId.eq(sale_id))
        .exec(&txn)
        .await?;
    Sale::delete_by_id(sale_id).exec(&txn).await?;

    txn.commit().await?;

    info!(invoice = %existing.invoice, restored = stock_changes.len(), "sale deleted");
    Ok(SaleReversal {
        id: existing.id,
        invoice: existing.invoice,
        stock_changes,
    })
}

/// Fetches a sale with its items.
pub async fn get_sale<C>(db: &C, sale_id: i64) -> Result<SaleDetails>
where
    C: ConnectionTrait,
{
    let sale = find_sale(db, sale_id).await?;
    let items = load_items(db, sale_id).await?;
    Ok(SaleDetails { sale, items })
}

/// Lists sales, newest first, optionally restricted to one business-local date.
pub async fn list_sales<C>(
    db: &C,
    calendar: &BusinessCalendar,
    date: Option<NaiveDate>,
) -> Result<Vec<SaleDetails>>
where
    C: ConnectionTrait,
{
    let mut query = Sale::find();
    if let Some(date) = date {
        let (start, end) = calendar.day_bounds(date);
        query = query
            .filter(sale::Column::Date.gte(start))
            .filter(sale::Column::Date.lt(end));
    }

    let sales = query
        .order_by_desc(sale::Column::Date)
        .order_by_desc(sale::Column::Id)
        .all(db)
        .await?;
    let item_rows = sales.load_many(SaleItem, db).await?;

    Ok(sales
        .into_iter()
        .zip(item_rows)
        .map(|(sale, rows)| SaleDetails {
            sale,
            items: to_line_items(rows),
        })
        .collect())
}

/// The `limit` most recent sales, without items.
pub async fn recent_sales<C>(db: &C, limit: u64) -> Result<Vec<sale::Model>>
where
    C: ConnectionTrait,
{
    Sale::find()
        .order_by_desc(sale::Column::Date)
        .order_by_desc(sale::Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Number of sales and their summed totals.
pub async fn sales_totals<C>(db: &C) -> Result<SalesTotals>
where
    C: ConnectionTrait,
{
    let sales_count = Sale::find().count(db).await?;
    let total_income: Option<f64> = Sale::find()
        .select_only()
        .column_as(sale::Column::TotalPrice.sum(), "total_income")
        .into_tuple::<Option<f64>>()
        .one(db)
        .await?
        .flatten();

    Ok(SalesTotals {
        sales_count,
        total_income: total_income.unwrap_or(0.0),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;
    use chrono::TimeZone;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_create_rejects_bad_input_before_storage() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let calendar = test_calendar();

        let result = create_sale(&db, &calendar, sale_input(at(15, 3), vec![LineItem::new("A", -1)])).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        let mut nameless = sale_input(at(15, 3), vec![LineItem::new("A", 1)]);
        nameless.username = String::new();
        let result = create_sale(&db, &calendar, nameless).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_decrements_each_item() -> Result<()> {
        let db = setup_test_db().await?;
        let calendar = test_calendar();
        create_test_drug(&db, "Paracetamol", 10).await?;
        create_test_drug(&db, "Amoxicillin", 5).await?;

        let created = create_sale(
            &db,
            &calendar,
            sale_input(
                at(15, 3),
                vec![LineItem::new("Paracetamol", 4), LineItem::new("Amoxicillin", 5)],
            ),
        )
        .await?;

        assert_eq!(created.sale.invoice, "INV-S-20240115-01");
        assert_eq!(created.sale.total_price, 13_500.0);
        assert_eq!(stock_of(&db, "Paracetamol").await?, 6);
        assert_eq!(stock_of(&db, "Amoxicillin").await?, 0);

        let stored = get_sale(&db, created.sale.id).await?;
        assert_eq!(stored.items, created.items);

        Ok(())
    }

    #[tokio::test]
    async fn test_insufficient_stock_leaves_everything_unchanged() -> Result<()> {
        let db = setup_test_db().await?;
        let calendar = test_calendar();
        create_test_drug(&db, "Paracetamol", 10).await?;
        create_test_drug(&db, "Amoxicillin", 2).await?;

        let result = create_sale(
            &db,
            &calendar,
            sale_input(
                at(15, 3),
                vec![LineItem::new("Paracetamol", 4), LineItem::new("Amoxicillin", 3)],
            ),
        )
        .await;

        assert!(matches!(
            result.unwrap_err(),
            Error::InsufficientStock { drug, available: 2, requested: 3 } if drug == "Amoxicillin"
        ));
        assert_eq!(stock_of(&db, "Paracetamol").await?, 10);
        assert_eq!(stock_of(&db, "Amoxicillin").await?, 2);
        assert!(recent_sales(&db, 10).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_names_are_checked_against_their_sum() -> Result<()> {
        let db = setup_test_db().await?;
        let calendar = test_calendar();
        create_test_drug(&db, "Paracetamol", 5).await?;

        let result = create_sale(
            &db,
            &calendar,
            sale_input(
                at(15, 3),
                vec![LineItem::new("Paracetamol", 3), LineItem::new("Paracetamol", 3)],
            ),
        )
        .await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InsufficientStock { requested: 6, .. }
        ));
        assert_eq!(stock_of(&db, "Paracetamol").await?, 5);

        Ok(())
    }

    #[tokio::test]
    async fn test_update_replaces_items_with_net_delta() -> Result<()> {
        let db = setup_test_db().await?;
        let calendar = test_calendar();
        create_test_drug(&db, "A", 10).await?;
        create_test_drug(&db, "B", 10).await?;

        let created = create_sale(&db, &calendar, sale_input(at(15, 3), vec![LineItem::new("A", 5)])).await?;
        assert_eq!(stock_of(&db, "A").await?, 5);

        let changes = SaleChanges {
            items: Some(vec![LineItem::new("A", 3), LineItem::new("B", 2)]),
            ..Default::default()
        };
        let updated = update_sale(&db, created.sale.id, changes).await?;

        // A gets 2 back, B loses 2
        assert_eq!(stock_of(&db, "A").await?, 7);
        assert_eq!(stock_of(&db, "B").await?, 8);
        assert_eq!(updated.sale.total_price, 7500.0);
        assert_eq!(updated.sale.invoice, created.sale.invoice);

        Ok(())
    }

    #[tokio::test]
    async fn test_update_does_not_recheck_stock() -> Result<()> {
        let db = setup_test_db().await?;
        let calendar = test_calendar();
        create_test_drug(&db, "A", 2).await?;

        let created = create_sale(&db, &calendar, sale_input(at(15, 3), vec![LineItem::new("A", 2)])).await?;
        let changes = SaleChanges {
            items: Some(vec![LineItem::new("A", 5)]),
            ..Default::default()
        };
        update_sale(&db, created.sale.id, changes).await?;
        assert_eq!(stock_of(&db, "A").await?, -3);

        Ok(())
    }

    #[tokio::test]
    async fn test_update_metadata_keeps_items_and_total() -> Result<()> {
        let db = setup_test_db().await?;
        let calendar = test_calendar();
        create_test_drug(&db, "A", 10).await?;

        let created = create_sale(&db, &calendar, sale_input(at(15, 3), vec![LineItem::new("A", 2)])).await?;
        let changes = SaleChanges {
            username: Some("night-shift".to_string()),
            ..Default::default()
        };
        let updated = update_sale(&db, created.sale.id, changes).await?;

        assert_eq!(updated.sale.username, "night-shift");
        assert_eq!(updated.sale.total_price, created.sale.total_price);
        assert_eq!(updated.items, created.items);
        assert_eq!(stock_of(&db, "A").await?, 8);

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_restores_stock() -> Result<()> {
        let db = setup_test_db().await?;
        let calendar = test_calendar();
        create_test_drug(&db, "A", 10).await?;

        let created = create_sale(
            &db,
            &calendar,
            sale_input(at(15, 3), vec![LineItem::new("A", 2), LineItem::new("A", 3)]),
        )
        .await?;
        assert_eq!(stock_of(&db, "A").await?, 5);

        let reversal = delete_sale(&db, created.sale.id).await?;
        assert_eq!(reversal.stock_changes.len(), 1);
        assert_eq!(reversal.stock_changes[0].delta, 5);
        assert_eq!(stock_of(&db, "A").await?, 10);

        assert!(matches!(
            delete_sale(&db, created.sale.id).await.unwrap_err(),
            Error::SaleNotFound { .. }
        ));
        assert!(matches!(
            update_sale(&db, created.sale.id, SaleChanges::default()).await.unwrap_err(),
            Error::SaleNotFound { .. }
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_competing_sales_never_oversell() -> Result<()> {
        // The in-memory pool has one connection, so these transactions run one
        // after the other and the loser stops at the stock check. A withdrawal
        // racing past a stale check is covered by
        // `ledger::tests::test_withdraw_rejects_a_stale_stock_check`.
        let db = setup_test_db().await?;
        let calendar = test_calendar();
        create_test_drug(&db, "Paracetamol", 10).await?;

        let (first, second) = tokio::join!(
            create_sale(&db, &calendar, sale_input(at(15, 3), vec![LineItem::new("Paracetamol", 6)])),
            create_sale(&db, &calendar, sale_input(at(15, 3), vec![LineItem::new("Paracetamol", 6)])),
        );
        let results = [first, second];
        let successes = results.iter().filter(|r| r.is_ok()).count();
        let shortages = results
            .iter()
            .filter(|r| matches!(r, Err(Error::InsufficientStock { .. })))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(shortages, 1);
        assert_eq!(stock_of(&db, "Paracetamol").await?, 4);

        let (first, second) = tokio::join!(
            create_sale(&db, &calendar, sale_input(at(15, 3), vec![LineItem::new("Paracetamol", 2)])),
            create_sale(&db, &calendar, sale_input(at(15, 3), vec![LineItem::new("Paracetamol", 2)])),
        );
        let first = first?;
        let second = second?;
        assert_ne!(first.sale.invoice, second.sale.invoice);
        assert_eq!(stock_of(&db, "Paracetamol").await?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_listing_and_totals() -> Result<()> {
        let db = setup_test_db().await?;
        let calendar = test_calendar();
        create_test_drug(&db, "A", 100).await?;

        for day in [15, 15, 16] {
            create_sale(&db, &calendar, sale_input(at(day, 3), vec![LineItem::new("A", 1)])).await?;
        }

        let all = list_sales(&db, &calendar, None).await?;
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].sale.invoice, "INV-S-20240116-01");
        assert_eq!(all[0].items, vec![LineItem::new("A", 1)]);

        let on_15th = list_sales(&db, &calendar, NaiveDate::from_ymd_opt(2024, 1, 15)).await?;
        assert_eq!(on_15th.len(), 2);
        assert_eq!(on_15th[0].sale.invoice, "INV-S-20240115-02");

        let totals = sales_totals(&db).await?;
        assert_eq!(
            totals,
            SalesTotals {
                sales_count: 3,
                total_income: 4500.0,
            }
        );

        Ok(())
    }
}
