//! Purchase transaction manager - stock-in orders and their reconciliation.
//!
//! Every create, update and delete runs inside one database transaction covering
//! pricing, persistence of the purchase and its items, and every ledger adjustment.
//! Only a `Completed` purchase holds stock; [`stock_effect`] maps each status
//! transition to what must happen to the ledger.

use crate::{
    core::{
        calendar::BusinessCalendar,
        drug::{self, PriceBasis},
        invoice::{self, InvoiceKind},
        items::{self, DrugQuantities, LineItem},
        ledger::{self, StockChange},
    },
    entities::{Purchase, PurchaseItem, purchase, purchase_item},
    errors::{Error, Result, required_text},
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    LoaderTrait, PaginatorTrait, QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*,
};
use serde::Serialize;
use std::{fmt, str::FromStr};
use tracing::info;

pub use crate::entities::purchase::PurchaseStatus;

impl PurchaseStatus {
    /// Stored and displayed form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::OnDelivery => "On Delivery",
            Self::Completed => "Completed",
        }
    }

    /// Whether a purchase in this status contributes its items to stock.
    #[must_use]
    pub const fn holds_stock(self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PurchaseStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "Pending" => Ok(Self::Pending),
            "On Delivery" => Ok(Self::OnDelivery),
            "Completed" => Ok(Self::Completed),
            other => Err(Error::validation(format!(
                "Unknown purchase status '{other}', expected Pending, On Delivery or Completed"
            ))),
        }
    }
}

/// What a status transition does to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StockEffect {
    /// Stock is untouched by the transition itself
    None,
    /// The purchase starts holding stock: add its items
    ApplyItems,
    /// The purchase stops holding stock: remove its items
    ReverseItems,
}

/// Transition table from `(from, to)` status to ledger effect.
#[must_use]
pub const fn stock_effect(from: PurchaseStatus, to: PurchaseStatus) -> StockEffect {
    use PurchaseStatus::{Completed, OnDelivery, Pending};
    match (from, to) {
        (Pending | OnDelivery, Completed) => StockEffect::ApplyItems,
        (Completed, Pending | OnDelivery) => StockEffect::ReverseItems,
        (Pending | OnDelivery, Pending | OnDelivery) | (Completed, Completed) => StockEffect::None,
    }
}

/// Net per-drug ledger change for an update from `(from, old_items)` to
/// `(to, new_items)`. `new_items` of `None` means the items are unchanged.
///
/// The result leaves stock as if the purchase had always had its final items
/// and status.
#[must_use]
pub fn reconcile(
    from: PurchaseStatus,
    to: PurchaseStatus,
    old_items: &[LineItem],
    new_items: Option<&[LineItem]>,
) -> DrugQuantities {
    let old = items::aggregate(old_items);
    match stock_effect(from, to) {
        StockEffect::ApplyItems => new_items.map_or(old, items::aggregate),
        StockEffect::ReverseItems => items::negate(old),
        StockEffect::None if to.holds_stock() => new_items.map_or_else(DrugQuantities::new, |new| {
            items::diff(&old, &items::aggregate(new))
        }),
        StockEffect::None => DrugQuantities::new(),
    }
}

/// Input for [`create_purchase`]
#[derive(Debug, Clone)]
pub struct NewPurchase {
    /// Transaction date
    pub date: DateTime<Utc>,
    /// Supplier the order is placed with
    pub supplier_name: String,
    /// Initial status
    pub status: PurchaseStatus,
    /// Ordered items
    pub items: Vec<LineItem>,
    /// Explicit invoice; `None` assigns the next one for the day
    pub invoice: Option<String>,
    /// Creator
    pub username: String,
}

/// Partial update for [`update_purchase`]. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct PurchaseChanges {
    /// New transaction date
    pub date: Option<DateTime<Utc>>,
    /// New supplier
    pub supplier_name: Option<String>,
    /// New status
    pub status: Option<PurchaseStatus>,
    /// Replacement item list
    pub items: Option<Vec<LineItem>>,
}

/// Filters for [`list_purchases`]
#[derive(Debug, Clone, Default)]
pub struct PurchaseFilter {
    /// Business-local date
    pub date: Option<NaiveDate>,
    /// Exact status
    pub status: Option<PurchaseStatus>,
}

/// A purchase together with its items in their original order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchaseDetails {
    /// Purchase record
    pub purchase: purchase::Model,
    /// Line items
    pub items: Vec<LineItem>,
}

/// Confirmation returned by [`delete_purchase`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseReversal {
    /// Id of the deleted purchase
    pub id: i64,
    /// Its invoice
    pub invoice: String,
    /// Ledger adjustments made to undo it (empty unless it was `Completed`)
    pub stock_changes: Vec<StockChange>,
}

/// Purchase counters for dashboards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchaseOverview {
    /// Sum of stored totals over all purchases
    pub total_spent: f64,
    /// Number of completed purchases
    pub completed: u64,
    /// Number of pending purchases
    pub pending: u64,
    /// Number of purchases on delivery
    pub on_delivery: u64,
}

fn to_line_items(mut rows: Vec<purchase_item::Model>) -> Vec<LineItem> {
    rows.sort_by_key(|row| row.position);
    rows.into_iter()
        .map(|row| LineItem::new(row.drug_name, row.quantity))
        .collect()
}

async fn load_items<C>(conn: &C, purchase_id: i64) -> Result<Vec<LineItem>>
where
    C: ConnectionTrait,
{
    let rows = PurchaseItem::find()
        .filter(purchase_item::Column::PurchaseId.eq(purchase_id))
        .order_by_asc(purchase_item::Column::Position)
        .all(conn)
        .await?;
    Ok(to_line_items(rows))
}

async fn insert_items<C>(conn: &C, purchase_id: i64, line_items: &[LineItem]) -> Result<()>
where
    C: ConnectionTrait,
{
    for (position, item) in line_items.iter().enumerate() {
        let position = i32::try_from(position)
            .map_err(|_| Error::validation("a purchase cannot hold that many items"))?;
        purchase_item::ActiveModel {
            purchase_id: Set(purchase_id),
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

async fn delete_items<C>(conn: &C, purchase_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    PurchaseItem::delete_many()
        .filter(purchase_item::Column::PurchaseId.eq(purchase_id))
        .exec(conn)
        .await?;
    Ok(())
}

async fn find_purchase<C>(conn: &C, purchase_id: i64) -> Result<purchase::Model>
where
    C: ConnectionTrait,
{
    Purchase::find_by_id(purchase_id)
        .one(conn)
        .await?
        .ok_or(Error::PurchaseNotFound { id: purchase_id })
}

async fn try_create_purchase(
    db: &DatabaseConnection,
    calendar: &BusinessCalendar,
    new_purchase: &NewPurchase,
    supplier_name: &str,
    username: &str,
) -> Result<PurchaseDetails> {
    let txn = db.begin().await?;

    let total_price =
        drug::price_items(&txn, &new_purchase.items, PriceBasis::Purchase).await?;
    let invoice = match new_purchase.invoice.as_deref() {
        Some(invoice) => invoice.trim().to_string(),
        None => {
            invoice::next_invoice(&txn, calendar, InvoiceKind::Purchase, new_purchase.date)
                .await?
                .next
        }
    };

    let purchase = purchase::ActiveModel {
        invoice: Set(invoice),
        date: Set(new_purchase.date),
        supplier_name: Set(supplier_name.to_string()),
        status: Set(new_purchase.status),
        total_price: Set(total_price),
        username: Set(username.to_string()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    insert_items(&txn, purchase.id, &new_purchase.items).await?;

    let stock_changes = if purchase.status.holds_stock() {
        ledger::apply(&txn, &items::aggregate(&new_purchase.items)).await?
    } else {
        Vec::new()
    };

    txn.commit().await?;

    info!(
        invoice = %purchase.invoice,
        status = %purchase.status,
        total_price,
        adjusted = stock_changes.len(),
        "purchase created"
    );
    Ok(PurchaseDetails {
        purchase,
        items: new_purchase.items.clone(),
    })
}

/// Creates a purchase. A `Completed` purchase adds its items to stock.
///
/// When no invoice is given, the next invoice for the purchase's local day is
/// claimed in the same transaction and the whole unit of work is retried if a
/// concurrent writer took that number first.
///
/// # Errors
/// `Validation` for malformed input, `DrugNotFound` for an unknown item,
/// `UniqueConstraintViolation` for a duplicate explicit invoice.
pub async fn create_purchase(
    db: &DatabaseConnection,
    calendar: &BusinessCalendar,
    new_purchase: NewPurchase,
) -> Result<PurchaseDetails> {
    items::validate_items(&new_purchase.items)?;
    let supplier_name = required_text("Supplier name", &new_purchase.supplier_name)?;
    let username = required_text("Username", &new_purchase.username)?;
    if let Some(invoice) = new_purchase.invoice.as_deref() {
        required_text("Invoice", invoice)?;
    }

    invoice::with_invoice_retry(new_purchase.invoice.is_none(), || {
        try_create_purchase(db, calendar, &new_purchase, &supplier_name, &username)
    })
    .await
}

/// Applies a partial update and reconciles stock with a single net delta per drug.
///
/// `total_price` is recomputed at current purchase prices only when items are
/// supplied; otherwise the stored total is kept.
///
/// # Errors
/// `PurchaseNotFound`, `DrugNotFound` for an unknown new item, `Validation`.
pub async fn update_purchase(
    db: &DatabaseConnection,
    purchase_id: i64,
    changes: PurchaseChanges,
) -> Result<PurchaseDetails> {
    if let Some(new_items) = changes.items.as_deref() {
        items::validate_items(new_items)?;
    }
    let supplier_name = changes
        .supplier_name
        .as_deref()
        .map(|name| required_text("Supplier name", name))
        .transpose()?;

    let txn = db.begin().await?;

    let existing = find_purchase(&txn, purchase_id).await?;
    let old_items = load_items(&txn, purchase_id).await?;
    let from = existing.status;
    let to = changes.status.unwrap_or(from);

    let total_price = match changes.items.as_deref() {
        Some(new_items) => Some(drug::price_items(&txn, new_items, PriceBasis::Purchase).await?),
        None => None,
    };
    let deltas = reconcile(from, to, &old_items, changes.items.as_deref());
    let stock_changes = ledger::apply(&txn, &deltas).await?;

    let mut model: purchase::ActiveModel = existing.into();
    if let Some(date) = changes.date {
        model.date = Set(date);
    }
    if let Some(supplier_name) = supplier_name {
        model.supplier_name = Set(supplier_name);
    }
    model.status = Set(to);
    if let Some(total_price) = total_price {
        model.total_price = Set(total_price);
    }
    let purchase = model.update(&txn).await?;

    let line_items = match changes.items {
        Some(new_items) => {
            delete_items(&txn, purchase_id).await?;
            insert_items(&txn, purchase_id, &new_items).await?;
            new_items
        }
        None => old_items,
    };

    txn.commit().await?;

    info!(
        invoice = %purchase.invoice,
        from = %from,
        to = %to,
        adjusted = stock_changes.len(),
        "purchase updated"
    );
    Ok(PurchaseDetails {
        purchase,
        items: line_items,
    })
}

/// Deletes a purchase, removing its items from stock if it was `Completed`.
///
/// # Errors
/// `PurchaseNotFound` when the id does not exist.
pub async fn delete_purchase(db: &DatabaseConnection, purchase_id: i64) -> Result<PurchaseReversal> {
    let txn = db.begin().await?;

    let existing = find_purchase(&txn, purchase_id).await?;
    let line_items = load_items(&txn, purchase_id).await?;

    let stock_changes = if existing.status.holds_stock() {
        ledger::apply(&txn, &items::negate(items::aggregate(&line_items))).await?
    } else {
        Vec::new()
    };

    delete_items(&txn, purchase_id).await?;
    Purchase::delete_by_id(purchase_id).exec(&txn).await?;

    txn.commit().await?;

    info!(
        invoice = %existing.invoice,
        status = %existing.status,
        reversed = stock_changes.len(),
        "purchase deleted"
    );
    Ok(PurchaseReversal {
        id: existing.id,
        invoice: existing.invoice,
        stock_changes,
    })
}

/// Fetches a purchase with its items.
pub async fn get_purchase<C>(db: &C, purchase_id: i64) -> Result<PurchaseDetails>
where
    C: ConnectionTrait,
{
    let purchase = find_purchase(db, purchase_id).await?;
    let items = load_items(db, purchase_id).await?;
    Ok(PurchaseDetails { purchase, items })
}

/// Lists purchases matching `filter`, newest first.
pub async fn list_purchases<C>(
    db: &C,
    calendar: &BusinessCalendar,
    filter: &PurchaseFilter,
) -> Result<Vec<PurchaseDetails>>
where
    C: ConnectionTrait,
{
    let mut query = Purchase::find();
    if let Some(date) = filter.date {
        let (start, end) = calendar.day_bounds(date);
        query = query
            .filter(purchase::Column::Date.gte(start))
            .filter(purchase::Column::Date.lt(end));
    }
    if let Some(status) = filter.status {
        query = query.filter(purchase::Column::Status.eq(status));
    }

    let purchases = query
        .order_by_desc(purchase::Column::Date)
        .order_by_desc(purchase::Column::Id)
        .all(db)
        .await?;
    let item_rows = purchases.load_many(PurchaseItem, db).await?;

    Ok(purchases
        .into_iter()
        .zip(item_rows)
        .map(|(purchase, rows)| PurchaseDetails {
            purchase,
            items: to_line_items(rows),
        })
        .collect())
}

/// The `limit` most recent purchases, without items.
pub async fn recent_purchases<C>(db: &C, limit: u64) -> Result<Vec<purchase::Model>>
where
    C: ConnectionTrait,
{
    Purchase::find()
        .order_by_desc(purchase::Column::Date)
        .order_by_desc(purchase::Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Totals spent and purchase counts per status.
pub async fn purchase_overview<C>(db: &C) -> Result<PurchaseOverview>
where
    C: ConnectionTrait,
{
    let total_spent: Option<f64> = Purchase::find()
        .select_only()
        .column_as(purchase::Column::TotalPrice.sum(), "total_spent")
        .into_tuple::<Option<f64>>()
        .one(db)
        .await?
        .flatten();

    let count_status = |status: PurchaseStatus| {
        Purchase::find()
            .filter(purchase::Column::Status.eq(status))
            .count(db)
    };

    Ok(PurchaseOverview {
        total_spent: total_spent.unwrap_or(0.0),
        completed: count_status(PurchaseStatus::Completed).await?,
        pending: count_status(PurchaseStatus::Pending).await?,
        on_delivery: count_status(PurchaseStatus::OnDelivery).await?,
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

    fn quantities(pairs: &[(&str, i64)]) -> DrugQuantities {
        pairs.iter().map(|(d, q)| ((*d).to_string(), *q)).collect()
    }

    #[test]
    fn test_status_parse_and_display() {
        assert_eq!(
            "On Delivery".parse::<PurchaseStatus>().unwrap(),
            PurchaseStatus::OnDelivery
        );
        assert_eq!(PurchaseStatus::Completed.to_string(), "Completed");
        assert!(matches!(
            "Shipped".parse::<PurchaseStatus>(),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn test_stock_effect_table() {
        use PurchaseStatus::{Completed, OnDelivery, Pending};
        assert_eq!(stock_effect(Pending, Completed), StockEffect::ApplyItems);
        assert_eq!(stock_effect(OnDelivery, Completed), StockEffect::ApplyItems);
        assert_eq!(stock_effect(Completed, Pending), StockEffect::ReverseItems);
        assert_eq!(stock_effect(Completed, OnDelivery), StockEffect::ReverseItems);
        assert_eq!(stock_effect(Pending, OnDelivery), StockEffect::None);
        assert_eq!(stock_effect(OnDelivery, Pending), StockEffect::None);
        assert_eq!(stock_effect(Completed, Completed), StockEffect::None);
        assert_eq!(stock_effect(Pending, Pending), StockEffect::None);
    }

    #[test]
    fn test_reconcile_nets_transition_and_item_change() {
        use PurchaseStatus::{Completed, Pending};
        let old = vec![LineItem::new("A", 5)];
        let new = vec![LineItem::new("A", 3), LineItem::new("B", 2)];

        // Becoming Completed applies only the new items, never old + diff
        assert_eq!(
            reconcile(Pending, Completed, &old, Some(&new)),
            quantities(&[("A", 3), ("B", 2)])
        );
        assert_eq!(
            reconcile(Pending, Completed, &old, None),
            quantities(&[("A", 5)])
        );
        assert_eq!(
            reconcile(Completed, Pending, &old, Some(&new)),
            quantities(&[("A", -5)])
        );
        assert_eq!(
            reconcile(Completed, Completed, &old, Some(&new)),
            quantities(&[("A", -2), ("B", 2)])
        );
        assert!(reconcile(Completed, Completed, &old, None).is_empty());
        assert!(reconcile(Pending, Pending, &old, Some(&new)).is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_bad_input_before_storage() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let calendar = test_calendar();

        let bad_items = purchase_input(at(15, 3), PurchaseStatus::Completed, vec![LineItem::new("A", 0)]);
        let result = create_purchase(&db, &calendar, bad_items).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        let mut blank_supplier =
            purchase_input(at(15, 3), PurchaseStatus::Completed, vec![LineItem::new("A", 1)]);
        blank_supplier.supplier_name = "  ".to_string();
        let result = create_purchase(&db, &calendar, blank_supplier).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_completed_create_then_delete_restores_stock() -> Result<()> {
        let db = setup_test_db().await?;
        let calendar = test_calendar();
        create_test_drug(&db, "Paracetamol", 10).await?;
        create_test_drug(&db, "Amoxicillin", 4).await?;

        let created = create_purchase(
            &db,
            &calendar,
            purchase_input(
                at(15, 3),
                PurchaseStatus::Completed,
                vec![
                    LineItem::new("Paracetamol", 20),
                    LineItem::new("Amoxicillin", 6),
                ],
            ),
        )
        .await?;

        assert_eq!(created.purchase.invoice, "INV-P-20240115-01");
        assert_eq!(created.purchase.total_price, 26_000.0);
        assert_eq!(stock_of(&db, "Paracetamol").await?, 30);
        assert_eq!(stock_of(&db, "Amoxicillin").await?, 10);

        let reversal = delete_purchase(&db, created.purchase.id).await?;
        assert_eq!(reversal.invoice, "INV-P-20240115-01");
        assert_eq!(reversal.stock_changes.len(), 2);
        assert_eq!(stock_of(&db, "Paracetamol").await?, 10);
        assert_eq!(stock_of(&db, "Amoxicillin").await?, 4);

        assert!(matches!(
            get_purchase(&db, created.purchase.id).await.unwrap_err(),
            Error::PurchaseNotFound { .. }
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_pending_purchase_never_touches_stock() -> Result<()> {
        let db = setup_test_db().await?;
        let calendar = test_calendar();
        create_test_drug(&db, "Paracetamol", 10).await?;

        let created = create_purchase(
            &db,
            &calendar,
            purchase_input(at(15, 3), PurchaseStatus::Pending, vec![LineItem::new("Paracetamol", 5)]),
        )
        .await?;
        assert_eq!(stock_of(&db, "Paracetamol").await?, 10);

        let reversal = delete_purchase(&db, created.purchase.id).await?;
        assert!(reversal.stock_changes.is_empty());
        assert_eq!(stock_of(&db, "Paracetamol").await?, 10);

        Ok(())
    }

    #[tokio::test]
    async fn test_status_round_trip_is_net_zero() -> Result<()> {
        let db = setup_test_db().await?;
        let calendar = test_calendar();
        create_test_drug(&db, "Paracetamol", 10).await?;

        let created = create_purchase(
            &db,
            &calendar,
            purchase_input(at(15, 3), PurchaseStatus::Completed, vec![LineItem::new("Paracetamol", 5)]),
        )
        .await?;
        assert_eq!(stock_of(&db, "Paracetamol").await?, 15);

        let to_pending = PurchaseChanges {
            status: Some(PurchaseStatus::Pending),
            ..Default::default()
        };
        update_purchase(&db, created.purchase.id, to_pending).await?;
        assert_eq!(stock_of(&db, "Paracetamol").await?, 10);

        let back = PurchaseChanges {
            status: Some(PurchaseStatus::Completed),
            items: Some(vec![LineItem::new("Paracetamol", 5)]),
            ..Default::default()
        };
        let updated = update_purchase(&db, created.purchase.id, back).await?;
        assert_eq!(updated.purchase.status, PurchaseStatus::Completed);
        assert_eq!(stock_of(&db, "Paracetamol").await?, 15);

        Ok(())
    }

    #[tokio::test]
    async fn test_completing_with_new_items_applies_only_new_items() -> Result<()> {
        let db = setup_test_db().await?;
        let calendar = test_calendar();
        create_test_drug(&db, "A", 0).await?;
        create_test_drug(&db, "B", 0).await?;

        let created = create_purchase(
            &db,
            &calendar,
            purchase_input(at(15, 3), PurchaseStatus::OnDelivery, vec![LineItem::new("A", 5)]),
        )
        .await?;

        let changes = PurchaseChanges {
            status: Some(PurchaseStatus::Completed),
            items: Some(vec![LineItem::new("A", 3), LineItem::new("B", 2)]),
            ..Default::default()
        };
        let updated = update_purchase(&db, created.purchase.id, changes).await?;

        assert_eq!(stock_of(&db, "A").await?, 3);
        assert_eq!(stock_of(&db, "B").await?, 2);
        assert_eq!(updated.purchase.total_price, 5000.0);
        assert_eq!(updated.items.len(), 2);

        let stored = get_purchase(&db, created.purchase.id).await?;
        assert_eq!(stored.items, updated.items);

        Ok(())
    }

    #[tokio::test]
    async fn test_completed_item_edit_applies_diff_with_duplicates() -> Result<()> {
        let db = setup_test_db().await?;
        let calendar = test_calendar();
        create_test_drug(&db, "A", 0).await?;
        create_test_drug(&db, "B", 0).await?;

        let created = create_purchase(
            &db,
            &calendar,
            purchase_input(
                at(15, 3),
                PurchaseStatus::Completed,
                vec![LineItem::new("A", 2), LineItem::new("A", 3)],
            ),
        )
        .await?;
        assert_eq!(stock_of(&db, "A").await?, 5);

        let changes = PurchaseChanges {
            items: Some(vec![
                LineItem::new("A", 1),
                LineItem::new("B", 4),
                LineItem::new("A", 1),
            ]),
            ..Default::default()
        };
        update_purchase(&db, created.purchase.id, changes).await?;

        assert_eq!(stock_of(&db, "A").await?, 2);
        assert_eq!(stock_of(&db, "B").await?, 4);

        Ok(())
    }

    #[tokio::test]
    async fn test_update_without_items_keeps_total() -> Result<()> {
        let db = setup_test_db().await?;
        let calendar = test_calendar();
        create_test_drug(&db, "Paracetamol", 0).await?;

        let created = create_purchase(
            &db,
            &calendar,
            purchase_input(at(15, 3), PurchaseStatus::Pending, vec![LineItem::new("Paracetamol", 3)]),
        )
        .await?;

        let changes = PurchaseChanges {
            supplier_name: Some("PT Enseval".to_string()),
            ..Default::default()
        };
        let updated = update_purchase(&db, created.purchase.id, changes).await?;

        assert_eq!(updated.purchase.supplier_name, "PT Enseval");
        assert_eq!(updated.purchase.total_price, 3000.0);
        assert_eq!(updated.items, vec![LineItem::new("Paracetamol", 3)]);

        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_drug_rolls_back_everything() -> Result<()> {
        let db = setup_test_db().await?;
        let calendar = test_calendar();
        create_test_drug(&db, "Paracetamol", 10).await?;

        let result = create_purchase(
            &db,
            &calendar,
            purchase_input(
                at(15, 3),
                PurchaseStatus::Completed,
                vec![LineItem::new("Paracetamol", 5), LineItem::new("Unobtainium", 1)],
            ),
        )
        .await;
        assert!(matches!(
            result.unwrap_err(),
            Error::DrugNotFound { name } if name == "Unobtainium"
        ));
        assert_eq!(stock_of(&db, "Paracetamol").await?, 10);
        assert!(recent_purchases(&db, 10).await?.is_empty());

        let created = create_purchase(
            &db,
            &calendar,
            purchase_input(at(15, 3), PurchaseStatus::Completed, vec![LineItem::new("Paracetamol", 5)]),
        )
        .await?;
        let changes = PurchaseChanges {
            items: Some(vec![LineItem::new("Unobtainium", 1)]),
            ..Default::default()
        };
        let result = update_purchase(&db, created.purchase.id, changes).await;
        assert!(result.unwrap_err().is_not_found());
        assert_eq!(stock_of(&db, "Paracetamol").await?, 15);

        Ok(())
    }

    #[tokio::test]
    async fn test_missing_purchase() -> Result<()> {
        let db = setup_test_db().await?;

        let result = update_purchase(&db, 42, PurchaseChanges::default()).await;
        assert!(matches!(result.unwrap_err(), Error::PurchaseNotFound { id: 42 }));
        let result = delete_purchase(&db, 42).await;
        assert!(matches!(result.unwrap_err(), Error::PurchaseNotFound { id: 42 }));

        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_explicit_invoice() -> Result<()> {
        let db = setup_test_db().await?;
        let calendar = test_calendar();
        create_test_drug(&db, "Paracetamol", 0).await?;

        let mut input =
            purchase_input(at(15, 3), PurchaseStatus::Completed, vec![LineItem::new("Paracetamol", 1)]);
        input.invoice = Some("INV-P-20240115-01".to_string());
        create_purchase(&db, &calendar, input.clone()).await?;

        let result = create_purchase(&db, &calendar, input).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::UniqueConstraintViolation { .. }
        ));
        assert_eq!(stock_of(&db, "Paracetamol").await?, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_listing_and_overview() -> Result<()> {
        let db = setup_test_db().await?;
        let calendar = test_calendar();
        create_test_drug(&db, "Paracetamol", 0).await?;

        for (day, status) in [
            (15, PurchaseStatus::Completed),
            (15, PurchaseStatus::Pending),
            (16, PurchaseStatus::OnDelivery),
        ] {
            create_purchase(
                &db,
                &calendar,
                purchase_input(at(day, 3), status, vec![LineItem::new("Paracetamol", 2)]),
            )
            .await?;
        }

        let all = list_purchases(&db, &calendar, &PurchaseFilter::default()).await?;
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].purchase.invoice, "INV-P-20240116-01");
        assert!(all.iter().all(|p| p.items == vec![LineItem::new("Paracetamol", 2)]));

        let filter = PurchaseFilter {
            date: NaiveDate::from_ymd_opt(2024, 1, 15),
            status: Some(PurchaseStatus::Pending),
        };
        let pending = list_purchases(&db, &calendar, &filter).await?;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].purchase.invoice, "INV-P-20240115-02");

        assert_eq!(recent_purchases(&db, 2).await?.len(), 2);

        let overview = purchase_overview(&db).await?;
        assert_eq!(
            overview,
            PurchaseOverview {
                total_spent: 6000.0,
                completed: 1,
                pending: 1,
                on_delivery: 1,
            }
        );

        Ok(())
    }
}
