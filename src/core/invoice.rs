//! Invoice sequencer - per-day, per-kind invoice numbers.
//!
//! Invoices look like `INV-P-20240115-07`: kind prefix, business-local date and a
//! sequence that restarts at 1 each day. The next number is derived from the
//! highest sequence among invoices already carrying that kind and local date.
//!
//! Claiming a number for a new record happens inside the transaction that inserts
//! the record. The unique index on `invoice` rejects a concurrent duplicate, and
//! [`with_invoice_retry`] reruns the whole unit of work with a fresh number.

use crate::{
    core::calendar::BusinessCalendar,
    entities::{Purchase, Sale, purchase, sale},
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{QuerySelect, prelude::*};
use serde::Serialize;
use std::future::Future;
use tracing::warn;

/// Attempts made for a unit of work whose invoice number was auto-assigned.
pub const MAX_INVOICE_ATTEMPTS: usize = 3;

/// Which transaction table an invoice belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InvoiceKind {
    /// Stock-in, prefix `P`
    Purchase,
    /// Stock-out, prefix `S`
    Sale,
}

impl InvoiceKind {
    /// Single-letter prefix used in the invoice string.
    #[must_use]
    pub const fn prefix(self) -> char {
        match self {
            Self::Purchase => 'P',
            Self::Sale => 'S',
        }
    }
}

/// Preview of the next invoice for a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NextInvoice {
    /// Highest invoice already issued that day, if any
    pub last: Option<String>,
    /// Invoice the next record will receive
    pub next: String,
}

/// Formats `INV-{P|S}-{yyyyMMdd}-{sequence:02}`.
#[must_use]
pub fn format_invoice(kind: InvoiceKind, date: NaiveDate, sequence: u32) -> String {
    format!("{}{sequence:02}", day_prefix(kind, date))
}

/// Reads the trailing numeric suffix of an invoice. Anything unparseable counts as 0.
#[must_use]
pub fn parse_sequence(invoice: &str) -> u32 {
    invoice
        .rsplit('-')
        .next()
        .and_then(|suffix| suffix.trim().parse().ok())
        .unwrap_or(0)
}

/// `INV-{P|S}-{yyyyMMdd}-`, shared by every invoice issued for that kind and day.
fn day_prefix(kind: InvoiceKind, date: NaiveDate) -> String {
    format!("INV-{}-{}-", kind.prefix(), date.format("%Y%m%d"))
}

async fn invoices_on_day<C>(conn: &C, kind: InvoiceKind, date: NaiveDate) -> Result<Vec<String>>
where
    C: ConnectionTrait,
{
    // Matched on the invoice itself: a record whose date was edited keeps its
    // invoice, and that number stays taken for the day it names.
    let prefix = day_prefix(kind, date);
    let invoices = match kind {
        InvoiceKind::Purchase => {
            Purchase::find()
                .select_only()
                .column(purchase::Column::Invoice)
                .filter(purchase::Column::Invoice.starts_with(prefix.as_str()))
                .into_tuple::<String>()
                .all(conn)
                .await?
        }
        InvoiceKind::Sale => {
            Sale::find()
                .select_only()
                .column(sale::Column::Invoice)
                .filter(sale::Column::Invoice.starts_with(prefix.as_str()))
                .into_tuple::<String>()
                .all(conn)
                .await?
        }
    };
    Ok(invoices)
}

/// Computes the next invoice for the local day containing `at`.
///
/// The last invoice is the one with the highest parsed sequence, so numbering
/// keeps counting correctly past 99 where a plain string sort would not.
pub async fn next_invoice<C>(
    conn: &C,
    calendar: &BusinessCalendar,
    kind: InvoiceKind,
    at: DateTime<Utc>,
) -> Result<NextInvoice>
where
    C: ConnectionTrait,
{
    let date = calendar.local_date(at);
    let last = invoices_on_day(conn, kind, date)
        .await?
        .into_iter()
        .max_by(|a, b| {
            parse_sequence(a)
                .cmp(&parse_sequence(b))
                .then_with(|| a.cmp(b))
        });

    let sequence = last.as_deref().map_or(0, parse_sequence).saturating_add(1);
    Ok(NextInvoice {
        next: format_invoice(kind, date, sequence),
        last,
    })
}

/// Runs `operation`, retrying when an auto-assigned invoice collided with a
/// concurrent writer. Explicit invoices are never retried.
pub(crate) async fn with_invoice_retry<T, F, Fut>(auto_assigned: bool, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Err(Error::UniqueConstraintViolation { message })
                if auto_assigned && attempt < MAX_INVOICE_ATTEMPTS =>
            {
                warn!(attempt, %message, "invoice number collided, retrying");
                attempt += 1;
            }
            result => return result,
        }
    }
}
