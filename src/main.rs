use chrono::Utc;
use dotenvy::dotenv;
use pharmacy_inventory::{
    config::{database, settings},
    core::{
        calendar::BusinessCalendar,
        catalog, drug,
        invoice::{self, InvoiceKind},
        store,
    },
    errors::Result,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; DATABASE_URL may also be set externally
    dotenv().ok();

    // 3. Load the application configuration
    let app_config = settings::load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;
    let calendar = BusinessCalendar::from_config(&app_config.business)?;
    info!(offset = %calendar.offset(), "Business calendar configured.");

    // 4. Open the database and make sure every table exists
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db).await?;

    // 5. Seed the store profile and catalog from config.toml
    let profile = store::ensure_store_profile(&db, &app_config.store).await?;
    catalog::seed_catalog(&db, &app_config)
        .await
        .inspect_err(|e| error!("Failed to seed catalog: {}", e))?;

    // 6. Report where the inventory stands
    let stats = drug::drug_statistics(&db, calendar.today()).await?;
    info!(
        store = %profile.name,
        total_drugs = stats.total_drugs,
        total_quantity = stats.total_quantity,
        expired = stats.expired_drugs,
        out_of_stock = stats.out_of_stock_drugs,
        "Inventory loaded."
    );

    let now = Utc::now();
    for kind in [InvoiceKind::Purchase, InvoiceKind::Sale] {
        let next = invoice::next_invoice(&db, &calendar, kind, now).await?;
        info!(?kind, next = %next.next, last = ?next.last, "Next invoice for today.");
    }

    db.close().await?;
    info!("Database connection closed.");
    Ok(())
}
