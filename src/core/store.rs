//! Store profile - the single row naming the pharmacy on invoices and reports.

use crate::{
    config::settings::StoreConfig,
    entities::{StoreProfile, store_profile},
    errors::{Error, Result, required_text},
};
use chrono::Utc;
use sea_orm::{Set, prelude::*};
use tracing::info;

const PROFILE_ID: i32 = 1;

/// Partial update for [`update_store_profile`]
#[derive(Debug, Clone, Default)]
pub struct StoreProfileChanges {
    /// New display name
    pub name: Option<String>,
    /// New address
    pub address: Option<String>,
    /// New phone number
    pub phone: Option<String>,
}

/// Reads the store profile, if one has been created.
pub async fn get_store_profile<C>(db: &C) -> Result<Option<store_profile::Model>>
where
    C: ConnectionTrait,
{
    StoreProfile::find_by_id(PROFILE_ID)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Creates the profile from `config` unless one already exists, returning the stored profile.
pub async fn ensure_store_profile<C>(db: &C, config: &StoreConfig) -> Result<store_profile::Model>
where
    C: ConnectionTrait,
{
    if let Some(existing) = get_store_profile(db).await? {
        return Ok(existing);
    }

    let created = store_profile::ActiveModel {
        id: Set(PROFILE_ID),
        name: Set(config.name.trim().to_string()),
        address: Set(config.address.clone()),
        phone: Set(config.phone.clone()),
        updated_at: Set(Utc::now().naive_utc()),
    }
    .insert(db)
    .await?;
    info!(store = %created.name, "store profile created");
    Ok(created)
}

/// Edits the store profile.
///
/// # Errors
/// `NotFound` before [`ensure_store_profile`] has run, `Validation` for a blank name.
pub async fn update_store_profile<C>(
    db: &C,
    changes: StoreProfileChanges,
) -> Result<store_profile::Model>
where
    C: ConnectionTrait,
{
    let mut model: store_profile::ActiveModel = get_store_profile(db)
        .await?
        .ok_or_else(|| Error::NotFound {
            entity: "Store profile",
            id: PROFILE_ID.to_string(),
        })?
        .into();

    if let Some(name) = changes.name {
        model.name = Set(required_text("Store name", &name)?);
    }
    if let Some(address) = changes.address {
        model.address = Set(address);
    }
    if let Some(phone) = changes.phone {
        model.phone = Set(phone);
    }
    model.updated_at = Set(Utc::now().naive_utc());

    model.update(db).await.map_err(Into::into)
}
