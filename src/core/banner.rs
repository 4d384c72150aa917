//! Promotional banner management.
//!
//! Banners are plain content rows with no ties to the ledger. Creation and
//! deletion are admin-only at the surface layer; this module does not check
//! permissions.

use crate::{
    entities::{Banner, banner},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};

/// Input for a new promotional banner.
#[derive(Debug, Clone)]
pub struct NewBanner {
    pub title: String,
    pub image_url: String,
    pub link_url: Option<String>,
}

/// Creates a banner, active immediately.
pub async fn create_banner(db: &DatabaseConnection, banner: NewBanner) -> Result<banner::Model> {
    if banner.title.trim().is_empty() {
        return Err(Error::Config {
            message: "banner title must not be empty".to_string(),
        });
    }
    if banner.image_url.trim().is_empty() {
        return Err(Error::Config {
            message: "banner image URL must not be empty".to_string(),
        });
    }

    let row = banner::ActiveModel {
        title: Set(banner.title),
        image_url: Set(banner.image_url),
        link_url: Set(banner.link_url),
        is_active: Set(true),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    row.insert(db).await.map_err(Into::into)
}

/// Lists the banners currently shown to users, newest first.
pub async fn active_banners(db: &DatabaseConnection) -> Result<Vec<banner::Model>> {
    Banner::find()
        .filter(banner::Column::IsActive.eq(true))
        .order_by_desc(banner::Column::CreatedAt)
        .order_by_desc(banner::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Lists every banner for the admin view, newest first.
pub async fn all_banners(db: &DatabaseConnection) -> Result<Vec<banner::Model>> {
    Banner::find()
        .order_by_desc(banner::Column::CreatedAt)
        .order_by_desc(banner::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Deletes a banner. Returns whether a row was actually removed.
pub async fn delete_banner(db: &DatabaseConnection, banner_id: i64) -> Result<bool> {
    let deleted = Banner::delete_by_id(banner_id).exec(db).await?;
    Ok(deleted.rows_affected > 0)
}
