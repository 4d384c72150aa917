//! Banner entity - Promotional content shown in the client, unrelated to the
//! ledger core.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Banner database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "banners")]
pub struct Model {
    /// Unique identifier for the banner
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Caption text
    pub title: String,
    /// Image to display
    pub image_url: String,
    /// Optional click-through target
    pub link_url: Option<String>,
    /// Whether the banner is currently shown
    pub is_active: bool,
    /// When the banner was created
    pub created_at: DateTimeUtc,
}

/// `Banner` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
