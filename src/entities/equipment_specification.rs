use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::EquipmentType;

/// The `equipment_specifications` table: catalogue of concrete equipment
/// variants ("Euro Pallet", "Blue Cage") with the type-level default threshold
/// applied to customers that have no explicit override.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "equipment_specifications")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Uuid")]
    pub id: Uuid,
    pub equipment_type: EquipmentType,
    pub name: String,
    pub color: Option<String>,
    pub size: Option<String>,
    pub grade: Option<String>,
    pub description: Option<String>,
    pub default_threshold: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
