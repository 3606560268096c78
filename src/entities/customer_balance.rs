use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::EquipmentType;

/// Classification of a balance against its threshold.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BalanceStatus {
    #[sea_orm(string_value = "normal")]
    Normal,
    #[sea_orm(string_value = "over_threshold")]
    OverThreshold,
    /// The customer has returned more than was delivered; usually a missed
    /// delivery note rather than a real negative holding.
    #[sea_orm(string_value = "negative")]
    Negative,
}

/// The `customer_balances` table: a cached projection of the movement ledger.
///
/// Never authoritative. Every row must be reproducible by folding the full
/// movement history for its key against the current threshold; the balance
/// service rewrites it wholesale on each recompute instead of incrementing it.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "customer_balances")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Uuid")]
    pub id: Uuid,
    pub customer_id: Uuid,
    pub equipment_type: EquipmentType,
    pub current_balance: i32,
    pub threshold: i32,
    pub status: BalanceStatus,
    /// Document time of the latest movement; carried for display only.
    pub last_movement_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
