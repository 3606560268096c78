use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::EquipmentType;

/// Direction of an equipment transfer relative to the customer.
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
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Direction {
    /// Equipment delivered to the customer; increases their balance.
    #[sea_orm(string_value = "in")]
    In,
    /// Equipment returned from the customer; decreases their balance.
    #[sea_orm(string_value = "out")]
    Out,
}

/// How a movement entered the system.
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
pub enum MovementSource {
    /// Transcribed from a delivery-note photo by the extraction collaborator.
    #[sea_orm(string_value = "ai_extraction")]
    AiExtraction,
    /// Keyed in by an operator; confidence is always 1.0.
    #[sea_orm(string_value = "manual")]
    Manual,
}

/// The `equipment_movements` table: append-only record of equipment transfers.
///
/// Rows are immutable facts. Corrections are made by inserting a compensating
/// movement; the only column that ever changes is `verified` (false to true).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "equipment_movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Uuid")]
    pub id: Uuid,
    pub customer_id: Uuid,
    pub equipment_type: EquipmentType,
    pub quantity: i32,
    pub direction: Direction,
    /// Document time: when the transfer happened per the delivery note.
    pub timestamp: DateTime<Utc>,
    pub source: MovementSource,
    pub confidence: f64,
    pub verified: bool,
    pub origin_photo_reference: Option<String>,
    pub driver_name: Option<String>,
    pub notes: Option<String>,
    /// Ingestion time; the duplicate-detection window is measured against this.
    pub recorded_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Signed contribution of this movement to the customer's balance.
    pub fn signed_quantity(&self) -> i32 {
        match self.direction {
            Direction::In => self.quantity,
            Direction::Out => -self.quantity,
        }
    }
}
