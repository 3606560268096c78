use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::EquipmentType;

/// Priority of a collection, derived from how far over threshold the balance
/// sits at evaluation time.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlertPriority {
    // Variant order gives Ord: Medium < High.
    #[sea_orm(string_value = "medium")]
    Medium,
    #[sea_orm(string_value = "high")]
    High,
}

/// Lifecycle state of a driver instruction.
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
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(24))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InstructionStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "assigned")]
    Assigned,
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Recoverable: the driver attempted the collection and could not finish
    /// it. Resolved by rescheduling or by marking the instruction failed.
    #[sea_orm(string_value = "unable_to_collect")]
    UnableToCollect,
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl InstructionStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, InstructionStatus::Completed | InstructionStatus::Failed)
    }
}

/// Why a driver could not complete a collection. Closed set; dispatch UIs
/// select from these rather than submitting free text.
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
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UnableReason {
    #[sea_orm(string_value = "no_equipment_available")]
    NoEquipmentAvailable,
    #[sea_orm(string_value = "vehicle_unavailable")]
    VehicleUnavailable,
    #[sea_orm(string_value = "customer_refused")]
    CustomerRefused,
    #[sea_orm(string_value = "access_issues")]
    AccessIssues,
    #[sea_orm(string_value = "equipment_damaged")]
    EquipmentDamaged,
    #[sea_orm(string_value = "weather")]
    Weather,
    #[sea_orm(string_value = "driver_unavailable")]
    DriverUnavailable,
    #[sea_orm(string_value = "other")]
    Other,
}

/// The `driver_instructions` table: actionable collection work items.
///
/// An instruction's identity is independent of the alert that spawned it, so
/// attempt history survives the alert clearing. Rows are never deleted;
/// terminal states are `completed` and `failed`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "driver_instructions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Uuid")]
    pub id: Uuid,
    pub customer_id: Uuid,
    pub equipment_type: EquipmentType,
    /// Excess captured when the alert first produced this instruction.
    pub excess_at_creation: i32,
    pub priority: AlertPriority,
    pub assigned_driver: Option<String>,
    pub status: InstructionStatus,
    /// Only meaningful while status is `unable_to_collect`.
    pub unable_reason: Option<UnableReason>,
    pub created_at: DateTime<Utc>,
    pub status_changed_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
