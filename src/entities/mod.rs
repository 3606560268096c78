pub mod customer_balance;
pub mod driver_instruction;
pub mod equipment_movement;
pub mod equipment_specification;
pub mod equipment_threshold;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// The closed set of trackable equipment categories.
///
/// Movements arriving from the transcription boundary with any other label are
/// rejected at deserialization time rather than stored as free-form text.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
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
pub enum EquipmentType {
    #[sea_orm(string_value = "pallet")]
    Pallet,
    #[sea_orm(string_value = "cage")]
    Cage,
    #[sea_orm(string_value = "dolly")]
    Dolly,
    #[sea_orm(string_value = "stillage")]
    Stillage,
    #[sea_orm(string_value = "container")]
    Container,
    #[sea_orm(string_value = "other")]
    Other,
}
