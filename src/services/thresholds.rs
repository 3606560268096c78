use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{
        equipment_specification::{
            self, Entity as EquipmentSpecificationEntity, Model as EquipmentSpecificationModel,
        },
        equipment_threshold::{self, Entity as EquipmentThresholdEntity},
        EquipmentType,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Input for creating or replacing an equipment specification.
#[derive(Debug, Clone)]
pub struct UpsertSpecificationInput {
    pub equipment_type: EquipmentType,
    pub name: String,
    pub color: Option<String>,
    pub size: Option<String>,
    pub grade: Option<String>,
    pub description: Option<String>,
    pub default_threshold: i32,
    pub is_active: bool,
}

/// Registry of collection ceilings.
///
/// Resolution order for a key is: explicit customer override, then the active
/// equipment specification's default for that equipment type, then the
/// configured fallback. The historical fallback is 0, which alerts on any
/// positive balance; that behavior is preserved deliberately (open product
/// question, not a bug to fix here).
#[derive(Clone)]
pub struct ThresholdService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    fallback_threshold: i32,
}

impl ThresholdService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        fallback_threshold: i32,
    ) -> Self {
        Self {
            db,
            event_sender,
            fallback_threshold,
        }
    }

    /// Resolves the applicable threshold for a key.
    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        customer_id: Uuid,
        equipment_type: EquipmentType,
    ) -> Result<i32, ServiceError> {
        let db = &*self.db;

        let override_row = EquipmentThresholdEntity::find()
            .filter(equipment_threshold::Column::CustomerId.eq(customer_id))
            .filter(equipment_threshold::Column::EquipmentType.eq(equipment_type))
            .one(db)
            .await?;

        if let Some(row) = override_row {
            return Ok(row.threshold);
        }

        let spec_default = EquipmentSpecificationEntity::find()
            .filter(equipment_specification::Column::EquipmentType.eq(equipment_type))
            .filter(equipment_specification::Column::IsActive.eq(true))
            .order_by_asc(equipment_specification::Column::CreatedAt)
            .one(db)
            .await?;

        Ok(spec_default
            .map(|s| s.default_threshold)
            .unwrap_or(self.fallback_threshold))
    }

    /// Upserts a per-customer override. Callers must already hold the key's
    /// guard; [`crate::Engine::set_threshold`] is the public entry point and
    /// follows this with a recompute so the stored snapshot never goes stale.
    /// Historical alerts and instructions are untouched.
    #[instrument(skip(self))]
    pub(crate) async fn set_locked(
        &self,
        customer_id: Uuid,
        equipment_type: EquipmentType,
        value: i32,
    ) -> Result<equipment_threshold::Model, ServiceError> {
        if value < 0 {
            return Err(ServiceError::InvalidThreshold(format!(
                "threshold must be non-negative, got {}",
                value
            )));
        }

        let db = &*self.db;
        let existing = EquipmentThresholdEntity::find()
            .filter(equipment_threshold::Column::CustomerId.eq(customer_id))
            .filter(equipment_threshold::Column::EquipmentType.eq(equipment_type))
            .one(db)
            .await?;

        let model = match existing {
            Some(row) => {
                let mut active: equipment_threshold::ActiveModel = row.into();
                active.threshold = Set(value);
                active.updated_at = Set(Utc::now());
                active.update(db).await?
            }
            None => {
                let active = equipment_threshold::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    customer_id: Set(customer_id),
                    equipment_type: Set(equipment_type),
                    threshold: Set(value),
                    updated_at: Set(Utc::now()),
                };
                active.insert(db).await?
            }
        };

        info!(
            customer_id = %customer_id,
            equipment_type = %equipment_type,
            threshold = value,
            "Threshold override set"
        );

        self.event_sender
            .send(Event::ThresholdUpdated {
                customer_id,
                equipment_type,
                threshold: value,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(model)
    }

    /// Returns the explicit override for a key, if one exists.
    pub async fn get_override(
        &self,
        customer_id: Uuid,
        equipment_type: EquipmentType,
    ) -> Result<Option<equipment_threshold::Model>, ServiceError> {
        let row = EquipmentThresholdEntity::find()
            .filter(equipment_threshold::Column::CustomerId.eq(customer_id))
            .filter(equipment_threshold::Column::EquipmentType.eq(equipment_type))
            .one(&*self.db)
            .await?;
        Ok(row)
    }

    /// Creates or updates the equipment specification carrying the type-level
    /// default threshold. Specs are matched by (equipment_type, name).
    #[instrument(skip(self, input), fields(equipment_type = %input.equipment_type, name = %input.name))]
    pub async fn upsert_specification(
        &self,
        input: UpsertSpecificationInput,
    ) -> Result<EquipmentSpecificationModel, ServiceError> {
        if input.default_threshold < 0 {
            return Err(ServiceError::InvalidThreshold(format!(
                "default threshold must be non-negative, got {}",
                input.default_threshold
            )));
        }

        let db = &*self.db;
        let existing = EquipmentSpecificationEntity::find()
            .filter(equipment_specification::Column::EquipmentType.eq(input.equipment_type))
            .filter(equipment_specification::Column::Name.eq(input.name.clone()))
            .one(db)
            .await?;

        let now = Utc::now();
        let model = match existing {
            Some(row) => {
                let mut active: equipment_specification::ActiveModel = row.into();
                active.color = Set(input.color);
                active.size = Set(input.size);
                active.grade = Set(input.grade);
                active.description = Set(input.description);
                active.default_threshold = Set(input.default_threshold);
                active.is_active = Set(input.is_active);
                active.updated_at = Set(now);
                active.update(db).await?
            }
            None => {
                let active = equipment_specification::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    equipment_type: Set(input.equipment_type),
                    name: Set(input.name),
                    color: Set(input.color),
                    size: Set(input.size),
                    grade: Set(input.grade),
                    description: Set(input.description),
                    default_threshold: Set(input.default_threshold),
                    is_active: Set(input.is_active),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                active.insert(db).await?
            }
        };

        Ok(model)
    }

    /// Lists equipment specifications, optionally restricted to active ones.
    pub async fn list_specifications(
        &self,
        only_active: bool,
    ) -> Result<Vec<EquipmentSpecificationModel>, ServiceError> {
        let mut query = EquipmentSpecificationEntity::find()
            .order_by_asc(equipment_specification::Column::EquipmentType)
            .order_by_asc(equipment_specification::Column::Name);
        if only_active {
            query = query.filter(equipment_specification::Column::IsActive.eq(true));
        }
        Ok(query.all(&*self.db).await?)
    }
}
