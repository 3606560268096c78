use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    Select, Set,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{
        customer_balance::{self, BalanceStatus},
        driver_instruction,
        equipment_movement::{
            self, Direction, Entity as EquipmentMovementEntity, MovementSource,
        },
        EquipmentType,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    key_lock::{BalanceKey, KeyLocks},
    services::{
        alerts::{Alert, AlertService},
        balances::BalanceService,
        instructions::InstructionService,
    },
};

/// Ascending ledger query for one (customer, equipment) key. Shared with the
/// balance recompute so both read the history in the same order.
pub(crate) fn ordered_query(
    customer_id: Uuid,
    equipment_type: EquipmentType,
    since: Option<DateTime<Utc>>,
) -> Select<EquipmentMovementEntity> {
    let mut query = EquipmentMovementEntity::find()
        .filter(equipment_movement::Column::CustomerId.eq(customer_id))
        .filter(equipment_movement::Column::EquipmentType.eq(equipment_type))
        .order_by_asc(equipment_movement::Column::Timestamp)
        .order_by_asc(equipment_movement::Column::RecordedAt);
    if let Some(since) = since {
        query = query.filter(equipment_movement::Column::Timestamp.gte(since));
    }
    query
}

/// A movement as submitted by a caller, before it becomes a ledger fact.
#[derive(Debug, Clone, Validate)]
pub struct RecordMovementInput {
    pub customer_id: Uuid,
    pub equipment_type: EquipmentType,
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub direction: Direction,
    /// Document time from the delivery note, not ingestion time.
    pub timestamp: DateTime<Utc>,
    pub source: MovementSource,
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence: f64,
    pub origin_photo_reference: Option<String>,
    pub driver_name: Option<String>,
    pub notes: Option<String>,
}

/// Everything a successful ingestion produced, so callers can answer "what
/// happened" without issuing follow-up queries.
#[derive(Debug, Clone)]
pub struct RecordOutcome {
    pub movement: equipment_movement::Model,
    pub balance: customer_balance::Model,
    /// Alert state after this movement, if the balance is out of range.
    pub alert: Option<Alert>,
    /// The live instruction for the key, present whenever `alert` is.
    pub instruction: Option<driver_instruction::Model>,
}

/// Front door of the ledger: validates, deduplicates and appends movements,
/// then runs the downstream pipeline inside the same per-key critical section.
#[derive(Clone)]
pub struct MovementService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    key_locks: KeyLocks,
    balances: BalanceService,
    alerts: AlertService,
    instructions: InstructionService,
    duplicate_window: Duration,
}

impl MovementService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        key_locks: KeyLocks,
        balances: BalanceService,
        alerts: AlertService,
        instructions: InstructionService,
        duplicate_window_secs: u64,
    ) -> Self {
        Self {
            db,
            event_sender,
            key_locks,
            balances,
            alerts,
            instructions,
            duplicate_window: Duration::seconds(duplicate_window_secs as i64),
        }
    }

    /// Records a movement and runs recompute, alert evaluation and
    /// instruction creation before releasing the key's guard. Concurrent
    /// submissions for the same key serialize here; submissions for
    /// different keys do not contend.
    #[instrument(skip(self, input), fields(customer_id = %input.customer_id, equipment_type = %input.equipment_type))]
    pub async fn record(&self, input: RecordMovementInput) -> Result<RecordOutcome, ServiceError> {
        input.validate()?;
        if input.source == MovementSource::Manual && input.confidence != 1.0 {
            return Err(ServiceError::ValidationError(format!(
                "manual movements are always certain, got confidence {}",
                input.confidence
            )));
        }

        let key = BalanceKey::new(input.customer_id, input.equipment_type);
        let _guard = self.key_locks.acquire(key).await;

        let now = Utc::now();
        if let Some(existing) = self.find_duplicate(&input, now).await? {
            let seconds_ago = (now - existing.recorded_at).num_seconds();
            warn!(
                existing_id = %existing.id,
                seconds_ago = seconds_ago,
                "Duplicate movement rejected"
            );
            counter!("movements_duplicates_total", 1);
            return Err(ServiceError::DuplicateMovement {
                existing_id: existing.id,
                seconds_ago,
            });
        }

        let active = equipment_movement::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(input.customer_id),
            equipment_type: Set(input.equipment_type),
            quantity: Set(input.quantity),
            direction: Set(input.direction),
            timestamp: Set(input.timestamp),
            source: Set(input.source),
            confidence: Set(input.confidence),
            // Manual entries carry their operator's sign-off; extracted ones
            // wait for review.
            verified: Set(input.source == MovementSource::Manual),
            origin_photo_reference: Set(input.origin_photo_reference),
            driver_name: Set(input.driver_name),
            notes: Set(input.notes),
            recorded_at: Set(now),
        };
        let movement = active.insert(&*self.db).await?;

        info!(
            movement_id = %movement.id,
            quantity = movement.quantity,
            direction = %movement.direction,
            source = %movement.source,
            "Movement recorded"
        );
        counter!("movements_recorded_total", 1);

        self.event_sender
            .send(Event::MovementRecorded {
                movement_id: movement.id,
                customer_id: movement.customer_id,
                equipment_type: movement.equipment_type,
                quantity: movement.quantity,
                confidence: movement.confidence,
            })
            .await
            .map_err(ServiceError::EventError)?;

        // Downstream pipeline, still under the guard taken above.
        let recompute = self
            .balances
            .recompute_locked(input.customer_id, input.equipment_type)
            .await?;

        let alert = self.alerts.evaluate(&recompute.balance);
        let was_alerting = recompute
            .previous
            .is_some_and(|(_, status)| status != BalanceStatus::Normal);

        let instruction = match &alert {
            Some(alert) => {
                self.event_sender
                    .send(Event::AlertRaised {
                        customer_id: alert.customer_id,
                        equipment_type: alert.equipment_type,
                        excess: alert.excess,
                        priority: alert.priority,
                    })
                    .await
                    .map_err(ServiceError::EventError)?;
                Some(self.instructions.on_alert_locked(alert).await?)
            }
            None => {
                if was_alerting {
                    self.event_sender
                        .send(Event::AlertCleared {
                            customer_id: input.customer_id,
                            equipment_type: input.equipment_type,
                        })
                        .await
                        .map_err(ServiceError::EventError)?;
                }
                // An alert clearing leaves any live instruction alone.
                None
            }
        };

        Ok(RecordOutcome {
            movement,
            balance: recompute.balance,
            alert,
            instruction,
        })
    }

    /// Flips an extracted movement to verified. Idempotent; verification
    /// never changes the balance, so no key guard is needed.
    #[instrument(skip(self))]
    pub async fn verify(
        &self,
        movement_id: Uuid,
    ) -> Result<equipment_movement::Model, ServiceError> {
        let movement = self.get(movement_id).await?;
        if movement.verified {
            return Ok(movement);
        }

        let mut active: equipment_movement::ActiveModel = movement.into();
        active.verified = Set(true);
        let movement = active.update(&*self.db).await?;

        self.event_sender
            .send(Event::MovementVerified {
                movement_id: movement.id,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(movement)
    }

    pub async fn get(
        &self,
        movement_id: Uuid,
    ) -> Result<equipment_movement::Model, ServiceError> {
        EquipmentMovementEntity::find_by_id(movement_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("movement {} not found", movement_id)))
    }

    /// Movement history for a key in ledger order (document time ascending),
    /// optionally bounded below.
    pub async fn query(
        &self,
        customer_id: Uuid,
        equipment_type: EquipmentType,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<equipment_movement::Model>, ServiceError> {
        Ok(ordered_query(customer_id, equipment_type, since)
            .all(&*self.db)
            .await?)
    }

    /// Looks for an identical tuple recorded within the idempotency window.
    /// The window is measured against ingestion time, so re-submitting an old
    /// delivery note months later is a new fact, not a duplicate.
    async fn find_duplicate(
        &self,
        input: &RecordMovementInput,
        now: DateTime<Utc>,
    ) -> Result<Option<equipment_movement::Model>, ServiceError> {
        let cutoff = now - self.duplicate_window;
        let row = EquipmentMovementEntity::find()
            .filter(equipment_movement::Column::CustomerId.eq(input.customer_id))
            .filter(equipment_movement::Column::EquipmentType.eq(input.equipment_type))
            .filter(equipment_movement::Column::Direction.eq(input.direction))
            .filter(equipment_movement::Column::Quantity.eq(input.quantity))
            .filter(equipment_movement::Column::Timestamp.eq(input.timestamp))
            .filter(equipment_movement::Column::Source.eq(input.source))
            .filter(equipment_movement::Column::RecordedAt.gte(cutoff))
            .order_by_desc(equipment_movement::Column::RecordedAt)
            .one(&*self.db)
            .await?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(quantity: i32, confidence: f64, source: MovementSource) -> RecordMovementInput {
        RecordMovementInput {
            customer_id: Uuid::new_v4(),
            equipment_type: EquipmentType::Pallet,
            quantity,
            direction: Direction::In,
            timestamp: Utc::now(),
            source,
            confidence,
            origin_photo_reference: None,
            driver_name: None,
            notes: None,
        }
    }

    #[test]
    fn quantity_must_be_positive() {
        assert!(input(0, 0.9, MovementSource::AiExtraction).validate().is_err());
        assert!(input(-5, 0.9, MovementSource::AiExtraction).validate().is_err());
        assert!(input(1, 0.9, MovementSource::AiExtraction).validate().is_ok());
    }

    #[test]
    fn confidence_is_bounded() {
        assert!(input(1, -0.1, MovementSource::AiExtraction).validate().is_err());
        assert!(input(1, 1.1, MovementSource::AiExtraction).validate().is_err());
        assert!(input(1, 0.0, MovementSource::AiExtraction).validate().is_ok());
        assert!(input(1, 1.0, MovementSource::AiExtraction).validate().is_ok());
    }
}
