use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{
        driver_instruction::{
            self, Entity as DriverInstructionEntity, InstructionStatus, UnableReason,
        },
        EquipmentType,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    key_lock::{BalanceKey, KeyLocks},
    services::alerts::Alert,
};

/// Whether a status change is admitted by the instruction state machine.
///
/// `unable_to_collect` is recoverable: it can go back to `pending` (the
/// collection is rescheduled) or forward to `failed`. `completed` and
/// `failed` are terminal.
pub fn is_valid_transition(from: InstructionStatus, to: InstructionStatus) -> bool {
    use InstructionStatus::*;
    matches!(
        (from, to),
        (Pending, Assigned)
            | (Assigned, Completed)
            | (Assigned, UnableToCollect)
            | (UnableToCollect, Pending)
            | (UnableToCollect, Failed)
    )
}

/// Owns driver instructions from creation through their terminal state.
///
/// Creation is driven by alerts; everything after that is driven by explicit
/// dispatch actions. An alert clearing never touches a live instruction.
#[derive(Clone)]
pub struct InstructionService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    key_locks: KeyLocks,
}

impl InstructionService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        key_locks: KeyLocks,
    ) -> Self {
        Self {
            db,
            event_sender,
            key_locks,
        }
    }

    /// Reacts to an alert inside the key's critical section. Idempotent: if a
    /// live instruction already exists for the key, it is returned untouched.
    #[instrument(skip(self, alert), fields(customer_id = %alert.customer_id, equipment_type = %alert.equipment_type))]
    pub async fn on_alert(
        &self,
        alert: &Alert,
    ) -> Result<driver_instruction::Model, ServiceError> {
        let key = BalanceKey::new(alert.customer_id, alert.equipment_type);
        let _guard = self.key_locks.acquire(key).await;
        self.on_alert_locked(alert).await
    }

    /// Alert reaction body. Callers must already hold the key's guard.
    pub(crate) async fn on_alert_locked(
        &self,
        alert: &Alert,
    ) -> Result<driver_instruction::Model, ServiceError> {
        if let Some(existing) = self
            .find_live(alert.customer_id, alert.equipment_type)
            .await?
        {
            return Ok(existing);
        }
        self.insert_for_alert(alert).await
    }

    /// Explicitly creates an instruction for an alert. Unlike `on_alert`,
    /// an existing live instruction is an error here, so callers issuing
    /// manual creations learn about the conflict.
    #[instrument(skip(self, alert), fields(customer_id = %alert.customer_id, equipment_type = %alert.equipment_type))]
    pub async fn create(&self, alert: &Alert) -> Result<driver_instruction::Model, ServiceError> {
        let key = BalanceKey::new(alert.customer_id, alert.equipment_type);
        let _guard = self.key_locks.acquire(key).await;

        if let Some(existing) = self
            .find_live(alert.customer_id, alert.equipment_type)
            .await?
        {
            return Err(ServiceError::DuplicateInstruction {
                existing_id: existing.id,
                status: existing.status,
            });
        }
        self.insert_for_alert(alert).await
    }

    /// Assigns a pending instruction to a driver.
    #[instrument(skip(self))]
    pub async fn assign(
        &self,
        instruction_id: Uuid,
        driver: String,
    ) -> Result<driver_instruction::Model, ServiceError> {
        if driver.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "driver name must not be empty".to_string(),
            ));
        }
        self.transition(instruction_id, InstructionStatus::Assigned, "assign", |m| {
            m.assigned_driver = Set(Some(driver));
        })
        .await
    }

    /// Marks an assigned instruction as collected.
    #[instrument(skip(self))]
    pub async fn complete(
        &self,
        instruction_id: Uuid,
    ) -> Result<driver_instruction::Model, ServiceError> {
        let model = self
            .transition(instruction_id, InstructionStatus::Completed, "complete", |_| {})
            .await?;
        counter!("instructions_completed_total", 1);
        Ok(model)
    }

    /// Records that the assigned driver attempted but could not collect.
    #[instrument(skip(self))]
    pub async fn mark_unable(
        &self,
        instruction_id: Uuid,
        reason: UnableReason,
    ) -> Result<driver_instruction::Model, ServiceError> {
        self.transition(
            instruction_id,
            InstructionStatus::UnableToCollect,
            "mark_unable",
            |m| {
                m.unable_reason = Set(Some(reason));
            },
        )
        .await
    }

    /// Puts an unable-to-collect instruction back in the pending queue. The
    /// driver assignment and unable reason are cleared so the rescheduled
    /// attempt starts clean.
    #[instrument(skip(self))]
    pub async fn reschedule(
        &self,
        instruction_id: Uuid,
    ) -> Result<driver_instruction::Model, ServiceError> {
        self.transition(instruction_id, InstructionStatus::Pending, "reschedule", |m| {
            m.assigned_driver = Set(None);
            m.unable_reason = Set(None);
        })
        .await
    }

    /// Gives up on an unable-to-collect instruction.
    #[instrument(skip(self))]
    pub async fn mark_failed(
        &self,
        instruction_id: Uuid,
    ) -> Result<driver_instruction::Model, ServiceError> {
        let model = self
            .transition(instruction_id, InstructionStatus::Failed, "mark_failed", |_| {})
            .await?;
        counter!("instructions_failed_total", 1);
        Ok(model)
    }

    pub async fn get(
        &self,
        instruction_id: Uuid,
    ) -> Result<driver_instruction::Model, ServiceError> {
        DriverInstructionEntity::find_by_id(instruction_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("driver instruction {} not found", instruction_id))
            })
    }

    /// Lists instructions, newest first, optionally filtered by status and
    /// assigned driver.
    pub async fn list(
        &self,
        status: Option<InstructionStatus>,
        driver: Option<&str>,
    ) -> Result<Vec<driver_instruction::Model>, ServiceError> {
        let mut query = DriverInstructionEntity::find()
            .order_by_desc(driver_instruction::Column::CreatedAt);
        if let Some(status) = status {
            query = query.filter(driver_instruction::Column::Status.eq(status));
        }
        if let Some(driver) = driver {
            query = query.filter(driver_instruction::Column::AssignedDriver.eq(driver));
        }
        Ok(query.all(&*self.db).await?)
    }

    /// The live (non-terminal) instruction for a key, if one exists. The
    /// invariant maintained by creation is that there is at most one.
    pub async fn find_live(
        &self,
        customer_id: Uuid,
        equipment_type: EquipmentType,
    ) -> Result<Option<driver_instruction::Model>, ServiceError> {
        let row = DriverInstructionEntity::find()
            .filter(driver_instruction::Column::CustomerId.eq(customer_id))
            .filter(driver_instruction::Column::EquipmentType.eq(equipment_type))
            .filter(
                driver_instruction::Column::Status.is_in([
                    InstructionStatus::Pending,
                    InstructionStatus::Assigned,
                    InstructionStatus::UnableToCollect,
                ]),
            )
            .one(&*self.db)
            .await?;
        Ok(row)
    }

    async fn insert_for_alert(
        &self,
        alert: &Alert,
    ) -> Result<driver_instruction::Model, ServiceError> {
        let now = Utc::now();
        let active = driver_instruction::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(alert.customer_id),
            equipment_type: Set(alert.equipment_type),
            excess_at_creation: Set(alert.excess),
            priority: Set(alert.priority),
            assigned_driver: Set(None),
            status: Set(InstructionStatus::Pending),
            unable_reason: Set(None),
            created_at: Set(now),
            status_changed_at: Set(now),
        };
        let model = active.insert(&*self.db).await?;

        info!(
            instruction_id = %model.id,
            customer_id = %model.customer_id,
            equipment_type = %model.equipment_type,
            excess = model.excess_at_creation,
            priority = %model.priority,
            "Driver instruction created"
        );
        counter!("instructions_created_total", 1);

        self.event_sender
            .send(Event::InstructionCreated {
                instruction_id: model.id,
                customer_id: model.customer_id,
                equipment_type: model.equipment_type,
                excess: model.excess_at_creation,
                priority: model.priority,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(model)
    }

    /// Shared transition body: re-reads the row inside the key's critical
    /// section, validates against the state machine, then applies the
    /// status change plus any operation-specific field updates.
    async fn transition(
        &self,
        instruction_id: Uuid,
        to: InstructionStatus,
        attempted: &'static str,
        mutate: impl FnOnce(&mut driver_instruction::ActiveModel),
    ) -> Result<driver_instruction::Model, ServiceError> {
        // First read is only to learn the key; the authoritative read happens
        // under the guard.
        let preliminary = self.get(instruction_id).await?;
        let key = BalanceKey::new(preliminary.customer_id, preliminary.equipment_type);
        let _guard = self.key_locks.acquire(key).await;

        let current = self.get(instruction_id).await?;
        if !is_valid_transition(current.status, to) {
            return Err(ServiceError::InvalidTransition {
                instruction_id,
                from: current.status,
                attempted,
            });
        }

        let from = current.status;
        let now = Utc::now();
        let mut active: driver_instruction::ActiveModel = current.into();
        active.status = Set(to);
        active.status_changed_at = Set(now);
        mutate(&mut active);
        let model = active.update(&*self.db).await?;

        info!(
            instruction_id = %instruction_id,
            from = %from,
            to = %to,
            "Instruction status changed"
        );

        self.event_sender
            .send(Event::InstructionStatusChanged {
                instruction_id,
                from,
                to,
                at: now,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;
    use InstructionStatus::*;

    #[test_case(Pending, Assigned => true)]
    #[test_case(Assigned, Completed => true)]
    #[test_case(Assigned, UnableToCollect => true)]
    #[test_case(UnableToCollect, Pending => true)]
    #[test_case(UnableToCollect, Failed => true)]
    #[test_case(Pending, Completed => false)]
    #[test_case(Pending, UnableToCollect => false)]
    #[test_case(Pending, Failed => false)]
    #[test_case(Assigned, Pending => false)]
    #[test_case(Assigned, Failed => false)]
    #[test_case(UnableToCollect, Assigned => false)]
    #[test_case(UnableToCollect, Completed => false)]
    #[test_case(Completed, Pending => false)]
    #[test_case(Completed, Assigned => false)]
    #[test_case(Failed, Pending => false)]
    #[test_case(Failed, Assigned => false)]
    fn transition_table(from: InstructionStatus, to: InstructionStatus) -> bool {
        is_valid_transition(from, to)
    }

    #[test]
    fn terminal_states_admit_nothing() {
        for from in [Completed, Failed] {
            assert!(from.is_terminal());
            for to in [Pending, Assigned, Completed, UnableToCollect, Failed] {
                assert!(!is_valid_transition(from, to));
            }
        }
    }
}
