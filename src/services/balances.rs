use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{
    entities::{
        customer_balance::{self, BalanceStatus, Entity as CustomerBalanceEntity},
        equipment_movement::Direction,
        EquipmentType,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    key_lock::{BalanceKey, KeyLocks},
    services::movements,
    services::thresholds::ThresholdService,
};

/// Movements folded per page so recomputation never materializes an entire
/// history at once.
const FOLD_PAGE_SIZE: u64 = 500;

/// Classifies a balance against its threshold.
///
/// Negative wins over everything; the zero-threshold edge (any positive
/// balance is over threshold) falls out of the comparison naturally.
pub fn classify(current_balance: i32, threshold: i32) -> BalanceStatus {
    if current_balance < 0 {
        BalanceStatus::Negative
    } else if current_balance > threshold {
        BalanceStatus::OverThreshold
    } else {
        BalanceStatus::Normal
    }
}

/// Folds signed quantities into a net balance. `None` signals i64 overflow,
/// which the caller must treat as a consistency violation, never as a number.
pub fn fold_quantities(items: impl IntoIterator<Item = (Direction, i32)>) -> Option<i64> {
    fold_quantities_from(0, items)
}

fn fold_quantities_from(
    start: i64,
    items: impl IntoIterator<Item = (Direction, i32)>,
) -> Option<i64> {
    let mut total = start;
    for (direction, quantity) in items {
        let delta = match direction {
            Direction::In => i64::from(quantity),
            Direction::Out => -i64::from(quantity),
        };
        total = total.checked_add(delta)?;
    }
    Some(total)
}

/// Result of a balance recomputation.
#[derive(Debug, Clone)]
pub struct RecomputeOutcome {
    pub balance: customer_balance::Model,
    /// Balance and status of the stored snapshot before this recompute, if a
    /// snapshot existed.
    pub previous: Option<(i32, BalanceStatus)>,
    /// Whether the snapshot actually changed (always true for a first
    /// snapshot).
    pub changed: bool,
}

/// Derives per-key balances by re-folding the movement ledger.
///
/// There is no incrementally maintained counter anywhere: every recompute
/// reads the full history for its key, so calling it twice in a row is
/// harmless and the snapshot can never drift from the ledger.
#[derive(Clone)]
pub struct BalanceService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    key_locks: KeyLocks,
    thresholds: ThresholdService,
}

impl BalanceService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        key_locks: KeyLocks,
        thresholds: ThresholdService,
    ) -> Self {
        Self {
            db,
            event_sender,
            key_locks,
            thresholds,
        }
    }

    /// Recomputes the balance for a key inside its critical section.
    #[instrument(skip(self))]
    pub async fn recompute(
        &self,
        customer_id: Uuid,
        equipment_type: EquipmentType,
    ) -> Result<RecomputeOutcome, ServiceError> {
        let key = BalanceKey::new(customer_id, equipment_type);
        let _guard = self.key_locks.acquire(key).await;
        self.recompute_locked(customer_id, equipment_type).await
    }

    /// Recompute body. Callers must already hold the key's guard; the
    /// ingestion pipeline runs this inside the guard it took for the
    /// movement write.
    pub(crate) async fn recompute_locked(
        &self,
        customer_id: Uuid,
        equipment_type: EquipmentType,
    ) -> Result<RecomputeOutcome, ServiceError> {
        let db = &*self.db;

        let inconsistent = |detail: String| ServiceError::InconsistentBalance {
            customer_id,
            equipment_type: equipment_type.to_string(),
            detail,
        };

        // Full re-fold of the ledger for this key, one page at a time.
        let mut paginator = movements::ordered_query(customer_id, equipment_type, None)
            .paginate(db, FOLD_PAGE_SIZE);
        let mut total: i64 = 0;
        let mut last_movement_at = None;

        while let Some(page) = paginator.fetch_and_next().await? {
            for movement in page {
                if movement.quantity <= 0 {
                    return Err(inconsistent(format!(
                        "stored movement {} has non-positive quantity {}",
                        movement.id, movement.quantity
                    )));
                }
                let delta = fold_quantities([(movement.direction, movement.quantity)])
                    .ok_or_else(|| inconsistent("balance fold overflowed".to_string()))?;
                total = total
                    .checked_add(delta)
                    .ok_or_else(|| inconsistent("balance fold overflowed".to_string()))?;
                last_movement_at = Some(movement.timestamp);
            }
        }

        let current_balance = i32::try_from(total)
            .map_err(|_| inconsistent(format!("net balance {} exceeds i32 range", total)))?;

        let threshold = self.thresholds.resolve(customer_id, equipment_type).await?;
        let status = classify(current_balance, threshold);

        let existing = CustomerBalanceEntity::find()
            .filter(customer_balance::Column::CustomerId.eq(customer_id))
            .filter(customer_balance::Column::EquipmentType.eq(equipment_type))
            .one(db)
            .await?;

        let previous = existing
            .as_ref()
            .map(|row| (row.current_balance, row.status));
        let changed = previous != Some((current_balance, status));

        let now = Utc::now();
        let balance = match existing {
            Some(row) => {
                if changed || row.last_movement_at != last_movement_at || row.threshold != threshold
                {
                    let mut active: customer_balance::ActiveModel = row.into();
                    active.current_balance = Set(current_balance);
                    active.threshold = Set(threshold);
                    active.status = Set(status);
                    active.last_movement_at = Set(last_movement_at);
                    active.updated_at = Set(now);
                    active.update(db).await?
                } else {
                    row
                }
            }
            None => {
                let active = customer_balance::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    customer_id: Set(customer_id),
                    equipment_type: Set(equipment_type),
                    current_balance: Set(current_balance),
                    threshold: Set(threshold),
                    status: Set(status),
                    last_movement_at: Set(last_movement_at),
                    updated_at: Set(now),
                };
                active.insert(db).await?
            }
        };

        if changed {
            debug!(
                customer_id = %customer_id,
                equipment_type = %equipment_type,
                balance = current_balance,
                status = %status,
                "Balance snapshot updated"
            );
            self.event_sender
                .send(Event::BalanceChanged {
                    customer_id,
                    equipment_type,
                    old_balance: previous.map(|(b, _)| b),
                    new_balance: current_balance,
                    old_status: previous.map(|(_, s)| s),
                    new_status: status,
                })
                .await
                .map_err(ServiceError::EventError)?;
        }

        Ok(RecomputeOutcome {
            balance,
            previous,
            changed,
        })
    }

    /// Current snapshot for a key, if any movements have ever been recorded.
    pub async fn get(
        &self,
        customer_id: Uuid,
        equipment_type: EquipmentType,
    ) -> Result<Option<customer_balance::Model>, ServiceError> {
        let row = CustomerBalanceEntity::find()
            .filter(customer_balance::Column::CustomerId.eq(customer_id))
            .filter(customer_balance::Column::EquipmentType.eq(equipment_type))
            .one(&*self.db)
            .await?;
        Ok(row)
    }

    /// All snapshots, optionally filtered by status. Consumed by the
    /// reporting boundary via query, never push.
    pub async fn list(
        &self,
        status: Option<BalanceStatus>,
    ) -> Result<Vec<customer_balance::Model>, ServiceError> {
        let mut query = CustomerBalanceEntity::find()
            .order_by_asc(customer_balance::Column::CustomerId)
            .order_by_asc(customer_balance::Column::EquipmentType);
        if let Some(status) = status {
            query = query.filter(customer_balance::Column::Status.eq(status));
        }
        Ok(query.all(&*self.db).await?)
    }
}
