use std::cmp::Reverse;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    entities::{
        customer_balance::{self, BalanceStatus, Entity as CustomerBalanceEntity},
        driver_instruction::AlertPriority,
        EquipmentType,
    },
    errors::ServiceError,
};

/// A balance that has left its normal range.
///
/// Alerts are values derived from the balance snapshot, never stored. They
/// exist exactly as long as the condition that produced them, so retiring an
/// alert is simply the balance returning to normal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub customer_id: Uuid,
    pub equipment_type: EquipmentType,
    pub current_balance: i32,
    pub threshold: i32,
    /// `current_balance - threshold`. Negative means a shortfall rather than
    /// an excess.
    pub excess: i32,
    pub priority: AlertPriority,
    pub last_movement_at: Option<DateTime<Utc>>,
}

/// Derives alerts from balance snapshots.
#[derive(Clone)]
pub struct AlertService {
    db: Arc<DatabaseConnection>,
    high_priority_multiplier: f64,
}

impl AlertService {
    pub fn new(db: Arc<DatabaseConnection>, high_priority_multiplier: f64) -> Self {
        Self {
            db,
            high_priority_multiplier,
        }
    }

    /// Maps a balance snapshot to its alert, if any. Pure and trivially
    /// idempotent: the same snapshot always yields the same alert.
    pub fn evaluate(&self, balance: &customer_balance::Model) -> Option<Alert> {
        if balance.status == BalanceStatus::Normal {
            return None;
        }

        let priority = self.priority_for(balance.current_balance, balance.threshold);
        Some(Alert {
            customer_id: balance.customer_id,
            equipment_type: balance.equipment_type,
            current_balance: balance.current_balance,
            threshold: balance.threshold,
            excess: balance.current_balance - balance.threshold,
            priority,
            last_movement_at: balance.last_movement_at,
        })
    }

    /// All currently active alerts, sorted by priority then excess, both
    /// descending.
    #[instrument(skip(self))]
    pub async fn active_alerts(&self) -> Result<Vec<Alert>, ServiceError> {
        let rows = CustomerBalanceEntity::find()
            .filter(customer_balance::Column::Status.ne(BalanceStatus::Normal))
            .all(&*self.db)
            .await?;

        let mut alerts: Vec<Alert> = rows.iter().filter_map(|row| self.evaluate(row)).collect();
        alerts.sort_by_key(|a| (Reverse(a.priority), Reverse(a.excess)));
        Ok(alerts)
    }

    fn priority_for(&self, current_balance: i32, threshold: i32) -> AlertPriority {
        if f64::from(current_balance) > self.high_priority_multiplier * f64::from(threshold) {
            AlertPriority::High
        } else {
            AlertPriority::Medium
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn service() -> AlertService {
        AlertService::new(Arc::new(DatabaseConnection::default()), 1.5)
    }

    fn balance(current: i32, threshold: i32, status: BalanceStatus) -> customer_balance::Model {
        customer_balance::Model {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            equipment_type: EquipmentType::Pallet,
            current_balance: current,
            threshold,
            status,
            last_movement_at: Some(Utc::now()),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn normal_balance_has_no_alert() {
        let svc = service();
        assert_eq!(svc.evaluate(&balance(10, 20, BalanceStatus::Normal)), None);
    }

    #[test]
    fn over_threshold_produces_excess_and_priority() {
        let svc = service();

        let medium = svc
            .evaluate(&balance(25, 20, BalanceStatus::OverThreshold))
            .unwrap();
        assert_eq!(medium.excess, 5);
        assert_eq!(medium.priority, AlertPriority::Medium);

        // 31 > 1.5 * 20, just past the high watermark.
        let high = svc
            .evaluate(&balance(31, 20, BalanceStatus::OverThreshold))
            .unwrap();
        assert_eq!(high.excess, 11);
        assert_eq!(high.priority, AlertPriority::High);

        // Exactly at 1.5x stays medium; the comparison is strict.
        let at_boundary = svc
            .evaluate(&balance(30, 20, BalanceStatus::OverThreshold))
            .unwrap();
        assert_eq!(at_boundary.priority, AlertPriority::Medium);
    }

    #[test]
    fn negative_balance_alerts_with_shortfall() {
        let svc = service();
        let alert = svc
            .evaluate(&balance(-5, 20, BalanceStatus::Negative))
            .unwrap();
        assert_eq!(alert.excess, -25);
        assert_eq!(alert.priority, AlertPriority::Medium);
    }

    #[test]
    fn sort_order_is_priority_then_excess_descending() {
        let svc = service();
        let mut alerts: Vec<Alert> = [
            balance(25, 20, BalanceStatus::OverThreshold),
            balance(100, 20, BalanceStatus::OverThreshold),
            balance(40, 20, BalanceStatus::OverThreshold),
            balance(28, 20, BalanceStatus::OverThreshold),
        ]
        .iter()
        .filter_map(|b| svc.evaluate(b))
        .collect();
        alerts.sort_by_key(|a| (Reverse(a.priority), Reverse(a.excess)));

        let balances: Vec<i32> = alerts.iter().map(|a| a.current_balance).collect();
        assert_eq!(balances, vec![100, 40, 28, 25]);
    }
}
