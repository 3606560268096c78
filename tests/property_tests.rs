use std::cmp::Reverse;
use std::sync::Arc;

use chrono::Utc;
use proptest::prelude::*;
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use equiptrack_engine::{
    entities::{
        customer_balance::{self, BalanceStatus},
        driver_instruction::{AlertPriority, InstructionStatus},
        equipment_movement::Direction,
        EquipmentType,
    },
    services::{
        balances::{classify, fold_quantities},
        instructions::is_valid_transition,
        AlertService,
    },
};

fn direction() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Direction::In), Just(Direction::Out)]
}

fn snapshot(balance: i32, threshold: i32) -> customer_balance::Model {
    customer_balance::Model {
        id: Uuid::new_v4(),
        customer_id: Uuid::new_v4(),
        equipment_type: EquipmentType::Pallet,
        current_balance: balance,
        threshold,
        status: classify(balance, threshold),
        last_movement_at: Some(Utc::now()),
        updated_at: Utc::now(),
    }
}

proptest! {
    #[test]
    fn fold_matches_reference_sum(
        items in prop::collection::vec((direction(), 1..=10_000i32), 0..200)
    ) {
        let reference: i64 = items
            .iter()
            .map(|(d, q)| match d {
                Direction::In => i64::from(*q),
                Direction::Out => -i64::from(*q),
            })
            .sum();
        prop_assert_eq!(fold_quantities(items), Some(reference));
    }

    #[test]
    fn fold_is_order_independent(
        items in prop::collection::vec((direction(), 1..=10_000i32), 0..100),
        seed in any::<u64>()
    ) {
        let forward = fold_quantities(items.clone());

        let mut shuffled = items;
        // Cheap deterministic shuffle; the property only needs some permutation.
        let mut state = seed | 1;
        for i in (1..shuffled.len()).rev() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            shuffled.swap(i, (state % (i as u64 + 1)) as usize);
        }

        prop_assert_eq!(fold_quantities(shuffled), forward);
    }

    #[test]
    fn classification_partitions_the_number_line(
        balance in -1_000_000..=1_000_000i32,
        threshold in 0..=1_000_000i32
    ) {
        let status = classify(balance, threshold);
        let expected = if balance < 0 {
            BalanceStatus::Negative
        } else if balance > threshold {
            BalanceStatus::OverThreshold
        } else {
            BalanceStatus::Normal
        };
        prop_assert_eq!(status, expected);
    }

    #[test]
    fn raising_the_threshold_never_raises_an_alert(
        balance in 0..=1_000_000i32,
        low in 0..=1_000_000i32,
        bump in 0..=1_000_000i32
    ) {
        // Monotonicity: if a balance is fine at some threshold, it is still
        // fine at any higher one.
        let high = low.saturating_add(bump);
        if classify(balance, low) == BalanceStatus::Normal {
            prop_assert_eq!(classify(balance, high), BalanceStatus::Normal);
        }
    }

    #[test]
    fn priority_matches_the_multiplier_rule(
        balance in -1_000_000..=1_000_000i32,
        threshold in 0..=1_000_000i32
    ) {
        let svc = AlertService::new(Arc::new(DatabaseConnection::default()), 1.5);
        let model = snapshot(balance, threshold);
        if let Some(alert) = svc.evaluate(&model) {
            // 2*balance > 3*threshold is the exact integer form of
            // balance > 1.5 * threshold.
            let expected = if 2 * i64::from(balance) > 3 * i64::from(threshold) {
                AlertPriority::High
            } else {
                AlertPriority::Medium
            };
            prop_assert_eq!(alert.priority, expected);
            prop_assert_eq!(alert.excess, balance - threshold);
        } else {
            prop_assert_eq!(model.status, BalanceStatus::Normal);
        }
    }

    #[test]
    fn alert_sort_key_orders_priority_then_excess(
        seeds in prop::collection::vec((-1_000..=1_000i32, 0..=1_000i32), 0..50)
    ) {
        let svc = AlertService::new(Arc::new(DatabaseConnection::default()), 1.5);
        let mut alerts: Vec<_> = seeds
            .into_iter()
            .filter_map(|(balance, threshold)| svc.evaluate(&snapshot(balance, threshold)))
            .collect();
        alerts.sort_by_key(|a| (Reverse(a.priority), Reverse(a.excess)));

        for pair in alerts.windows(2) {
            let better = (pair[0].priority, pair[0].excess);
            let worse = (pair[1].priority, pair[1].excess);
            prop_assert!(better >= worse);
        }
    }
}

#[test]
fn state_machine_shape_is_fixed() {
    use InstructionStatus::*;
    let all = [Pending, Assigned, Completed, UnableToCollect, Failed];

    for from in all {
        let successors: Vec<_> = all
            .into_iter()
            .filter(|to| is_valid_transition(from, *to))
            .collect();
        let expected: &[InstructionStatus] = match from {
            Pending => &[Assigned],
            Assigned => &[Completed, UnableToCollect],
            UnableToCollect => &[Pending, Failed],
            Completed | Failed => &[],
        };
        assert_eq!(successors, expected);
        assert_eq!(from.is_terminal(), successors.is_empty());
    }
}
