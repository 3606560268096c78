mod common;

use assert_matches::assert_matches;
use uuid::Uuid;

use common::{movement, TestEngine};
use equiptrack_engine::{
    entities::{
        driver_instruction::{InstructionStatus, UnableReason},
        equipment_movement::Direction,
        EquipmentType,
    },
    errors::ServiceError,
};

/// Pushes a key over its threshold and returns the live instruction id.
async fn raise(t: &TestEngine, customer: Uuid, equipment: EquipmentType) -> Uuid {
    t.engine
        .set_threshold(customer, equipment, 10)
        .await
        .expect("set threshold");
    let outcome = t
        .engine
        .movements()
        .record(movement(customer, equipment, 25, Direction::In))
        .await
        .expect("record");
    outcome.instruction.expect("instruction created").id
}

#[tokio::test]
async fn collection_happy_path() {
    let t = TestEngine::new().await;
    let id = raise(&t, Uuid::new_v4(), EquipmentType::Pallet).await;

    let assigned = t
        .engine
        .instructions()
        .assign(id, "M. Novak".to_string())
        .await
        .expect("assign");
    assert_eq!(assigned.status, InstructionStatus::Assigned);
    assert_eq!(assigned.assigned_driver.as_deref(), Some("M. Novak"));

    let done = t.engine.instructions().complete(id).await.expect("complete");
    assert_eq!(done.status, InstructionStatus::Completed);
    assert!(done.status_changed_at >= done.created_at);

    let err = t
        .engine
        .instructions()
        .complete(id)
        .await
        .expect_err("terminal state");
    assert_matches!(
        err,
        ServiceError::InvalidTransition {
            from: InstructionStatus::Completed,
            attempted: "complete",
            ..
        }
    );
}

#[tokio::test]
async fn unable_to_collect_can_be_rescheduled() {
    let t = TestEngine::new().await;
    let id = raise(&t, Uuid::new_v4(), EquipmentType::Cage).await;

    t.engine
        .instructions()
        .assign(id, "J. Hart".to_string())
        .await
        .expect("assign");
    let unable = t
        .engine
        .instructions()
        .mark_unable(id, UnableReason::AccessIssues)
        .await
        .expect("mark unable");
    assert_eq!(unable.status, InstructionStatus::UnableToCollect);
    assert_eq!(unable.unable_reason, Some(UnableReason::AccessIssues));

    // Rescheduling puts it back in the queue with a clean slate.
    let rescheduled = t
        .engine
        .instructions()
        .reschedule(id)
        .await
        .expect("reschedule");
    assert_eq!(rescheduled.status, InstructionStatus::Pending);
    assert_eq!(rescheduled.assigned_driver, None);
    assert_eq!(rescheduled.unable_reason, None);

    // And the next attempt can proceed normally.
    t.engine
        .instructions()
        .assign(id, "A. Lindqvist".to_string())
        .await
        .expect("second assign");
    t.engine
        .instructions()
        .complete(id)
        .await
        .expect("second attempt completes");
}

#[tokio::test]
async fn unable_to_collect_can_be_written_off() {
    let t = TestEngine::new().await;
    let id = raise(&t, Uuid::new_v4(), EquipmentType::Dolly).await;

    t.engine
        .instructions()
        .assign(id, "K. Mensah".to_string())
        .await
        .expect("assign");
    t.engine
        .instructions()
        .mark_unable(id, UnableReason::CustomerRefused)
        .await
        .expect("mark unable");
    let failed = t
        .engine
        .instructions()
        .mark_failed(id)
        .await
        .expect("mark failed");
    assert_eq!(failed.status, InstructionStatus::Failed);

    let err = t
        .engine
        .instructions()
        .reschedule(id)
        .await
        .expect_err("failed is terminal");
    assert_matches!(err, ServiceError::InvalidTransition { .. });
}

#[tokio::test]
async fn skipping_states_is_rejected() {
    let t = TestEngine::new().await;
    let id = raise(&t, Uuid::new_v4(), EquipmentType::Stillage).await;

    // Pending admits only assignment.
    let complete = t.engine.instructions().complete(id).await;
    assert_matches!(
        complete,
        Err(ServiceError::InvalidTransition {
            from: InstructionStatus::Pending,
            attempted: "complete",
            ..
        })
    );
    let unable = t
        .engine
        .instructions()
        .mark_unable(id, UnableReason::Weather)
        .await;
    assert_matches!(unable, Err(ServiceError::InvalidTransition { .. }));
    let failed = t.engine.instructions().mark_failed(id).await;
    assert_matches!(failed, Err(ServiceError::InvalidTransition { .. }));

    // Assigned cannot be re-assigned or rescheduled.
    t.engine
        .instructions()
        .assign(id, "D. Silva".to_string())
        .await
        .expect("assign");
    let reassign = t.engine.instructions().assign(id, "S. Weber".to_string()).await;
    assert_matches!(reassign, Err(ServiceError::InvalidTransition { .. }));
    let reschedule = t.engine.instructions().reschedule(id).await;
    assert_matches!(reschedule, Err(ServiceError::InvalidTransition { .. }));
}

#[tokio::test]
async fn alert_clearing_leaves_the_instruction_in_place() {
    let t = TestEngine::new().await;
    let customer = Uuid::new_v4();
    let equipment = EquipmentType::Pallet;
    let id = raise(&t, customer, equipment).await;

    // Collect enough to bring the balance back under threshold.
    let outcome = t
        .engine
        .movements()
        .record(movement(customer, equipment, 20, Direction::Out))
        .await
        .expect("record collection");
    assert!(outcome.alert.is_none(), "alert must clear");

    // The physical collection may already be in motion; the instruction is
    // left for dispatch to resolve explicitly.
    let live = t
        .engine
        .instructions()
        .find_live(customer, equipment)
        .await
        .expect("find live")
        .expect("instruction still live");
    assert_eq!(live.id, id);
    assert_eq!(live.status, InstructionStatus::Pending);
}

#[tokio::test]
async fn at_most_one_live_instruction_per_key() {
    let t = TestEngine::new().await;
    let customer = Uuid::new_v4();
    let equipment = EquipmentType::Cage;
    let id = raise(&t, customer, equipment).await;

    // More traffic while the alert is active reuses the live instruction.
    let outcome = t
        .engine
        .movements()
        .record(movement(customer, equipment, 5, Direction::In))
        .await
        .expect("record");
    assert_eq!(outcome.instruction.expect("live instruction").id, id);

    // Explicit creation while one is live is a conflict.
    let alert = outcome.alert.expect("alert active");
    let err = t
        .engine
        .instructions()
        .create(&alert)
        .await
        .expect_err("duplicate create");
    assert_matches!(
        err,
        ServiceError::DuplicateInstruction { existing_id, .. } if existing_id == id
    );

    // Once the live instruction reaches a terminal state, a fresh alert may
    // open a new one.
    t.engine
        .instructions()
        .assign(id, "P. Costa".to_string())
        .await
        .expect("assign");
    t.engine.instructions().complete(id).await.expect("complete");

    let next = t
        .engine
        .movements()
        .record(movement(customer, equipment, 5, Direction::In))
        .await
        .expect("record");
    let fresh = next.instruction.expect("new instruction");
    assert_ne!(fresh.id, id);
    assert_eq!(fresh.status, InstructionStatus::Pending);
}

#[tokio::test]
async fn assignment_requires_a_driver_name() {
    let t = TestEngine::new().await;
    let id = raise(&t, Uuid::new_v4(), EquipmentType::Container).await;

    let err = t
        .engine
        .instructions()
        .assign(id, "   ".to_string())
        .await
        .expect_err("blank driver");
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn listing_filters_by_status_and_driver() {
    let t = TestEngine::new().await;
    let first = raise(&t, Uuid::new_v4(), EquipmentType::Pallet).await;
    let second = raise(&t, Uuid::new_v4(), EquipmentType::Pallet).await;

    t.engine
        .instructions()
        .assign(first, "N. Fournier".to_string())
        .await
        .expect("assign");

    let pending = t
        .engine
        .instructions()
        .list(Some(InstructionStatus::Pending), None)
        .await
        .expect("list pending");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, second);

    let by_driver = t
        .engine
        .instructions()
        .list(None, Some("N. Fournier"))
        .await
        .expect("list by driver");
    assert_eq!(by_driver.len(), 1);
    assert_eq!(by_driver[0].id, first);

    let missing = t.engine.instructions().get(Uuid::new_v4()).await;
    assert_matches!(missing, Err(ServiceError::NotFound(_)));
}
