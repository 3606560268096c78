use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::entities::{
    customer_balance::BalanceStatus,
    driver_instruction::{AlertPriority, InstructionStatus},
    EquipmentType,
};

/// Handle services use to publish engine events without blocking on
/// downstream consumers.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Everything observable that happens inside the engine.
///
/// `BalanceChanged` is the interesting one: it fires only when a recompute
/// actually changed the balance or its status, which is what lets the alert
/// generator react per key instead of re-scanning the world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    MovementRecorded {
        movement_id: Uuid,
        customer_id: Uuid,
        equipment_type: EquipmentType,
        quantity: i32,
        confidence: f64,
    },
    MovementVerified {
        movement_id: Uuid,
    },
    BalanceChanged {
        customer_id: Uuid,
        equipment_type: EquipmentType,
        old_balance: Option<i32>,
        new_balance: i32,
        old_status: Option<BalanceStatus>,
        new_status: BalanceStatus,
    },
    AlertRaised {
        customer_id: Uuid,
        equipment_type: EquipmentType,
        excess: i32,
        priority: AlertPriority,
    },
    AlertCleared {
        customer_id: Uuid,
        equipment_type: EquipmentType,
    },
    ThresholdUpdated {
        customer_id: Uuid,
        equipment_type: EquipmentType,
        threshold: i32,
    },
    InstructionCreated {
        instruction_id: Uuid,
        customer_id: Uuid,
        equipment_type: EquipmentType,
        excess: i32,
        priority: AlertPriority,
    },
    InstructionStatusChanged {
        instruction_id: Uuid,
        from: InstructionStatus,
        to: InstructionStatus,
        at: DateTime<Utc>,
    },
}

/// Drains the engine's event channel and logs each event.
///
/// Dashboards, notification fan-out and similar consumers subscribe here;
/// inside the engine boundary the loop is observability only, so a lagging
/// consumer can never block a ledger write.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::BalanceChanged {
                customer_id,
                equipment_type,
                new_balance,
                new_status,
                ..
            } => {
                info!(
                    customer_id = %customer_id,
                    equipment_type = %equipment_type,
                    balance = new_balance,
                    status = %new_status,
                    "Balance changed"
                );
            }
            Event::AlertRaised {
                customer_id,
                equipment_type,
                excess,
                priority,
            } => {
                warn!(
                    customer_id = %customer_id,
                    equipment_type = %equipment_type,
                    excess = excess,
                    priority = %priority,
                    "Alert raised"
                );
            }
            Event::AlertCleared {
                customer_id,
                equipment_type,
            } => {
                info!(
                    customer_id = %customer_id,
                    equipment_type = %equipment_type,
                    "Alert cleared"
                );
            }
            Event::InstructionStatusChanged {
                instruction_id,
                from,
                to,
                ..
            } => {
                info!(
                    instruction_id = %instruction_id,
                    from = %from,
                    to = %to,
                    "Instruction status changed"
                );
            }
            other => debug!(event = ?other, "Engine event"),
        }
    }

    info!("Event processing loop stopped");
}

/// Convenience constructor for a channel plus its sender handle.
pub fn channel(buffer: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender::new(tx), rx)
}
