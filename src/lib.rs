//! Equipment ledger and alerting engine.
//!
//! Tracks returnable transport equipment (pallets, cages, dollies and the
//! like) held by customers: movements are appended to an immutable ledger,
//! per-key balances are re-derived from that ledger, balances out of range
//! produce alerts, and alerts drive the driver-instruction state machine.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod key_lock;
pub mod logging;
pub mod migrator;
pub mod services;

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::entities::{customer_balance, driver_instruction, equipment_threshold, EquipmentType};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::key_lock::{BalanceKey, KeyLocks};
use crate::services::{
    Alert, AlertService, BalanceService, InstructionService, MovementService, ThresholdService,
};

/// What a threshold change did to the key, mirroring the shape ingestion
/// reports for a movement.
#[derive(Debug, Clone)]
pub struct ThresholdChangeOutcome {
    pub threshold: equipment_threshold::Model,
    pub balance: customer_balance::Model,
    /// Alert state after the change, if the balance is now out of range.
    pub alert: Option<Alert>,
    /// The live instruction for the key, present whenever `alert` is.
    pub instruction: Option<driver_instruction::Model>,
}

/// The assembled engine: one database pool, one event channel, one set of
/// per-key locks, shared by every service.
///
/// Services are cheap to clone (they hold `Arc`s), so embedders typically
/// build one `Engine` at startup and hand out clones of the services they
/// need.
#[derive(Clone)]
pub struct Engine {
    db: Arc<DatabaseConnection>,
    config: AppConfig,
    event_sender: EventSender,
    key_locks: KeyLocks,
    movements: MovementService,
    balances: BalanceService,
    alerts: AlertService,
    thresholds: ThresholdService,
    instructions: InstructionService,
}

impl Engine {
    /// Wires the services together around an existing pool. The caller keeps
    /// the receiving half of the event channel, usually handing it to
    /// [`events::process_events`].
    pub fn new(db: Arc<DatabaseConnection>, config: AppConfig, event_sender: EventSender) -> Self {
        let key_locks = KeyLocks::new();

        let thresholds = ThresholdService::new(
            db.clone(),
            event_sender.clone(),
            config.fallback_threshold,
        );
        let balances = BalanceService::new(
            db.clone(),
            event_sender.clone(),
            key_locks.clone(),
            thresholds.clone(),
        );
        let alerts = AlertService::new(db.clone(), config.high_priority_multiplier);
        let instructions =
            InstructionService::new(db.clone(), event_sender.clone(), key_locks.clone());
        let movements = MovementService::new(
            db.clone(),
            event_sender.clone(),
            key_locks.clone(),
            balances.clone(),
            alerts.clone(),
            instructions.clone(),
            config.duplicate_window_secs,
        );

        Self {
            db,
            config,
            event_sender,
            key_locks,
            movements,
            balances,
            alerts,
            thresholds,
            instructions,
        }
    }

    /// Connects, optionally migrates, and assembles an engine from
    /// configuration. Returns the engine together with the event receiver.
    pub async fn from_config(
        config: AppConfig,
    ) -> Result<(Self, tokio::sync::mpsc::Receiver<events::Event>), ServiceError> {
        let pool = db::establish_connection_from_app_config(&config).await?;
        if config.auto_migrate {
            db::run_migrations(&pool).await?;
        }

        let (event_sender, rx) = events::channel(config.event_buffer);
        Ok((Self::new(Arc::new(pool), config, event_sender), rx))
    }

    /// Sets a per-customer threshold override and immediately recomputes the
    /// key, so the stored snapshot and the derived alert reflect the new
    /// threshold without waiting for the next movement. Runs the same
    /// recompute-evaluate-instruction chain as ingestion, under one guard.
    #[instrument(skip(self))]
    pub async fn set_threshold(
        &self,
        customer_id: Uuid,
        equipment_type: EquipmentType,
        value: i32,
    ) -> Result<ThresholdChangeOutcome, ServiceError> {
        let key = BalanceKey::new(customer_id, equipment_type);
        let _guard = self.key_locks.acquire(key).await;

        let threshold = self
            .thresholds
            .set_locked(customer_id, equipment_type, value)
            .await?;
        let recompute = self
            .balances
            .recompute_locked(customer_id, equipment_type)
            .await?;

        let alert = self.alerts.evaluate(&recompute.balance);
        let was_alerting = recompute
            .previous
            .is_some_and(|(_, status)| status != customer_balance::BalanceStatus::Normal);

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
                            customer_id,
                            equipment_type,
                        })
                        .await
                        .map_err(ServiceError::EventError)?;
                }
                // A cleared alert leaves any live instruction for dispatch
                // to resolve explicitly.
                None
            }
        };

        Ok(ThresholdChangeOutcome {
            threshold,
            balance: recompute.balance,
            alert,
            instruction,
        })
    }

    pub fn db(&self) -> &Arc<DatabaseConnection> {
        &self.db
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn event_sender(&self) -> &EventSender {
        &self.event_sender
    }

    pub fn key_locks(&self) -> &KeyLocks {
        &self.key_locks
    }

    pub fn movements(&self) -> &MovementService {
        &self.movements
    }

    pub fn balances(&self) -> &BalanceService {
        &self.balances
    }

    pub fn alerts(&self) -> &AlertService {
        &self.alerts
    }

    pub fn thresholds(&self) -> &ThresholdService {
        &self.thresholds
    }

    pub fn instructions(&self) -> &InstructionService {
        &self.instructions
    }
}
