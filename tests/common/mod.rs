use std::sync::Arc;

use chrono::Utc;
use tempfile::TempDir;
use uuid::Uuid;

use equiptrack_engine::{
    config::AppConfig,
    db,
    entities::{
        equipment_movement::{Direction, MovementSource},
        EquipmentType,
    },
    events::{self, process_events},
    services::movements::RecordMovementInput,
    Engine,
};

/// Test harness: a fully wired engine backed by a throwaway SQLite file.
///
/// A file rather than `sqlite::memory:` because every pooled connection to a
/// memory URL gets its own empty database.
pub struct TestEngine {
    pub engine: Engine,
    _event_task: tokio::task::JoinHandle<()>,
    _tmp: TempDir,
}

impl TestEngine {
    pub async fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let db_path = tmp.path().join("equiptrack_test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());

        let mut cfg = AppConfig::new(url, "test");
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("connect to test database");
        db::run_migrations(&pool).await.expect("run migrations");

        let (event_sender, rx) = events::channel(cfg.event_buffer);
        let event_task = tokio::spawn(process_events(rx));

        let engine = Engine::new(Arc::new(pool), cfg, event_sender);
        Self {
            engine,
            _event_task: event_task,
            _tmp: tmp,
        }
    }
}

/// A verified-style extraction movement with sensible defaults.
pub fn movement(
    customer_id: Uuid,
    equipment_type: EquipmentType,
    quantity: i32,
    direction: Direction,
) -> RecordMovementInput {
    RecordMovementInput {
        customer_id,
        equipment_type,
        quantity,
        direction,
        timestamp: Utc::now(),
        source: MovementSource::AiExtraction,
        confidence: 0.92,
        origin_photo_reference: Some("photos/note-0001.jpg".to_string()),
        driver_name: Some("R. Okafor".to_string()),
        notes: None,
    }
}
