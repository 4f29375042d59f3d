#![cfg(feature = "postgres-tests")]

use chrono::Utc;
use cortex_domain::response::Response;
use cortex_domain::sync::SyncCheckpoint;
use cortex_ports::{CheckpointStore, ResponseStore};
use cortex_storage::{CheckpointRepository, ResponseRepository};
use sqlx::PgPool;
use uuid::Uuid;

#[sqlx::test(migrations = "migrations")]
async fn responses_are_appended_and_read_back_newest_first(pool: PgPool) -> Result<(), sqlx::Error> {
    let repo = ResponseRepository::new(pool);
    let atom_id = Uuid::new_v4();
    let session_id = Uuid::new_v4();

    for i in 0..3 {
        let response = Response {
            atom_id,
            is_correct: i % 2 == 0,
            response_time_ms: 1000 + i * 100,
            hint_used: false,
            chosen_option: None,
            timestamp: Utc::now(),
            session_id,
        };
        repo.append(response)
            .await
            .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;
    }

    let history = repo
        .history_for_atom(atom_id, 10)
        .await
        .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;
    assert_eq!(history.len(), 3);
    Ok(())
}

#[sqlx::test(migrations = "migrations")]
async fn checkpoint_round_trips_watermark(pool: PgPool) -> Result<(), sqlx::Error> {
    let repo = CheckpointRepository::new(pool);
    let mut checkpoint = SyncCheckpoint::new("tasks");
    checkpoint.last_cursor = Some("cursor-1".to_string());
    checkpoint.last_edited_watermark = Some(Utc::now());
    checkpoint.consecutive_failures = 2;

    repo.save(&checkpoint)
        .await
        .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;

    let fetched = repo
        .get("tasks")
        .await
        .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;
    assert_eq!(fetched.last_cursor, Some("cursor-1".to_string()));
    assert_eq!(fetched.consecutive_failures, 2);
    Ok(())
}
