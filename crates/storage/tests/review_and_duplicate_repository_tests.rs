#![cfg(feature = "postgres-tests")]

use chrono::Utc;
use cortex_domain::duplicate::{DuplicateGroup, DuplicateMethod, DuplicateStatus};
use cortex_domain::review::{ReviewQueueItem, ReviewStatus};
use cortex_ports::{DuplicateGroupStore, ReviewQueueStore};
use cortex_storage::{DuplicateGroupRepository, ReviewQueueRepository};
use sqlx::PgPool;
use uuid::Uuid;

#[sqlx::test(migrations = "migrations")]
async fn review_queue_round_trips_pending_items(pool: PgPool) -> Result<(), sqlx::Error> {
    let repo = ReviewQueueRepository::new(pool);
    let item = ReviewQueueItem::new_improve(Uuid::new_v4(), Vec::new(), Utc::now());
    let id = item.id;
    repo.insert(item)
        .await
        .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;

    let pending = repo
        .list(Some(ReviewStatus::Pending))
        .await
        .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;
    assert!(pending.iter().any(|i| i.id == id));

    let mut fetched = repo
        .get(id)
        .await
        .map_err(|e| sqlx::Error::Protocol(e.to_string()))?
        .expect("item present");
    fetched.status = ReviewStatus::Approved;
    fetched.reviewed_at = Some(Utc::now());
    repo.update(fetched)
        .await
        .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;

    let approved = repo
        .list(Some(ReviewStatus::Approved))
        .await
        .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;
    assert!(approved.iter().any(|i| i.id == id));
    Ok(())
}

#[sqlx::test(migrations = "migrations")]
async fn resolving_a_duplicate_group_sets_canonical_atom(pool: PgPool) -> Result<(), sqlx::Error> {
    let repo = DuplicateGroupRepository::new(pool);
    let atom_a = Uuid::new_v4();
    let atom_b = Uuid::new_v4();
    let group = DuplicateGroup {
        id: Uuid::new_v4(),
        atom_ids: vec![atom_a, atom_b],
        method: DuplicateMethod::Fuzzy,
        similarity: 0.9,
        status: DuplicateStatus::Open,
        canonical_atom_id: None,
    };
    let group_id = group.id;
    repo.upsert_groups(vec![group])
        .await
        .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;

    repo.resolve(group_id, atom_a)
        .await
        .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;

    let open = repo
        .list(Some(DuplicateStatus::Open))
        .await
        .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;
    assert!(open.iter().all(|g| g.id != group_id));

    let resolved = repo
        .list(Some(DuplicateStatus::Resolved))
        .await
        .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;
    let resolved_group = resolved.iter().find(|g| g.id == group_id).expect("resolved");
    assert_eq!(resolved_group.canonical_atom_id, Some(atom_a));
    Ok(())
}
