#![cfg(feature = "postgres-tests")]

use chrono::Utc;
use cortex_domain::atom::{
    Atom, AtomFlags, AtomType, FsrsState, KnowledgeType, QualityGrade,
};
use cortex_domain::atom::AtomSource;
use cortex_domain::DomainError;
use cortex_ports::CanonicalStore;
use cortex_storage::CanonicalRepository;
use sqlx::PgPool;
use uuid::Uuid;

fn sample_atom(source_ref: &str) -> Atom {
    let now = Utc::now();
    Atom {
        atom_id: Uuid::new_v4(),
        front: "What is TCP?".to_string(),
        back: "Transmission Control Protocol".to_string(),
        atom_type: AtomType::Flashcard,
        section_id: Some("11.2.3".to_string()),
        concept_ids: Default::default(),
        knowledge_type: KnowledgeType::Declarative,
        difficulty: 0.3,
        quality_grade: QualityGrade::A,
        quality_score: 100,
        quality_issues: Vec::new(),
        source: AtomSource::Notion,
        source_ref: source_ref.to_string(),
        fsrs_state: FsrsState::new(),
        flags: AtomFlags::default(),
        superseded_by: None,
        version: 1,
        created_at: now,
        updated_at: now,
    }
}

#[sqlx::test(migrations = "migrations")]
async fn upsert_is_keyed_by_source_and_source_ref(pool: PgPool) -> Result<(), sqlx::Error> {
    let repo = CanonicalRepository::new(pool);

    let first = sample_atom("page-1");
    let first_id = first.atom_id;
    repo.upsert(first)
        .await
        .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;

    let mut second = sample_atom("page-1");
    second.atom_id = first_id;
    second.back = "Edited back".to_string();
    repo.upsert(second)
        .await
        .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;

    let stored = repo
        .get_by_source_ref(AtomSource::Notion, "page-1")
        .await
        .map_err(|e| sqlx::Error::Protocol(e.to_string()))?
        .expect("atom present");
    assert_eq!(stored.back, "Edited back");
    assert_eq!(stored.atom_id, first_id);
    Ok(())
}

#[sqlx::test(migrations = "migrations")]
async fn update_checked_rejects_stale_version(pool: PgPool) -> Result<(), sqlx::Error> {
    let repo = CanonicalRepository::new(pool);
    let atom = repo
        .upsert(sample_atom("page-2"))
        .await
        .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;

    let mut edited = atom.clone();
    edited.back = "Updated".to_string();
    let result = repo.update_checked(edited, atom.version + 1).await;
    assert!(matches!(result, Err(DomainError::StaleAtom(_))));
    Ok(())
}

#[sqlx::test(migrations = "migrations")]
async fn mark_superseded_excludes_from_schedulable(pool: PgPool) -> Result<(), sqlx::Error> {
    let repo = CanonicalRepository::new(pool);
    let parent = repo
        .upsert(sample_atom("page-3"))
        .await
        .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;
    let child = repo
        .upsert(sample_atom("page-4"))
        .await
        .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;

    repo.mark_superseded(parent.atom_id, child.atom_id)
        .await
        .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;

    let schedulable = repo
        .list_schedulable(None)
        .await
        .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;
    assert!(schedulable.iter().all(|a| a.atom_id != parent.atom_id));
    Ok(())
}
