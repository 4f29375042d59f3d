//! Postgres-backed `CanonicalStore` (§3 Atom, §5 optimistic locking).
//!
//! Transaction note: `update_checked` relies on the `UPDATE ... WHERE
//! version = $expected` row count to decide between success and
//! [`DomainError::StaleAtom`], so it doesn't need an explicit transaction —
//! the single statement is already atomic.

use async_trait::async_trait;
use cortex_domain::atom::{Atom, AtomId, AtomSource};
use cortex_domain::DomainError;
use cortex_ports::CanonicalStore;
use sqlx::types::Json;
use sqlx::PgPool;

pub struct CanonicalRepository {
    pool: PgPool,
}

impl CanonicalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn source_tag(source: AtomSource) -> &'static str {
    match source {
        AtomSource::Notion => "notion",
        AtomSource::Anki => "anki",
        AtomSource::AiGenerated => "ai_generated",
        AtomSource::Manual => "manual",
    }
}

fn grade_tag(grade: cortex_domain::atom::QualityGrade) -> &'static str {
    use cortex_domain::atom::QualityGrade::*;
    match grade {
        A => "A",
        B => "B",
        C => "C",
        D => "D",
        F => "F",
    }
}

#[async_trait]
impl CanonicalStore for CanonicalRepository {
    async fn upsert(&self, atom: Atom) -> anyhow::Result<Atom> {
        sqlx::query(
            r#"
            INSERT INTO atoms (atom_id, front, back, atom_type, section_id, source, source_ref,
                                quality_grade, superseded_by, version, created_at, updated_at, data)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (source, source_ref) DO UPDATE SET
                front = EXCLUDED.front,
                back = EXCLUDED.back,
                atom_type = EXCLUDED.atom_type,
                section_id = EXCLUDED.section_id,
                quality_grade = EXCLUDED.quality_grade,
                superseded_by = EXCLUDED.superseded_by,
                version = EXCLUDED.version,
                updated_at = EXCLUDED.updated_at,
                data = EXCLUDED.data
            "#,
        )
        .bind(atom.atom_id)
        .bind(&atom.front)
        .bind(&atom.back)
        .bind(format!("{:?}", atom.atom_type))
        .bind(&atom.section_id)
        .bind(source_tag(atom.source))
        .bind(&atom.source_ref)
        .bind(grade_tag(atom.quality_grade))
        .bind(atom.superseded_by)
        .bind(atom.version)
        .bind(atom.created_at)
        .bind(atom.updated_at)
        .bind(Json(&atom))
        .execute(&self.pool)
        .await?;
        Ok(atom)
    }

    async fn get(&self, atom_id: AtomId) -> anyhow::Result<Option<Atom>> {
        let row: Option<(Json<Atom>,)> =
            sqlx::query_as("SELECT data FROM atoms WHERE atom_id = $1")
                .bind(atom_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(Json(atom),)| atom))
    }

    async fn get_by_source_ref(
        &self,
        source: AtomSource,
        source_ref: &str,
    ) -> anyhow::Result<Option<Atom>> {
        let row: Option<(Json<Atom>,)> = sqlx::query_as(
            "SELECT data FROM atoms WHERE source = $1 AND source_ref = $2",
        )
        .bind(source_tag(source))
        .bind(source_ref)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(Json(atom),)| atom))
    }

    async fn list_schedulable(&self, section_id: Option<&str>) -> anyhow::Result<Vec<Atom>> {
        let rows: Vec<(Json<Atom>,)> = match section_id {
            Some(id) => {
                sqlx::query_as(
                    "SELECT data FROM atoms WHERE superseded_by IS NULL AND section_id = $1",
                )
                .bind(id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT data FROM atoms WHERE superseded_by IS NULL")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(rows.into_iter().map(|(Json(atom),)| atom).collect())
    }

    async fn list_all(&self) -> anyhow::Result<Vec<Atom>> {
        let rows: Vec<(Json<Atom>,)> = sqlx::query_as("SELECT data FROM atoms")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(Json(atom),)| atom).collect())
    }

    async fn update_checked(&self, atom: Atom, expected_version: i64) -> Result<Atom, DomainError> {
        let mut updated = atom;
        updated.version = expected_version + 1;

        let result = sqlx::query(
            r#"
            UPDATE atoms SET
                front = $1, back = $2, atom_type = $3, section_id = $4,
                quality_grade = $5, superseded_by = $6, version = $7,
                updated_at = $8, data = $9
            WHERE atom_id = $10 AND version = $11
            "#,
        )
        .bind(&updated.front)
        .bind(&updated.back)
        .bind(format!("{:?}", updated.atom_type))
        .bind(&updated.section_id)
        .bind(grade_tag(updated.quality_grade))
        .bind(updated.superseded_by)
        .bind(updated.version)
        .bind(updated.updated_at)
        .bind(Json(&updated))
        .bind(updated.atom_id)
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(anyhow::Error::from)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::StaleAtom(updated.atom_id.to_string()));
        }
        Ok(updated)
    }

    async fn mark_superseded(&self, atom_id: AtomId, by: AtomId) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE atoms SET superseded_by = $1, version = version + 1 WHERE atom_id = $2",
        )
        .bind(by)
        .bind(atom_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
