//! Postgres-backed `ResponseStore`, `PersonaStore`, and `StruggleStore`
//! (§3 Response/LearnerPersona/StruggleSignal, §4.H, §4.K).

use async_trait::async_trait;
use cortex_domain::atom::AtomId;
use cortex_domain::persona::{LearnerPersona, StruggleSignal};
use cortex_domain::response::Response;
use cortex_ports::{PersonaStore, ResponseStore, StruggleStore};
use sqlx::types::Json;
use sqlx::PgPool;

pub struct ResponseRepository {
    pool: PgPool,
}

impl ResponseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResponseStore for ResponseRepository {
    async fn append(&self, response: Response) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO responses (atom_id, section_id, "timestamp", data)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(response.atom_id)
        .bind(response.section_id.clone())
        .bind(response.timestamp)
        .bind(Json(&response))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn history_for_atom(&self, atom_id: AtomId, limit: usize) -> anyhow::Result<Vec<Response>> {
        let rows: Vec<(Json<Response>,)> = sqlx::query_as(
            r#"SELECT data FROM responses WHERE atom_id = $1 ORDER BY "timestamp" DESC LIMIT $2"#,
        )
        .bind(atom_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(Json(r),)| r).collect())
    }

    async fn history_for_section(&self, section_id: &str) -> anyhow::Result<Vec<Response>> {
        let rows: Vec<(Json<Response>,)> = sqlx::query_as(
            r#"SELECT data FROM responses WHERE section_id = $1 ORDER BY "timestamp""#,
        )
        .bind(section_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(Json(r),)| r).collect())
    }
}

pub struct PersonaRepository {
    pool: PgPool,
}

impl PersonaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PersonaStore for PersonaRepository {
    async fn get(&self, learner_id: &str) -> anyhow::Result<LearnerPersona> {
        let row: Option<(Json<LearnerPersona>,)> =
            sqlx::query_as("SELECT data FROM learner_personas WHERE learner_id = $1")
                .bind(learner_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(Json(p),)| p).unwrap_or_default())
    }

    async fn save(&self, learner_id: &str, persona: &LearnerPersona) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO learner_personas (learner_id, data)
            VALUES ($1, $2)
            ON CONFLICT (learner_id) DO UPDATE SET data = EXCLUDED.data
            "#,
        )
        .bind(learner_id)
        .bind(Json(persona))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

pub struct StruggleRepository {
    pool: PgPool,
}

impl StruggleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StruggleStore for StruggleRepository {
    async fn save_all(&self, signals: Vec<StruggleSignal>) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        for signal in &signals {
            sqlx::query(
                r#"
                INSERT INTO struggle_signals (section_id, data)
                VALUES ($1, $2)
                ON CONFLICT (section_id) DO UPDATE SET data = EXCLUDED.data
                "#,
            )
            .bind(&signal.section_id)
            .bind(Json(signal))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list(&self) -> anyhow::Result<Vec<StruggleSignal>> {
        let rows: Vec<(Json<StruggleSignal>,)> =
            sqlx::query_as("SELECT data FROM struggle_signals")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(Json(s),)| s).collect())
    }
}
