//! Canonical atom store port (§3 Atom, §4.D, §5 optimistic locking).

use async_trait::async_trait;
use cortex_domain::atom::{Atom, AtomId, AtomSource};
use cortex_domain::DomainError;

#[async_trait]
pub trait CanonicalStore: Send + Sync {
    /// Idempotent upsert keyed by `(source, source_ref)` (§4.D).
    async fn upsert(&self, atom: Atom) -> anyhow::Result<Atom>;

    async fn get(&self, atom_id: AtomId) -> anyhow::Result<Option<Atom>>;

    async fn get_by_source_ref(
        &self,
        source: AtomSource,
        source_ref: &str,
    ) -> anyhow::Result<Option<Atom>>;

    /// All schedulable atoms (`superseded_by.is_none()`) in a section.
    async fn list_schedulable(&self, section_id: Option<&str>) -> anyhow::Result<Vec<Atom>>;

    async fn list_all(&self) -> anyhow::Result<Vec<Atom>>;

    /// Compare-and-swap update guarded by `expected_version` (§5). Returns
    /// [`DomainError::StaleAtom`] when `expected_version` doesn't match the
    /// stored version.
    async fn update_checked(
        &self,
        atom: Atom,
        expected_version: i64,
    ) -> Result<Atom, DomainError>;

    async fn mark_superseded(&self, atom_id: AtomId, by: AtomId) -> anyhow::Result<()>;
}
