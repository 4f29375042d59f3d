//! Rewriter + Review Queue (§3 ReviewQueueItem, §4.G).
//!
//! Enqueues grade-D/F atoms for an AI rewrite suggestion, estimates the
//! resulting grade by re-running the Quality Analyzer over the suggestion,
//! and exposes the reviewer operations (`approve`, `reject`, `edit`,
//! `auto_approve`) that gate every atom mutation behind a human decision.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use cortex_core::quality::{analyze, AnalyzerMode, QualityThresholds};
use cortex_domain::atom::{Atom, AtomSource, QualityGrade};
use cortex_domain::errors::DomainError;
use cortex_domain::review::{ReviewQueueItem, ReviewStatus, RewriteType, SplitSuggestion};
use cortex_ports::{CanonicalStore, LlmClient, ReviewQueueStore, RewritePrompt};
use uuid::Uuid;

pub struct Rewriter {
    pub canonical: Arc<dyn CanonicalStore>,
    pub review_queue: Arc<dyn ReviewQueueStore>,
    pub llm: Arc<dyn LlmClient>,
    pub quality_thresholds: QualityThresholds,
    pub analyzer_mode: AnalyzerMode,
}

#[derive(Debug, Default)]
pub struct EnqueueOutcome {
    pub enqueued: u32,
    pub errored: u32,
}

impl Rewriter {
    /// Enqueues every grade-D/F atom not already superseded or queued,
    /// calling the LLM for a suggestion. `rewrite_type = split` when the
    /// atom carries `ENUMERATION_DETECTED`, else `improve` (§4.G). If the
    /// LLM is unavailable the item is still enqueued, with `status=error`
    /// (§4.G, §7) — the pipeline continues rather than aborting.
    pub async fn enqueue_low_grade_atoms(
        &self,
        atoms: &[Atom],
        now: DateTime<Utc>,
    ) -> Result<EnqueueOutcome, DomainError> {
        let mut outcome = EnqueueOutcome::default();

        for atom in atoms
            .iter()
            .filter(|a| a.is_schedulable() && a.quality_grade.needs_rewrite())
        {
            let prompt = RewritePrompt {
                front: atom.front.clone(),
                back: atom.back.clone(),
                issues: atom.quality_issues.clone(),
            };

            let mut item = if atom.flags.needs_split {
                ReviewQueueItem::new_split(atom.atom_id, atom.quality_issues.clone(), now)
            } else {
                ReviewQueueItem::new_improve(atom.atom_id, atom.quality_issues.clone(), now)
            };

            match item.rewrite_type {
                RewriteType::Improve => match self.llm.improve(&prompt).await {
                    Ok(suggestion) => {
                        let estimate = analyze(
                            &suggestion.front,
                            &suggestion.back,
                            atom.atom_type,
                            &self.quality_thresholds,
                            self.analyzer_mode,
                        )
                        .ok();
                        item.suggested_front = Some(suggestion.front);
                        item.suggested_back = Some(suggestion.back);
                        item.estimated_new_grade = estimate.map(|o| o.grade);
                        outcome.enqueued += 1;
                    }
                    Err(err) => {
                        tracing::warn!(atom_id = %atom.atom_id, error = %err, "LLM unavailable, enqueueing with error status");
                        item.status = ReviewStatus::Error;
                        outcome.errored += 1;
                    }
                },
                RewriteType::Split => match self.llm.split(&prompt).await {
                    Ok(suggestions) => {
                        // Estimate the new grade as the worst of the N children —
                        // a split only "counts" as improved if every child clears B.
                        let worst = suggestions
                            .iter()
                            .filter_map(|s| {
                                analyze(
                                    &s.front,
                                    &s.back,
                                    atom.atom_type,
                                    &self.quality_thresholds,
                                    self.analyzer_mode,
                                )
                                .ok()
                                .map(|o| o.grade)
                            })
                            .min();
                        item.split_suggestions = suggestions
                            .into_iter()
                            .map(|s| SplitSuggestion {
                                front: s.front,
                                back: s.back,
                            })
                            .collect();
                        item.estimated_new_grade = worst;
                        outcome.enqueued += 1;
                    }
                    Err(err) => {
                        tracing::warn!(atom_id = %atom.atom_id, error = %err, "LLM unavailable, enqueueing with error status");
                        item.status = ReviewStatus::Error;
                        outcome.errored += 1;
                    }
                },
            }

            self.review_queue
                .insert(item)
                .await
                .map_err(DomainError::Internal)?;
        }

        Ok(outcome)
    }

    /// `approve` for an `improve` item: overwrites the source atom's
    /// front/back and re-analyzes it (§9 Open Question: "implementations
    /// should re-analyze" rather than trust `estimated_new_grade`).
    pub async fn approve_improve(
        &self,
        item_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Atom, DomainError> {
        let mut item = self.get_pending_or_edited(item_id).await?;
        if item.rewrite_type != RewriteType::Improve {
            return Err(DomainError::Validation(
                "item is not an improve rewrite".to_string(),
            ));
        }
        let front = item
            .suggested_front
            .clone()
            .ok_or_else(|| DomainError::Validation("no suggested_front to approve".to_string()))?;
        let back = item
            .suggested_back
            .clone()
            .ok_or_else(|| DomainError::Validation("no suggested_back to approve".to_string()))?;

        let atom = self
            .canonical
            .get(item.source_atom_id)
            .await
            .map_err(DomainError::Internal)?
            .ok_or_else(|| DomainError::NotFound(item.source_atom_id.to_string()))?;

        let mut updated = atom.clone();
        updated.front = front;
        updated.back = back;
        updated.updated_at = now;

        let output = analyze(
            &updated.front,
            &updated.back,
            updated.atom_type,
            &self.quality_thresholds,
            self.analyzer_mode,
        )
        .map_err(|_| DomainError::AnalyzerMalformedInput(updated.atom_id.to_string()))?;
        updated.quality_grade = output.grade;
        updated.quality_score = output.score;
        updated.quality_issues = output.issues;
        updated.flags = output.flags;

        let expected_version = atom.version;
        let saved = self.canonical.update_checked(updated, expected_version).await?;

        item.status = ReviewStatus::Approved;
        item.reviewed_at = Some(now);
        item.estimated_new_grade = Some(saved.quality_grade);
        self.review_queue
            .update(item)
            .await
            .map_err(DomainError::Internal)?;

        Ok(saved)
    }

    /// `approve` for a `split` item: marks the source atom superseded and
    /// inserts N new atoms, each re-analyzed. Per §3/§8 P9, a child that
    /// fails to re-grade to ≥ B causes the whole approval to be rejected —
    /// the store is never left with a superseded parent missing a child,
    /// nor with a sub-B child.
    pub async fn approve_split(
        &self,
        item_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Atom>, DomainError> {
        let mut item = self.get_pending_or_edited(item_id).await?;
        if item.rewrite_type != RewriteType::Split {
            return Err(DomainError::Validation(
                "item is not a split rewrite".to_string(),
            ));
        }
        if item.split_suggestions.is_empty() {
            return Err(DomainError::Validation(
                "split item has no suggestions".to_string(),
            ));
        }

        let parent = self
            .canonical
            .get(item.source_atom_id)
            .await
            .map_err(DomainError::Internal)?
            .ok_or_else(|| DomainError::NotFound(item.source_atom_id.to_string()))?;

        let mut children = Vec::with_capacity(item.split_suggestions.len());
        for suggestion in &item.split_suggestions {
            let output = analyze(
                &suggestion.front,
                &suggestion.back,
                parent.atom_type,
                &self.quality_thresholds,
                self.analyzer_mode,
            )
            .map_err(|_| DomainError::AnalyzerMalformedInput(parent.atom_id.to_string()))?;

            if output.grade < QualityGrade::B {
                item.status = ReviewStatus::Rejected;
                item.reviewer_note = Some(format!(
                    "split rejected: child regraded to {:?}, below B",
                    output.grade
                ));
                item.reviewed_at = Some(now);
                self.review_queue
                    .update(item)
                    .await
                    .map_err(DomainError::Internal)?;
                return Err(DomainError::BusinessLogic(
                    "split rejected: a child failed to re-grade to at least B".to_string(),
                ));
            }

            let mut child = parent.clone();
            child.atom_id = Uuid::new_v4();
            child.front = suggestion.front.clone();
            child.back = suggestion.back.clone();
            child.quality_grade = output.grade;
            child.quality_score = output.score;
            child.quality_issues = output.issues;
            child.flags = output.flags;
            child.superseded_by = None;
            child.version = 1;
            child.created_at = now;
            child.updated_at = now;
            // Split children are distinct Notion/Anki/AI content; give each
            // its own synthetic source_ref so the canonical upsert key stays unique.
            child.source = AtomSource::AiGenerated;
            child.source_ref = format!("{}::split::{}", parent.source_ref, child.atom_id);

            children.push(child);
        }

        let mut saved_children = Vec::with_capacity(children.len());
        for child in children {
            saved_children.push(self.canonical.upsert(child).await.map_err(DomainError::Internal)?);
        }

        self.canonical
            .mark_superseded(parent.atom_id, saved_children[0].atom_id)
            .await
            .map_err(DomainError::Internal)?;

        item.status = ReviewStatus::Approved;
        item.reviewed_at = Some(now);
        self.review_queue
            .update(item)
            .await
            .map_err(DomainError::Internal)?;

        Ok(saved_children)
    }

    /// Dispatches to [`Self::approve_improve`] or [`Self::approve_split`]
    /// based on the item's `rewrite_type`.
    pub async fn approve(&self, item_id: Uuid, now: DateTime<Utc>) -> Result<Vec<Atom>, DomainError> {
        let item = self
            .review_queue
            .get(item_id)
            .await
            .map_err(DomainError::Internal)?
            .ok_or_else(|| DomainError::NotFound(item_id.to_string()))?;

        match item.rewrite_type {
            RewriteType::Improve => self.approve_improve(item_id, now).await.map(|a| vec![a]),
            RewriteType::Split => self.approve_split(item_id, now).await,
        }
    }

    /// `reject(reason)` — records the decision without mutating the atom.
    pub async fn reject(&self, item_id: Uuid, reason: String, now: DateTime<Utc>) -> Result<(), DomainError> {
        let mut item = self
            .review_queue
            .get(item_id)
            .await
            .map_err(DomainError::Internal)?
            .ok_or_else(|| DomainError::NotFound(item_id.to_string()))?;
        item.status = ReviewStatus::Rejected;
        item.reviewer_note = Some(reason);
        item.reviewed_at = Some(now);
        self.review_queue.update(item).await.map_err(DomainError::Internal)
    }

    /// `edit` — the reviewer mutates the suggested payload; re-approval is
    /// required afterward (status reverts to `edited`, not `approved`).
    pub async fn edit(
        &self,
        item_id: Uuid,
        suggested_front: Option<String>,
        suggested_back: Option<String>,
        split_suggestions: Option<Vec<SplitSuggestion>>,
    ) -> Result<ReviewQueueItem, DomainError> {
        let mut item = self
            .review_queue
            .get(item_id)
            .await
            .map_err(DomainError::Internal)?
            .ok_or_else(|| DomainError::NotFound(item_id.to_string()))?;

        if let Some(front) = suggested_front {
            item.suggested_front = Some(front);
        }
        if let Some(back) = suggested_back {
            item.suggested_back = Some(back);
        }
        if let Some(splits) = split_suggestions {
            item.split_suggestions = splits;
        }
        item.status = ReviewStatus::Edited;
        self.review_queue
            .update(item.clone())
            .await
            .map_err(DomainError::Internal)?;
        Ok(item)
    }

    /// `auto_approve(min_improvement_pct)` — batch-approves every pending
    /// item whose estimated improvement over the atom's current score
    /// clears the threshold (§4.G).
    pub async fn auto_approve(
        &self,
        min_improvement_pct: f32,
        now: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, DomainError> {
        let pending = self
            .review_queue
            .list(Some(ReviewStatus::Pending))
            .await
            .map_err(DomainError::Internal)?;

        let mut approved = Vec::new();
        for item in pending {
            let Some(estimated) = item.estimated_new_grade else {
                continue;
            };
            let atom = self
                .canonical
                .get(item.source_atom_id)
                .await
                .map_err(DomainError::Internal)?;
            let Some(atom) = atom else { continue };

            let improvement_pct = grade_improvement_pct(atom.quality_grade, estimated);
            if improvement_pct >= min_improvement_pct {
                if self.approve(item.id, now).await.is_ok() {
                    approved.push(item.id);
                }
            }
        }
        Ok(approved)
    }

    async fn get_pending_or_edited(&self, item_id: Uuid) -> Result<ReviewQueueItem, DomainError> {
        let item = self
            .review_queue
            .get(item_id)
            .await
            .map_err(DomainError::Internal)?
            .ok_or_else(|| DomainError::NotFound(item_id.to_string()))?;
        if !matches!(item.status, ReviewStatus::Pending | ReviewStatus::Edited) {
            return Err(DomainError::Conflict(format!(
                "review item {item_id} is not pending or edited"
            )));
        }
        Ok(item)
    }
}

/// Maps a letter grade onto a 0-100 band midpoint so "improvement" has a
/// concrete percentage to threshold against (§4.G `auto_approve`).
fn grade_score_estimate(grade: QualityGrade) -> f32 {
    match grade {
        QualityGrade::A => 95.0,
        QualityGrade::B => 82.0,
        QualityGrade::C => 67.0,
        QualityGrade::D => 50.0,
        QualityGrade::F => 20.0,
    }
}

fn grade_improvement_pct(before: QualityGrade, after: QualityGrade) -> f32 {
    grade_score_estimate(after) - grade_score_estimate(before)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cortex_domain::atom::{AtomFlags, AtomType, FsrsState, KnowledgeType};
    use cortex_ports::{ImproveSuggestion, SplitSuggestion as PortSplitSuggestion};
    use std::sync::Mutex;

    fn sample_atom(grade: QualityGrade, needs_split: bool) -> Atom {
        let now = Utc::now();
        Atom {
            atom_id: Uuid::new_v4(),
            front: "What are the OSI layers?".to_string(),
            back: "1. Physical 2. Data Link 3. Network".to_string(),
            atom_type: AtomType::Flashcard,
            section_id: None,
            concept_ids: Default::default(),
            knowledge_type: KnowledgeType::Declarative,
            difficulty: 0.3,
            quality_grade: grade,
            quality_score: 10,
            quality_issues: Vec::new(),
            source: AtomSource::Notion,
            source_ref: "page-1".to_string(),
            fsrs_state: FsrsState::new(),
            flags: AtomFlags {
                needs_split,
                ..Default::default()
            },
            superseded_by: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    struct MemoryCanonical {
        atoms: Mutex<Vec<Atom>>,
    }

    #[async_trait]
    impl CanonicalStore for MemoryCanonical {
        async fn upsert(&self, atom: Atom) -> anyhow::Result<Atom> {
            self.atoms.lock().unwrap().push(atom.clone());
            Ok(atom)
        }
        async fn get(&self, atom_id: cortex_domain::atom::AtomId) -> anyhow::Result<Option<Atom>> {
            Ok(self.atoms.lock().unwrap().iter().find(|a| a.atom_id == atom_id).cloned())
        }
        async fn get_by_source_ref(
            &self,
            _source: AtomSource,
            _source_ref: &str,
        ) -> anyhow::Result<Option<Atom>> {
            Ok(None)
        }
        async fn list_schedulable(&self, _section_id: Option<&str>) -> anyhow::Result<Vec<Atom>> {
            Ok(self.atoms.lock().unwrap().iter().filter(|a| a.is_schedulable()).cloned().collect())
        }
        async fn list_all(&self) -> anyhow::Result<Vec<Atom>> {
            Ok(self.atoms.lock().unwrap().clone())
        }
        async fn update_checked(&self, atom: Atom, expected_version: i64) -> Result<Atom, DomainError> {
            let mut atoms = self.atoms.lock().unwrap();
            let existing = atoms.iter_mut().find(|a| a.atom_id == atom.atom_id);
            match existing {
                Some(existing) if existing.version == expected_version => {
                    let mut updated = atom;
                    updated.version = expected_version + 1;
                    *existing = updated.clone();
                    Ok(updated)
                }
                Some(_) => Err(DomainError::StaleAtom(atom.atom_id.to_string())),
                None => Err(DomainError::NotFound(atom.atom_id.to_string())),
            }
        }
        async fn mark_superseded(&self, atom_id: cortex_domain::atom::AtomId, by: cortex_domain::atom::AtomId) -> anyhow::Result<()> {
            let mut atoms = self.atoms.lock().unwrap();
            if let Some(a) = atoms.iter_mut().find(|a| a.atom_id == atom_id) {
                a.superseded_by = Some(by);
            }
            Ok(())
        }
    }

    struct MemoryReviewQueue {
        items: Mutex<Vec<ReviewQueueItem>>,
    }

    #[async_trait]
    impl ReviewQueueStore for MemoryReviewQueue {
        async fn insert(&self, item: ReviewQueueItem) -> anyhow::Result<ReviewQueueItem> {
            self.items.lock().unwrap().push(item.clone());
            Ok(item)
        }
        async fn get(&self, id: Uuid) -> anyhow::Result<Option<ReviewQueueItem>> {
            Ok(self.items.lock().unwrap().iter().find(|i| i.id == id).cloned())
        }
        async fn list(&self, status: Option<ReviewStatus>) -> anyhow::Result<Vec<ReviewQueueItem>> {
            Ok(self
                .items
                .lock()
                .unwrap()
                .iter()
                .filter(|i| status.map_or(true, |s| i.status == s))
                .cloned()
                .collect())
        }
        async fn update(&self, item: ReviewQueueItem) -> anyhow::Result<()> {
            let mut items = self.items.lock().unwrap();
            if let Some(existing) = items.iter_mut().find(|i| i.id == item.id) {
                *existing = item;
            }
            Ok(())
        }
    }

    struct StubLlm;

    #[async_trait]
    impl LlmClient for StubLlm {
        async fn improve(&self, prompt: &RewritePrompt) -> anyhow::Result<ImproveSuggestion> {
            Ok(ImproveSuggestion {
                front: prompt.front.clone(),
                back: "Short answer".to_string(),
            })
        }
        async fn split(&self, _prompt: &RewritePrompt) -> anyhow::Result<Vec<PortSplitSuggestion>> {
            Ok(vec![
                PortSplitSuggestion {
                    front: "What is the Physical layer?".to_string(),
                    back: "Transmits raw bits".to_string(),
                },
                PortSplitSuggestion {
                    front: "What is the Data Link layer?".to_string(),
                    back: "Frames and MAC addressing".to_string(),
                },
                PortSplitSuggestion {
                    front: "What is the Network layer?".to_string(),
                    back: "Routing and IP addressing".to_string(),
                },
            ])
        }
    }

    fn rewriter(atoms: Vec<Atom>) -> (Rewriter, Arc<MemoryReviewQueue>) {
        let canonical = Arc::new(MemoryCanonical {
            atoms: Mutex::new(atoms),
        });
        let queue = Arc::new(MemoryReviewQueue {
            items: Mutex::new(Vec::new()),
        });
        (
            Rewriter {
                canonical,
                review_queue: queue.clone(),
                llm: Arc::new(StubLlm),
                quality_thresholds: QualityThresholds::default(),
                analyzer_mode: AnalyzerMode::Relaxed,
            },
            queue,
        )
    }

    #[tokio::test]
    async fn test_enumeration_atom_enqueues_split_with_three_children_estimate() {
        let atom = sample_atom(QualityGrade::F, true);
        let (rewriter, queue) = rewriter(vec![atom.clone()]);

        let outcome = rewriter
            .enqueue_low_grade_atoms(&[atom], Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome.enqueued, 1);

        let items = queue.list(None).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].rewrite_type, RewriteType::Split);
        assert_eq!(items[0].split_suggestions.len(), 3);
        assert!(items[0].estimated_new_grade.unwrap() >= QualityGrade::B);
    }

    #[tokio::test]
    async fn test_approve_split_supersedes_parent_and_creates_children() {
        let atom = sample_atom(QualityGrade::F, true);
        let atom_id = atom.atom_id;
        let (rewriter, queue) = rewriter(vec![atom.clone()]);
        rewriter
            .enqueue_low_grade_atoms(&[atom], Utc::now())
            .await
            .unwrap();
        let item_id = queue.list(None).await.unwrap()[0].id;

        let children = rewriter.approve(item_id, Utc::now()).await.unwrap();
        assert_eq!(children.len(), 3);

        let parent = rewriter.canonical.get(atom_id).await.unwrap().unwrap();
        assert!(parent.superseded_by.is_some());
        for child in &children {
            assert!(child.quality_grade >= QualityGrade::B);
        }
    }

    #[tokio::test]
    async fn test_reject_does_not_mutate_atom() {
        let atom = sample_atom(QualityGrade::D, false);
        let atom_id = atom.atom_id;
        let (rewriter, queue) = rewriter(vec![atom.clone()]);
        rewriter
            .enqueue_low_grade_atoms(&[atom], Utc::now())
            .await
            .unwrap();
        let item_id = queue.list(None).await.unwrap()[0].id;

        rewriter
            .reject(item_id, "not worth it".to_string(), Utc::now())
            .await
            .unwrap();

        let item = queue.get(item_id).await.unwrap().unwrap();
        assert_eq!(item.status, ReviewStatus::Rejected);
        assert_eq!(item.reviewer_note.as_deref(), Some("not worth it"));

        let atom_after = rewriter.canonical.get(atom_id).await.unwrap().unwrap();
        assert_eq!(atom_after.version, 1);
    }
}
