//! Sync Engine (§4.B): pulls each configured collection through its
//! `NotionAdapter`, paginating under a token-bucket rate limit with
//! retry-on-transient-failure, and commits batches into the staging store.
//! Collections run in parallel when requested (§4.B "the engine may run in
//! parallel when requested"); each collection still commits independently.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use cortex_domain::errors::DomainError;
use cortex_domain::sync::{SyncMode, SyncRun, SyncStatus};
use cortex_ports::{BatchCommitOutcome, Clock, NotionAdapter, RawPage, StagingRecord};
use cortex_ports::{CheckpointStore, StagingStore, SyncRunLog};
use tokio::task::JoinSet;

use crate::rate_limiter::TokenBucket;
use crate::retry::{retry, Retryable};

pub const BATCH_SIZE: usize = 100;

/// An error surfaced by the adapter, classified so `retry` knows whether
/// to try again. Adapters map their own transport/HTTP errors into this.
#[derive(Debug, Clone)]
pub struct AdapterError {
    pub message: String,
    pub retryable: bool,
}

impl std::fmt::Display for AdapterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

pub struct SyncEngine {
    pub notion: Arc<dyn NotionAdapter>,
    pub staging: Arc<dyn StagingStore>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub run_log: Arc<dyn SyncRunLog>,
    pub clock: Arc<dyn Clock>,
    pub rate_limiter: Arc<TokenBucket>,
}

impl SyncEngine {
    /// Runs one full or incremental sync across `collections` (§4.B).
    /// Each collection commits independently; a failure in one does not
    /// roll back another's already-committed batches. `cancel` is polled at
    /// each batch boundary so `Cancel(sync_id)` can stop the run cooperatively.
    /// `sync_id` is caller-assigned (mirroring `RunOptions::run_id`) so the
    /// HTTP API can hand it back before the run completes (§6.4).
    pub async fn sync(
        self: &Arc<Self>,
        sync_id: uuid::Uuid,
        mode: SyncMode,
        collections: Vec<String>,
        parallel: bool,
        cancel: Arc<AtomicBool>,
    ) -> Result<SyncRun, DomainError> {
        let now = self.clock.now();
        let mut run = SyncRun::start_with_id(sync_id, mode, collections.clone(), now);

        let outcomes: Vec<(String, anyhow::Result<CollectionOutcome>)> = if parallel {
            let mut set = JoinSet::new();
            for collection in collections.clone() {
                let engine = Arc::clone(self);
                let cancel = Arc::clone(&cancel);
                set.spawn(async move {
                    let outcome = engine.sync_collection(&collection, mode, cancel).await;
                    (collection, outcome)
                });
            }
            let mut results = Vec::new();
            while let Some(joined) = set.join_next().await {
                results.push(joined.expect("sync collection task panicked"));
            }
            results
        } else {
            let mut results = Vec::new();
            for collection in &collections {
                let outcome = self
                    .sync_collection(collection, mode, Arc::clone(&cancel))
                    .await;
                results.push((collection.clone(), outcome));
            }
            results
        };

        let mut any_failed = false;
        let mut any_warning = false;
        let mut was_cancelled = false;

        for (collection, result) in outcomes {
            match result {
                Ok(outcome) => {
                    run.created += outcome.created;
                    run.updated += outcome.updated;
                    run.tombstoned += outcome.tombstoned;
                    if outcome.cancelled {
                        was_cancelled = true;
                    }
                    if outcome.had_warnings {
                        any_warning = true;
                    }
                }
                Err(err) => {
                    tracing::error!(collection, error = %err, "sync failed for collection");
                    run.error_message = Some(format!("{collection}: {err}"));
                    any_failed = true;
                }
            }
        }

        run.completed_at = Some(self.clock.now());
        run.status = if was_cancelled {
            SyncStatus::Cancelled
        } else if any_failed {
            SyncStatus::Failed
        } else if any_warning {
            SyncStatus::CompletedWithWarnings
        } else {
            SyncStatus::Completed
        };

        self.run_log
            .record(&run)
            .await
            .map_err(DomainError::Internal)?;

        if any_failed {
            return Err(DomainError::SyncFailed(
                run.error_message.clone().unwrap_or_default(),
            ));
        }
        Ok(run)
    }

    async fn sync_collection(
        &self,
        collection: &str,
        mode: SyncMode,
        cancel: Arc<AtomicBool>,
    ) -> anyhow::Result<CollectionOutcome> {
        let mut checkpoint = self.checkpoints.get(collection).await?;
        let since_watermark = match mode {
            SyncMode::Incremental => checkpoint.last_edited_watermark,
            SyncMode::Full => None,
        };

        let mut cursor = if mode == SyncMode::Incremental {
            checkpoint.last_cursor.clone()
        } else {
            None
        };

        let mut outcome = CollectionOutcome::default();
        let mut pending: Vec<RawPage> = Vec::new();
        let mut seen_external_ids: Vec<String> = Vec::new();
        let mut newest_watermark = since_watermark;

        loop {
            if cancel.load(Ordering::SeqCst) {
                outcome.cancelled = true;
                tracing::warn!(collection, "sync cancelled at batch boundary; uncommitted batch dropped");
                return Ok(outcome);
            }

            self.rate_limiter.acquire(self.clock.as_ref()).await;

            let collection_owned = collection.to_string();
            let since = since_watermark;
            let page_cursor = cursor.clone();
            let notion = Arc::clone(&self.notion);

            let batch = retry(
                || {
                    let notion = Arc::clone(&notion);
                    let collection_owned = collection_owned.clone();
                    let page_cursor = page_cursor.clone();
                    async move {
                        notion
                            .list_pages(&collection_owned, since, page_cursor)
                            .await
                            .map_err(|e| AdapterError {
                                message: e.to_string(),
                                retryable: true,
                            })
                    }
                },
                |e: &AdapterError| if e.retryable { Retryable::Yes } else { Retryable::No },
            )
            .await
            .map_err(|e| anyhow::anyhow!(e.message))?;

            for page in &batch.pages {
                seen_external_ids.push(page.external_id.clone());
            }
            if let Some(watermark) = batch.new_watermark {
                newest_watermark = Some(newest_watermark.map_or(watermark, |w| w.max(watermark)));
            }
            pending.extend(batch.pages);

            while pending.len() >= BATCH_SIZE {
                let chunk: Vec<RawPage> = pending.drain(..BATCH_SIZE).collect();
                if let Err(err) = self.commit_chunk(collection, &chunk, &mut outcome).await {
                    return Err(self.record_batch_failure(collection, err).await);
                }

                if cancel.load(Ordering::SeqCst) {
                    outcome.cancelled = true;
                    tracing::warn!(collection, "sync cancelled after committing batch");
                    return Ok(outcome);
                }
            }

            cursor = batch.next_cursor;
            if cursor.is_none() {
                break;
            }
        }

        if !pending.is_empty() {
            let chunk = std::mem::take(&mut pending);
            if let Err(err) = self.commit_chunk(collection, &chunk, &mut outcome).await {
                return Err(self.record_batch_failure(collection, err).await);
            }
        }

        if mode == SyncMode::Full {
            let tombstoned = self
                .staging
                .mark_tombstoned(collection, &seen_external_ids)
                .await?;
            outcome.tombstoned += tombstoned;
        }

        checkpoint.last_cursor = None;
        checkpoint.last_edited_watermark = newest_watermark;
        checkpoint.consecutive_failures = 0;
        checkpoint.last_success_at = Some(self.clock.now());
        self.checkpoints.save(&checkpoint).await?;

        Ok(outcome)
    }

    /// On a failed batch commit, §4.B/§7 require `consecutive_failures` to
    /// advance so a collection that keeps failing trips whatever alerting
    /// watches the checkpoint, rather than resetting silently on the next
    /// attempt. Reloads the checkpoint rather than reusing the caller's
    /// in-memory copy, since that copy may already hold an advanced cursor
    /// from a commit earlier in this same run that hasn't been persisted yet.
    async fn record_batch_failure(&self, collection: &str, err: anyhow::Error) -> anyhow::Error {
        tracing::error!(collection, error = %err, "batch commit rolled back");
        match self.checkpoints.get(collection).await {
            Ok(mut checkpoint) => {
                checkpoint.consecutive_failures += 1;
                if let Err(save_err) = self.checkpoints.save(&checkpoint).await {
                    tracing::error!(collection, error = %save_err, "failed to persist consecutive_failures after batch failure");
                }
            }
            Err(load_err) => {
                tracing::error!(collection, error = %load_err, "failed to reload checkpoint after batch failure");
            }
        }
        err
    }

    async fn commit_chunk(
        &self,
        collection: &str,
        chunk: &[RawPage],
        outcome: &mut CollectionOutcome,
    ) -> anyhow::Result<()> {
        let records: Vec<StagingRecord> = chunk
            .iter()
            .map(|p| StagingRecord {
                collection: collection.to_string(),
                external_id: p.external_id.clone(),
                properties: p.properties.clone(),
                external_last_edited: p.external_last_edited,
                tombstoned: false,
            })
            .collect();

        let batch_outcome = self.staging.commit_batch(collection, &records).await?;
        outcome.created += batch_outcome.created;
        outcome.updated += batch_outcome.updated;
        Ok(())
    }
}

#[derive(Default)]
struct CollectionOutcome {
    created: u64,
    updated: u64,
    tombstoned: u64,
    had_warnings: bool,
    cancelled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cortex_ports::{FixedClock, PageBatch};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct OnePageAdapter;

    #[async_trait]
    impl NotionAdapter for OnePageAdapter {
        async fn list_pages(
            &self,
            _collection: &str,
            _since_watermark: Option<chrono::DateTime<Utc>>,
            _cursor: Option<String>,
        ) -> anyhow::Result<PageBatch> {
            Ok(PageBatch {
                pages: vec![RawPage {
                    external_id: "page-1".to_string(),
                    properties: serde_json::json!({}),
                    external_last_edited: Utc::now(),
                }],
                next_cursor: None,
                new_watermark: Some(Utc::now()),
            })
        }
    }

    struct MemoryStaging {
        commits: AtomicUsize,
        seen: std::sync::Mutex<std::collections::HashSet<(String, String)>>,
    }

    #[async_trait]
    impl StagingStore for MemoryStaging {
        async fn commit_batch(
            &self,
            collection: &str,
            records: &[StagingRecord],
        ) -> anyhow::Result<BatchCommitOutcome> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            let mut seen = self.seen.lock().unwrap();
            let mut outcome = BatchCommitOutcome::default();
            for record in records {
                if seen.insert((collection.to_string(), record.external_id.clone())) {
                    outcome.created += 1;
                } else {
                    outcome.updated += 1;
                }
            }
            Ok(outcome)
        }
        async fn list_collection(&self, _collection: &str) -> anyhow::Result<Vec<StagingRecord>> {
            Ok(vec![])
        }
        async fn mark_tombstoned(
            &self,
            _collection: &str,
            _seen_external_ids: &[String],
        ) -> anyhow::Result<u64> {
            Ok(0)
        }
    }

    struct MemoryCheckpoints;

    #[async_trait]
    impl CheckpointStore for MemoryCheckpoints {
        async fn get(&self, collection: &str) -> anyhow::Result<cortex_domain::sync::SyncCheckpoint> {
            Ok(cortex_domain::sync::SyncCheckpoint::new(collection))
        }
        async fn save(&self, _checkpoint: &cortex_domain::sync::SyncCheckpoint) -> anyhow::Result<()> {
            Ok(())
        }
    }

    /// Tracks the last-saved checkpoint per collection so tests can assert
    /// on `consecutive_failures` after a failed batch commit.
    struct TrackingCheckpoints {
        saved: std::sync::Mutex<std::collections::HashMap<String, cortex_domain::sync::SyncCheckpoint>>,
    }

    impl TrackingCheckpoints {
        fn new() -> Self {
            Self {
                saved: std::sync::Mutex::new(std::collections::HashMap::new()),
            }
        }
    }

    #[async_trait]
    impl CheckpointStore for TrackingCheckpoints {
        async fn get(&self, collection: &str) -> anyhow::Result<cortex_domain::sync::SyncCheckpoint> {
            Ok(self
                .saved
                .lock()
                .unwrap()
                .get(collection)
                .cloned()
                .unwrap_or_else(|| cortex_domain::sync::SyncCheckpoint::new(collection)))
        }
        async fn save(&self, checkpoint: &cortex_domain::sync::SyncCheckpoint) -> anyhow::Result<()> {
            self.saved
                .lock()
                .unwrap()
                .insert(checkpoint.collection.clone(), checkpoint.clone());
            Ok(())
        }
    }

    struct FailingStaging;

    #[async_trait]
    impl StagingStore for FailingStaging {
        async fn commit_batch(
            &self,
            _collection: &str,
            _records: &[StagingRecord],
        ) -> anyhow::Result<BatchCommitOutcome> {
            Err(anyhow::anyhow!("constraint violation"))
        }
        async fn list_collection(&self, _collection: &str) -> anyhow::Result<Vec<StagingRecord>> {
            Ok(vec![])
        }
        async fn mark_tombstoned(
            &self,
            _collection: &str,
            _seen_external_ids: &[String],
        ) -> anyhow::Result<u64> {
            Ok(0)
        }
    }

    struct MemoryRunLog;

    #[async_trait]
    impl SyncRunLog for MemoryRunLog {
        async fn record(&self, _run: &SyncRun) -> anyhow::Result<()> {
            Ok(())
        }
        async fn get(&self, _sync_id: uuid::Uuid) -> anyhow::Result<Option<SyncRun>> {
            Ok(None)
        }
        async fn history(&self, _status: Option<&str>, _limit: usize) -> anyhow::Result<Vec<SyncRun>> {
            Ok(vec![])
        }
    }

    fn test_engine() -> Arc<SyncEngine> {
        let clock = Arc::new(FixedClock(Utc::now()));
        Arc::new(SyncEngine {
            notion: Arc::new(OnePageAdapter),
            staging: Arc::new(MemoryStaging {
                commits: AtomicUsize::new(0),
                seen: std::sync::Mutex::new(std::collections::HashSet::new()),
            }),
            checkpoints: Arc::new(MemoryCheckpoints),
            run_log: Arc::new(MemoryRunLog),
            clock: clock.clone(),
            rate_limiter: Arc::new(TokenBucket::new(10.0, clock.as_ref())),
        })
    }

    #[tokio::test]
    async fn test_failed_batch_commit_increments_consecutive_failures() {
        let clock = Arc::new(FixedClock(Utc::now()));
        let checkpoints = Arc::new(TrackingCheckpoints::new());
        let engine = Arc::new(SyncEngine {
            notion: Arc::new(OnePageAdapter),
            staging: Arc::new(FailingStaging),
            checkpoints: checkpoints.clone(),
            run_log: Arc::new(MemoryRunLog),
            clock: clock.clone(),
            rate_limiter: Arc::new(TokenBucket::new(10.0, clock.as_ref())),
        });

        let err = engine
            .sync(
                uuid::Uuid::new_v4(),
                SyncMode::Full,
                vec!["tasks".to_string()],
                false,
                Arc::new(AtomicBool::new(false)),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::SyncFailed(_)));
        let checkpoint = checkpoints.get("tasks").await.unwrap();
        assert_eq!(checkpoint.consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_sync_commits_single_page_and_completes() {
        let engine = test_engine();
        let run = engine
            .sync(
                uuid::Uuid::new_v4(),
                SyncMode::Full,
                vec!["tasks".to_string()],
                false,
                Arc::new(AtomicBool::new(false)),
            )
            .await
            .unwrap();

        assert_eq!(run.status, SyncStatus::Completed);
        assert_eq!(run.created, 1);
        assert_eq!(run.updated, 0);
    }

    #[tokio::test]
    async fn test_sync_runs_collections_in_parallel_when_requested() {
        let engine = test_engine();
        let run = engine
            .sync(
                uuid::Uuid::new_v4(),
                SyncMode::Full,
                vec!["tasks".to_string(), "flashcards".to_string()],
                true,
                Arc::new(AtomicBool::new(false)),
            )
            .await
            .unwrap();

        assert_eq!(run.status, SyncStatus::Completed);
        assert_eq!(run.created, 2);
        assert_eq!(run.updated, 0);
    }

    #[tokio::test]
    async fn test_sync_re_pulling_same_page_counts_as_updated() {
        let engine = test_engine();
        let collections = vec!["tasks".to_string()];
        engine
            .sync(uuid::Uuid::new_v4(), SyncMode::Full, collections.clone(), false, Arc::new(AtomicBool::new(false)))
            .await
            .unwrap();

        let run = engine
            .sync(uuid::Uuid::new_v4(), SyncMode::Full, collections, false, Arc::new(AtomicBool::new(false)))
            .await
            .unwrap();

        assert_eq!(run.created, 0);
        assert_eq!(run.updated, 1);
    }

    #[tokio::test]
    async fn test_pre_cancelled_sync_marks_run_cancelled() {
        let engine = test_engine();
        let run = engine
            .sync(
                uuid::Uuid::new_v4(),
                SyncMode::Full,
                vec!["tasks".to_string()],
                false,
                Arc::new(AtomicBool::new(true)),
            )
            .await
            .unwrap();

        assert_eq!(run.status, SyncStatus::Cancelled);
        assert_eq!(run.updated, 0);
    }
}
