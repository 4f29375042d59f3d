//! `cortex sync ...` (§6.3): Notion pull via the Sync Engine, plus the much
//! smaller Anki push/pull glue that has no dedicated engine contract of its
//! own in §4.B (that section specifies the Notion-staging algorithm only).

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::{Args, Subcommand};
use colored::Colorize;
use cortex_domain::atom::{AtomSource, QualityGrade};
use cortex_domain::errors::DomainError;
use cortex_domain::sync::SyncMode;
use cortex_ports::{AnkiAdapter, CanonicalStore};

use crate::context::Context;

#[derive(Subcommand)]
pub enum SyncCommand {
    /// Pull one or more Notion collections into staging and transform them.
    Notion {
        #[arg(long)]
        full: bool,
        #[arg(long)]
        incremental: bool,
        /// Comma-separated collection names; defaults to every configured collection.
        #[arg(long, value_delimiter = ',')]
        database: Vec<String>,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        parallel: bool,
    },
    /// Push schedulable atoms of at least `--min-quality` into Anki as notes.
    AnkiPush(AnkiPushArgs),
    /// Pull card stats from Anki (best-effort report; see DESIGN.md).
    AnkiPull,
    /// Runs `sync notion --incremental` followed by `sync anki-push`.
    All,
}

#[derive(Args)]
pub struct AnkiPushArgs {
    #[arg(long)]
    pub dry_run: bool,
    #[arg(long, default_value = "C")]
    pub min_quality: String,
}

pub async fn run(ctx: &Context, cmd: SyncCommand) -> Result<(), DomainError> {
    match cmd {
        SyncCommand::Notion {
            full,
            incremental,
            database,
            dry_run,
            parallel,
        } => notion(ctx, full, incremental, database, dry_run, parallel).await,
        SyncCommand::AnkiPush(args) => anki_push(ctx, args).await,
        SyncCommand::AnkiPull => anki_pull(ctx).await,
        SyncCommand::All => {
            notion(ctx, false, true, Vec::new(), false, false).await?;
            anki_push(
                ctx,
                AnkiPushArgs {
                    dry_run: false,
                    min_quality: "C".to_string(),
                },
            )
            .await
        }
    }
}

async fn notion(
    ctx: &Context,
    full: bool,
    incremental: bool,
    database: Vec<String>,
    dry_run: bool,
    parallel: bool,
) -> Result<(), DomainError> {
    let collections = if database.is_empty() {
        ctx.config.notion_collections.keys().cloned().collect()
    } else {
        database
    };
    let mode = if incremental && !full { SyncMode::Incremental } else { SyncMode::Full };
    let sync_id = uuid::Uuid::new_v4();

    if dry_run {
        println!(
            "{} would sync {} collection(s) in {:?} mode (dry run, nothing written)",
            "DRY RUN".yellow().bold(),
            collections.len(),
            mode
        );
        return Ok(());
    }

    let engine = ctx.sync_engine();
    let cancel = Arc::new(AtomicBool::new(false));
    let run = engine.sync(sync_id, mode, collections, parallel, cancel).await?;

    println!(
        "sync {} — {:?}: created={} updated={} tombstoned={}",
        run.sync_id, run.status, run.created, run.updated, run.tombstoned
    );
    if run.status == cortex_domain::sync::SyncStatus::Failed {
        return Err(DomainError::SyncFailed(
            run.error_message.unwrap_or_else(|| "unknown".to_string()),
        ));
    }
    Ok(())
}

fn parse_grade(raw: &str) -> Result<QualityGrade, DomainError> {
    match raw.to_uppercase().as_str() {
        "A" => Ok(QualityGrade::A),
        "B" => Ok(QualityGrade::B),
        "C" => Ok(QualityGrade::C),
        "D" => Ok(QualityGrade::D),
        "F" => Ok(QualityGrade::F),
        other => Err(DomainError::Validation(format!("unknown grade {other}"))),
    }
}

/// Exports every schedulable, non-superseded atom not already sourced from
/// Anki whose grade clears `--min-quality` as an Anki note. There's no
/// persisted "already pushed" marker in this schema (§3 names no such
/// field), so a push is not itself idempotent — re-running re-exports
/// already-pushed atoms as new notes. Tracking that is future work; noted
/// in DESIGN.md rather than invented here.
async fn anki_push(ctx: &Context, args: AnkiPushArgs) -> Result<(), DomainError> {
    let min_grade = parse_grade(&args.min_quality)?;
    let atoms = ctx
        .canonical
        .list_schedulable(None)
        .await
        .map_err(DomainError::Internal)?;

    let candidates: Vec<_> = atoms
        .into_iter()
        .filter(|a| a.source != AtomSource::Anki && a.quality_grade >= min_grade)
        .collect();

    if args.dry_run {
        println!(
            "{} would push {} atom(s) to Anki (min grade {:?})",
            "DRY RUN".yellow().bold(),
            candidates.len(),
            min_grade
        );
        return Ok(());
    }

    let mut pushed = 0u32;
    let mut errored = 0u32;
    for atom in &candidates {
        let deck = atom.section_id.clone().unwrap_or_else(|| "cortex".to_string());
        let fields = serde_json::json!({ "Front": atom.front, "Back": atom.back });
        match ctx.anki.push_note(&deck, &fields).await {
            Ok(_) => pushed += 1,
            Err(err) => {
                errored += 1;
                tracing::warn!(atom_id = %atom.atom_id, error = %err, "anki push failed");
            }
        }
    }

    println!("pushed={pushed} errored={errored}");
    Ok(())
}

/// Reports AnkiConnect-visible deck/card counts. A full stats pull that
/// rewrites `fsrs_state` needs an atom↔Anki-note_id mapping this schema
/// doesn't persist, so this stays a read-only report (see DESIGN.md).
async fn anki_pull(ctx: &Context) -> Result<(), DomainError> {
    let atoms = ctx
        .canonical
        .list_schedulable(None)
        .await
        .map_err(DomainError::Internal)?;
    let decks: std::collections::HashSet<String> = atoms
        .iter()
        .filter_map(|a| a.section_id.clone())
        .collect();

    let mut total_notes = 0usize;
    for deck in &decks {
        match ctx.anki.list_notes(deck).await {
            Ok(notes) => total_notes += notes.len(),
            Err(err) => tracing::warn!(deck, error = %err, "failed to list Anki notes"),
        }
    }
    println!("decks checked={} total_notes_seen={}", decks.len(), total_notes);
    Ok(())
}
