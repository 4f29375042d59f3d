//! `cortex study ...` (§6.3): the only front door onto the Study Engine —
//! there is no `/api/study/*` HTTP surface, so this is where sessions get
//! built and responses get recorded.

use clap::Subcommand;
use colored::Colorize;
use cortex_domain::errors::DomainError;
use cortex_ports::StruggleStore;
use uuid::Uuid;

use crate::context::Context;

const DEFAULT_SESSION_SIZE: usize = 20;

#[derive(Subcommand)]
pub enum StudyCommand {
    /// Builds and prints today's session queue (alias for `start`).
    Today {
        #[arg(long, default_value_t = DEFAULT_SESSION_SIZE)]
        size: usize,
        #[arg(long)]
        war_mode: bool,
    },
    /// Same as `today`.
    Start {
        #[arg(long, default_value_t = DEFAULT_SESSION_SIZE)]
        size: usize,
        #[arg(long)]
        war_mode: bool,
    },
    /// Prints the per-section struggle signals currently on file.
    Stats,
    /// Rebuilds struggle signals and lists only the sections flagged
    /// `needs_remediation`.
    Remediation,
    /// Pulls the latest Notion content and pushes due atoms to Anki — an
    /// alias for `sync all`, kept under `study` since that's where §6.3
    /// lists it.
    Sync,
    /// A fixed, spec-named curriculum path through sections. No
    /// section-hierarchy store exists in this schema (§3 Section is a
    /// curriculum coordinate, not persisted data here), so this reports
    /// that rather than inventing one.
    Path,
    /// Same limitation as `path`, scoped to one module.
    Module { n: u32 },
}

pub async fn run(ctx: &Context, cmd: StudyCommand) -> Result<(), DomainError> {
    match cmd {
        StudyCommand::Today { size, war_mode } | StudyCommand::Start { size, war_mode } => {
            session(ctx, size, war_mode).await
        }
        StudyCommand::Stats => stats(ctx).await,
        StudyCommand::Remediation => remediation(ctx).await,
        StudyCommand::Sync => sync_alias(ctx).await,
        StudyCommand::Path => Err(curriculum_unavailable()),
        StudyCommand::Module { n: _ } => Err(curriculum_unavailable()),
    }
}

fn curriculum_unavailable() -> DomainError {
    DomainError::BusinessLogic(
        "no curriculum/module hierarchy is persisted in this schema; use `study today` for the flat schedulable queue".to_string(),
    )
}

async fn session(ctx: &Context, size: usize, war_mode: bool) -> Result<(), DomainError> {
    let engine = ctx.study_engine();
    let session = engine.build_daily_session(size, war_mode).await?;

    if session.is_empty() {
        println!("nothing due — empty session");
        return Ok(());
    }
    println!("{} item(s) in today's session:", session.len());
    for candidate in &session {
        println!(
            "  {} {:?} weakness={:.2}",
            candidate.atom_id, candidate.atom_type, candidate.weakness_score
        );
    }
    Ok(())
}

async fn stats(ctx: &Context) -> Result<(), DomainError> {
    let signals = ctx.struggles.list().await.map_err(DomainError::Internal)?;
    if signals.is_empty() {
        println!("no struggle signals on file yet — run `study remediation` or a session first");
        return Ok(());
    }
    for signal in signals {
        let flag = if signal.needs_remediation {
            "remediate".red()
        } else {
            "healthy".green()
        };
        println!(
            "{} {flag} retrievability={:.2} lapses={:.2} mcq_acc={:.2} parsons_acc={:.2} — {}",
            signal.section_id,
            signal.avg_retrievability,
            signal.avg_lapses,
            signal.mcq_accuracy,
            signal.parsons_accuracy,
            signal.reason
        );
    }
    Ok(())
}

async fn remediation(ctx: &Context) -> Result<(), DomainError> {
    let engine = ctx.study_engine();
    let signals = engine.rebuild_struggle_signals().await?;
    let flagged: Vec<_> = signals.into_iter().filter(|s| s.needs_remediation).collect();

    if flagged.is_empty() {
        println!("no sections currently flagged for remediation");
        return Ok(());
    }
    for signal in flagged {
        println!("{} — {}", signal.section_id.red(), signal.reason);
    }
    Ok(())
}

async fn sync_alias(ctx: &Context) -> Result<(), DomainError> {
    let collections: Vec<String> = ctx.config.notion_collections.keys().cloned().collect();
    let sync_id = Uuid::new_v4();
    let cancel = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let run = ctx
        .sync_engine()
        .sync(sync_id, cortex_domain::sync::SyncMode::Incremental, collections, false, cancel)
        .await?;
    println!("sync {} — {:?}", run.sync_id, run.status);
    Ok(())
}
