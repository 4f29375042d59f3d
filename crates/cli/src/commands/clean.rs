//! `cortex clean ...` (§6.3): runs the cleaning pipeline, or previews a
//! quality/duplicate pass without writing anything.

use clap::Subcommand;
use colored::Colorize;
use cortex_core::duplicate::{detect, DuplicateCandidate};
use cortex_core::quality::analyze;
use cortex_domain::atom::{AtomSource, QualityGrade};
use cortex_domain::errors::DomainError;
use cortex_pipeline::{PipelineStatus, RunOptions};

use crate::context::{analyzer_mode, quality_thresholds, Context};

#[derive(Subcommand)]
pub enum CleanCommand {
    /// Runs Transform → Quality Analyzer → Duplicate Detector → Rewriter
    /// enqueue for one collection.
    Run {
        #[arg(long)]
        rewrite: bool,
        #[arg(long, default_value = "D")]
        min_grade: String,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        resume: bool,
        /// Collection to run; defaults to the first configured Notion collection.
        #[arg(long)]
        database: Option<String>,
    },
    /// Re-grades up to `--limit` schedulable atoms and prints their grade,
    /// without writing anything.
    Check {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Re-runs duplicate detection over every canonical atom at the given
    /// threshold and prints the resulting groups, without persisting them.
    Duplicates {
        #[arg(long, default_value_t = 0.85)]
        threshold: f64,
    },
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

pub async fn run(ctx: &Context, cmd: CleanCommand) -> Result<(), DomainError> {
    match cmd {
        CleanCommand::Run {
            rewrite,
            min_grade,
            dry_run,
            resume,
            database,
        } => clean_run(ctx, rewrite, min_grade, dry_run, resume, database).await,
        CleanCommand::Check { limit } => check(ctx, limit).await,
        CleanCommand::Duplicates { threshold } => duplicates(ctx, threshold).await,
    }
}

async fn clean_run(
    ctx: &Context,
    rewrite: bool,
    min_grade: String,
    dry_run: bool,
    resume: bool,
    database: Option<String>,
) -> Result<(), DomainError> {
    let collection = database.unwrap_or_else(|| {
        ctx.config
            .notion_collections
            .keys()
            .next()
            .cloned()
            .unwrap_or_else(|| "default".to_string())
    });
    let run_id = uuid::Uuid::new_v4();
    let orchestrator = ctx.orchestrator();

    let (status, summary) = orchestrator
        .run(RunOptions {
            enable_rewrite: rewrite,
            min_grade: parse_grade(&min_grade)?,
            dry_run,
            resume,
            run_id,
            collection,
            source: AtomSource::Notion,
        })
        .await?;

    println!(
        "run {run_id} — {}",
        match status {
            PipelineStatus::Completed => "completed".green().to_string(),
            PipelineStatus::CompletedWithWarnings => "completed_with_warnings".yellow().to_string(),
            PipelineStatus::Failed => "failed".red().to_string(),
        }
    );
    println!(
        "transformed={} skipped={} graded={} duplicate_groups={} review_items={}",
        summary.atoms_transformed,
        summary.atoms_skipped,
        summary.atoms_graded,
        summary.duplicate_groups_found,
        summary.review_items_enqueued
    );
    for warning in &summary.warnings {
        println!("  {} {warning}", "warning:".yellow());
    }

    if matches!(status, PipelineStatus::Failed) {
        return Err(DomainError::BusinessLogic("clean run failed".to_string()));
    }
    Ok(())
}

async fn check(ctx: &Context, limit: usize) -> Result<(), DomainError> {
    use cortex_ports::CanonicalStore;

    let atoms = ctx
        .canonical
        .list_schedulable(None)
        .await
        .map_err(DomainError::Internal)?;
    let thresholds = quality_thresholds(&ctx.config.quality);
    let mode = analyzer_mode(&ctx.config.quality);

    for atom in atoms.into_iter().take(limit) {
        match analyze(&atom.front, &atom.back, atom.atom_type, &thresholds, mode) {
            Ok(output) => println!(
                "{} {:?} score={} issues={}",
                atom.atom_id,
                output.grade,
                output.score,
                output.issues.len()
            ),
            Err(err) => println!("{} {}", atom.atom_id, format!("skipped: {err}").yellow()),
        }
    }
    Ok(())
}

async fn duplicates(ctx: &Context, threshold: f64) -> Result<(), DomainError> {
    use cortex_ports::CanonicalStore;

    let atoms = ctx.canonical.list_all().await.map_err(DomainError::Internal)?;
    let candidates: Vec<DuplicateCandidate> = atoms
        .iter()
        .map(|a| DuplicateCandidate {
            atom_id: a.atom_id,
            front: a.front.clone(),
            back: a.back.clone(),
            section_id: a.section_id.clone(),
            concept_ids: a.concept_ids.iter().cloned().collect(),
        })
        .collect();

    let outcome = detect(&candidates, &[], threshold, None);
    println!("{} duplicate group(s) found at threshold {threshold}", outcome.groups.len());
    for warning in &outcome.warnings {
        println!("  {} {warning}", "warning:".yellow());
    }
    for group in &outcome.groups {
        println!("  {:?} — {} atom(s), similarity={:.3}", group.method, group.atom_ids.len(), group.similarity);
    }
    Ok(())
}
