//! `cortex review ...` (§6.3): list, inspect, and decide on Rewriter review
//! queue items from the terminal instead of `/api/review/*`.

use clap::Subcommand;
use colored::Colorize;
use cortex_domain::errors::DomainError;
use cortex_domain::review::{ReviewStatus, SplitSuggestion};
use cortex_ports::ReviewQueueStore;
use uuid::Uuid;

use crate::context::Context;

#[derive(Subcommand)]
pub enum ReviewCommand {
    /// Lists queue items, optionally filtered by status.
    List {
        #[arg(long)]
        status: Option<String>,
    },
    /// Prints one item in full.
    Show { id: Uuid },
    /// Approves an item (or every pending item clearing `--min-improvement`
    /// when `--auto` is set).
    Approve {
        id: Option<Uuid>,
        #[arg(long)]
        auto: bool,
        #[arg(long, default_value_t = 10.0)]
        min_improvement: f32,
    },
    /// Rejects an item with a reason.
    Reject {
        id: Uuid,
        #[arg(long)]
        reason: String,
    },
    /// Overwrites an item's suggested payload; leaves it needing re-approval.
    Edit {
        id: Uuid,
        #[arg(long)]
        front: Option<String>,
        #[arg(long)]
        back: Option<String>,
    },
}

fn parse_status(raw: &str) -> Result<ReviewStatus, DomainError> {
    match raw {
        "pending" => Ok(ReviewStatus::Pending),
        "approved" => Ok(ReviewStatus::Approved),
        "rejected" => Ok(ReviewStatus::Rejected),
        "edited" => Ok(ReviewStatus::Edited),
        "error" => Ok(ReviewStatus::Error),
        other => Err(DomainError::Validation(format!("unknown review status {other}"))),
    }
}

pub async fn run(ctx: &Context, cmd: ReviewCommand) -> Result<(), DomainError> {
    match cmd {
        ReviewCommand::List { status } => list(ctx, status).await,
        ReviewCommand::Show { id } => show(ctx, id).await,
        ReviewCommand::Approve {
            id,
            auto,
            min_improvement,
        } => approve(ctx, id, auto, min_improvement).await,
        ReviewCommand::Reject { id, reason } => reject(ctx, id, reason).await,
        ReviewCommand::Edit { id, front, back } => edit(ctx, id, front, back).await,
    }
}

async fn list(ctx: &Context, status: Option<String>) -> Result<(), DomainError> {
    let status = status.as_deref().map(parse_status).transpose()?;
    let items = ctx.review_queue.list(status).await.map_err(DomainError::Internal)?;
    if items.is_empty() {
        println!("no review items");
        return Ok(());
    }
    for item in items {
        println!(
            "{} {:?} {:?} atom={}",
            item.id, item.rewrite_type, item.status, item.source_atom_id
        );
    }
    Ok(())
}

async fn show(ctx: &Context, id: Uuid) -> Result<(), DomainError> {
    let item = ctx
        .review_queue
        .get(id)
        .await
        .map_err(DomainError::Internal)?
        .ok_or_else(|| DomainError::NotFound(id.to_string()))?;

    println!("id:            {}", item.id);
    println!("atom:          {}", item.source_atom_id);
    println!("type:          {:?}", item.rewrite_type);
    println!("status:        {:?}", item.status);
    println!("issues:        {:?}", item.original_issues);
    println!("estimated new grade: {:?}", item.estimated_new_grade);
    if let Some(front) = &item.suggested_front {
        println!("suggested front: {front}");
    }
    if let Some(back) = &item.suggested_back {
        println!("suggested back:  {back}");
    }
    for (i, SplitSuggestion { front, back }) in item.split_suggestions.iter().enumerate() {
        println!("split {i}: {front} / {back}");
    }
    if let Some(note) = &item.reviewer_note {
        println!("note:          {note}");
    }
    Ok(())
}

async fn approve(
    ctx: &Context,
    id: Option<Uuid>,
    auto: bool,
    min_improvement: f32,
) -> Result<(), DomainError> {
    let rewriter = ctx.rewriter();
    let now = chrono::Utc::now();

    if auto {
        let approved = rewriter.auto_approve(min_improvement, now).await?;
        println!("auto-approved {} item(s)", approved.len());
        return Ok(());
    }

    let id = id.ok_or_else(|| DomainError::Validation("an item id or --auto is required".to_string()))?;
    let atoms = rewriter.approve(id, now).await?;
    println!(
        "{} item {id} — {} atom(s) written",
        "approved".green(),
        atoms.len()
    );
    for atom in atoms {
        println!("  {} grade={:?}", atom.atom_id, atom.quality_grade);
    }
    Ok(())
}

async fn reject(ctx: &Context, id: Uuid, reason: String) -> Result<(), DomainError> {
    ctx.rewriter().reject(id, reason, chrono::Utc::now()).await?;
    println!("{} item {id}", "rejected".red());
    Ok(())
}

async fn edit(
    ctx: &Context,
    id: Uuid,
    front: Option<String>,
    back: Option<String>,
) -> Result<(), DomainError> {
    if front.is_none() && back.is_none() {
        return Err(DomainError::Validation(
            "--front and/or --back is required".to_string(),
        ));
    }
    let item = ctx.rewriter().edit(id, front, back, None).await?;
    println!("item {} now {:?}, awaiting re-approval", item.id, item.status);
    Ok(())
}
