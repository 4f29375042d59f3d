//! Top-level `cortex optimize`/`cortex suggest`/`cortex read <m>` (§6.3).
//!
//! §6.3 names these alongside the `study`/`sync`/`clean`/`review` groups but
//! §9's design notes don't specify what "optimize a study plan" or "suggest"
//! mean in terms of this system's stored types, and no module/curriculum
//! store exists to scope a `read <m>` reading assignment against (same gap
//! noted in `study::Path`/`study::Module`). Rather than invent scoring
//! heuristics or a fake content store, these report the one thing this
//! workspace actually has evidence for — current struggle signals — and are
//! explicit about the rest being unavailable.

use clap::Args;
use cortex_domain::errors::DomainError;
use cortex_ports::StruggleStore;

use crate::context::Context;

#[derive(Args)]
pub struct OptimizeArgs {
    #[arg(long, value_delimiter = ',')]
    pub modules: Vec<String>,
    #[arg(long)]
    pub plan: bool,
}

#[derive(Args)]
pub struct ReadArgs {
    pub m: String,
    #[arg(long)]
    pub section: Option<String>,
}

pub async fn optimize(ctx: &Context, args: OptimizeArgs) -> Result<(), DomainError> {
    if !args.modules.is_empty() {
        println!("module-scoped optimization is not available: no module/curriculum store is persisted in this schema");
    }
    let signals = ctx.struggles.list().await.map_err(DomainError::Internal)?;
    let flagged: Vec<_> = signals.iter().filter(|s| s.needs_remediation).collect();

    if args.plan {
        println!("suggested plan: prioritize the {} flagged section(s) before new material:", flagged.len());
    } else {
        println!("{} section(s) currently need remediation:", flagged.len());
    }
    for signal in flagged {
        println!("  {} — {}", signal.section_id, signal.reason);
    }
    Ok(())
}

pub async fn suggest(ctx: &Context) -> Result<(), DomainError> {
    let signals = ctx.struggles.list().await.map_err(DomainError::Internal)?;
    let worst = signals
        .iter()
        .filter(|s| s.needs_remediation)
        .min_by(|a, b| a.avg_retrievability.total_cmp(&b.avg_retrievability));

    match worst {
        Some(signal) => println!(
            "suggestion: study section {} next — {}",
            signal.section_id, signal.reason
        ),
        None => println!("no struggling sections on file — run `study today` to build up history"),
    }
    Ok(())
}

pub async fn read(_ctx: &Context, args: ReadArgs) -> Result<(), DomainError> {
    Err(DomainError::BusinessLogic(format!(
        "reading assignments for module {} (section {:?}) are not available: no module/section-content store is persisted in this schema",
        args.m, args.section
    )))
}
