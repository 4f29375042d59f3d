//! `cortex` — terminal front door onto the cleaning pipeline, review queue,
//! Notion/Anki sync, and study engine (§6.3). Shares its component wiring
//! with `cortex-server` through [`context::Context`].

mod commands;
mod context;

use clap::{Parser, Subcommand};
use colored::Colorize;
use cortex_domain::errors::DomainError;

use commands::{clean::CleanCommand, extras, review::ReviewCommand, study::StudyCommand, sync::SyncCommand};
use context::Context;

#[derive(Parser)]
#[command(name = "cortex")]
#[command(about = "Learning-content pipeline and adaptive study engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pulls Notion content and/or pushes to Anki.
    Sync {
        #[command(subcommand)]
        command: SyncCommand,
    },
    /// Runs the cleaning pipeline, or previews quality/duplicate checks.
    Clean {
        #[command(subcommand)]
        command: CleanCommand,
    },
    /// Manages the AI-rewrite review queue.
    Review {
        #[command(subcommand)]
        command: ReviewCommand,
    },
    /// Builds and works with study sessions.
    Study {
        #[command(subcommand)]
        command: StudyCommand,
    },
    /// Suggests a remediation-first study plan.
    Optimize(extras::OptimizeArgs),
    /// Suggests the single next section to study.
    Suggest,
    /// Prints a reading assignment for a module.
    Read(extras::ReadArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_target(false).compact().init();

    let cli = Cli::parse();
    let ctx = match Context::load().await {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("{} {err}", "config error:".red().bold());
            std::process::exit(DomainError::Config(err.to_string()).exit_code());
        }
    };

    let result = match cli.command {
        Commands::Sync { command } => commands::sync::run(&ctx, command).await,
        Commands::Clean { command } => commands::clean::run(&ctx, command).await,
        Commands::Review { command } => commands::review::run(&ctx, command).await,
        Commands::Study { command } => commands::study::run(&ctx, command).await,
        Commands::Optimize(args) => extras::optimize(&ctx, args).await,
        Commands::Suggest => extras::suggest(&ctx).await,
        Commands::Read(args) => extras::read(&ctx, args).await,
    };

    if let Err(err) = result {
        eprintln!("{} {err}", "error:".red().bold());
        std::process::exit(err.exit_code());
    }
}
