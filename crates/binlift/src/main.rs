//! binlift command-line entry point.
//!
//! `binlift worker` runs the daemon (worker pool + janitor + sweeper); the
//! remaining subcommands are a thin operational shell over the core API for
//! submitting jobs, reading results and administering providers.

#![allow(clippy::print_stdout)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use binlift_domain::entities::{DetailLevel, FileRef, JobSpec, TranslationSpec};
use binlift_domain::ports::ProviderAdmin;
use binlift_domain::value_objects::JobId;
use binlift_infrastructure::config::ConfigLoader;
use binlift_infrastructure::factory::{AppContext, build_context};
use binlift_infrastructure::logging;
use binlift_infrastructure::runtime::{spawn_janitor, spawn_sweeper, spawn_workers};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser)]
#[command(name = "binlift", version, about = "Binary decompilation and LLM translation service")]
struct Cli {
    /// Explicit configuration file (default: config/{env}.yaml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the worker daemon (workers, janitor, sweeper).
    Worker,
    /// Submit a binary for decompilation.
    Submit {
        /// Path to the executable.
        file: PathBuf,
        /// Owner to bill the job to.
        #[arg(long, default_value = "cli")]
        owner: String,
        /// Also run LLM translation.
        #[arg(long)]
        translate: bool,
        /// Pin a provider id for translation.
        #[arg(long)]
        provider: Option<String>,
        /// Translation detail: brief, standard or detailed.
        #[arg(long, default_value = "standard")]
        detail: String,
        /// Scheduling priority (higher claims first).
        #[arg(long, default_value_t = 0)]
        priority: i64,
    },
    /// Show one job's status and progress.
    Status {
        /// Job id.
        job: String,
    },
    /// Print a job's decompilation result.
    Result {
        /// Job id.
        job: String,
        /// Print the translation result instead.
        #[arg(long)]
        translation: bool,
    },
    /// Cancel a job.
    Cancel {
        /// Job id.
        job: String,
        /// Owner the job belongs to.
        #[arg(long, default_value = "cli")]
        owner: String,
    },
    /// List providers with health and breaker state.
    Providers,
    /// Reset a provider's circuit breaker.
    Reset {
        /// Provider id.
        provider: String,
    },
    /// Force a provider's circuit breaker open.
    ForceOpen {
        /// Provider id.
        provider: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_config_path(path);
    }
    let config = loader.load().context("load configuration")?;
    logging::init(&config.logging).context("initialize logging")?;

    let ctx = Arc::new(build_context(config).await.context("build application")?);
    match cli.command {
        Command::Worker => run_worker_daemon(ctx).await,
        Command::Submit {
            file,
            owner,
            translate,
            provider,
            detail,
            priority,
        } => submit(&ctx, &file, owner, translate, provider, &detail, priority).await,
        Command::Status { job } => status(&ctx, &job).await,
        Command::Result { job, translation } => result(&ctx, &job, translation).await,
        Command::Cancel { job, owner } => cancel(&ctx, &job, &owner).await,
        Command::Providers => providers(&ctx).await,
        Command::Reset { provider } => {
            ctx.admin.reset(&provider).await?;
            println!("breaker for '{provider}' reset");
            Ok(())
        }
        Command::ForceOpen { provider } => {
            ctx.admin.force_open(&provider).await?;
            println!("breaker for '{provider}' forced open");
            Ok(())
        }
    }
}

async fn run_worker_daemon(ctx: Arc<AppContext>) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let mut handles = spawn_workers(Arc::clone(&ctx), ctx.config.worker_count, shutdown.clone());
    handles.push(spawn_janitor(Arc::clone(&ctx), shutdown.clone()));
    handles.push(spawn_sweeper(Arc::clone(&ctx), shutdown.clone()));
    info!(workers = ctx.config.worker_count, "binlift daemon running");

    tokio::signal::ctrl_c().await.context("wait for ctrl-c")?;
    info!("shutdown requested");
    shutdown.cancel();
    for handle in handles {
        let _ = handle.await;
    }
    Ok(())
}

async fn submit(
    ctx: &AppContext,
    file: &std::path::Path,
    owner: String,
    translate: bool,
    provider: Option<String>,
    detail: &str,
    priority: i64,
) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("read {}", file.display()))?;
    let translation = translate.then(|| TranslationSpec {
        detail_level: parse_detail(detail),
        provider_pref: provider,
        model_pref: None,
        max_concurrency: None,
    });
    let spec = JobSpec {
        owner,
        file_ref: FileRef::Inline {
            bytes,
            filename: file.file_name().map(|n| n.to_string_lossy().into_owned()),
        },
        translation,
        priority,
        idempotency_key: None,
    };
    let job_id = ctx.queue.submit(spec).await?;
    println!("{job_id}");
    Ok(())
}

async fn status(ctx: &AppContext, job: &str) -> anyhow::Result<()> {
    let job = ctx.results.job(JobId::parse(job)?).await?;
    println!("{}", serde_json::to_string_pretty(&job)?);
    Ok(())
}

async fn result(ctx: &AppContext, job: &str, translation: bool) -> anyhow::Result<()> {
    let job_id = JobId::parse(job)?;
    let rendered = if translation {
        serde_json::to_string_pretty(&ctx.results.translation(job_id).await?)?
    } else {
        serde_json::to_string_pretty(&ctx.results.decompilation(job_id).await?)?
    };
    println!("{rendered}");
    Ok(())
}

async fn cancel(ctx: &AppContext, job: &str, owner: &str) -> anyhow::Result<()> {
    ctx.queue.cancel(JobId::parse(job)?, owner).await?;
    println!("cancelled");
    Ok(())
}

async fn providers(ctx: &AppContext) -> anyhow::Result<()> {
    let states = ctx.admin.list_providers().await?;
    println!("{}", serde_json::to_string_pretty(&states)?);
    Ok(())
}

fn parse_detail(detail: &str) -> DetailLevel {
    match detail {
        "brief" => DetailLevel::Brief,
        "detailed" => DetailLevel::Detailed,
        _ => DetailLevel::Standard,
    }
}
