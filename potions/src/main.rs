mod adapters;
mod batch;
mod cli;
mod error;
mod orchestrator;
mod report;
mod validate;

use std::path::Path;
use std::time::Duration;

use adapters::SystemClock;
use clap::Parser;
use cli::{BatchArgs, BuildArgs, Cli, Commands, LogLevel};
use colored::Colorize;
use potions_core::RecipeStore;
use potions_release::ReleaseClient;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn init_logging(log_level: LogLevel) {
    let level = match log_level {
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

/// Installs a SIGINT/SIGTERM handler that cancels `token` on the first
/// signal (§5: cancellation aborts the next I/O operation at a
/// well-defined boundary, it never force-kills in-flight work).
fn spawn_signal_handler(token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut terminate = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sig) => sig,
                Err(e) => {
                    tracing::warn!("failed to install SIGTERM handler: {e}");
                    let _ = ctrl_c.await;
                    token.cancel();
                    return;
                }
            };
            tokio::select! {
                _ = ctrl_c => {}
                _ = terminate.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }
        tracing::info!("shutdown signal received, canceling in-flight work");
        token.cancel();
    });
}

async fn run_build_command(args: BuildArgs) -> error::Result<()> {
    let store = RecipeStore::scan(&args.recipes_dir)?;
    let token = CancellationToken::new();
    spawn_signal_handler(token.clone());

    std::fs::create_dir_all(&args.outdir).map_err(|e| error::Error::Step {
        step: "create output directory",
        source: e.to_string(),
    })?;

    let clock = SystemClock;
    let result = orchestrator::run_build(
        &store,
        &args.name,
        &args.version,
        &args.platform,
        &args.outdir,
        &token,
        &clock,
        args.scan,
    )
    .await?;

    println!(
        "{} {} v{} ({}) in {:.2?}",
        "built".green().bold(),
        result.recipe_name,
        result.version,
        result.platform,
        result.total_duration,
    );
    if let Some(path) = &result.artifact_path {
        println!("  artifact: {}", path.display());
    }
    if let Some(security) = &result.security {
        println!("  security score: {:.1}", security.score);
    }
    Ok(())
}

async fn run_batch_command(args: BatchArgs) -> std::io::Result<bool> {
    let store = RecipeStore::scan(&args.recipes_dir)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    let token = CancellationToken::new();
    spawn_signal_handler(token.clone());

    std::fs::create_dir_all(&args.outdir)?;
    std::fs::create_dir_all(&args.report_dir)?;

    let names = if args.names.is_empty() {
        store.list().map(|r| r.name.clone()).collect()
    } else {
        args.names.clone()
    };

    let release_client = match (&args.release_owner, &args.release_repo, &args.release_token) {
        (Some(_), Some(_), Some(token)) => Some(
            ReleaseClient::new(token.clone())
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?,
        ),
        _ => {
            tracing::info!("release owner/repo/token not fully configured; builds will run without publishing");
            None
        }
    };
    let publish = release_client.as_ref().map(|client| batch::PublishTarget {
        client,
        owner: args.release_owner.clone().unwrap_or_default(),
        repo: args.release_repo.clone().unwrap_or_default(),
    });

    let request = batch::BatchRequest {
        store: &store,
        names,
        out_dir: Path::new(&args.outdir),
        report_dir: Path::new(&args.report_dir),
        configured_max: args.max_packages,
        package_deadline: Some(Duration::from_secs(args.package_deadline_secs)),
        publish,
        scan_enabled: args.scan,
    };

    let summary = batch::run_batch(request, &token).await?;

    println!(
        "{} {} succeeded, {} failed, {} timed out ({} total)",
        "batch complete:".blue().bold(),
        summary.successful_builds,
        summary.failed_builds,
        summary.timeout_builds,
        summary.outcomes.len(),
    );

    Ok(summary.is_fatal())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build(args) => {
            init_logging(args.log_level);
            if let Err(e) = run_build_command(args).await {
                eprintln!("{}: {e}", "error".red().bold());
                std::process::exit(1);
            }
        }
        Commands::Batch(args) => {
            init_logging(args.log_level);
            match run_batch_command(args).await {
                Ok(fatal) => {
                    if fatal {
                        std::process::exit(1);
                    }
                }
                Err(e) => {
                    eprintln!("{}: {e}", "error".red().bold());
                    std::process::exit(2);
                }
            }
        }
    }
}
