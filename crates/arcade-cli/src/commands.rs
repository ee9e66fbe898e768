use std::fs::File;

use anyhow::{bail, Context};
use colored::Colorize;
use serde_json::json;

use arcade_ingest::ArchiveIngestor;
use arcade_server::{shutdown_signal, ArcadeConfig, ArcadeServer};
use arcade_store::ContentStore;
use arcade_sync::{BundleRemover, ObjectStorePuller, ObjectStorePusher, PushReport};
use arcade_types::BundleId;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = ArcadeConfig::load(cli.config.as_deref())?;
    let format = cli.format;
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    match cli.command {
        Command::Serve => runtime.block_on(cmd_serve(config)),
        Command::Ingest(args) => runtime.block_on(cmd_ingest(&config, args, format)),
        Command::Push(args) => runtime.block_on(cmd_push(&config, args, format)),
        Command::Reconcile => runtime.block_on(cmd_reconcile(&config, format)),
        Command::Remove(args) => runtime.block_on(cmd_remove(&config, args, format)),
        Command::List => cmd_list(&config, format),
    }
}

fn content_store(config: &ArcadeConfig) -> ContentStore {
    ContentStore::new(&config.server.content_root)
}

fn parse_bundle(raw: &str) -> anyhow::Result<BundleId> {
    BundleId::parse(raw).with_context(|| format!("{raw:?} is not a bundle id"))
}

async fn cmd_serve(config: ArcadeConfig) -> anyhow::Result<()> {
    println!(
        "{} arcade serving on {} (content: {})",
        "✓".green().bold(),
        config.server.bind_addr.to_string().bold(),
        config.server.content_root.display()
    );
    ArcadeServer::new(config).serve(shutdown_signal()).await?;
    println!("{} stopped", "✓".green());
    Ok(())
}

async fn cmd_ingest(config: &ArcadeConfig, args: IngestArgs, format: OutputFormat) -> anyhow::Result<()> {
    let file = File::open(&args.archive).with_context(|| format!("cannot open {}", args.archive.display()))?;
    let ingestor = ArchiveIngestor::new(content_store(config), config.ingest.clone());
    let receipt = tokio::task::spawn_blocking(move || ingestor.ingest(file)).await??;

    let push = if args.no_push || !config.sync.enabled {
        None
    } else {
        let pusher = ObjectStorePusher::new(config.remote.build()?, config.sync.clone());
        Some(pusher.push(&receipt.root, receipt.bundle_id).await?)
    };

    match format {
        OutputFormat::Json => {
            let value = json!({
                "ok": true,
                "gameId": receipt.bundle_id.to_string(),
                "playUrl": receipt.playback_path,
                "files": receipt.files,
                "bytes": receipt.bytes,
                "pushed": push.as_ref().map(|r| r.uploaded.len()),
                "pushFailed": push.as_ref().map(|r| r.failed.len()),
            });
            println!("{value}");
        }
        OutputFormat::Text => {
            println!("{} Ingested bundle {}", "✓".green().bold(), receipt.bundle_id.to_string().yellow());
            println!("  Files: {} ({} bytes)", receipt.files, receipt.bytes);
            println!("  Play: {}", receipt.playback_path.cyan());
            match &push {
                Some(report) => print_push(report),
                None => println!("  Push: {}", "skipped".dimmed()),
            }
        }
    }
    check_push(push.as_ref())
}

async fn cmd_push(config: &ArcadeConfig, args: BundleArgs, format: OutputFormat) -> anyhow::Result<()> {
    let id = parse_bundle(&args.bundle)?;
    let Some(bundle) = content_store(config).open_bundle(id) else {
        bail!("bundle {id} not found in {}", config.server.content_root.display());
    };
    let pusher = ObjectStorePusher::new(config.remote.build()?, config.sync.clone());
    let report = pusher.push(bundle.root(), id).await?;

    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "gameId": id.to_string(),
                "uploaded": report.uploaded.len(),
                "failed": report.failed.iter().map(|f| &f.key).collect::<Vec<_>>(),
            })
        ),
        OutputFormat::Text => {
            println!("Pushing {}...", id.to_string().yellow());
            print_push(&report);
        }
    }
    check_push(Some(&report))
}

fn print_push(report: &PushReport) {
    if report.is_complete() {
        println!("  Push: {} {} files", "✓".green(), report.uploaded.len());
    } else {
        println!(
            "  Push: {} uploaded, {} failed",
            report.uploaded.len(),
            report.failed.len().to_string().red()
        );
        for failure in &report.failed {
            println!("    {} {}: {}", "✗".red(), failure.key, failure.error.dimmed());
        }
    }
}

fn check_push(report: Option<&PushReport>) -> anyhow::Result<()> {
    match report {
        Some(report) if !report.is_complete() => {
            bail!("{} files failed to upload", report.failed.len())
        }
        _ => Ok(()),
    }
}

async fn cmd_reconcile(config: &ArcadeConfig, format: OutputFormat) -> anyhow::Result<()> {
    let content = content_store(config);
    content.ensure_root()?;
    let puller = ObjectStorePuller::new(config.remote.build()?, content, config.sync.clone());
    let report = puller.reconcile().await?;

    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "listed": report.listed,
                "downloaded": report.downloaded,
                "skippedExisting": report.skipped_existing,
                "skippedInvalid": report.skipped_invalid,
                "failed": report.failed,
            })
        ),
        OutputFormat::Text => {
            let mark = if report.failed == 0 { "✓".green().bold() } else { "!".yellow().bold() };
            println!("{mark} Reconciled {} remote keys", report.listed);
            println!("  Downloaded: {}", report.downloaded.to_string().green());
            println!("  Already present: {}", report.skipped_existing);
            if report.skipped_invalid > 0 {
                println!("  Ignored: {}", report.skipped_invalid.to_string().dimmed());
            }
            if report.failed > 0 {
                println!("  Failed: {}", report.failed.to_string().red());
            }
        }
    }
    Ok(())
}

async fn cmd_remove(config: &ArcadeConfig, args: BundleArgs, format: OutputFormat) -> anyhow::Result<()> {
    let id = parse_bundle(&args.bundle)?;
    let remover = BundleRemover::new(content_store(config), config.remote.build()?, config.sync.clone());
    let report = remover.remove(id).await?;
    if !report.found() {
        bail!("bundle {id} not found");
    }

    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "ok": true,
                "gameId": id.to_string(),
                "localRemoved": report.local_removed,
                "remoteDeleted": report.remote_deleted,
            })
        ),
        OutputFormat::Text => {
            println!("{} Removed bundle {}", "✓".green().bold(), id.to_string().yellow());
            println!("  Local copy: {}", if report.local_removed { "deleted" } else { "absent" });
            if remover.propagates() {
                println!("  Remote keys deleted: {}", report.remote_deleted);
            }
        }
    }
    Ok(())
}

fn cmd_list(config: &ArcadeConfig, format: OutputFormat) -> anyhow::Result<()> {
    let bundles = content_store(config).list_bundles()?;
    match format {
        OutputFormat::Json => {
            let items: Vec<_> = bundles
                .iter()
                .map(|b| {
                    json!({
                        "gameId": b.id().to_string(),
                        "createdAt": b.created_at().map(|t| t.to_rfc3339()),
                        "playUrl": b.playback_path(),
                    })
                })
                .collect();
            println!("{}", serde_json::Value::Array(items));
        }
        OutputFormat::Text => {
            if bundles.is_empty() {
                println!("No bundles.");
            }
            for bundle in &bundles {
                let created = bundle
                    .created_at()
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default();
                println!("{}  {}", bundle.id().to_string().yellow(), created.dimmed());
            }
        }
    }
    Ok(())
}
