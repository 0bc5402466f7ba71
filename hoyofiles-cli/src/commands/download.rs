//! `download`: fetch a selection into a local directory.

use std::path::PathBuf;
use std::time::Duration;

use console::style;
use futures::StreamExt;
use hoyofiles::download::{TransferReport, TransferStatus};
use hoyofiles::selection::DownloadSet;
use hoyofiles::Engine;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::common::{default_download_dir, format_size, FilterArgs, TargetArgs};
use crate::error::CliError;

pub struct DownloadArgs {
    pub target: TargetArgs,
    pub filter: FilterArgs,
    pub dest: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub archives: bool,
    pub update_from: Option<String>,
}

pub async fn run(engine: &Engine, args: DownloadArgs) -> Result<(), CliError> {
    let target = args.target.resolve(engine).await?;

    let set = if args.archives || args.update_from.is_some() {
        engine
            .archive_plan(&target, args.update_from.as_deref())
            .await?
    } else {
        let tree = engine
            .load_tree(
                &target,
                &args.target.locale_selection(),
                args.filter.diff_from.as_deref(),
            )
            .await?;
        engine.plan(&tree, &args.filter.request())?
    };

    let dest = args.dest.unwrap_or_else(|| default_download_dir(&target));
    let concurrency = args
        .concurrency
        .unwrap_or(engine.config().concurrency)
        .max(1);
    println!(
        "Downloading {} files ({}) for {} into {}",
        set.len(),
        format_size(set.total_bytes()),
        target,
        dest.display()
    );
    print_obsolete(&set);

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!();
            eprintln!("Interrupted, stopping after the current chunk (partial files are kept)...");
            signal_token.cancel();
        }
    });

    let total_bytes = set.total_bytes();
    let total_files = set.len();
    let mut stream = engine.download_with(set, dest.clone(), concurrency, cancel);

    let bar = ProgressBar::new(total_bytes);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec} | {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    bar.enable_steady_tick(Duration::from_millis(100));

    while let Some(state) = stream.next().await {
        let progress = stream.progress();
        bar.set_position(progress.bytes_transferred);
        bar.set_message(format!(
            "{}/{} files",
            progress.entries_finished(),
            total_files
        ));
        match state.status {
            TransferStatus::Failed => bar.println(format!(
                "{} {}: {}",
                style("failed").red(),
                state.destination,
                state.error.as_deref().unwrap_or("unknown error")
            )),
            TransferStatus::Pending if state.error.is_some() => warn!(
                destination = %state.destination,
                attempt = state.attempt_count,
                error = state.error.as_deref().unwrap_or_default(),
                "Retrying"
            ),
            _ => {}
        }
    }
    bar.finish_and_clear();

    let report = stream.into_report().await;
    summarize(&report, &dest)
}

fn print_obsolete(set: &DownloadSet) {
    if set.obsolete().is_empty() {
        return;
    }
    println!(
        "{} files were removed in this version and can be deleted:",
        set.obsolete().len()
    );
    for path in set.obsolete() {
        println!("  {}", path);
    }
}

fn summarize(report: &TransferReport, dest: &std::path::Path) -> Result<(), CliError> {
    let done = report.done_count();
    let failed = report.failure_count();
    let pending = report.pending_count();

    if report.is_complete() {
        println!(
            "{} {} files ({}) in {}",
            style("Done:").green().bold(),
            done,
            format_size(report.total_bytes()),
            dest.display()
        );
        return Ok(());
    }

    println!(
        "{} {} done, {} failed, {} not finished ({:.1}% of bytes)",
        style("Stopped:").yellow().bold(),
        done,
        failed,
        pending,
        report.progress_percent()
    );
    for state in report.failed() {
        println!(
            "  {} after {} attempts: {}",
            state.destination,
            state.attempt_count,
            state.error.as_deref().unwrap_or("unknown error")
        );
    }
    if pending > 0 {
        println!("Run the same command again to resume.");
    }
    Err(CliError::Incomplete { failed, pending })
}
