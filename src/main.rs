use anyhow::Context;
use clap::Parser;
use photoprep::cli::Cli;
use photoprep::utils::format_file_size;
use photoprep::Publisher;
use std::process::ExitCode;
use std::sync::atomic::Ordering;

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .init();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// `Ok(false)` when the batch ran but not every photo made it.
fn run(cli: &Cli) -> anyhow::Result<bool> {
    let publisher = Publisher::new(cli.to_config());

    let cancelled = publisher.cancellation_flag();
    ctrlc::set_handler(move || {
        log::warn!("Cancelling: waiting for photos in progress to finish");
        cancelled.store(true, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl-C handler")?;

    let report = publisher
        .publish()
        .with_context(|| format!("Failed to publish {}", cli.photo_dir.display()))?;

    let published: u64 = report
        .successes()
        .map(|r| r.results.total_rendition_size())
        .sum();

    log::info!(
        "Published {} photos ({} of renditions), {} failed, {} skipped",
        report.successes().count(),
        format_file_size(published),
        report.failures().count(),
        report.skipped().len()
    );

    Ok(report.is_complete())
}
