use anyhow::{Context, Result};
use clap::Parser;
use nacc_archive::{ArchiveOutcome, Normalizer, RunSummary, RunTotals};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod cli;

#[derive(Serialize)]
struct JsonSummary<'a> {
    totals: RunTotals,
    #[serde(flatten)]
    summary: &'a RunSummary,
}

fn main() -> Result<()> {
    let app = cli::App::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(app.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let options = app.options()?;
    let normalizer = Normalizer::new(options).context("invalid normalization options")?;
    tracing::info!(
        source = %normalizer.options().source.display(),
        output = %normalizer.output_root().display(),
        "starting normalization"
    );
    let summary = normalizer.run().with_context(|| {
        format!(
            "failed to normalize '{}'",
            normalizer.options().source.display()
        )
    })?;

    if app.json {
        let output = JsonSummary {
            totals: summary.totals(),
            summary: &summary,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_summary(&summary, normalizer.output_root());
    }
    Ok(())
}

fn print_summary(summary: &RunSummary, output_root: &std::path::Path) {
    for outcome in &summary.archives {
        match outcome {
            ArchiveOutcome::Normalized(report) => println!(
                "ok      {} -> {} ({} files, {} renamed, {} already present, {} skipped)",
                report.archive.display(),
                report.identifier,
                report.written_count(),
                report.renamed_count(),
                report.present_count(),
                report.skipped_count()
            ),
            ArchiveOutcome::Skipped { archive, error } => {
                println!("skipped {}: {error}", archive.display())
            }
            ArchiveOutcome::Failed { archive, error } => {
                println!("failed  {}: {error}", archive.display())
            }
        }
    }

    let totals = summary.totals();
    println!(
        "\n{} archives normalized, {} skipped, {} failed; {} files ({} bytes) written to {}",
        totals.archives_normalized,
        totals.archives_skipped,
        totals.archives_failed,
        totals.files_written,
        totals.bytes_written,
        output_root.display()
    );
    if totals.members_skipped > 0 {
        println!("{} members skipped, see log for details", totals.members_skipped);
    }
}
