use clap::{Args, Parser, Subcommand};
use price_transparency::cleaning::{CleaningJob, CleaningOutcome, OutputLayout};
use price_transparency::config::AppConfig;
use price_transparency::error::AppError;
use price_transparency::telemetry;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "clearcare",
    about = "Clean and validate hospital price-transparency files",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clean an extracted price file and publish its transparency score
    Clean(CleanArgs),
}

#[derive(Args, Debug)]
struct CleanArgs {
    /// Campus identifier used to name every output file
    #[arg(long)]
    campus_id: String,
    /// Healthcare system the campus belongs to
    #[arg(long)]
    healthcare_system: String,
    /// Extracted file to clean (defaults to the extraction output for this campus)
    #[arg(long)]
    input: Option<PathBuf>,
    /// Override the configured output directory root
    #[arg(long)]
    base_dir: Option<PathBuf>,
    /// Override the configured number of rows per batch
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    batch_size: Option<u64>,
}

pub(crate) fn run() -> Result<(), AppError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Clean(args) => run_clean(args),
    }
}

fn run_clean(args: CleanArgs) -> Result<(), AppError> {
    let CleanArgs {
        campus_id,
        healthcare_system,
        input,
        base_dir,
        batch_size,
    } = args;

    let mut config = AppConfig::load()?;
    if let Some(base_dir) = base_dir {
        config.cleaning.base_dir = base_dir;
    }
    if let Some(batch_size) = batch_size {
        config.cleaning.batch_size = batch_size as usize;
    }

    telemetry::init(&config.telemetry)?;

    let layout = OutputLayout::new(&config.cleaning.base_dir, &healthcare_system, campus_id);
    let job = match input {
        Some(path) => CleaningJob::new(path, layout),
        None => CleaningJob::for_layout(layout),
    }
    .with_batch_size(config.cleaning.batch_size);

    info!(
        environment = ?config.environment,
        input = %job.input.display(),
        campus = job.layout.campus_id(),
        system = job.layout.system_slug(),
        batch_size = job.batch_size,
        "starting cleaning run"
    );

    let outcome = job.run()?;
    render_outcome(&job, &outcome);

    Ok(())
}

fn render_outcome(job: &CleaningJob, outcome: &CleaningOutcome) {
    let metadata = outcome.metadata();

    println!(
        "Cleaning run for campus {} ({})",
        job.layout.campus_id(),
        job.layout.system_slug()
    );
    println!(
        "Input: {} ({} rows in {} batches)",
        job.input.display(),
        outcome.input_rows,
        outcome.batches
    );
    println!(
        "Elapsed: {} ms",
        (outcome.finished_at - outcome.started_at).num_milliseconds()
    );

    println!("\nTransparency score: {:.4}", metadata.final_transparency_score);
    println!("Rows cleaned: {}", metadata.total_rows_cleaned);
    println!("Duplicates dropped: {}", metadata.total_duplicates_dropped);
    println!(
        "Rows dropped for rule violations: {}",
        metadata.total_rows_dropped_due_to_rule_violations
    );
    println!(
        "Negotiated algorithm format violations: {}",
        metadata.total_algorithm_format_violations
    );

    println!("\nRule violations");
    for (rule, count) in metadata.rule_violations_summary.iter() {
        println!("- {}: {}", rule, count);
    }

    println!("\nCleaned file: {}", outcome.cleaned_output.display());
    match &outcome.violations_report {
        Some(path) => println!("Violations report: {}", path.display()),
        None => println!("Violations report: none (no rule violations)"),
    }
    println!("Run report: {}", job.layout.run_report().display());
}
