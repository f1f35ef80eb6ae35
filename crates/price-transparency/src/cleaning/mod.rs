mod codes;
mod dedup;
mod normalizer;
mod partition;
mod paths;
mod reader;
mod report;
mod rules;
mod schema;
mod score;

pub use codes::retain_valid_codes;
pub use dedup::drop_duplicates;
pub use normalizer::{normalize_batch, normalize_record, PLACEHOLDER_AMOUNT};
pub use partition::{partition, Partition, ViolatingRecord};
pub use paths::{system_slug, OutputLayout};
pub use reader::{BatchReader, RawRecord, DEFAULT_BATCH_SIZE};
pub use report::{
    merge_cleaning_metadata, CleaningMetadata, JsonRunReport, RunReportStore,
    CLEANING_METADATA_KEY,
};
pub use rules::{evaluate, Rule, RuleCounts, RuleSet, RULE_COUNT};
pub use schema::{Field, FieldKind, Record, Value, FIELD_COUNT};
pub use score::{round_score, BatchTally, RunState};

use chrono::{DateTime, Utc};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Column appended to the violations report.
pub const RULES_VIOLATED_COLUMN: &str = "rules_violated";

#[derive(Debug, thiserror::Error)]
pub enum CleaningError {
    #[error("input header is missing required columns: {}", .missing.join(", "))]
    Schema { missing: Vec<&'static str> },
    #[error("failed to read price file {input}: {source}")]
    Parse { input: String, source: csv::Error },
    #[error("{input} line {line}: row has {found} fields but the header has {expected}")]
    RowTooLong {
        input: String,
        line: u64,
        found: usize,
        expected: usize,
    },
    #[error("failed to write {}: {source}", .path.display())]
    Output {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("run report {} is unusable: {reason}", .path.display())]
    Report { path: PathBuf, reason: String },
    #[error("failed to serialize run report section: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("batch size must be at least one row")]
    InvalidBatchSize,
}

/// Result of pushing one raw batch through normalization, validation and partitioning.
#[derive(Debug, Default)]
pub struct ProcessedBatch {
    pub input_rows: u64,
    pub invalid_codes_dropped: u64,
    pub partition: Partition,
    pub tally: BatchTally,
}

/// Runs every per-batch stage; pure over the batch's own records.
pub fn process_batch(raw: Vec<RawRecord>) -> ProcessedBatch {
    let input_rows = raw.len() as u64;
    let mut records = normalize_batch(raw);
    let invalid_codes_dropped = retain_valid_codes(&mut records) as u64;
    let duplicates_dropped = drop_duplicates(&mut records) as u64;
    let partition = partition(records);

    let tally = BatchTally {
        clean_rows: partition.clean.len() as u64,
        duplicates_dropped,
        rule_counts: partition.rule_counts,
        algorithm_format_issues: partition.algorithm_format_issues,
    };

    ProcessedBatch {
        input_rows,
        invalid_codes_dropped,
        partition,
        tally,
    }
}

/// Everything a caller learns from a finished run.
#[derive(Debug, Clone)]
pub struct CleaningOutcome {
    pub state: RunState,
    pub input_rows: u64,
    pub violating_rows: u64,
    /// Rows removed for malformed codes. Never published in the run report.
    pub invalid_codes_dropped: u64,
    pub batches: u64,
    pub cleaned_output: PathBuf,
    pub violations_report: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CleaningOutcome {
    pub fn transparency_score(&self) -> f64 {
        self.state.transparency_score()
    }

    pub fn metadata(&self) -> CleaningMetadata {
        CleaningMetadata::from_state(&self.state)
    }
}

/// One cleaning run over one extracted file.
#[derive(Debug, Clone)]
pub struct CleaningJob {
    pub input: PathBuf,
    pub layout: OutputLayout,
    pub batch_size: usize,
}

impl CleaningJob {
    pub fn new(input: impl Into<PathBuf>, layout: OutputLayout) -> Self {
        Self {
            input: input.into(),
            layout,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Reads the layout's extracted file for this campus.
    pub fn for_layout(layout: OutputLayout) -> Self {
        Self::new(layout.extracted_input(), layout)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn run(&self) -> Result<CleaningOutcome, CleaningError> {
        let report = JsonRunReport::new(self.layout.run_report());
        self.run_with_report(&report)
    }

    pub fn run_with_report<S: RunReportStore + ?Sized>(
        &self,
        report: &S,
    ) -> Result<CleaningOutcome, CleaningError> {
        let started_at = Utc::now();
        let batches = BatchReader::open(&self.input, self.batch_size)?;

        self.layout.prepare()?;
        let cleaned_path = self.layout.cleaned_output();
        let violations_path = self.layout.violations_report();
        paths::remove_stale(&cleaned_path)?;
        if paths::remove_stale(&violations_path)? {
            debug!(path = %violations_path.display(), "removed violations report from a previous run");
        }

        let mut cleaned = CsvSink::create(&cleaned_path, None)?;
        let mut state = RunState::default();
        let mut violations: Vec<ViolatingRecord> = Vec::new();
        let mut input_rows = 0;
        let mut invalid_codes_dropped = 0;
        let mut batch_count = 0;

        for (number, batch) in (1u64..).zip(batches) {
            let processed = process_batch(batch?);
            let ProcessedBatch {
                partition, tally, ..
            } = &processed;

            cleaned.write_rows(partition.clean.iter().map(Record::to_row))?;
            cleaned.flush()?;
            state.absorb(tally);

            debug!(
                batch = number,
                duplicates = tally.duplicates_dropped,
                invalid_codes = processed.invalid_codes_dropped,
                violations = partition.violations.len(),
                "batch partitioned"
            );
            info!(batch = number, rows = tally.clean_rows, "processed batch");

            input_rows += processed.input_rows;
            invalid_codes_dropped += processed.invalid_codes_dropped;
            batch_count = number;
            violations.extend(processed.partition.violations);
        }

        let violations_report = if violations.is_empty() {
            None
        } else {
            let mut sink = CsvSink::create(&violations_path, Some(RULES_VIOLATED_COLUMN))?;
            sink.write_rows(violations.iter().map(ViolatingRecord::to_row))?;
            sink.flush()?;
            Some(violations_path)
        };

        if invalid_codes_dropped > 0 {
            warn!(
                rows = invalid_codes_dropped,
                "dropped rows with malformed codes; they are not part of any published count"
            );
        }

        let metadata = CleaningMetadata::from_state(&state);
        merge_cleaning_metadata(report, &metadata)?;

        let cleaned_bytes = file_size(&cleaned_path)?;
        info!(
            total_rows = state.total_clean_rows,
            duplicates_dropped = state.total_duplicates_dropped,
            score = format_args!("{:.4}", metadata.final_transparency_score),
            rule_violations = %state.per_rule_violation_counts,
            algorithm_format_violations = state.total_algorithm_format_issues,
            "finished cleaning"
        );
        info!(
            path = %cleaned_path.display(),
            size_mb = format_args!("{:.2}", cleaned_bytes as f64 / (1024.0 * 1024.0)),
            "cleaned file saved"
        );
        if let Some(path) = &violations_report {
            info!(path = %path.display(), rows = violations.len(), "rule violations saved");
        }

        Ok(CleaningOutcome {
            state,
            input_rows,
            violating_rows: violations.len() as u64,
            invalid_codes_dropped,
            batches: batch_count,
            cleaned_output: cleaned_path,
            violations_report,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

/// Delimited writer that emits the canonical header once, then appends rows.
struct CsvSink {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl CsvSink {
    fn create(path: &Path, trailing_column: Option<&str>) -> Result<Self, CleaningError> {
        let writer = csv::Writer::from_path(path).map_err(|err| output_error(path, err))?;
        let mut sink = Self {
            path: path.to_path_buf(),
            writer,
        };

        let mut header: Vec<&str> = schema::header_row();
        header.extend(trailing_column);
        sink.writer
            .write_record(&header)
            .map_err(|err| output_error(path, err))?;
        Ok(sink)
    }

    fn write_rows<I>(&mut self, rows: I) -> Result<(), CleaningError>
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        for row in rows {
            self.writer
                .write_record(&row)
                .map_err(|err| output_error(&self.path, err))?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), CleaningError> {
        self.writer.flush().map_err(|source| CleaningError::Output {
            path: self.path.clone(),
            source,
        })
    }
}

fn output_error(path: &Path, err: csv::Error) -> CleaningError {
    CleaningError::Output {
        path: path.to_path_buf(),
        source: err.into(),
    }
}

fn file_size(path: &Path) -> Result<u64, CleaningError> {
    std::fs::metadata(path)
        .map(|metadata| metadata.len())
        .map_err(|source| CleaningError::Output {
            path: path.to_path_buf(),
            source,
        })
}
