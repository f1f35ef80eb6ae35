use super::rules::RuleCounts;
use super::score::{round_score, RunState};
use super::CleaningError;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Key of the run report section owned by the cleaning run.
pub const CLEANING_METADATA_KEY: &str = "cleaning_metadata";

/// Published summary of a cleaning run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleaningMetadata {
    pub final_transparency_score: f64,
    pub total_rows_cleaned: u64,
    pub total_duplicates_dropped: u64,
    pub total_rows_dropped_due_to_rule_violations: u64,
    pub total_algorithm_format_violations: u64,
    pub rule_violations_summary: RuleCounts,
}

impl CleaningMetadata {
    pub fn from_state(state: &RunState) -> Self {
        Self {
            final_transparency_score: round_score(state.transparency_score()),
            total_rows_cleaned: state.total_clean_rows,
            total_duplicates_dropped: state.total_duplicates_dropped,
            total_rows_dropped_due_to_rule_violations: state.total_rows_dropped(),
            total_algorithm_format_violations: state.total_algorithm_format_issues,
            rule_violations_summary: state.per_rule_violation_counts,
        }
    }
}

/// Key-value document shared with other pipeline stages.
///
/// The cleaning run only ever replaces its own section; every other key must
/// come back out exactly as it went in.
pub trait RunReportStore {
    fn load(&self) -> Result<Map<String, Value>, CleaningError>;
    fn save(&self, document: &Map<String, Value>) -> Result<(), CleaningError>;
}

/// Run report persisted as pretty-printed JSON on disk.
#[derive(Debug, Clone)]
pub struct JsonRunReport {
    path: PathBuf,
}

impl JsonRunReport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn report_error(&self, reason: impl Into<String>) -> CleaningError {
        CleaningError::Report {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }
}

impl RunReportStore for JsonRunReport {
    fn load(&self) -> Result<Map<String, Value>, CleaningError> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let file = File::open(&self.path).map_err(|source| CleaningError::Output {
            path: self.path.clone(),
            source,
        })?;
        match serde_json::from_reader(BufReader::new(file)) {
            Ok(Value::Object(document)) => Ok(document),
            Ok(_) => Err(self.report_error("expected a JSON object at the top level")),
            Err(err) => Err(self.report_error(err.to_string())),
        }
    }

    fn save(&self, document: &Map<String, Value>) -> Result<(), CleaningError> {
        let output_error = |source| CleaningError::Output {
            path: self.path.clone(),
            source,
        };

        let file = File::create(&self.path).map_err(output_error)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, document)
            .map_err(|err| self.report_error(err.to_string()))?;
        writer.flush().map_err(output_error)
    }
}

/// Read-merge-write of the `cleaning_metadata` section.
pub fn merge_cleaning_metadata<S: RunReportStore + ?Sized>(
    store: &S,
    metadata: &CleaningMetadata,
) -> Result<(), CleaningError> {
    let mut document = store.load()?;
    let section = serde_json::to_value(metadata)?;
    document.insert(CLEANING_METADATA_KEY.to_string(), section);
    store.save(&document)
}
