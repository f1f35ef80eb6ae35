use super::CleaningError;
use std::fs;
use std::path::{Path, PathBuf};

/// Where a cleaning run for one campus reads from and writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    base_dir: PathBuf,
    system_slug: String,
    campus_id: String,
}

impl OutputLayout {
    pub fn new(
        base_dir: impl Into<PathBuf>,
        healthcare_system: &str,
        campus_id: impl Into<String>,
    ) -> Self {
        Self {
            base_dir: base_dir.into(),
            system_slug: system_slug(healthcare_system),
            campus_id: campus_id.into(),
        }
    }

    pub fn system_slug(&self) -> &str {
        &self.system_slug
    }

    pub fn campus_id(&self) -> &str {
        &self.campus_id
    }

    /// Flat file produced by the extraction stage.
    pub fn extracted_input(&self) -> PathBuf {
        self.data_dir("extracted data")
            .join(format!("{}_extracted.csv", self.campus_id))
    }

    pub fn cleaned_output(&self) -> PathBuf {
        self.data_dir("cleaned data")
            .join(format!("{}_cleaned.csv", self.campus_id))
    }

    pub fn violations_report(&self) -> PathBuf {
        self.logs_dir("rules violations")
            .join(format!("{}_rules_violated.csv", self.campus_id))
    }

    pub fn run_report(&self) -> PathBuf {
        self.logs_dir("devlogs")
            .join(format!("{}_devlog.json", self.campus_id))
    }

    /// Creates the parent directories of every output path.
    pub fn prepare(&self) -> Result<(), CleaningError> {
        for path in [
            self.cleaned_output(),
            self.violations_report(),
            self.run_report(),
        ] {
            if let Some(parent) = path.parent() {
                create_dir(parent)?;
            }
        }
        Ok(())
    }

    fn data_dir(&self, stage: &str) -> PathBuf {
        self.base_dir
            .join("data")
            .join(stage)
            .join(&self.system_slug)
    }

    fn logs_dir(&self, stage: &str) -> PathBuf {
        self.base_dir
            .join("data")
            .join("logs")
            .join(stage)
            .join(&self.system_slug)
    }
}

/// `"Mercy Health System"` becomes `"mercy_health_system"`.
pub fn system_slug(healthcare_system: &str) -> String {
    healthcare_system.trim().to_lowercase().replace(' ', "_")
}

fn create_dir(path: &Path) -> Result<(), CleaningError> {
    fs::create_dir_all(path).map_err(|source| CleaningError::Output {
        path: path.to_path_buf(),
        source,
    })
}

/// Removes a file left by an earlier run; absence is not an error.
pub(crate) fn remove_stale(path: &Path) -> Result<bool, CleaningError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(CleaningError::Output {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_lowercases_and_joins_words() {
        assert_eq!(system_slug("Mercy Health System"), "mercy_health_system");
        assert_eq!(system_slug(" UCHealth "), "uchealth");
    }

    #[test]
    fn derives_stage_paths_per_system_and_campus() {
        let layout = OutputLayout::new("/srv/clearcare", "Mercy Health", "IA-0042");
        assert_eq!(
            layout.extracted_input(),
            PathBuf::from("/srv/clearcare/data/extracted data/mercy_health/IA-0042_extracted.csv")
        );
        assert_eq!(
            layout.cleaned_output(),
            PathBuf::from("/srv/clearcare/data/cleaned data/mercy_health/IA-0042_cleaned.csv")
        );
        assert_eq!(
            layout.violations_report(),
            PathBuf::from(
                "/srv/clearcare/data/logs/rules violations/mercy_health/IA-0042_rules_violated.csv"
            )
        );
        assert_eq!(
            layout.run_report(),
            PathBuf::from("/srv/clearcare/data/logs/devlogs/mercy_health/IA-0042_devlog.json")
        );
    }

    #[test]
    fn prepare_creates_output_directories() {
        let dir = tempfile::tempdir().expect("temp dir");
        let layout = OutputLayout::new(dir.path(), "Mercy Health", "IA-0042");
        layout.prepare().expect("directories created");

        assert!(layout.cleaned_output().parent().expect("parent").is_dir());
        assert!(layout.violations_report().parent().expect("parent").is_dir());
        assert!(layout.run_report().parent().expect("parent").is_dir());
    }

    #[test]
    fn removing_a_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("absent.csv");
        assert!(!remove_stale(&path).expect("no error"));

        std::fs::write(&path, "code\n").expect("write fixture");
        assert!(remove_stale(&path).expect("removed"));
        assert!(!path.exists());
    }
}
