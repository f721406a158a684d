//! Persisted pipeline run reports under `.zkguard/runs/`.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use zkguard_common::RunReport;

pub struct RunRecorder {
    runs_dir: PathBuf,
}

impl RunRecorder {
    pub fn new(runs_dir: &Path) -> Self {
        Self {
            runs_dir: runs_dir.to_path_buf(),
        }
    }

    pub fn runs_dir(&self) -> &Path {
        &self.runs_dir
    }

    /// Write `report` as pretty JSON and return the file path.
    pub fn record(&self, report: &RunReport) -> Result<PathBuf> {
        fs::create_dir_all(&self.runs_dir).context("Failed to create runs directory")?;

        let filename = format!(
            "{}_{}.json",
            report.started_at.format("%Y-%m-%dT%H-%M-%S"),
            &report.run_id.to_string()[..8]
        );
        let run_file = self.runs_dir.join(&filename);

        let json = serde_json::to_string_pretty(report).context("Failed to serialize run report")?;
        fs::write(&run_file, json).context("Failed to write run report file")?;
        Ok(run_file)
    }

    pub fn list_runs(&self) -> Result<Vec<PathBuf>> {
        if !self.runs_dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs: Vec<PathBuf> = fs::read_dir(&self.runs_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|e| e == "json").unwrap_or(false))
            .collect();

        runs.sort();
        runs.reverse(); // Most recent first
        Ok(runs)
    }

    pub fn load_run(&self, path: &Path) -> Result<RunReport> {
        let content = fs::read_to_string(path).context("Failed to read run report file")?;
        let report: RunReport =
            serde_json::from_str(&content).context("Failed to parse run report file")?;
        Ok(report)
    }
}
