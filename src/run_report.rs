//! Run report
//!
//! A JSON record of one pipeline run: what was asked for and what happened to
//! every generated file. Written only on request; nothing reads it back
//! during later runs.

use crate::contexts::{FileStatus, MaterializeReport};
use crate::data::{ContextMode, PipelineConfig, Strictness};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Outcome of a single generated file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Key as returned by the generator
    pub path: String,
    /// Resolved location on disk
    pub target: Option<String>,
    pub status: String,
    /// Rejection or failure reason
    pub detail: Option<String>,
    /// SHA-256 of the generated content
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: String,
    pub finished_at: Option<String>,
    pub mode: ContextMode,
    pub strictness: Strictness,
    pub model: String,
    pub dry_run: bool,
    pub files: Vec<FileRecord>,
}

impl RunReport {
    /// Starts a report for `config`, stamped with the current time
    pub fn start(config: &PipelineConfig, dry_run: bool) -> Self {
        Self {
            started_at: chrono::Utc::now().to_rfc3339(),
            finished_at: None,
            mode: config.mode,
            strictness: config.strictness,
            model: config.model.clone(),
            dry_run,
            files: Vec::new(),
        }
    }

    /// Records the materialization outcome and stamps the finish time
    pub fn finish(&mut self, report: &MaterializeReport) {
        self.files = report
            .outcomes
            .iter()
            .map(|o| FileRecord {
                path: o.path.clone(),
                target: o.target.as_ref().map(|t| t.display().to_string()),
                status: o.status.label().to_string(),
                detail: match &o.status {
                    FileStatus::Rejected(e) => Some(e.to_string()),
                    FileStatus::Failed(reason) => Some(reason.clone()),
                    _ => None,
                },
                sha256: o.digest.clone(),
            })
            .collect();
        self.finished_at = Some(chrono::Utc::now().to_rfc3339());
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create report directory {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize run report")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write run report {}", path.display()))?;
        Ok(())
    }

    /// Human-readable listing of the recorded files
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!("Run Report ({} mode, {}):", self.mode, self.model));

        for file in &self.files {
            match &file.detail {
                Some(detail) => lines.push(format!("  {} [{}] {}", file.path, file.status, detail)),
                None => lines.push(format!("  {} [{}]", file.path, file.status)),
            }
        }

        if self.files.is_empty() {
            lines.push("  No generated files".to_string());
        }

        lines.join("\n")
    }
}
