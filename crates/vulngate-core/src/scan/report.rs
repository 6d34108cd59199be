use crate::artifacts::classifier::Prediction;
use crate::artifacts::encoder::ExtensionCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Repository-wide gate decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Accept,
    Reject,
}

impl Verdict {
    pub fn symbol(&self) -> &str {
        match self {
            Verdict::Accept => "ACCEPT",
            Verdict::Reject => "REJECT",
        }
    }
}

/// Outcome for one admitted file.
#[derive(Debug, Clone, Serialize)]
pub struct FileVerdict {
    pub path: String,
    pub extension: String,
    pub category: ExtensionCategory,
    pub prediction: Prediction,
}

/// A completed scan. Only produced when every admitted file was evaluated.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub root: String,
    pub scanned_at: DateTime<Utc>,
    pub files_scanned: usize,
    /// Files predicted vulnerable, in traversal order.
    pub flagged_files: Vec<String>,
    /// Files whose extension the encoder did not know.
    pub unknown_extension_files: Vec<String>,
    pub verdict: Verdict,
    pub files: Vec<FileVerdict>,
}

impl ScanReport {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            scanned_at: Utc::now(),
            files_scanned: 0,
            flagged_files: Vec::new(),
            unknown_extension_files: Vec::new(),
            verdict: Verdict::Accept,
            files: Vec::new(),
        }
    }

    /// Fold one file's outcome into the report.
    pub fn record(&mut self, file: FileVerdict) {
        self.files_scanned += 1;
        if file.category.is_unknown() {
            self.unknown_extension_files.push(file.path.clone());
        }
        if file.prediction.is_vulnerable() {
            self.flagged_files.push(file.path.clone());
            self.verdict = Verdict::Reject;
        }
        self.files.push(file);
    }

    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Accept
    }
}
