pub mod report;
pub mod sarif;

use crate::artifacts::ArtifactBundle;
use crate::collector::{read_source, CandidateFile, FileCollector};
use crate::config::GateConfig;
use crate::error::{FileError, ScanError};
use crate::features::FeatureExtractor;
use report::{FileVerdict, ScanReport};
use std::path::Path;

/// Runs extraction and classification over admitted files, one at a time.
pub struct Scanner<'a> {
    bundle: &'a ArtifactBundle,
    extractor: FeatureExtractor<'a>,
}

impl<'a> Scanner<'a> {
    pub fn new(bundle: &'a ArtifactBundle, unknown_extension_code: f64) -> Self {
        Self {
            bundle,
            extractor: FeatureExtractor::new(bundle, unknown_extension_code),
        }
    }

    /// Classify one file's text.
    pub fn evaluate(&self, candidate: &CandidateFile, raw_text: &str) -> Result<FileVerdict, FileError> {
        let features = self
            .extractor
            .extract(raw_text, &candidate.extension)
            .map_err(|source| FileError::Extract {
                path: candidate.relative_path.clone(),
                source,
            })?;

        let prediction = self
            .bundle
            .classifier()
            .predict(&features.row)
            .map_err(|source| FileError::Predict {
                path: candidate.relative_path.clone(),
                source,
            })?;

        Ok(FileVerdict {
            path: candidate.relative_path.clone(),
            extension: candidate.extension.clone(),
            category: features.category,
            prediction,
        })
    }

    /// Evaluate every candidate in traversal order.
    ///
    /// Stops at the first traversal, read, extraction or prediction error:
    /// a file that cannot be evaluated is never counted as safe.
    pub fn scan(&self, collector: &FileCollector) -> Result<ScanReport, ScanError> {
        let mut report = ScanReport::new(collector.root().display().to_string());

        for candidate in collector.candidates() {
            let candidate = candidate?;
            tracing::debug!(path = %candidate.relative_path, "evaluating file");

            let text = read_source(&candidate)?;
            let verdict = self.evaluate(&candidate, &text)?;
            if verdict.prediction.is_vulnerable() {
                tracing::warn!(path = %verdict.path, "file predicted vulnerable");
            }
            report.record(verdict);
        }

        tracing::info!(
            files = report.files_scanned,
            flagged = report.flagged_files.len(),
            verdict = report.verdict.symbol(),
            "scan complete"
        );
        Ok(report)
    }
}

/// Final result of a gate run, mapped to an exit code by the caller.
#[derive(Debug)]
pub enum ScanOutcome {
    Accept(ScanReport),
    Reject(ScanReport),
    Fatal(ScanError),
}

impl From<Result<ScanReport, ScanError>> for ScanOutcome {
    fn from(result: Result<ScanReport, ScanError>) -> Self {
        match result {
            Ok(report) if report.passed() => ScanOutcome::Accept(report),
            Ok(report) => ScanOutcome::Reject(report),
            Err(err) => {
                tracing::error!(kind = err.kind(), error = %err, "scan aborted");
                ScanOutcome::Fatal(err)
            }
        }
    }
}

impl ScanOutcome {
    /// `0` only for a completed scan with no vulnerable file.
    pub fn exit_code(&self) -> u8 {
        match self {
            ScanOutcome::Accept(_) => 0,
            ScanOutcome::Reject(_) | ScanOutcome::Fatal(_) => 1,
        }
    }

    pub fn report(&self) -> Option<&ScanReport> {
        match self {
            ScanOutcome::Accept(r) | ScanOutcome::Reject(r) => Some(r),
            ScanOutcome::Fatal(_) => None,
        }
    }

    pub fn flagged_files(&self) -> &[String] {
        self.report().map(|r| r.flagged_files.as_slice()).unwrap_or(&[])
    }

    /// One plain-text line describing the outcome, for chat notifications.
    pub fn summary(&self) -> String {
        match self {
            ScanOutcome::Accept(r) => format!(
                "vulngate ACCEPT: {} files scanned in {}, none flagged",
                r.files_scanned, r.root
            ),
            ScanOutcome::Reject(r) => format!(
                "vulngate REJECT: {} of {} files flagged as vulnerable in {}: {}",
                r.flagged_files.len(),
                r.files_scanned,
                r.root,
                r.flagged_files.join(", ")
            ),
            ScanOutcome::Fatal(e) => format!("vulngate FAILED ({}): {}", e.kind(), e),
        }
    }
}

/// Build the collector for `root` from configuration.
pub fn collector_for(root: &Path, config: &GateConfig) -> Result<FileCollector, ScanError> {
    FileCollector::new(root)
        .exclude_path(&config.artifacts.models_dir(root))
        .exclude_patterns(&config.scan.exclude)
}

/// Load artifacts, then scan `root`. Artifacts are loaded before any file
/// is touched; a load failure never produces a report.
pub fn run_gate(root: &Path, config: &GateConfig) -> ScanOutcome {
    let bundle = match ArtifactBundle::load(&config.artifacts.paths(root), &config.artifacts.sha256) {
        Ok(bundle) => bundle,
        Err(err) => return ScanOutcome::from(Err(ScanError::from(err))),
    };
    run_with_bundle(root, config, &bundle)
}

/// Scan `root` with an already-loaded bundle.
pub fn run_with_bundle(root: &Path, config: &GateConfig, bundle: &ArtifactBundle) -> ScanOutcome {
    let result = collector_for(root, config).and_then(|collector| {
        Scanner::new(bundle, config.artifacts.unknown_extension_code).scan(&collector)
    });
    ScanOutcome::from(result)
}
