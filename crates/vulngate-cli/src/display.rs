use colored::*;
use vulngate_core::artifacts::{ArtifactPaths, BundleSummary};
use vulngate_core::scan::report::{ScanReport, Verdict};
use vulngate_core::ScanError;

/// Print a completed scan to the terminal.
pub fn print_scan_report(report: &ScanReport) {
    println!();
    println!(
        "{}",
        format!(
            " vulngate v{} - Scanning {}",
            env!("CARGO_PKG_VERSION"),
            report.root
        )
        .bold()
    );
    println!();

    if report.files_scanned == 0 {
        println!(
            " {} No source files matched the allow-list.",
            "OK".green().bold()
        );
    } else if report.flagged_files.is_empty() {
        println!(
            " {} No vulnerable files detected.",
            "OK".green().bold()
        );
    } else {
        for path in &report.flagged_files {
            println!(
                " {} {}",
                " VULNERABLE ".on_red().white().bold(),
                path.bold()
            );
        }
    }

    if !report.unknown_extension_files.is_empty() {
        println!();
        println!(
            " {} {} file(s) had an extension the encoder does not know:",
            "NOTE".yellow().bold(),
            report.unknown_extension_files.len()
        );
        for path in &report.unknown_extension_files {
            println!("   {} {}", "|".dimmed(), path.dimmed());
        }
    }

    println!();
    println!(" {}", "=".repeat(60).dimmed());
    println!();
    println!(" {}", "Summary".bold().underline());
    println!(
        " {} Files scanned:  {}",
        "|-".dimmed(),
        report.files_scanned
    );
    println!(
        " {} Files flagged:  {}",
        "|-".dimmed(),
        if report.flagged_files.is_empty() {
            "0".to_string()
        } else {
            report.flagged_files.len().to_string().red().bold().to_string()
        }
    );
    println!(
        " {} Result:         {}",
        "|-".dimmed(),
        match report.verdict {
            Verdict::Accept => report.verdict.symbol().green().bold().to_string(),
            Verdict::Reject => report.verdict.symbol().red().bold().to_string(),
        }
    );
    println!();
}

/// Print the diagnostic for an aborted scan. No report accompanies it.
pub fn print_fatal(err: &ScanError) {
    eprintln!();
    eprintln!(
        " {} [{}] {}",
        " FAILED ".on_red().white().bold(),
        err.kind().dimmed(),
        err
    );
    let hint = match err {
        ScanError::Artifact(_) => Some(
            "Make sure the models directory holds vulnerability_detector.json, vectorizer_detector.json and language_encoder.json.",
        ),
        ScanError::File(_) | ScanError::Traverse { .. } => {
            Some("A file that cannot be evaluated is treated as a failure, not as safe.")
        }
        ScanError::Config(_) => None,
    };
    if let Some(hint) = hint {
        eprintln!("   {} {}", "|".dimmed(), hint.dimmed());
    }
    eprintln!();
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "error:".red().bold(), message);
}

/// Print a summary of a loaded artifact bundle.
pub fn print_bundle_summary(paths: &ArtifactPaths, summary: &BundleSummary, unknown_code: f64) {
    println!();
    println!("{}", " vulngate Artifacts".bold());
    println!();
    println!(" {}", "Files".bold().underline());
    println!(" {} Classifier: {}", "|-".dimmed(), paths.classifier.display());
    println!(" {} Vectorizer: {}", "|-".dimmed(), paths.vectorizer.display());
    println!(" {} Encoder:    {}", "|-".dimmed(), paths.encoder.display());
    println!();
    println!(" {}", "Model".bold().underline());
    println!(" {} Kind:            {}", "|-".dimmed(), summary.model.cyan());
    println!(" {} Vocabulary (D):  {}", "|-".dimmed(), summary.vocabulary_size);
    println!(" {} Row width:       {}", "|-".dimmed(), summary.row_width);
    println!(
        " {} Languages:       {}",
        "|-".dimmed(),
        summary
            .encoder_classes
            .iter()
            .enumerate()
            .map(|(code, ext)| format!("{}={}", ext, code))
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(" {} Unknown code:    {}", "|-".dimmed(), unknown_code);
    println!();
    println!(" {} Artifacts are consistent.", "OK".green().bold());
    println!();
}
