use crate::scan::report::{FileVerdict, ScanReport};
use serde_json::json;

const RULE_ID: &str = "VG001";

/// Generate a SARIF 2.1.0 document from a completed scan, one result per
/// flagged file, for GitHub Code Scanning and similar consumers.
pub fn to_sarif(report: &ScanReport) -> serde_json::Value {
    let results: Vec<serde_json::Value> = report
        .files
        .iter()
        .filter(|file| file.prediction.is_vulnerable())
        .map(sarif_result)
        .collect();

    json!({
        "$schema": "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/main/sarif-2.1/schema/sarif-schema-2.1.0.json",
        "version": "2.1.0",
        "runs": [{
            "tool": {
                "driver": {
                    "name": "vulngate",
                    "version": env!("CARGO_PKG_VERSION"),
                    "rules": [sarif_rule()],
                }
            },
            "results": results,
            "invocations": [{
                "executionSuccessful": true,
                "endTimeUtc": report.scanned_at.to_rfc3339(),
                "properties": {
                    "filesScanned": report.files_scanned,
                    "verdict": report.verdict,
                    "unknownExtensionFiles": report.unknown_extension_files,
                }
            }]
        }]
    })
}

fn sarif_rule() -> serde_json::Value {
    json!({
        "id": RULE_ID,
        "name": "PredictedVulnerableFile",
        "shortDescription": {
            "text": "Source file classified as vulnerable",
        },
        "fullDescription": {
            "text": "The trained vulnerability classifier labelled this file as vulnerable based on its terms and language.",
        },
        "defaultConfiguration": {
            "level": "error",
        },
    })
}

fn sarif_result(file: &FileVerdict) -> serde_json::Value {
    let path = file.path.as_str();
    json!({
        "ruleId": RULE_ID,
        "level": "error",
        "message": {
            "text": format!("'{}' was classified as vulnerable. Review it before merging.", path),
        },
        "locations": [{
            "physicalLocation": {
                "artifactLocation": {
                    "uri": path,
                },
                "region": {
                    "startLine": 1,
                }
            }
        }],
        "properties": {
            "predictedLabel": file.prediction.label(),
            "extension": file.extension,
            "knownLanguage": !file.category.is_unknown(),
        },
    })
}
