//! JSON output for programmatic integration.

use std::path::Path;

use serde::Serialize;
use strand_core::ContextReport;

use crate::commands::analyze::FileOutcome;

#[derive(Serialize)]
pub struct JsonOutput {
    pub version: &'static str,
    pub analyzed_path: String,
    pub field: String,
    pub summary: JsonSummary,
    pub files: Vec<JsonFile>,
}

#[derive(Serialize)]
pub struct JsonSummary {
    pub total_files: usize,
    pub vulnerable_files: usize,
    pub failed_files: usize,
}

#[derive(Serialize)]
pub struct JsonFile {
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub unmodeled_operations: usize,
    pub contexts: Vec<ContextReport>,
}

impl JsonOutput {
    pub fn build(path: &Path, field: &str, outcomes: &[FileOutcome]) -> JsonOutput {
        let files: Vec<JsonFile> = outcomes
            .iter()
            .map(|o| JsonFile {
                file: o.file.to_string_lossy().to_string(),
                error: o.error.clone(),
                unmodeled_operations: o.unmodeled,
                contexts: o.reports.clone(),
            })
            .collect();
        JsonOutput {
            version: env!("CARGO_PKG_VERSION"),
            analyzed_path: path.to_string_lossy().to_string(),
            field: field.to_string(),
            summary: JsonSummary {
                total_files: outcomes.len(),
                vulnerable_files: outcomes.iter().filter(|o| o.is_vulnerable()).count(),
                failed_files: outcomes.iter().filter(|o| o.error.is_some()).count(),
            },
            files,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use strand_core::AttackContext;

    #[test]
    fn json_output_counts_verdicts() {
        let outcomes = vec![
            FileOutcome {
                file: PathBuf::from("a.dg"),
                reports: vec![ContextReport {
                    context: AttackContext::HtmlBody,
                    vulnerable: true,
                    example: Some("<".to_string()),
                }],
                unmodeled: 0,
                error: None,
            },
            FileOutcome {
                file: PathBuf::from("b.dg"),
                reports: Vec::new(),
                unmodeled: 0,
                error: Some("parse failure".to_string()),
            },
        ];
        let out = JsonOutput::build(Path::new("."), "q", &outcomes);
        assert_eq!(out.summary.total_files, 2);
        assert_eq!(out.summary.vulnerable_files, 1);
        assert_eq!(out.summary.failed_files, 1);
        let text = serde_json::to_string(&out).unwrap();
        assert!(text.contains("\"vulnerable\":true"));
        assert!(text.contains("parse failure"));
    }
}
