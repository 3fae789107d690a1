//! Analyze command - runs the forward/backward analysis per attack context

use std::path::{Path, PathBuf};
use std::process;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use rayon::prelude::*;
use walkdir::WalkDir;

use strand_core::config::Config;
use strand_core::driver::Analyzer;
use strand_core::{AttackContext, ContextReport};

use crate::output::json::JsonOutput;

const SUPPORTED_EXTENSIONS: &[&str] = &["dg", "dot", "depgraph"];

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Depgraph file or directory of depgraph files
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Name of the attacker-controlled input field
    #[arg(short, long)]
    pub field: String,

    /// Attack context to check (html, html_attr, js, url); repeatable.
    /// Defaults to the configured contexts, or all of them.
    #[arg(short, long)]
    pub context: Vec<String>,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    pub format: String,

    /// Exit with code 1 if any file is vulnerable
    #[arg(long)]
    pub fail_on_vulnerable: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

/// Per-file outcome: either context reports or the error that stopped
/// the analysis.
pub struct FileOutcome {
    pub file: PathBuf,
    pub reports: Vec<ContextReport>,
    pub unmodeled: usize,
    pub error: Option<String>,
}

impl FileOutcome {
    pub fn is_vulnerable(&self) -> bool {
        self.reports.iter().any(|r| r.vulnerable)
    }
}

impl AnalyzeArgs {
    pub fn run(&self) -> Result<()> {
        self.configure_colors();

        let config_dir = if self.path.is_dir() {
            self.path.clone()
        } else {
            self.path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        };
        let config = Config::discover(&config_dir)?;
        let contexts = self.resolve_contexts(&config)?;

        let files = discover_files(&self.path)?;
        if files.is_empty() {
            println!("No depgraph files found under {}", self.path.display());
            return Ok(());
        }

        // One analyzer per file; instances share nothing mutable.
        let outcomes: Vec<FileOutcome> = files
            .par_iter()
            .map(|file| self.analyze_file(file, &config, &contexts))
            .collect();

        match self.format.as_str() {
            "json" => {
                let out = JsonOutput::build(&self.path, &self.field, &outcomes);
                println!("{}", serde_json::to_string_pretty(&out)?);
            }
            _ => self.output_text(&outcomes),
        }

        if self.fail_on_vulnerable && outcomes.iter().any(FileOutcome::is_vulnerable) {
            process::exit(1);
        }
        Ok(())
    }

    fn analyze_file(
        &self,
        file: &Path,
        config: &Config,
        contexts: &[AttackContext],
    ) -> FileOutcome {
        let analyzer = match Analyzer::from_file(file, config.analysis) {
            Ok(a) => a,
            Err(e) => {
                return FileOutcome {
                    file: file.to_path_buf(),
                    reports: Vec::new(),
                    unmodeled: 0,
                    error: Some(e.to_string()),
                };
            }
        };
        let scan = match analyzer.forward(&self.field) {
            Ok(s) => s,
            Err(e) => {
                return FileOutcome {
                    file: file.to_path_buf(),
                    reports: Vec::new(),
                    unmodeled: 0,
                    error: Some(e.to_string()),
                };
            }
        };
        let mut reports = Vec::new();
        for &context in contexts {
            match analyzer.check_context(&scan, context) {
                Ok(report) => reports.push(report),
                Err(e) => {
                    return FileOutcome {
                        file: file.to_path_buf(),
                        reports,
                        unmodeled: scan.unmodeled().len(),
                        error: Some(e.to_string()),
                    };
                }
            }
        }
        FileOutcome {
            file: file.to_path_buf(),
            reports,
            unmodeled: scan.unmodeled().len(),
            error: None,
        }
    }

    fn resolve_contexts(&self, config: &Config) -> Result<Vec<AttackContext>> {
        let names: Vec<String> = if !self.context.is_empty() {
            self.context.clone()
        } else if !config.contexts.is_empty() {
            config.contexts.clone()
        } else {
            return Ok(AttackContext::all().to_vec());
        };
        names
            .iter()
            .map(|name| {
                AttackContext::parse(name).ok_or_else(|| {
                    anyhow::anyhow!(
                        "Invalid context '{}'. Valid values: html, html_attr, js, url",
                        name
                    )
                })
            })
            .collect()
    }

    fn configure_colors(&self) {
        let no_color_env = std::env::var("NO_COLOR").is_ok();
        if self.no_color || no_color_env {
            colored::control::set_override(false);
        }
    }

    fn output_text(&self, outcomes: &[FileOutcome]) {
        for outcome in outcomes {
            if let Some(error) = &outcome.error {
                println!(
                    "{}: {} {}",
                    outcome.file.display(),
                    "error".red().bold(),
                    error
                );
                continue;
            }
            for report in &outcome.reports {
                let verdict = if report.vulnerable {
                    "vulnerable".red().bold()
                } else {
                    "safe".green()
                };
                match &report.example {
                    Some(example) => println!(
                        "{}: [{}] {} (example input: {:?})",
                        outcome.file.display(),
                        report.context.name(),
                        verdict,
                        example
                    ),
                    None => println!(
                        "{}: [{}] {}",
                        outcome.file.display(),
                        report.context.name(),
                        verdict
                    ),
                }
            }
            if outcome.unmodeled > 0 {
                println!(
                    "  {} {} unmodeled operation(s) encountered",
                    "note:".yellow(),
                    outcome.unmodeled
                );
            }
        }

        let vulnerable = outcomes.iter().filter(|o| o.is_vulnerable()).count();
        let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
        println!();
        println!(
            "{} file(s) analyzed, {} vulnerable, {} failed",
            outcomes.len(),
            vulnerable,
            failed
        );
    }
}

fn discover_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let ext = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        if SUPPORTED_EXTENSIONS.contains(&ext) {
            files.push(entry.path().to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}
