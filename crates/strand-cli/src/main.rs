//! strand CLI - automaton-based string-flow security analysis
//!
//! Analyzes dependency-graph files of string-sanitization code and
//! reports which attack contexts an input field can still reach.

mod commands;
mod output;

use clap::Parser;
use commands::Commands;

#[derive(Parser, Debug)]
#[command(
    name = "strand",
    author,
    version,
    about = "Automaton-based string-flow security analyzer",
    long_about = "strand analyzes dependency graphs of string-manipulation code.\n\n\
                  It computes the set of strings an attacker-controlled input can\n\
                  drive into a sink and checks them against per-context attack\n\
                  patterns (HTML body, HTML attribute, JavaScript, URL)."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze(args) => args.run(),
        Commands::Graph(args) => args.run(),
        Commands::Operators(args) => args.run(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_analyze_command() {
        let cli = Cli::try_parse_from(["strand", "analyze", "./graphs", "--field", "q"]).unwrap();
        match cli.command {
            Commands::Analyze(args) => {
                assert_eq!(args.path.to_str().unwrap(), "./graphs");
                assert_eq!(args.field, "q");
            }
            _ => panic!("Expected Analyze command"),
        }
    }

    #[test]
    fn cli_parses_analyze_with_contexts() {
        let cli = Cli::try_parse_from([
            "strand", "analyze", "g.dg", "--field", "q", "--context", "html", "--context", "url",
        ])
        .unwrap();
        match cli.command {
            Commands::Analyze(args) => {
                assert_eq!(args.context, vec!["html", "url"]);
            }
            _ => panic!("Expected Analyze command"),
        }
    }

    #[test]
    fn cli_parses_graph_command() {
        let cli = Cli::try_parse_from(["strand", "graph", "g.dg"]).unwrap();
        assert!(matches!(cli.command, Commands::Graph(_)));
    }

    #[test]
    fn cli_parses_operators_command() {
        let cli = Cli::try_parse_from(["strand", "operators"]).unwrap();
        assert!(matches!(cli.command, Commands::Operators(_)));
    }
}
