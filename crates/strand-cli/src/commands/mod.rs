//! CLI command implementations

pub mod analyze;
pub mod graph;
pub mod operators;

pub use analyze::AnalyzeArgs;
pub use graph::GraphArgs;
pub use operators::OperatorsArgs;

use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze depgraph files for string-flow vulnerabilities
    Analyze(AnalyzeArgs),

    /// Parse a depgraph file and print its structure
    Graph(GraphArgs),

    /// List the modeled string operators
    Operators(OperatorsArgs),
}
