//! strand-core: automaton-based string analysis over dependency graphs.
//!
//! The analysis answers one question about a piece of string-manipulation
//! code: can attacker-controlled input reach a dangerous sink despite the
//! sanitization on the way? Programs are consumed as dependency graphs
//! (`depgraph`), abstract string values are finite automata
//! (`strand-automata`), and the `analysis` engines propagate them forward
//! (post-images) and backward (pre-images) through the graph, including
//! fixed-point resolution of loops with widening.
//!
//! `driver::Analyzer` is the high-level entry point: one instance per
//! depgraph file, no shared mutable state between instances.

pub mod analysis;
pub mod attack;
pub mod config;
pub mod depgraph;
pub mod driver;
pub mod error;

pub use analysis::{
    AnalysisResult, ImageComputer, OperatorRegistry, ValidationImageComputer, ValidationOutcome,
};
pub use attack::AttackContext;
pub use config::{AnalysisSettings, Config};
pub use driver::{Analyzer, ContextReport, DriverError, ForwardScan};
pub use error::AnalysisError;
