//! Per-file analysis driver.
//!
//! Ties the pieces together for one depgraph: seed the input field with
//! any-string (every other input with bottom), run the forward analysis,
//! overlap the sink's post-image with an attack pattern, and if the
//! overlap is non-trivial run the backward analysis to recover the input
//! strings that reach it.

use std::path::Path;

use serde::Serialize;
use strand_automata::{AutomatonError, StringAutomaton};

use crate::analysis::{AnalysisResult, ImageComputer, tagged};
use crate::attack::AttackContext;
use crate::config::AnalysisSettings;
use crate::depgraph::{DepGraph, NodeId, ParseError, Subgraph, node_index, parse_file, parse_str};
use crate::error::AnalysisError;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Automaton(#[from] AutomatonError),
    #[error("input field '{0}' not found in the depgraph")]
    UnknownField(String),
}

pub struct Analyzer {
    graph: DepGraph,
    settings: AnalysisSettings,
}

/// The outcome of a forward pass for one input field.
#[derive(Debug)]
pub struct ForwardScan<'g> {
    sub: Subgraph<'g>,
    input: NodeId,
    result: AnalysisResult,
    unmodeled: Vec<NodeId>,
}

impl ForwardScan<'_> {
    /// The post-image at the sink (the graph root).
    pub fn post_image(&self) -> Option<&StringAutomaton> {
        self.result.get(self.sub.root())
    }

    pub fn input(&self) -> NodeId {
        self.input
    }

    pub fn result(&self) -> &AnalysisResult {
        &self.result
    }

    /// Operation nodes without a transfer entry (empty on success).
    pub fn unmodeled(&self) -> &[NodeId] {
        &self.unmodeled
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextReport {
    pub context: AttackContext,
    pub vulnerable: bool,
    /// A witness drawn from the input pre-image, when vulnerable.
    pub example: Option<String>,
}

impl Analyzer {
    pub fn new(graph: DepGraph, settings: AnalysisSettings) -> Self {
        Analyzer { graph, settings }
    }

    pub fn from_file(path: &Path, settings: AnalysisSettings) -> Result<Self, DriverError> {
        Ok(Analyzer::new(parse_file(path)?, settings))
    }

    pub fn from_str(text: &str, settings: AnalysisSettings) -> Result<Self, DriverError> {
        Ok(Analyzer::new(parse_str(text)?, settings))
    }

    pub fn graph(&self) -> &DepGraph {
        &self.graph
    }

    /// Forward analysis with `field` ranging over any string.
    pub fn forward(&self, field: &str) -> Result<ForwardScan<'_>, DriverError> {
        let input = self
            .graph
            .find_input(field)
            .ok_or_else(|| DriverError::UnknownField(field.to_string()))?;
        let sub = self.graph.input_relevant(input).ok_or_else(|| {
            AnalysisError::malformed(
                node_index(input),
                "input node is not relevant to the graph root",
            )
        })?;

        let mut result = AnalysisResult::new();
        for uninit in self.graph.uninit_nodes() {
            result.set(uninit, tagged(StringAutomaton::empty_set(), uninit));
        }
        result.set(input, tagged(StringAutomaton::any_string(), input));

        let mut computer = ImageComputer::new(self.settings);
        tracing::debug!(field, nodes = sub.node_count(), "forward analysis");
        computer.forward_over_subgraph(&sub, &mut result)?;

        Ok(ForwardScan {
            sub,
            input,
            result,
            unmodeled: computer.unmodeled().to_vec(),
        })
    }

    /// Checks one sink context against a completed forward scan.
    pub fn check_context(
        &self,
        scan: &ForwardScan<'_>,
        context: AttackContext,
    ) -> Result<ContextReport, DriverError> {
        let pattern = context.attack_pattern()?;
        self.check_pattern(scan, context, &pattern)
    }

    /// Like `check_context` with a caller-supplied attack pattern.
    pub fn check_pattern(
        &self,
        scan: &ForwardScan<'_>,
        context: AttackContext,
        pattern: &StringAutomaton,
    ) -> Result<ContextReport, DriverError> {
        let post = scan.post_image().ok_or_else(|| {
            AnalysisError::malformed(
                node_index(scan.sub.root()),
                "forward analysis produced no post-image at the root",
            )
        })?;
        let overlap = post.intersect(pattern);
        if overlap.is_empty() || overlap.is_empty_string() {
            return Ok(ContextReport {
                context,
                vulnerable: false,
                example: None,
            });
        }

        tracing::debug!(context = context.name(), "overlap found, running backward analysis");
        let mut computer = ImageComputer::new(self.settings);
        let backward = computer.backward_analysis(&scan.sub, &overlap, &scan.result)?;
        let example = backward.get(scan.input).and_then(|pre| pre.example());
        Ok(ContextReport {
            context,
            vulnerable: true,
            example,
        })
    }
}
