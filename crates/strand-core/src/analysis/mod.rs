//! The image-computation engines.
//!
//! `ImageComputer` runs the forward (post-image) and backward (pre-image)
//! fixed-point analyses over a dependency graph, dispatching per-operator
//! transfer functions from the registry in `ops`. `ValidationImageComputer`
//! specializes the backward walk to extract the validation sub-computation.
//!
//! All traversals are iterative (explicit stack/queue/worklist); the
//! engines never recurse over graph structure, so arbitrarily deep graphs
//! cannot overflow the call stack. Cycles are resolved once per SCC with
//! a worklist fixed-point and a two-level widening ladder.

mod backward;
mod forward;
mod ops;
pub mod result;
mod validation;

pub use ops::{OperatorEntry, OperatorRegistry};
pub use result::AnalysisResult;
pub use validation::{ValidationImageComputer, ValidationOutcome};

use strand_automata::{RegexMode, StringAutomaton};

use crate::config::AnalysisSettings;
use crate::depgraph::{DepGraph, NodeId, NodeKind, Place, node_index};
use crate::error::AnalysisError;

/// Visit counts above this switch plain union to precise widening.
pub const PRECISE_WIDENING_THRESHOLD: usize = 5;
/// Visit counts above this switch to coarse widening.
pub const COARSE_WIDENING_THRESHOLD: usize = 20;
/// Hard safety bound on SCC worklist iterations.
pub const SCC_ITERATION_CAP: usize = 30_000;

/// Retags a freshly computed value with the node it belongs to.
pub(crate) fn tagged(mut value: StringAutomaton, node: NodeId) -> StringAutomaton {
    value.set_tag(node_index(node) as u32);
    value
}

pub struct ImageComputer {
    settings: AnalysisSettings,
    registry: OperatorRegistry,
    unmodeled: Vec<NodeId>,
}

impl Default for ImageComputer {
    fn default() -> Self {
        ImageComputer::new(AnalysisSettings::default())
    }
}

impl ImageComputer {
    pub fn new(settings: AnalysisSettings) -> Self {
        ImageComputer {
            settings,
            registry: OperatorRegistry::with_defaults(),
            unmodeled: Vec::new(),
        }
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    /// Operation nodes whose operator had no transfer entry. Populated
    /// before the corresponding `NotImplemented` error propagates.
    pub fn unmodeled(&self) -> &[NodeId] {
        &self.unmodeled
    }

    // ---- literal/constant handling ----

    /// True for a leaf normal node bound to a literal value.
    pub(crate) fn is_literal(&self, graph: &DepGraph, node: NodeId) -> bool {
        graph.successors(node).is_empty()
            && matches!(
                &graph.get(node).kind,
                NodeKind::Normal {
                    place: Place::Literal(_)
                }
            )
    }

    /// The literal text of a normal node, or `MalformedDepgraph`.
    pub(crate) fn literal_value<'g>(
        &self,
        graph: &'g DepGraph,
        node: NodeId,
    ) -> Result<&'g str, AnalysisError> {
        match &graph.get(node).kind {
            NodeKind::Normal {
                place: Place::Literal(value),
            } => Ok(value),
            _ => Err(AnalysisError::malformed(
                node_index(node),
                "node should be a literal or constant",
            )),
        }
    }

    /// Builds the automaton for a literal node. A value delimited by
    /// slashes is a regex: `^...$` anchors compile to an exact match;
    /// otherwise a restrict context matches the pattern anywhere and a
    /// plain value context matches it exactly. The token `NUL` denotes
    /// the single NUL byte.
    pub(crate) fn literal_auto(
        &self,
        graph: &DepGraph,
        node: NodeId,
        restrict: bool,
    ) -> Result<StringAutomaton, AnalysisError> {
        let value = self.literal_value(graph, node)?;
        let auto = if value.len() >= 2 && value.starts_with('/') && value.ends_with('/') {
            let reg = &value[1..value.len() - 1];
            let (pattern, mode) = if reg.len() >= 2 && reg.starts_with('^') && reg.ends_with('$') {
                (&reg[1..reg.len() - 1], RegexMode::Exact)
            } else if restrict {
                (reg, RegexMode::Contains)
            } else {
                (reg, RegexMode::Exact)
            };
            StringAutomaton::compile_regex(pattern, mode).map_err(|source| {
                AnalysisError::Automaton {
                    node: node_index(node),
                    source,
                }
            })?
        } else if value == "NUL" {
            StringAutomaton::char(0)
        } else {
            StringAutomaton::literal(value)
        };
        Ok(tagged(auto, node))
    }

    // ---- argument extraction ----

    /// A forward value that must already exist.
    pub(crate) fn fw_value<'r>(
        &self,
        result: &'r AnalysisResult,
        node: NodeId,
        what: &str,
    ) -> Result<&'r StringAutomaton, AnalysisError> {
        result.get(node).ok_or_else(|| {
            AnalysisError::malformed(node_index(node), format!("{what} has no computed value"))
        })
    }

    /// Extracts the single string of a constant-valued operand.
    pub(crate) fn singleton_arg(
        &self,
        value: &StringAutomaton,
        node: NodeId,
        op: &str,
        what: &str,
    ) -> Result<String, AnalysisError> {
        value
            .singleton_value()
            .map_err(|_| AnalysisError::InvalidArgument {
                node: node_index(node),
                op: op.to_string(),
                message: format!("{what} is not a constant string"),
            })
    }

    /// Extracts a non-negative integer operand.
    pub(crate) fn int_arg(
        &self,
        value: &StringAutomaton,
        node: NodeId,
        op: &str,
        what: &str,
    ) -> Result<usize, AnalysisError> {
        let text = self.singleton_arg(value, node, op, what)?;
        let parsed: i64 = text
            .trim()
            .parse()
            .map_err(|_| AnalysisError::InvalidArgument {
                node: node_index(node),
                op: op.to_string(),
                message: format!("{what} '{text}' is not an integer"),
            })?;
        if parsed < 0 {
            return Err(AnalysisError::InvalidArgument {
                node: node_index(node),
                op: op.to_string(),
                message: format!("negative {what} {parsed} is unsupported"),
            });
        }
        Ok(parsed as usize)
    }
}
