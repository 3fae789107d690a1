//! Error taxonomy of the analysis engine.
//!
//! Every error aborts the current analysis call and propagates to the
//! caller; the engine never recovers locally. Node payloads are the
//! arena indices of the offending depgraph nodes.

use strand_automata::AutomatonError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("malformed dependency graph at node {node}: {message}")]
    MalformedDepgraph { node: usize, message: String },

    #[error("operation '{op}' at node {node} is not modeled")]
    NotImplemented { node: usize, op: String },

    #[error("invalid argument for '{op}' at node {node}: {message}")]
    InvalidArgument {
        node: usize,
        op: String,
        message: String,
    },

    #[error("automaton failure at node {node}")]
    Automaton {
        node: usize,
        #[source]
        source: AutomatonError,
    },

    #[error("replacement text at node {node} embeds the page url '{url}'")]
    UrlInReplaceString { node: usize, url: String },
}

impl AnalysisError {
    pub(crate) fn malformed(node: usize, message: impl Into<String>) -> Self {
        AnalysisError::MalformedDepgraph {
            node,
            message: message.into(),
        }
    }
}
