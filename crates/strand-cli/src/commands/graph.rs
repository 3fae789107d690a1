//! Graph command - parses a depgraph file and prints its structure

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use strand_core::depgraph::{NodeKind, Place, node_index, parse_file};

#[derive(Args, Debug)]
pub struct GraphArgs {
    /// Depgraph file to inspect
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

impl GraphArgs {
    pub fn run(&self) -> Result<()> {
        let graph = parse_file(&self.file)?;

        println!("{} {}", "file:".bold(), self.file.display());
        println!("{} {}", "nodes:".bold(), graph.node_count());
        if let Some(uuid) = &graph.metadata().uuid {
            println!("{} {}", "uuid:".bold(), uuid);
        }
        if let Some(url) = &graph.metadata().url {
            println!("{} {}", "url:".bold(), url);
        }

        for node in graph.nodes() {
            let desc = match &node.kind {
                NodeKind::Normal {
                    place: Place::Var(name),
                } => format!("var {name}"),
                NodeKind::Normal {
                    place: Place::Literal(value),
                } => format!("literal {value:?}"),
                NodeKind::Op { name } => format!("op {name}"),
                NodeKind::Uninit { name } => format!("input {name}"),
            };
            let scc = match graph.scc_id(node.id) {
                Some(scc) => format!(" (scc {scc})"),
                None => String::new(),
            };
            let operands: Vec<String> = graph
                .successors(node.id)
                .iter()
                .map(|&s| node_index(s).to_string())
                .collect();
            if operands.is_empty() {
                println!("  {:>4}  {desc}{scc}", node_index(node.id));
            } else {
                println!(
                    "  {:>4}  {desc}{scc} -> [{}]",
                    node_index(node.id),
                    operands.join(", ")
                );
            }
        }

        let inputs: Vec<String> = graph
            .nodes()
            .filter_map(|n| match &n.kind {
                NodeKind::Uninit { name } => Some(name.clone()),
                _ => None,
            })
            .collect();
        if inputs.is_empty() {
            println!("{} none", "inputs:".bold());
        } else {
            println!("{} {}", "inputs:".bold(), inputs.join(", "));
        }
        Ok(())
    }
}
