//! Operators command - lists the builtins the engine models

use anyhow::Result;
use clap::Args;

use strand_core::OperatorRegistry;

#[derive(Args, Debug)]
pub struct OperatorsArgs {}

impl OperatorsArgs {
    pub fn run(&self) -> Result<()> {
        let registry = OperatorRegistry::with_defaults();
        for name in registry.operator_names() {
            println!("{name}");
        }
        Ok(())
    }
}
