//! `chainwatch check-abi`: validate an ABI file and list its actions.

use anyhow::{Context, Result};
use chainwatch_abi::{AbiDef, AbiSerializer};
use std::path::Path;

pub fn run(file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let abi = AbiDef::from_json(&content).with_context(|| format!("parsing {}", file.display()))?;

    match AbiSerializer::new(abi.clone()) {
        Ok(ser) => {
            println!("✓ ABI {} is valid", file.display());
            println!("  Version:  {}", if ser.version().is_empty() { "-" } else { ser.version() });
            println!("  Types:    {}", abi.types.len());
            println!("  Structs:  {}", abi.structs.len());
            println!("  Variants: {}", abi.variants.len());
            println!("  Actions:  {}", abi.actions.len());
            for action in &abi.actions {
                println!("    - {} → {}", action.name, action.type_name);
            }
        }
        Err(e) => {
            eprintln!("✗ Invalid ABI: {e}");
            std::process::exit(1);
        }
    }
    Ok(())
}
