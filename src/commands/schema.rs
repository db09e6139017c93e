//! Schema generation command implementation.
//!
//! Editors that speak JSON Schema (yaml-language-server and friends) can
//! validate the YAML manifests against these.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use schemars::schema_for;
use std::fs;
use std::path::PathBuf;

use crate::manifest::{HostManifest, ModuleManifest, RootConfig};

#[derive(Debug, Args)]
pub struct SchemaArgs {
    #[command(subcommand)]
    pub action: SchemaAction,
}

#[derive(Debug, Subcommand)]
pub enum SchemaAction {
    /// Generate JSON schemas for all manifest types
    Generate {
        /// Output directory (if not specified, prints to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List available schema types
    List,
}

struct SchemaInfo {
    name: &'static str,
    filename: &'static str,
    description: &'static str,
}

const SCHEMAS: &[SchemaInfo] = &[
    SchemaInfo {
        name: "RootConfig",
        filename: "config.schema.json",
        description: "config.yaml: which host this machine is",
    },
    SchemaInfo {
        name: "HostManifest",
        filename: "host.schema.json",
        description: "hosts/<name>.yaml: module selection, AUR helper, pruning and host hooks",
    },
    SchemaInfo {
        name: "ModuleManifest",
        filename: "module.schema.json",
        description: "modules/<name>/module.yaml: packages, services, dotfiles and hooks",
    },
];

/// Every schema as (filename, pretty JSON).
fn generate_all_schemas() -> Result<Vec<(&'static str, String)>> {
    Ok(vec![
        (
            "config.schema.json",
            serde_json::to_string_pretty(&schema_for!(RootConfig))?,
        ),
        (
            "host.schema.json",
            serde_json::to_string_pretty(&schema_for!(HostManifest))?,
        ),
        (
            "module.schema.json",
            serde_json::to_string_pretty(&schema_for!(ModuleManifest))?,
        ),
    ])
}

pub fn run(args: SchemaArgs) -> Result<()> {
    match args.action {
        SchemaAction::Generate { output } => {
            let schemas = generate_all_schemas()?;

            match output {
                Some(dir) => {
                    fs::create_dir_all(&dir)
                        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

                    for (filename, json) in schemas {
                        let path = dir.join(filename);
                        fs::write(&path, &json)
                            .with_context(|| format!("Failed to write {}", path.display()))?;
                        println!("Wrote {}", path.display());
                    }
                }
                None => {
                    let mut combined = serde_json::Map::new();
                    for (filename, json) in schemas {
                        let value: serde_json::Value = serde_json::from_str(&json)?;
                        let name = filename.strip_suffix(".schema.json").unwrap_or(filename);
                        combined.insert(name.to_string(), value);
                    }
                    println!("{}", serde_json::to_string_pretty(&combined)?);
                }
            }
        }
        SchemaAction::List => {
            println!("Available schema types:\n");
            for info in SCHEMAS {
                println!("  {} ({})", info.name, info.filename);
                println!("    {}\n", info.description);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_listed_schema_is_generated() {
        let generated = generate_all_schemas().unwrap();
        for info in SCHEMAS {
            assert!(
                generated.iter().any(|(f, _)| *f == info.filename),
                "{} missing",
                info.filename
            );
        }
    }

    #[test]
    fn test_module_schema_mentions_fields() {
        let generated = generate_all_schemas().unwrap();
        let (_, module) = generated
            .iter()
            .find(|(f, _)| *f == "module.schema.json")
            .unwrap();
        for field in ["packages", "services", "dotfiles", "hooks"] {
            assert!(module.contains(field), "{field} missing from schema");
        }
    }
}
