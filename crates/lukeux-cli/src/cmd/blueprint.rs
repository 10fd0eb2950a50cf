use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use lukeux_core::blueprint::{self, FORMAT_INSTRUCTIONS};
use std::io::Read;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum BlueprintSubcommand {
    /// Parse blueprint blocks out of a saved model response
    Parse {
        /// File to read (default: stdin)
        file: Option<PathBuf>,
    },

    /// Print the format instructions appended to every system prompt
    Instructions,
}

pub fn run(subcmd: BlueprintSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        BlueprintSubcommand::Parse { file } => parse(file, json),
        BlueprintSubcommand::Instructions => {
            println!("{FORMAT_INSTRUCTIONS}");
            Ok(())
        }
    }
}

fn parse(file: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let text = match file {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };

    let parsed = blueprint::parse_blueprints(&text);
    if json {
        return print_json(&parsed);
    }

    if parsed.concepts.is_empty() {
        println!("No blueprint concepts found.");
        return Ok(());
    }
    let rows = parsed
        .concepts
        .iter()
        .map(|c| {
            vec![
                c.index.to_string(),
                c.title().unwrap_or("-").to_string(),
                c.summary().unwrap_or("-").to_string(),
                c.fields.len().to_string(),
            ]
        })
        .collect();
    print_table(&["#", "TITLE", "SUMMARY", "FIELDS"], rows);
    Ok(())
}
