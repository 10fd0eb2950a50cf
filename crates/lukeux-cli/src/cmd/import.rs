use super::open_store;
use crate::output::{print_json, print_table};
use anyhow::Context;
use lukeux_core::import;
use std::path::Path;

pub fn run(root: &Path, path: &Path, json: bool) -> anyhow::Result<()> {
    let (_config, store) = open_store(root)?;
    let report = import::import_file(&store, path)
        .with_context(|| format!("failed to import {}", path.display()))?;

    if json {
        return print_json(&report);
    }

    let rows = report
        .collections
        .iter()
        .map(|c| {
            vec![
                c.collection.clone(),
                c.read.to_string(),
                c.inserted.to_string(),
                c.skipped.len().to_string(),
            ]
        })
        .collect();
    print_table(&["COLLECTION", "READ", "INSERTED", "SKIPPED"], rows);

    for c in &report.collections {
        for s in &c.skipped {
            println!("  skipped {}/{}: {}", c.collection, s.id, s.reason);
        }
    }
    if !report.password_resets.is_empty() {
        println!(
            "\n{} users need a new password (`lukeux user passwd <email>`):",
            report.password_resets.len()
        );
        for email in &report.password_resets {
            println!("  {email}");
        }
    }
    println!(
        "\nRead {}, inserted {}, skipped {}.",
        report.total_read(),
        report.total_inserted(),
        report.total_skipped()
    );
    Ok(())
}
