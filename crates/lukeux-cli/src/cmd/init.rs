use anyhow::Context;
use lukeux_core::config::Config;
use lukeux_core::store::Store;
use lukeux_core::{io, paths};
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing Luke UX in: {}", root.display());

    let dir = paths::lukeux_dir(root);
    io::ensure_dir(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let config_path = paths::config_path(root);
    if !config_path.exists() {
        Config::default()
            .save(root)
            .context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
    } else {
        println!("  exists:  {}", paths::CONFIG_FILE);
    }

    let store_path = paths::store_path(root);
    let existed = store_path.exists();
    Store::open(&store_path).context("failed to create store")?;
    if existed {
        println!("  exists:  {}", paths::STORE_FILE);
    } else {
        println!("  created: {}", paths::STORE_FILE);
    }

    io::ensure_gitignore_entry(root, paths::STORE_FILE)
        .context("failed to update .gitignore")?;

    println!("\nNext: set ANTHROPIC_API_KEY (or OPENAI_API_KEY) and run `lukeux serve`.");
    Ok(())
}
