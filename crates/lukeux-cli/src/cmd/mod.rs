pub mod blueprint;
pub mod config;
pub mod export;
pub mod import;
pub mod init;
pub mod promo;
pub mod serve;
pub mod user;

use anyhow::Context;
use lukeux_core::config::Config;
use lukeux_core::store::Store;
use std::path::Path;

/// Open the store of an initialized root. Fails with the "run lukeux init"
/// error when `.lukeux/config.yaml` is missing.
pub fn open_store(root: &Path) -> anyhow::Result<(Config, Store)> {
    let config = Config::load(root).context("failed to load config")?;
    let store = Store::open_root(root).context("failed to open store")?;
    Ok((config, store))
}
