pub mod schema;
pub mod stats;
pub mod sync;

use std::path::{Path, PathBuf};

use locsync_config::{load_config, load_config_file, LocSyncConfig};
use locsync_core::Result;
use locsync_store::Store;

use crate::StoreArgs;

/// The configuration and the directory its relative paths are resolved
/// against: the config file's directory, or the current directory for the
/// layered lookup.
pub fn load(args: &StoreArgs) -> Result<(LocSyncConfig, PathBuf)> {
    match &args.config {
        Some(path) => {
            let cfg = load_config_file(path)?;
            let base = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            Ok((cfg, base))
        }
        None => Ok((load_config()?, std::env::current_dir()?)),
    }
}

pub fn open_store(args: &StoreArgs, cfg: &LocSyncConfig, base: &Path) -> Result<Store> {
    let path = args
        .database
        .clone()
        .unwrap_or_else(|| base.join(cfg.database()));
    tracing::debug!(event = "store_opening", path = %path.display());
    Ok(Store::open(&path)?)
}
