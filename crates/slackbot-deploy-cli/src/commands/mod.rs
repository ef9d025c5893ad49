pub mod install;
pub mod plan;
pub mod status;

use anyhow::{Context, Result};
use std::path::PathBuf;

/// `--root` if given, else the current directory; always absolute.
pub fn resolve_root(root: Option<PathBuf>) -> Result<PathBuf> {
    let root = match root {
        Some(r) => r,
        None => std::env::current_dir().context("Cannot determine current directory")?,
    };
    root.canonicalize()
        .with_context(|| format!("Install root {} is not accessible", root.display()))
}
