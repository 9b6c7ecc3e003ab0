pub mod admin;
pub mod application;
pub mod config;
pub mod domain;
pub mod init;
pub mod reconcile;
pub mod registry;
pub mod serve;

use anyhow::Context;
use onboard_core::Platform;
use std::path::Path;

/// Open the platform at `root`, naming the root in the error.
pub fn open_platform(root: &Path) -> anyhow::Result<Platform> {
    Platform::open(root).with_context(|| format!("failed to open platform at {}", root.display()))
}
