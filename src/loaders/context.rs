use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::download::SyncEngine;

/// Name of the scratch subdirectory strategies unpack installers into.
/// Removed again once the strategy finishes.
pub const SCRATCH_DIR_NAME: &str = ".flowupdater";

/// Install context threaded through every loader strategy.
/// Carries borrows only, so it stays cheap to hand around.
#[derive(Clone, Copy)]
pub struct InstallContext<'a> {
    pub game_version: &'a str,
    pub install_dir: &'a Path,
    pub libraries_dir: &'a Path,
    pub client: &'a reqwest::Client,
    pub sync: &'a SyncEngine,
    pub java_bin: &'a Path,
    pub installer_memory_mb: Option<u32>,
    pub cancel: &'a CancellationToken,
}

impl InstallContext<'_> {
    pub fn scratch_dir(&self) -> PathBuf {
        self.install_dir.join(SCRATCH_DIR_NAME)
    }
}
