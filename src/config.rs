use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{UpdaterError, UpdaterResult};
use crate::http::DEFAULT_REQUEST_TIMEOUT;

/// Pipeline stages, reported once each through [`ProgressHandler::on_step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Remote index + version document resolution.
    Read,
    Libraries,
    Assets,
    ExternalFiles,
    Natives,
    Loader,
    Mods,
    Done,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Read => "read",
            Step::Libraries => "libraries",
            Step::Assets => "assets",
            Step::ExternalFiles => "external files",
            Step::Natives => "natives",
            Step::Loader => "loader",
            Step::Mods => "mods",
            Step::Done => "done",
        };
        f.write_str(name)
    }
}

/// Callback surface the host application plugs in. Implementations must be
/// cheap: `on_bytes` fires once per completed artifact, possibly from
/// several download workers.
pub trait ProgressHandler: Send + Sync {
    fn on_step(&self, _step: Step) {}

    /// Cumulative byte progress: (downloaded so far, precomputed total).
    fn on_bytes(&self, _downloaded: u64, _total: u64) {}
}

/// Default handler when the host does not care about progress.
pub struct NoopProgress;

impl ProgressHandler for NoopProgress {}

/// Run configuration. Plain data, no hidden defaults beyond `Default`;
/// `validate()` is the single gate and runs before any network activity.
#[derive(Debug, Clone)]
pub struct UpdaterConfig {
    /// Target installation root. Required.
    pub install_dir: PathBuf,
    /// Java binary used to run installer subprocesses.
    pub java_bin: PathBuf,
    /// Optional `-Xmx` for installer subprocesses, in megabytes.
    pub installer_memory_mb: Option<u32>,
    /// Per-request timeout on the shared HTTP client.
    pub request_timeout: Duration,
    /// Parallel transfers per category drain.
    pub download_concurrency: usize,
    /// Parallel registry lookups during pack-member resolution.
    pub resolver_concurrency: usize,
    /// Re-extract native binaries even when some are already present.
    pub force_reextract_natives: bool,
    /// Abort the whole run on installer-subprocess failure instead of
    /// only the loader step.
    pub abort_on_installer_failure: bool,
    /// File names the mods-directory reconciler must never delete.
    pub reconcile_ignore: Vec<String>,
    /// Cooperative cancellation, checked at artifact and subprocess-wait
    /// boundaries, never mid-write.
    pub cancel_token: CancellationToken,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            install_dir: PathBuf::new(),
            java_bin: PathBuf::from("java"),
            installer_memory_mb: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            download_concurrency: 8,
            resolver_concurrency: 4,
            force_reextract_natives: false,
            abort_on_installer_failure: false,
            reconcile_ignore: Vec::new(),
            cancel_token: CancellationToken::new(),
        }
    }
}

impl UpdaterConfig {
    /// Reject unusable configurations before the run starts.
    pub fn validate(&self) -> UpdaterResult<()> {
        if self.install_dir.as_os_str().is_empty() {
            return Err(UpdaterError::Config("install_dir is required".into()));
        }
        if self.java_bin.as_os_str().is_empty() {
            return Err(UpdaterError::Config("java_bin must not be empty".into()));
        }
        if self.download_concurrency == 0 {
            return Err(UpdaterError::Config(
                "download_concurrency must be at least 1".into(),
            ));
        }
        if self.resolver_concurrency == 0 {
            return Err(UpdaterError::Config(
                "resolver_concurrency must be at least 1".into(),
            ));
        }
        if self.installer_memory_mb == Some(0) {
            return Err(UpdaterError::Config(
                "installer_memory_mb must be positive when set".into(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(UpdaterError::Config(
                "request_timeout must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> UpdaterConfig {
        UpdaterConfig {
            install_dir: PathBuf::from("/tmp/game"),
            ..Default::default()
        }
    }

    #[test]
    fn default_config_needs_install_dir() {
        let err = UpdaterConfig::default().validate().unwrap_err();
        assert!(matches!(err, UpdaterError::Config(_)));
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn zero_knobs_are_rejected() {
        let mut c = valid();
        c.download_concurrency = 0;
        assert!(c.validate().is_err());

        let mut c = valid();
        c.resolver_concurrency = 0;
        assert!(c.validate().is_err());

        let mut c = valid();
        c.installer_memory_mb = Some(0);
        assert!(c.validate().is_err());

        let mut c = valid();
        c.request_timeout = Duration::ZERO;
        assert!(c.validate().is_err());
    }
}
