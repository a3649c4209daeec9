// ─── Installer subprocess runner ───
// Shared `java -jar` execution for the subprocess-driven strategies.

use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{UpdaterError, UpdaterResult};

/// One installer invocation: `java [-Xmx<N>M] -jar <jar> <args..>`,
/// working directory pinned to the target install root.
pub struct InstallerCommand<'a> {
    pub java_bin: &'a Path,
    pub memory_mb: Option<u32>,
    pub jar: &'a Path,
    pub args: &'a [String],
    pub cwd: &'a Path,
}

fn build_command(cmd: &InstallerCommand<'_>) -> Command {
    let mut command = Command::new(cmd.java_bin);
    if let Some(mb) = cmd.memory_mb {
        command.arg(format!("-Xmx{mb}M"));
    }
    command.arg("-jar").arg(cmd.jar);
    command.args(cmd.args);
    command
        .current_dir(cmd.cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    command
}

/// Run an installer to completion, mirroring its output into the log
/// line by line. Only exit code 0 counts as success. Cancellation
/// terminates the subprocess.
pub async fn run_installer(
    cmd: InstallerCommand<'_>,
    cancel: &CancellationToken,
) -> UpdaterResult<()> {
    if cancel.is_cancelled() {
        return Err(UpdaterError::Cancelled);
    }

    info!("Running installer {:?}", cmd.jar);
    let mut child = build_command(&cmd).spawn().map_err(|e| {
        UpdaterError::Installer(format!("failed to launch {:?}: {e}", cmd.java_bin))
    })?;

    let stdout = child.stdout.take().map(|out| drain_lines(out, "stdout"));
    let stderr = child.stderr.take().map(|err| drain_lines(err, "stderr"));

    let status = tokio::select! {
        status = child.wait() => {
            status.map_err(|e| UpdaterError::Installer(format!("wait failed: {e}")))?
        }
        _ = cancel.cancelled() => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Err(UpdaterError::Cancelled);
        }
    };

    if let Some(task) = stdout {
        let _ = task.await;
    }
    if let Some(task) = stderr {
        let _ = task.await;
    }

    if !status.success() {
        return Err(UpdaterError::InstallerExit {
            code: status.code(),
        });
    }
    Ok(())
}

fn drain_lines<R>(reader: R, stream: &'static str) -> tokio::task::JoinHandle<()>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!("installer {}: {}", stream, line);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_carries_memory_and_jar_flags() {
        let args = vec!["--installClient".to_string(), "/tmp/target".to_string()];
        let cmd = InstallerCommand {
            java_bin: Path::new("java"),
            memory_mb: Some(2048),
            jar: Path::new("/tmp/installer.jar"),
            args: &args,
            cwd: Path::new("/tmp"),
        };

        let built = build_command(&cmd);
        let argv: Vec<String> = built
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert_eq!(
            argv,
            vec![
                "-Xmx2048M",
                "-jar",
                "/tmp/installer.jar",
                "--installClient",
                "/tmp/target"
            ]
        );
    }

    #[test]
    fn memory_flag_absent_when_unset() {
        let cmd = InstallerCommand {
            java_bin: Path::new("java"),
            memory_mb: None,
            jar: Path::new("installer.jar"),
            args: &[],
            cwd: Path::new("."),
        };
        let built = build_command(&cmd);
        let first = built.as_std().get_args().next().unwrap();
        assert_eq!(first.to_string_lossy(), "-jar");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn zero_exit_is_success() {
        let dir = tempfile::tempdir().unwrap();
        // /bin/true ignores the -jar arguments and exits 0.
        let cmd = InstallerCommand {
            java_bin: Path::new("/bin/true"),
            memory_mb: None,
            jar: Path::new("installer.jar"),
            args: &[],
            cwd: dir.path(),
        };
        assert!(run_installer(cmd, &CancellationToken::new()).await.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_surfaces_the_code() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = InstallerCommand {
            java_bin: Path::new("/bin/false"),
            memory_mb: None,
            jar: Path::new("installer.jar"),
            args: &[],
            cwd: dir.path(),
        };
        let err = run_installer(cmd, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UpdaterError::InstallerExit { code: Some(1) }
        ));
    }

    #[tokio::test]
    async fn cancelled_token_skips_launch() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let cmd = InstallerCommand {
            java_bin: Path::new("java"),
            memory_mb: None,
            jar: Path::new("installer.jar"),
            args: &[],
            cwd: Path::new("."),
        };
        let err = run_installer(cmd, &cancel).await.unwrap_err();
        assert!(matches!(err, UpdaterError::Cancelled));
    }
}
