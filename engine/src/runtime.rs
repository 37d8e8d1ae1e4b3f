//! 파이썬 런타임 탐지 및 무인 설치
//!
//! ## 탐지
//! `<path> --version`을 제한 시간 안에 실행해 `Python <버전>` 출력을 확인합니다.
//! 시간 초과·실행 실패·버전 불일치는 모두 "설치 안 됨"으로 취급합니다 (재설치로 복구).
//!
//! ## 설치
//! 공식 설치 프로그램을 고정 플래그로 실행하고, 종료를 폴링으로 기다립니다.
//! 취소되면 설치 프로세스를 종료합니다.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::error::{LauncherError, Result};
use crate::process::{apply_creation_flags, runtime_executable};

/// `--version` 출력에서 기대 버전을 찾음
///
/// `"3.11"`은 `Python 3.11`, `Python 3.11.9`와 일치하지만 `Python 3.110`과는 일치하지 않습니다.
pub fn matches_version(output: &str, expected: &str) -> bool {
    output.lines().any(|line| {
        let version = match line.trim().strip_prefix("Python ") {
            Some(v) => v.trim(),
            None => return false,
        };
        version == expected
            || version
                .strip_prefix(expected)
                .map(|rest| rest.starts_with('.'))
                .unwrap_or(false)
    })
}

pub struct RuntimeProbe {
    expected_version: String,
    timeout: Duration,
}

impl RuntimeProbe {
    pub fn new(expected_version: impl Into<String>, timeout: Duration) -> Self {
        Self {
            expected_version: expected_version.into(),
            timeout,
        }
    }

    pub async fn is_usable(&self, path: &Path) -> bool {
        if !path.is_file() {
            tracing::debug!("[Runtime] {} does not exist", path.display());
            return false;
        }

        let mut cmd = Command::new(path);
        cmd.arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        apply_creation_flags(&mut cmd);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Err(_) => {
                tracing::warn!(
                    "[Runtime] Version probe of {} timed out after {}s",
                    path.display(),
                    self.timeout.as_secs()
                );
                return false;
            }
            Ok(Err(e)) => {
                tracing::warn!("[Runtime] Failed to run {}: {}", path.display(), e);
                return false;
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            return false;
        }

        // 구버전 파이썬은 버전을 stderr로 출력
        let text = format!(
            "{}\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let ok = matches_version(&text, &self.expected_version);
        tracing::info!(
            "[Runtime] {} → {} (expected Python {}): {}",
            path.display(),
            text.trim(),
            self.expected_version,
            if ok { "usable" } else { "mismatch" }
        );
        ok
    }
}

/// 무인 설치 플래그
pub fn silent_install_args(target_dir: &Path) -> Vec<String> {
    let mut args: Vec<String> = [
        "/passive",
        "InstallAllUsers=0",
        "PrependPath=0",
        "Include_doc=0",
        "Include_launcher=0",
        "Include_test=0",
        "Include_dev=0",
        "AssociateFiles=0",
        "Shortcuts=0",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.push(format!("TargetDir={}", target_dir.display()));
    args
}

pub struct RuntimeInstaller {
    poll_interval: Duration,
}

impl Default for RuntimeInstaller {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl RuntimeInstaller {
    /// 설치 프로그램 실행 → 종료 대기 → 인터프리터 경로 반환
    pub async fn install(
        &self,
        installer: &Path,
        target_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        std::fs::create_dir_all(target_dir).map_err(|e| LauncherError::fs("create_dir", target_dir, e))?;
        tracing::info!("[Runtime] Installing {} into {}", installer.display(), target_dir.display());

        let mut cmd = Command::new(installer);
        cmd.args(silent_install_args(target_dir))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| LauncherError::subprocess(installer, format!("failed to start: {}", e)))?;

        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf).await;
                buf
            })
        });

        let status = loop {
            if cancel.is_cancelled() {
                tracing::info!("[Runtime] Install cancelled, terminating installer");
                let _ = child.kill().await;
                return Err(LauncherError::Cancelled);
            }
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => {
                    return Err(LauncherError::subprocess(installer, format!("wait failed: {}", e)))
                }
            }
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        };

        if !status.success() {
            let stderr = match stderr_task {
                Some(task) => task.await.unwrap_or_default(),
                None => String::new(),
            };
            return Err(LauncherError::subprocess(
                installer,
                format!("exited with {}: {}", status, stderr.trim()),
            ));
        }

        let exe = runtime_executable(target_dir);
        if !exe.is_file() {
            return Err(LauncherError::subprocess(
                installer,
                format!("installer finished but {} was not found", exe.display()),
            ));
        }

        tracing::info!("[Runtime] Installed runtime at {}", exe.display());
        Ok(exe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_matching() {
        assert!(matches_version("Python 3.11.9\n", "3.11"));
        assert!(matches_version("Python 3.11", "3.11"));
        assert!(!matches_version("Python 3.12.1", "3.11"));
        assert!(!matches_version("Python 3.110", "3.11"));
        assert!(!matches_version("", "3.11"));
        assert!(matches_version("\nPython 3.11.2", "3.11"));
    }

    #[test]
    fn silent_flags_end_with_target_dir() {
        let args = silent_install_args(Path::new("/opt/exvr/python"));
        assert_eq!(args[0], "/passive");
        assert!(args.contains(&"Include_launcher=0".to_string()));
        assert_eq!(args.last().unwrap(), "TargetDir=/opt/exvr/python");
        assert_eq!(args.len(), 10);
    }

    #[tokio::test]
    async fn missing_interpreter_is_not_usable() {
        let probe = RuntimeProbe::new("3.11", Duration::from_secs(1));
        assert!(!probe.is_usable(Path::new("/definitely/not/here/python")).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn probe_checks_script_output_and_timeout() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::TempDir::new().unwrap();

        let write_script = |name: &str, body: &str| {
            let path = dir.path().join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        };

        let good = write_script("good", "echo 'Python 3.11.9'");
        let wrong = write_script("wrong", "echo 'Python 3.8.10'");
        let slow = write_script("slow", "sleep 5; echo 'Python 3.11.9'");

        let probe = RuntimeProbe::new("3.11", Duration::from_millis(500));
        assert!(probe.is_usable(&good).await);
        assert!(!probe.is_usable(&wrong).await);
        assert!(!probe.is_usable(&slow).await, "timeout counts as not installed");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn installer_failure_is_subprocess_error() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::TempDir::new().unwrap();
        let installer = dir.path().join("installer");
        std::fs::write(&installer, "#!/bin/sh\necho broken >&2\nexit 3\n").unwrap();
        std::fs::set_permissions(&installer, std::fs::Permissions::from_mode(0o755)).unwrap();

        let err = RuntimeInstaller::default()
            .install(&installer, &dir.path().join("python"), &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            LauncherError::Subprocess { message, .. } => assert!(message.contains("broken")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
