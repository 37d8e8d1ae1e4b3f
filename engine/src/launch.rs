//! 애플리케이션 실행
//!
//! `<venv python> <entry> --log-dir <dir> [추가 인자]`를 분리 프로세스로 시작하고,
//! 짧은 유예 시간 동안 즉시 종료되는지 확인합니다.

use futures_util::future::BoxFuture;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::error::{LauncherError, Result};
use crate::process::apply_detached_flags;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub entry_point: PathBuf,
    pub working_dir: PathBuf,
    pub log_dir: PathBuf,
    pub extra_args: Vec<String>,
}

impl LaunchSpec {
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            self.entry_point.clone().into_os_string(),
            OsString::from("--log-dir"),
            self.log_dir.clone().into_os_string(),
        ];
        args.extend(self.extra_args.iter().map(OsString::from));
        args
    }

    /// 로그용 한 줄 표현
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args().iter().map(|a| a.to_string_lossy().into_owned()));
        parts.join(" ")
    }
}

pub trait ApplicationLauncher: Send + Sync {
    fn launch<'a>(&'a self, spec: &'a LaunchSpec) -> BoxFuture<'a, Result<()>>;
}

pub struct ProcessLauncher {
    grace: Duration,
}

impl ProcessLauncher {
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }

    async fn spawn_detached(&self, spec: &LaunchSpec) -> Result<()> {
        if !spec.program.is_file() {
            return Err(LauncherError::fs(
                "launch",
                &spec.program,
                "virtual environment interpreter not found",
            ));
        }
        if !spec.entry_point.is_file() {
            return Err(LauncherError::fs("launch", &spec.entry_point, "main application script not found"));
        }
        std::fs::create_dir_all(&spec.log_dir).map_err(|e| LauncherError::fs("create_dir", &spec.log_dir, e))?;

        tracing::info!("[Launch] Running: {}", spec.command_line());

        let mut cmd = Command::new(&spec.program);
        cmd.args(spec.args())
            .current_dir(&spec.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        apply_detached_flags(&mut cmd);

        let mut child = cmd
            .spawn()
            .map_err(|e| LauncherError::subprocess(&spec.program, format!("failed to start: {}", e)))?;

        tokio::time::sleep(self.grace).await;

        match child.try_wait() {
            Ok(Some(status)) if !status.success() => Err(LauncherError::subprocess(
                &spec.program,
                format!("application exited immediately with {}", status),
            )),
            Ok(Some(_)) => {
                tracing::info!("[Launch] Application exited within the grace period");
                Ok(())
            }
            Ok(None) => {
                tracing::info!("[Launch] Application launched (pid {:?})", child.id());
                Ok(())
            }
            Err(e) => Err(LauncherError::subprocess(&spec.program, e.to_string())),
        }
    }
}

impl ApplicationLauncher for ProcessLauncher {
    fn launch<'a>(&'a self, spec: &'a LaunchSpec) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.spawn_detached(spec))
    }
}
