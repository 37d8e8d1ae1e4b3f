//! 의존성 환경 프로비저닝 워커
//!
//! ## 흐름
//! 1. `<app>/venv`가 없으면 런타임으로 venv 생성 (있으면 재사용)
//! 2. venv의 pip로 requirements 설치 (미러 인덱스 사용)
//! 3. 설치 후 에셋 매핑 테이블대로 파일을 site-packages 안으로 복사
//!
//! pip는 기계가 읽을 수 있는 진행률을 내지 않으므로 출력 줄에서 추정합니다.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::error::{LauncherError, Result};
use crate::event::{EventSink, WorkerOutput};
use crate::process::{apply_creation_flags, site_packages, venv_python};
use crate::settings::AssetMapping;
use crate::worker::{Worker, WorkerContext};

/// venv 생성 직후 진행률
const VENV_READY_PROGRESS: u8 = 20;

/// pip 출력 기반 진행률 추정
///
/// "collecting" 줄마다 +2 (최대 90), "installing" 줄마다 +1 (최대 95).
/// 값은 절대 줄어들지 않습니다.
#[derive(Debug, Clone, Copy)]
pub struct PipProgress {
    value: u8,
}

impl PipProgress {
    pub fn starting_at(value: u8) -> Self {
        Self { value }
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    /// 출력 한 줄을 반영. 진행률이 바뀌면 새 값을 반환
    pub fn observe(&mut self, line: &str) -> Option<u8> {
        let lower = line.to_ascii_lowercase();
        let next = if lower.contains("collecting") {
            self.value.saturating_add(2).min(90)
        } else if lower.contains("installing") {
            self.value.saturating_add(1).min(95)
        } else {
            return None;
        };
        if next > self.value {
            self.value = next;
            Some(next)
        } else {
            None
        }
    }
}

pub struct ProvisionWorker {
    runtime: PathBuf,
    app_dir: PathBuf,
    requirements: PathBuf,
    index_url: String,
    asset_mappings: Vec<AssetMapping>,
}

impl ProvisionWorker {
    pub fn new(
        runtime: impl Into<PathBuf>,
        app_dir: impl Into<PathBuf>,
        requirements: impl Into<PathBuf>,
        index_url: impl Into<String>,
        asset_mappings: Vec<AssetMapping>,
    ) -> Self {
        Self {
            runtime: runtime.into(),
            app_dir: app_dir.into(),
            requirements: requirements.into(),
            index_url: index_url.into(),
            asset_mappings,
        }
    }

    pub fn venv_dir(&self) -> PathBuf {
        self.app_dir.join("venv")
    }

    /// venv를 새로 만들어야 하는데 런타임이 없는 경우
    pub fn runtime_missing(&self) -> bool {
        !venv_python(&self.venv_dir()).exists() && !self.runtime.is_file()
    }

    async fn create_venv(&self, ctx: &WorkerContext, venv_dir: &Path) -> Result<()> {
        if venv_python(venv_dir).exists() {
            ctx.events().log("Virtual environment already exists.");
            tracing::info!("[Provision] Reusing venv at {}", venv_dir.display());
            return Ok(());
        }

        if !self.runtime.is_file() {
            return Err(LauncherError::subprocess(&self.runtime, "runtime interpreter not found"));
        }

        ctx.events().log(format!("Creating virtual environment at {}", venv_dir.display()));
        tracing::info!("[Provision] Creating venv with {}", self.runtime.display());

        let mut cmd = Command::new(&self.runtime);
        cmd.arg("-m")
            .arg("venv")
            .arg(venv_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        apply_creation_flags(&mut cmd);

        let output = tokio::select! {
            biased;
            _ = ctx.cancel_token().cancelled() => return Err(LauncherError::Cancelled),
            out = cmd.output() => out.map_err(|e| LauncherError::subprocess(&self.runtime, e.to_string()))?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LauncherError::subprocess(
                &self.runtime,
                format!("failed to create virtual environment: {}", stderr.trim()),
            ));
        }
        Ok(())
    }

    async fn pip_install(&self, ctx: &WorkerContext, python: &Path) -> Result<()> {
        ctx.events().log(format!(
            "Installing requirements from {} using {}",
            self.requirements.display(),
            self.index_url
        ));

        let mut cmd = Command::new(python);
        cmd.args(["-m", "pip", "install", "-i"])
            .arg(&self.index_url)
            .arg("-r")
            .arg(&self.requirements)
            .current_dir(&self.app_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        apply_creation_flags(&mut cmd);

        let mut child = cmd
            .spawn()
            .map_err(|e| LauncherError::subprocess(python, format!("failed to start pip: {}", e)))?;

        let stderr_task = child.stderr.take().map(|stderr| {
            let events = ctx.events().clone();
            tokio::spawn(forward_stderr(stderr, events))
        });

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| LauncherError::subprocess(python, "stdout not captured"))?;
        let mut lines = BufReader::new(stdout).lines();
        let mut estimate = PipProgress::starting_at(VENV_READY_PROGRESS);

        loop {
            let line = tokio::select! {
                biased;
                _ = ctx.cancel_token().cancelled() => {
                    tracing::info!("[Provision] Cancelled, terminating pip");
                    let _ = child.kill().await;
                    return Err(LauncherError::Cancelled);
                }
                line = lines.next_line() => line,
            };

            match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if let Some(p) = estimate.observe(line) {
                        ctx.events().progress(p);
                    }
                    ctx.events().log(line.to_string());
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("[Provision] Failed to read pip output: {}", e);
                    break;
                }
            }
        }

        let status = tokio::select! {
            biased;
            _ = ctx.cancel_token().cancelled() => {
                let _ = child.kill().await;
                return Err(LauncherError::Cancelled);
            }
            status = child.wait() => status.map_err(|e| LauncherError::subprocess(python, e.to_string()))?,
        };

        let stderr_tail = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            return Err(LauncherError::subprocess(
                python,
                format!("requirements installation failed with {}: {}", status, stderr_tail.trim()),
            ));
        }

        ctx.events().log("Requirements installation completed successfully.");
        Ok(())
    }

    /// 매핑된 파일 복사. 개별 실패는 로그만 남김
    fn replace_assets(&self, events: &EventSink, venv_dir: &Path) {
        let site = match site_packages(venv_dir) {
            Some(site) => site,
            None => {
                tracing::warn!("[Provision] site-packages not found under {}", venv_dir.display());
                return;
            }
        };

        for mapping in &self.asset_mappings {
            let src = self.app_dir.join(&mapping.source);
            let dst = site.join(&mapping.target);
            if !src.is_file() {
                events.log(format!("Module file not found: {}", src.display()));
                continue;
            }

            let result = dst
                .parent()
                .map(std::fs::create_dir_all)
                .unwrap_or(Ok(()))
                .and_then(|_| std::fs::copy(&src, &dst));
            match result {
                Ok(_) => {
                    tracing::info!("[Provision] Replaced {}", dst.display());
                    events.log(format!("Successfully replaced: {}", dst.display()));
                }
                Err(e) => {
                    tracing::warn!("[Provision] Replacement of {} failed: {}", dst.display(), e);
                    events.log(format!("Replacement failed: {}", e));
                }
            }
        }
    }
}

/// stderr 줄을 로그로 전달하고 마지막 몇 줄을 반환
async fn forward_stderr(stderr: tokio::process::ChildStderr, events: EventSink) -> String {
    const TAIL: usize = 5;
    let mut tail: Vec<String> = Vec::new();
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        events.log(line.clone());
        tail.push(line);
        if tail.len() > TAIL {
            tail.remove(0);
        }
    }
    tail.join("\n")
}

impl Worker for ProvisionWorker {
    fn name(&self) -> &'static str {
        "Provision"
    }

    async fn run(self, ctx: WorkerContext) -> Result<WorkerOutput> {
        ctx.check_cancelled()?;
        let venv_dir = self.venv_dir();

        self.create_venv(&ctx, &venv_dir).await?;
        ctx.events().progress(VENV_READY_PROGRESS);
        ctx.check_cancelled()?;

        let python = venv_python(&venv_dir);
        if !python.exists() {
            return Err(LauncherError::subprocess(
                &python,
                "virtual environment interpreter not found",
            ));
        }
        if !self.requirements.is_file() {
            return Err(LauncherError::fs(
                "open",
                &self.requirements,
                "requirements file not found",
            ));
        }

        self.pip_install(&ctx, &python).await?;
        ctx.check_cancelled()?;

        ctx.events().log("Starting module file replacement");
        self.replace_assets(ctx.events(), &venv_dir);

        tracing::info!("[Provision] Environment ready: {}", python.display());
        Ok(WorkerOutput::Provisioned(python))
    }
}
