//! 설치/업데이트 파이프라인 컨트롤러
//!
//! ## 단계
//! ```text
//! Start → CheckLauncherVersion → ResolveExistingInstall ─┬─────────────────────────────→ CheckApplicationVersion
//!                                                         └→ PickInstallPath → CheckRuntime
//! CheckRuntime ─┬→ DownloadRuntime → InstallRuntime ─┐
//!               └────────────────────────────────────┴→ DownloadApplication → ExtractApplication
//!   → ProvisionDependencies → RegisterInstall → CheckApplicationVersion ─┬→ LaunchApplication
//!                                                                       └→ PromptUpdate ─┬→ DownloadApplication
//!                                                                                        └→ LaunchApplication
//! ```
//! 어느 단계에서든 `FatalError` 또는 `Cancelled`로 끝날 수 있습니다.
//!
//! ## 규칙
//! - 워커는 `WorkerSlot`을 통해 한 번에 하나만 실행
//! - 설치 기록은 단계가 성공한 뒤에만 저장 (읽기 실패는 신규 설치로 간주, 쓰기 실패는 치명적)
//! - 메타데이터는 실행당 한 번 가져온 불변 스냅샷
//! - 임시 작업 디렉터리는 성공/실패와 관계없이 항상 삭제

use std::future::Future;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::download::{http_client, DownloadWorker};
use crate::error::{LauncherError, Result};
use crate::event::{WorkerEvent, WorkerOutput};
use crate::extract::ExtractWorker;
use crate::launch::{ApplicationLauncher, LaunchSpec, ProcessLauncher};
use crate::metadata::{version_string, HttpMetadataSource, MetadataSource, ReleaseSource, RemoteMetadata};
use crate::presenter::Presenter;
use crate::process::{runtime_executable, venv_python};
use crate::provision::ProvisionWorker;
use crate::runtime::{RuntimeInstaller, RuntimeProbe};
use crate::settings::LauncherSettings;
use crate::state::{ConfigStore, InstallState};
use crate::worker::{Worker, WorkerSlot};
use crate::LAUNCHER_VERSION;

// ─── 단계 ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    Start,
    CheckLauncherVersion,
    ResolveExistingInstall,
    PickInstallPath,
    CheckRuntime,
    DownloadRuntime,
    InstallRuntime,
    DownloadApplication,
    ExtractApplication,
    ProvisionDependencies,
    RegisterInstall,
    CheckApplicationVersion,
    PromptUpdate,
    LaunchApplication,
    FatalError,
    Cancelled,
    /// 오류 없이 조기 종료 (런처 구버전, 경로 선택 중단)
    Exited,
}

impl PipelineStep {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::FatalError | Self::Cancelled | Self::Exited)
    }

    pub fn can_transition(self, to: PipelineStep) -> bool {
        use PipelineStep::*;
        if matches!(to, FatalError | Cancelled) {
            return !self.is_terminal();
        }
        matches!(
            (self, to),
            (Start, CheckLauncherVersion)
                | (CheckLauncherVersion, ResolveExistingInstall)
                | (CheckLauncherVersion, Exited)
                | (ResolveExistingInstall, CheckApplicationVersion)
                | (ResolveExistingInstall, PickInstallPath)
                | (PickInstallPath, CheckRuntime)
                | (PickInstallPath, Exited)
                | (CheckRuntime, DownloadApplication)
                | (CheckRuntime, DownloadRuntime)
                | (DownloadRuntime, InstallRuntime)
                | (InstallRuntime, DownloadApplication)
                | (DownloadApplication, ExtractApplication)
                | (ExtractApplication, ProvisionDependencies)
                | (ProvisionDependencies, RegisterInstall)
                | (RegisterInstall, CheckApplicationVersion)
                | (CheckApplicationVersion, PromptUpdate)
                | (CheckApplicationVersion, LaunchApplication)
                | (PromptUpdate, DownloadApplication)
                | (PromptUpdate, LaunchApplication)
        )
    }
}

/// 파이프라인 최종 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    Launched,
    LauncherOutdated,
    /// 설치 경로 선택 중단
    Aborted,
    Cancelled,
    Failed(LauncherError),
}

impl PipelineOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Failed(_) => 1,
            _ => 0,
        }
    }
}

enum Next {
    Step(PipelineStep),
    Done(PipelineOutcome),
}

/// 한 번의 실행 동안 단계 사이에 전달되는 값
#[derive(Default)]
struct RunContext {
    metadata: Option<RemoteMetadata>,
    install: InstallState,
    install_root: Option<PathBuf>,
    runtime: Option<PathBuf>,
    runtime_installer: Option<PathBuf>,
    archive: Option<PathBuf>,
    pending_update: Option<(String, String)>,
    installed_this_run: bool,
    suppress_announcement: bool,
}

impl RunContext {
    fn install_root(&self) -> Result<&Path> {
        self.install_root
            .as_deref()
            .ok_or_else(|| LauncherError::Config("install path has not been selected".to_string()))
    }

    fn runtime(&self) -> Result<&Path> {
        self.runtime
            .as_deref()
            .ok_or_else(|| LauncherError::Config("runtime path is unknown".to_string()))
    }
}

// ─── 보조 함수 ───────────────────────────────────────────

/// 설치 기록 저장. 같은 값으로 여러 번 호출해도 결과가 같음
pub fn register_install(store: &dyn ConfigStore, state: &InstallState) -> Result<()> {
    store.save(state).map_err(|e| match e {
        LauncherError::Config(_) => e,
        other => LauncherError::Config(format!("failed to save install record: {}", other)),
    })?;
    tracing::info!(
        "[Store] Registered install at {} (runtime {})",
        state.install_path().map(|p| p.display().to_string()).unwrap_or_default(),
        state.runtime_path().map(|p| p.display().to_string()).unwrap_or_default()
    );
    Ok(())
}

/// 설치본의 설정 파일에서 로컬 앱 버전을 읽음. 없거나 읽을 수 없으면 `None`
pub fn read_local_version(app_dir: &Path, settings: &LauncherSettings) -> Option<String> {
    let path = app_dir.join(&settings.version_file);
    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) => {
            tracing::info!("[Pipeline] No local version at {}: {}", path.display(), e);
            return None;
        }
    };
    let value: serde_json::Value = match serde_json::from_str(&text) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("[Pipeline] Error reading local config {}: {}", path.display(), e);
            return None;
        }
    };
    version_string(value.get(&settings.version_key)?)
}

async fn cancellable<F: Future>(cancel: &CancellationToken, fut: F) -> Result<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(LauncherError::Cancelled),
        out = fut => Ok(out),
    }
}

// ─── 컨트롤러 ───────────────────────────────────────────

pub struct Pipeline {
    settings: LauncherSettings,
    store: Box<dyn ConfigStore>,
    presenter: Box<dyn Presenter>,
    metadata: Box<dyn MetadataSource>,
    launcher: Box<dyn ApplicationLauncher>,
    release: ReleaseSource,
    client: reqwest::Client,
    cancel: CancellationToken,
    slot: WorkerSlot,
    step: PipelineStep,
    history: Vec<PipelineStep>,
    log_dir: PathBuf,
    launch_args: Vec<String>,
    scratch: Option<TempDir>,
}

impl Pipeline {
    pub fn new(
        settings: LauncherSettings,
        store: Box<dyn ConfigStore>,
        presenter: Box<dyn Presenter>,
    ) -> Result<Self> {
        let client = http_client(settings.request_timeout())?;
        let metadata = Box::new(HttpMetadataSource::from_settings(client.clone(), &settings));
        let launcher = Box::new(ProcessLauncher::new(settings.launch_grace()));
        let release = ReleaseSource::from_settings(&settings);
        let log_dir = match &settings.log_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()
                .map(|d| d.join("logs"))
                .unwrap_or_else(|_| PathBuf::from("logs")),
        };

        Ok(Self {
            slot: WorkerSlot::new(settings.stop_grace()),
            settings,
            store,
            presenter,
            metadata,
            launcher,
            release,
            client,
            cancel: CancellationToken::new(),
            step: PipelineStep::Start,
            history: vec![PipelineStep::Start],
            log_dir,
            launch_args: Vec::new(),
            scratch: None,
        })
    }

    pub fn with_metadata(mut self, source: impl MetadataSource + 'static) -> Self {
        self.metadata = Box::new(source);
        self
    }

    pub fn with_launcher(mut self, launcher: impl ApplicationLauncher + 'static) -> Self {
        self.launcher = Box::new(launcher);
        self
    }

    pub fn with_release_source(mut self, release: ReleaseSource) -> Self {
        self.release = release;
        self
    }

    /// 앱에 추가로 넘길 인자 (예: `-log`)
    pub fn with_launch_args(mut self, args: Vec<String>) -> Self {
        self.launch_args = args;
        self
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// 사용자 취소 토큰. `cancel()` 호출 시 현재 단계를 중단하고 종료
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn current_step(&self) -> PipelineStep {
        self.step
    }

    pub fn history(&self) -> &[PipelineStep] {
        &self.history
    }

    pub async fn run(&mut self) -> PipelineOutcome {
        tracing::info!("[Pipeline] Starting launcher (version {})", LAUNCHER_VERSION);

        let result = match self.prepare_scratch() {
            Ok(()) => self.drive().await,
            Err(e) => Err(e),
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => self.fail(e).await,
        };

        self.slot.stop_active().await;
        self.clean_scratch();
        tracing::info!("[Pipeline] Finished: {:?}", outcome);
        outcome
    }

    fn enter(&mut self, step: PipelineStep) {
        if !self.step.can_transition(step) {
            tracing::error!("[Pipeline] Unexpected transition {:?} -> {:?}", self.step, step);
        }
        tracing::info!("[Pipeline] {:?} -> {:?}", self.step, step);
        self.step = step;
        self.history.push(step);
    }

    async fn drive(&mut self) -> Result<PipelineOutcome> {
        let mut ctx = RunContext::default();
        let mut step = PipelineStep::CheckLauncherVersion;

        loop {
            if self.cancel.is_cancelled() {
                return Err(LauncherError::Cancelled);
            }
            self.enter(step);

            let next = match step {
                PipelineStep::CheckLauncherVersion => self.check_launcher_version(&mut ctx).await?,
                PipelineStep::ResolveExistingInstall => self.resolve_existing_install(&mut ctx),
                PipelineStep::PickInstallPath => self.pick_install_path(&mut ctx),
                PipelineStep::CheckRuntime => self.check_runtime(&mut ctx).await?,
                PipelineStep::DownloadRuntime => self.download_runtime(&mut ctx).await?,
                PipelineStep::InstallRuntime => self.install_runtime(&mut ctx).await?,
                PipelineStep::DownloadApplication => self.download_application(&mut ctx).await?,
                PipelineStep::ExtractApplication => self.extract_application(&mut ctx).await?,
                PipelineStep::ProvisionDependencies => self.provision_dependencies(&mut ctx).await?,
                PipelineStep::RegisterInstall => self.register(&mut ctx)?,
                PipelineStep::CheckApplicationVersion => self.check_application_version(&mut ctx)?,
                PipelineStep::PromptUpdate => self.prompt_update(&mut ctx)?,
                PipelineStep::LaunchApplication => self.launch_application(&ctx).await?,
                PipelineStep::Start
                | PipelineStep::FatalError
                | PipelineStep::Cancelled
                | PipelineStep::Exited => {
                    return Err(LauncherError::Config(format!("cannot resume from {:?}", step)))
                }
            };

            match next {
                Next::Step(s) => step = s,
                Next::Done(outcome) => {
                    if matches!(outcome, PipelineOutcome::LauncherOutdated | PipelineOutcome::Aborted) {
                        self.enter(PipelineStep::Exited);
                    }
                    return Ok(outcome);
                }
            }
        }
    }

    async fn fail(&mut self, error: LauncherError) -> PipelineOutcome {
        let failed_at = self.step;
        self.slot.stop_active().await;
        self.presenter.end_step();

        if error.is_cancelled() {
            self.enter(PipelineStep::Cancelled);
            tracing::info!("[Pipeline] Cancelled by user during {:?}", failed_at);
            self.presenter.show_info(error.title(), &error.to_string());
            PipelineOutcome::Cancelled
        } else {
            self.enter(PipelineStep::FatalError);
            tracing::error!("[Pipeline] {:?} failed ({}): {}", failed_at, error.kind(), error);
            self.presenter.show_error(error.title(), &error.to_string());
            PipelineOutcome::Failed(error)
        }
    }

    // ─── 임시 디렉터리 ──────────────────────────────────

    fn prepare_scratch(&mut self) -> Result<()> {
        let dir = tempfile::Builder::new()
            .prefix("exvr-launcher-")
            .tempdir()
            .map_err(|e| LauncherError::fs("create_dir", &std::env::temp_dir(), e))?;
        tracing::debug!("[Pipeline] Scratch directory {}", dir.path().display());
        self.scratch = Some(dir);
        Ok(())
    }

    fn scratch_path(&self) -> Result<PathBuf> {
        self.scratch
            .as_ref()
            .map(|d| d.path().to_path_buf())
            .ok_or_else(|| LauncherError::fs("open", Path::new("<scratch>"), "scratch directory already removed"))
    }

    fn clean_scratch(&mut self) {
        if let Some(dir) = self.scratch.take() {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => tracing::debug!("[Pipeline] Removed scratch directory {}", path.display()),
                Err(e) => tracing::warn!("[Pipeline] Failed to remove {}: {}", path.display(), e),
            }
        }
    }

    // ─── 워커 실행 ──────────────────────────────────────

    /// 워커를 시작하고 종료 이벤트까지 대기. 대기 중에도 사용자 취소에 반응
    async fn run_worker<W: Worker>(&mut self, worker: W, title: &str, label: &str) -> Result<WorkerOutput> {
        let tag = worker.name();
        let cancel = self.cancel.clone();
        self.presenter.begin_step(title, label);
        let mut rx = self.slot.start(worker).await;

        let result = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Err(LauncherError::Cancelled),
                event = rx.recv() => match event {
                    Some(WorkerEvent::Progress(p)) => self.presenter.progress(p),
                    Some(WorkerEvent::Log(line)) => tracing::info!("[{}] {}", tag, line),
                    Some(WorkerEvent::Finished(output)) => break Ok(output),
                    Some(WorkerEvent::Failed(e)) => break Err(e),
                    None => {
                        break Err(LauncherError::subprocess(
                            tag,
                            "worker stopped without reporting a result",
                        ))
                    }
                },
            }
        };

        match &result {
            Ok(_) => {
                self.slot.release().await;
                self.presenter.end_step();
            }
            Err(_) => {
                self.slot.stop_active().await;
            }
        }
        result
    }

    // ─── 단계 구현 ──────────────────────────────────────

    async fn check_launcher_version(&mut self, ctx: &mut RunContext) -> Result<Next> {
        ctx.metadata = cancellable(&self.cancel, self.metadata.fetch()).await?;

        if let Some(meta) = &ctx.metadata {
            if meta.launcher_outdated(LAUNCHER_VERSION) {
                tracing::warn!(
                    "[Pipeline] Launcher update required (remote {:?}, local {})",
                    meta.launcher_version,
                    LAUNCHER_VERSION
                );
                self.presenter.show_launcher_notice(meta.launcher_announcement.as_deref());
                return Ok(Next::Done(PipelineOutcome::LauncherOutdated));
            }
        }
        Ok(Next::Step(PipelineStep::ResolveExistingInstall))
    }

    fn resolve_existing_install(&mut self, ctx: &mut RunContext) -> Next {
        ctx.install = match self.store.load() {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!("[Store] Failed to read install record, treating as new install: {}", e);
                InstallState::default()
            }
        };

        let root = match (ctx.install.is_complete(), ctx.install.install_path.clone()) {
            (true, Some(root)) => root,
            _ => {
                if ctx.install.runtime_path.is_some() {
                    tracing::info!("[Pipeline] Previous installation stopped after the runtime step, resuming");
                } else {
                    tracing::info!("[Pipeline] No existing installation found");
                }
                return Next::Step(PipelineStep::PickInstallPath);
            }
        };

        let entry = self.settings.app_dir(&root).join(&self.settings.entry_point);
        if !entry.is_file() {
            // 기록은 있지만 앱 파일이 없음: 런타임 경로만 남기고 설치를 다시 진행
            tracing::warn!(
                "[Pipeline] Recorded installation at {} has no {}, reinstalling",
                root.display(),
                entry.display()
            );
            ctx.install.install_path = None;
            return Next::Step(PipelineStep::PickInstallPath);
        }

        tracing::info!("[Pipeline] Found existing installation at {}", root.display());
        ctx.runtime = ctx.install.runtime_path.clone();
        ctx.install_root = Some(root);
        Next::Step(PipelineStep::CheckApplicationVersion)
    }

    fn pick_install_path(&mut self, ctx: &mut RunContext) -> Next {
        match self.presenter.pick_install_path() {
            Some(path) => {
                tracing::info!("[Pipeline] Selected installation path: {}", path.display());
                ctx.install_root = Some(path);
                Next::Step(PipelineStep::CheckRuntime)
            }
            None => {
                tracing::info!("[Pipeline] Installation cancelled at path selection");
                Next::Done(PipelineOutcome::Aborted)
            }
        }
    }

    async fn check_runtime(&mut self, ctx: &mut RunContext) -> Result<Next> {
        let candidate = match &ctx.install.runtime_path {
            Some(path) => path.clone(),
            None => runtime_executable(&self.settings.runtime_dir(ctx.install_root()?)),
        };

        self.presenter.begin_step("Check", "Checking Python installation...");
        let probe = RuntimeProbe::new(&self.settings.runtime_version, self.settings.probe_timeout());
        let usable = cancellable(&self.cancel, probe.is_usable(&candidate)).await?;
        self.presenter.end_step();

        if usable {
            tracing::info!("[Pipeline] Python {} is installed, proceeding with download", self.settings.runtime_version);
            ctx.runtime = Some(candidate);
            Ok(Next::Step(PipelineStep::DownloadApplication))
        } else {
            tracing::info!("[Pipeline] Python {} not found, installing", self.settings.runtime_version);
            Ok(Next::Step(PipelineStep::DownloadRuntime))
        }
    }

    async fn download_runtime(&mut self, ctx: &mut RunContext) -> Result<Next> {
        let dest = self.scratch_path()?.join("python_installer.exe");
        let worker = DownloadWorker::new(self.client.clone(), self.settings.runtime_download_url.clone(), dest)
            .with_read_timeout(self.settings.request_timeout());
        let label = format!("Downloading Python {}...", self.settings.runtime_version);

        let output = self.run_worker(worker, "Download Python", &label).await?;
        ctx.runtime_installer = Some(output.into_path());
        Ok(Next::Step(PipelineStep::InstallRuntime))
    }

    async fn install_runtime(&mut self, ctx: &mut RunContext) -> Result<Next> {
        let installer = ctx
            .runtime_installer
            .clone()
            .ok_or_else(|| LauncherError::Config("runtime installer was not downloaded".to_string()))?;
        let root = ctx.install_root()?.to_path_buf();
        let target = self.settings.runtime_dir(&root);

        self.presenter.begin_step("Install Python", "Installing Python...");
        let exe = RuntimeInstaller::default().install(&installer, &target, &self.cancel).await?;
        self.presenter.end_step();

        // 앱 배치 전이므로 런타임 경로만 기록. 설치 경로는 RegisterInstall에서 추가
        let state = InstallState::runtime_only(&exe);
        register_install(self.store.as_ref(), &state)?;
        ctx.install = state;
        ctx.runtime = Some(exe);
        Ok(Next::Step(PipelineStep::DownloadApplication))
    }

    async fn download_application(&mut self, ctx: &mut RunContext) -> Result<Next> {
        let url = cancellable(&self.cancel, self.release.resolve(&self.client)).await?;
        let dest = self.scratch_path()?.join("release.zip");
        let worker = DownloadWorker::new(self.client.clone(), url, dest)
            .with_read_timeout(self.settings.request_timeout());

        let output = self
            .run_worker(worker, "Download Application", "Downloading the latest version...")
            .await?;
        ctx.archive = Some(output.into_path());
        Ok(Next::Step(PipelineStep::ExtractApplication))
    }

    async fn extract_application(&mut self, ctx: &mut RunContext) -> Result<Next> {
        let archive = ctx
            .archive
            .clone()
            .ok_or_else(|| LauncherError::Archive("no archive was downloaded".to_string()))?;
        let app_dir = self.settings.app_dir(ctx.install_root()?);
        let extract_dir = self.scratch_path()?.join("extract");

        // 업데이트 루프에서 이전 추출 결과가 섞이지 않게 비움
        if extract_dir.exists() {
            std::fs::remove_dir_all(&extract_dir).map_err(|e| LauncherError::fs("remove_dir", &extract_dir, e))?;
        }

        let worker = ExtractWorker::new(archive, extract_dir, Some(app_dir), self.settings.ignored_folders.clone());
        self.run_worker(worker, "Extract files", "Unzipping application files...")
            .await?;
        Ok(Next::Step(PipelineStep::ProvisionDependencies))
    }

    async fn provision_dependencies(&mut self, ctx: &mut RunContext) -> Result<Next> {
        let app_dir = self.settings.app_dir(ctx.install_root()?);
        let requirements = app_dir.join(&self.settings.requirements_file);
        if !requirements.is_file() {
            tracing::info!("[Pipeline] Requirements file not found, skipping provisioning");
            return Ok(Next::Step(PipelineStep::RegisterInstall));
        }

        let runtime = ctx.runtime()?.to_path_buf();
        let worker = ProvisionWorker::new(
            &runtime,
            &app_dir,
            requirements,
            self.settings.package_index_url.clone(),
            self.settings.asset_mappings.clone(),
        );

        if worker.runtime_missing() {
            tracing::warn!("[Pipeline] Runtime {} is missing, resetting install record", runtime.display());
            if let Err(e) = self.store.delete() {
                tracing::warn!("[Store] Failed to delete install record: {}", e);
            }
            return Err(LauncherError::subprocess(&runtime, "Python interpreter not found in launcher configuration"));
        }

        self.run_worker(
            worker,
            "Install requirements",
            "Installing Python requirements... (Initial installation may be time-consuming).",
        )
        .await?;
        Ok(Next::Step(PipelineStep::RegisterInstall))
    }

    fn register(&mut self, ctx: &mut RunContext) -> Result<Next> {
        let state = InstallState::new(ctx.install_root()?, ctx.runtime()?);
        register_install(self.store.as_ref(), &state)?;
        ctx.install = state;
        ctx.installed_this_run = true;
        Ok(Next::Step(PipelineStep::CheckApplicationVersion))
    }

    fn check_application_version(&mut self, ctx: &mut RunContext) -> Result<Next> {
        if ctx.installed_this_run {
            tracing::info!("[Pipeline] Application was installed in this run, skipping version check");
            return Ok(Next::Step(PipelineStep::LaunchApplication));
        }

        let remote = match ctx.metadata.as_ref().and_then(|m| m.application_version.clone()) {
            Some(v) => v,
            None => {
                tracing::info!("[Pipeline] Remote version unavailable, running current version");
                return Ok(Next::Step(PipelineStep::LaunchApplication));
            }
        };

        let app_dir = self.settings.app_dir(ctx.install_root()?);
        let local = match read_local_version(&app_dir, &self.settings) {
            Some(v) => v,
            None => {
                tracing::info!("[Pipeline] Local version unknown, running current version");
                return Ok(Next::Step(PipelineStep::LaunchApplication));
            }
        };

        if local == remote {
            tracing::info!("[Pipeline] Application is up to date ({})", local);
            ctx.suppress_announcement = true;
            Ok(Next::Step(PipelineStep::LaunchApplication))
        } else {
            tracing::info!("[Pipeline] Update available: local={}, remote={}", local, remote);
            ctx.pending_update = Some((local, remote));
            Ok(Next::Step(PipelineStep::PromptUpdate))
        }
    }

    fn prompt_update(&mut self, ctx: &mut RunContext) -> Result<Next> {
        let (local, remote) = ctx
            .pending_update
            .take()
            .ok_or_else(|| LauncherError::Config("no pending update to confirm".to_string()))?;

        if self.presenter.confirm_update(&local, &remote) {
            tracing::info!("[Pipeline] User chose to update to {}", remote);
            Ok(Next::Step(PipelineStep::DownloadApplication))
        } else {
            tracing::info!("[Pipeline] User declined update, running {}", local);
            ctx.suppress_announcement = true;
            Ok(Next::Step(PipelineStep::LaunchApplication))
        }
    }

    async fn launch_application(&mut self, ctx: &RunContext) -> Result<Next> {
        self.clean_scratch();

        if !ctx.suppress_announcement {
            match ctx.metadata.as_ref().and_then(|m| m.board.as_ref()) {
                Some(board) => self.presenter.show_announcement(board),
                None => tracing::debug!("[Pipeline] No announcement board"),
            }
        }

        let app_dir = self.settings.app_dir(ctx.install_root()?);
        let spec = LaunchSpec {
            program: venv_python(&app_dir.join("venv")),
            entry_point: app_dir.join(&self.settings.entry_point),
            working_dir: app_dir.clone(),
            log_dir: self.log_dir.clone(),
            extra_args: self.launch_args.clone(),
        };

        cancellable(&self.cancel, self.launcher.launch(&spec)).await??;
        tracing::info!("[Pipeline] Application launched, exiting launcher");
        Ok(Next::Done(PipelineOutcome::Launched))
    }
}
