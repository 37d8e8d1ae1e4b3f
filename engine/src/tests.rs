//! 파이프라인 시나리오 테스트
//!
//! ## 테스트 시나리오
//! 1. 버전 일치: 확인 창 없이 바로 실행
//! 2. 업데이트 거절: 기존 설치본 실행, 공지 생략
//! 3. 런처 구버전: 안내 후 종료
//! 4. 경로 선택 중단: 오류 없이 종료
//! 5. 메타데이터 없음 / 로컬 버전 없음: 실행 (fail open)
//! 6. 설치 기록: 읽기 실패는 신규 설치, 등록은 멱등, 앱 파일 없는 기록은 재설치
//! 7. 신규 설치 전체 흐름 (로컬 HTTP 서버 + 가짜 런타임)

use crate::{
    ApplicationLauncher, Board, ConfigStore, InstallState, LaunchSpec, LauncherError, LauncherSettings,
    MemoryStore, Pipeline, PipelineOutcome, PipelineStep, Presenter, ReleaseSource, RemoteMetadata,
    StaticMetadata,
};
use futures_util::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

// ═══════════════════════════════════════════════════════
// 테스트용 협력 객체
// ═══════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct PresenterLog {
    prompts: Vec<(String, String)>,
    announcements: Vec<String>,
    launcher_notices: Vec<Option<String>>,
    steps: Vec<String>,
    progress: Vec<u8>,
    errors: Vec<String>,
    infos: Vec<String>,
    path_requests: usize,
}

struct ScriptedPresenter {
    log: Arc<Mutex<PresenterLog>>,
    install_path: Option<PathBuf>,
    accept_update: bool,
    cancel_on_progress: Option<CancellationToken>,
}

impl ScriptedPresenter {
    fn new(log: Arc<Mutex<PresenterLog>>) -> Self {
        Self {
            log,
            install_path: None,
            accept_update: false,
            cancel_on_progress: None,
        }
    }
}

impl Presenter for ScriptedPresenter {
    fn pick_install_path(&mut self) -> Option<PathBuf> {
        self.log.lock().unwrap().path_requests += 1;
        self.install_path.clone()
    }

    fn confirm_update(&mut self, local_version: &str, remote_version: &str) -> bool {
        self.log
            .lock()
            .unwrap()
            .prompts
            .push((local_version.to_string(), remote_version.to_string()));
        self.accept_update
    }

    fn show_launcher_notice(&mut self, announcement: Option<&str>) {
        self.log
            .lock()
            .unwrap()
            .launcher_notices
            .push(announcement.map(str::to_string));
    }

    fn show_announcement(&mut self, board: &Board) {
        self.log.lock().unwrap().announcements.push(board.title.clone());
    }

    fn begin_step(&mut self, title: &str, _label: &str) {
        self.log.lock().unwrap().steps.push(title.to_string());
    }

    fn progress(&mut self, percent: u8) {
        self.log.lock().unwrap().progress.push(percent);
        if let Some(token) = &self.cancel_on_progress {
            token.cancel();
        }
    }

    fn end_step(&mut self) {}

    fn show_error(&mut self, _title: &str, message: &str) {
        self.log.lock().unwrap().errors.push(message.to_string());
    }

    fn show_info(&mut self, _title: &str, message: &str) {
        self.log.lock().unwrap().infos.push(message.to_string());
    }
}

#[derive(Clone, Default)]
struct RecordingLauncher {
    launched: Arc<Mutex<Vec<LaunchSpec>>>,
}

impl ApplicationLauncher for RecordingLauncher {
    fn launch<'a>(&'a self, spec: &'a LaunchSpec) -> BoxFuture<'a, crate::Result<()>> {
        Box::pin(async move {
            self.launched.lock().unwrap().push(spec.clone());
            Ok(())
        })
    }
}

/// 읽기/쓰기 실패를 흉내내는 저장소
struct BrokenStore {
    fail_load: bool,
    inner: MemoryStore,
}

impl ConfigStore for BrokenStore {
    fn load(&self) -> crate::Result<InstallState> {
        if self.fail_load {
            return Err(LauncherError::Config("unreadable record".into()));
        }
        self.inner.load()
    }

    fn save(&self, _state: &InstallState) -> crate::Result<()> {
        Err(LauncherError::fs("write", Path::new("exvr_config.json"), "read-only file system"))
    }

    fn delete(&self) -> crate::Result<()> {
        self.inner.delete()
    }
}

fn metadata(version: &str) -> RemoteMetadata {
    RemoteMetadata {
        launcher_version: Some(1),
        launcher_announcement: None,
        application_version: Some(version.to_string()),
        board: Some(Board {
            title: "News".to_string(),
            text: "<b>hello</b>".to_string(),
        }),
    }
}

/// 기존 설치본 (로컬 버전 파일 포함)
fn existing_install(local_version: Option<&str>) -> (TempDir, InstallState) {
    let root = TempDir::new().unwrap();
    let app = root.path().join("exvr");
    std::fs::create_dir_all(app.join("settings")).unwrap();
    std::fs::write(app.join("main.py"), "print('exvr')").unwrap();
    if let Some(v) = local_version {
        std::fs::write(app.join("settings/config.json"), format!(r#"{{"Version": "{}"}}"#, v)).unwrap();
    }
    let state = InstallState::new(root.path(), root.path().join("python/python.exe"));
    (root, state)
}

struct Harness {
    pipeline: Pipeline,
    log: Arc<Mutex<PresenterLog>>,
    launcher: RecordingLauncher,
}

fn harness(
    store: Box<dyn ConfigStore>,
    presenter: impl FnOnce(ScriptedPresenter) -> ScriptedPresenter,
    meta: Option<RemoteMetadata>,
) -> Harness {
    let log = Arc::new(Mutex::new(PresenterLog::default()));
    let launcher = RecordingLauncher::default();
    let settings = LauncherSettings {
        launch_grace_ms: 10,
        stop_grace_ms: 500,
        ..Default::default()
    };
    let pipeline = Pipeline::new(settings, store, Box::new(presenter(ScriptedPresenter::new(log.clone()))))
        .unwrap()
        .with_metadata(StaticMetadata(meta))
        .with_launcher(launcher.clone())
        .with_release_source(ReleaseSource::Fixed("http://127.0.0.1:1/unused.zip".into()));
    Harness { pipeline, log, launcher }
}

// ═══════════════════════════════════════════════════════
// 테스트 1: 버전 일치
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn test_matching_version_launches_without_prompt() {
    let (root, state) = existing_install(Some("1.2.0"));
    let mut h = harness(Box::new(MemoryStore::with_state(state)), |p| p, Some(metadata("1.2.0")));

    let outcome = h.pipeline.run().await;
    assert_eq!(outcome, PipelineOutcome::Launched);

    let log = h.log.lock().unwrap();
    assert!(log.prompts.is_empty(), "no update prompt expected");
    assert!(log.announcements.is_empty(), "up-to-date install suppresses the board");

    let launched = h.launcher.launched.lock().unwrap();
    assert_eq!(launched.len(), 1);
    assert_eq!(launched[0].working_dir, root.path().join("exvr"));
    assert_eq!(launched[0].entry_point, root.path().join("exvr").join("main.py"));

    assert_eq!(
        h.pipeline.history(),
        &[
            PipelineStep::Start,
            PipelineStep::CheckLauncherVersion,
            PipelineStep::ResolveExistingInstall,
            PipelineStep::CheckApplicationVersion,
            PipelineStep::LaunchApplication,
        ]
    );
    println!("✓ 버전 일치 시 바로 실행");
}

// ═══════════════════════════════════════════════════════
// 테스트 2: 업데이트 거절
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn test_declined_update_runs_existing_install_without_board() {
    let (_root, state) = existing_install(Some("1.2.0"));
    let mut h = harness(
        Box::new(MemoryStore::with_state(state)),
        |mut p| {
            p.accept_update = false;
            p
        },
        Some(metadata("1.3.0")),
    );

    let outcome = h.pipeline.run().await;
    assert_eq!(outcome, PipelineOutcome::Launched);

    let log = h.log.lock().unwrap();
    assert_eq!(log.prompts, vec![("1.2.0".to_string(), "1.3.0".to_string())]);
    assert!(log.announcements.is_empty());
    assert!(log.steps.is_empty(), "no worker should have been started");
    assert_eq!(h.launcher.launched.lock().unwrap().len(), 1);
    assert!(h.pipeline.history().contains(&PipelineStep::PromptUpdate));
    assert!(!h.pipeline.history().contains(&PipelineStep::DownloadApplication));
    println!("✓ 업데이트 거절 시 기존 버전 실행");
}

// ═══════════════════════════════════════════════════════
// 테스트 3: 런처 구버전
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn test_outdated_launcher_stops_before_anything_else() {
    let (_root, state) = existing_install(Some("1.2.0"));
    let mut meta = metadata("1.2.0");
    meta.launcher_version = Some(crate::LAUNCHER_VERSION + 1);
    meta.launcher_announcement = Some("download the new launcher".into());

    let mut h = harness(Box::new(MemoryStore::with_state(state)), |p| p, Some(meta));
    let outcome = h.pipeline.run().await;

    assert_eq!(outcome, PipelineOutcome::LauncherOutdated);
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(
        h.log.lock().unwrap().launcher_notices,
        vec![Some("download the new launcher".to_string())]
    );
    assert!(h.launcher.launched.lock().unwrap().is_empty());
    assert_eq!(h.pipeline.current_step(), PipelineStep::Exited);
    println!("✓ 런처 구버전 안내 후 종료");
}

// ═══════════════════════════════════════════════════════
// 테스트 4: 경로 선택 중단
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn test_aborted_path_selection_exits_cleanly() {
    let store = MemoryStore::new();
    let mut h = harness(Box::new(store), |p| p, None);

    let outcome = h.pipeline.run().await;
    assert_eq!(outcome, PipelineOutcome::Aborted);

    let log = h.log.lock().unwrap();
    assert_eq!(log.path_requests, 1);
    assert!(log.errors.is_empty());
    assert!(h.launcher.launched.lock().unwrap().is_empty());
    println!("✓ 경로 선택 중단");
}

// ═══════════════════════════════════════════════════════
// 테스트 5: fail open
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn test_missing_metadata_or_local_version_still_launches() {
    let (_root, state) = existing_install(Some("1.2.0"));
    let mut h = harness(Box::new(MemoryStore::with_state(state)), |p| p, None);
    assert_eq!(h.pipeline.run().await, PipelineOutcome::Launched);
    assert!(h.log.lock().unwrap().prompts.is_empty());

    let (_root, state) = existing_install(None);
    let mut h = harness(Box::new(MemoryStore::with_state(state)), |p| p, Some(metadata("9.9.9")));
    assert_eq!(h.pipeline.run().await, PipelineOutcome::Launched);
    let log = h.log.lock().unwrap();
    assert!(log.prompts.is_empty());
    // 버전을 모르면 공지는 그대로 표시
    assert_eq!(log.announcements, vec!["News".to_string()]);
    println!("✓ 메타데이터/로컬 버전 없음 → 실행");
}

// ═══════════════════════════════════════════════════════
// 테스트 6: 설치 기록
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn test_unreadable_record_is_treated_as_new_install() {
    let store = BrokenStore {
        fail_load: true,
        inner: MemoryStore::new(),
    };
    let mut h = harness(Box::new(store), |p| p, None);

    assert_eq!(h.pipeline.run().await, PipelineOutcome::Aborted);
    assert_eq!(h.log.lock().unwrap().path_requests, 1);
    assert!(h.pipeline.history().contains(&PipelineStep::PickInstallPath));
    println!("✓ 기록 읽기 실패 → 신규 설치 흐름");
}

#[tokio::test]
async fn test_record_without_app_files_is_not_an_existing_install() {
    let root = TempDir::new().unwrap();
    let state = InstallState::new(root.path(), root.path().join("python/python.exe"));
    let mut h = harness(Box::new(MemoryStore::with_state(state)), |p| p, Some(metadata("1.2.0")));

    assert_eq!(h.pipeline.run().await, PipelineOutcome::Aborted);
    assert_eq!(h.log.lock().unwrap().path_requests, 1);
    assert!(h.pipeline.history().contains(&PipelineStep::PickInstallPath));
    assert!(!h.pipeline.history().contains(&PipelineStep::CheckApplicationVersion));
    assert!(h.launcher.launched.lock().unwrap().is_empty());
    println!("✓ 앱 파일 없는 기록 → 설치 재진행");
}

#[tokio::test]
async fn test_runtime_only_record_asks_for_install_path() {
    let state = InstallState::runtime_only("/opt/exvr-root/python/python.exe");
    let mut h = harness(Box::new(MemoryStore::with_state(state)), |p| p, None);

    assert_eq!(h.pipeline.run().await, PipelineOutcome::Aborted);
    assert_eq!(h.log.lock().unwrap().path_requests, 1);
    println!("✓ 런타임만 기록된 상태 → 경로 선택부터");
}

#[test]
fn test_registration_is_idempotent() {
    let store = MemoryStore::new();
    let state = InstallState::new("/opt/exvr-root", "/opt/exvr-root/python/python.exe");

    crate::register_install(&store, &state).unwrap();
    let first = store.snapshot();
    crate::register_install(&store, &state).unwrap();
    let second = store.snapshot();

    assert_eq!(first, Some(state));
    assert_eq!(first, second);
}

#[test]
fn test_registration_write_failure_is_config_error() {
    let store = BrokenStore {
        fail_load: false,
        inner: MemoryStore::new(),
    };
    let err = crate::register_install(&store, &InstallState::new("/a", "/b")).unwrap_err();
    assert_eq!(err.kind(), crate::ErrorKind::Config);
}

// ═══════════════════════════════════════════════════════
// 테스트 7: 신규 설치 전체 흐름
// ═══════════════════════════════════════════════════════

#[cfg(unix)]
mod first_install {
    use super::*;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn release_zip() -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let options = zip::write::FileOptions::default();
            zip.add_directory("ExVR-main/", options).unwrap();
            zip.start_file("ExVR-main/main.py", options).unwrap();
            zip.write_all(b"print('exvr')").unwrap();
            zip.start_file("ExVR-main/settings/config.json", options).unwrap();
            zip.write_all(br#"{"Version": "1.3.0"}"#).unwrap();
            zip.finish().unwrap();
        }
        buf.into_inner()
    }

    /// 요청마다 같은 아카이브를 돌려주는 서버
    async fn serve_archive(body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let body = body.clone();
                tokio::spawn(async move {
                    let mut req = [0u8; 2048];
                    let _ = socket.read(&mut req).await;
                    let header = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/zip\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        body.len()
                    );
                    let _ = socket.write_all(header.as_bytes()).await;
                    let _ = socket.write_all(&body).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{}/release.zip", addr)
    }

    /// `<root>/python/bin/python3` 위치의 가짜 런타임
    fn fake_runtime(root: &Path) -> PathBuf {
        let bin = root.join("python/bin");
        std::fs::create_dir_all(&bin).unwrap();
        let exe = bin.join("python3");
        std::fs::write(&exe, "#!/bin/sh\necho 'Python 3.11.9'\n").unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();
        exe
    }

    #[tokio::test]
    async fn test_first_install_downloads_extracts_registers_and_launches() {
        let root = TempDir::new().unwrap();
        let runtime = fake_runtime(root.path());
        let url = serve_archive(release_zip()).await;

        let store = Arc::new(MemoryStore::new());
        let mut h = harness(
            Box::new(SharedStore(store.clone())),
            |mut p| {
                p.install_path = Some(root.path().to_path_buf());
                p
            },
            Some(metadata("1.3.0")),
        );
        h.pipeline = h.pipeline.with_release_source(ReleaseSource::Fixed(url));

        let outcome = h.pipeline.run().await;
        assert_eq!(outcome, PipelineOutcome::Launched);

        // 단일 최상위 디렉터리는 벗겨져서 exvr/ 바로 아래에 배치
        let app = root.path().join("exvr");
        assert!(app.join("main.py").is_file());
        assert!(!app.join("ExVR-main").exists());

        assert_eq!(store.snapshot(), Some(InstallState::new(root.path(), &runtime)));

        let log = h.log.lock().unwrap();
        assert!(log.steps.contains(&"Download Application".to_string()));
        assert!(log.steps.contains(&"Extract files".to_string()));
        assert!(log.prompts.is_empty(), "fresh install skips the version prompt");
        assert_eq!(log.announcements, vec!["News".to_string()]);
        assert_eq!(h.launcher.launched.lock().unwrap().len(), 1);

        let history = h.pipeline.history();
        assert!(history.windows(2).all(|w| w[0].can_transition(w[1])));
        assert!(!history.contains(&PipelineStep::DownloadRuntime));
        // requirements.txt가 없는 릴리스는 프로비저닝을 건너뜀
        assert!(history.contains(&PipelineStep::ProvisionDependencies));
        assert!(!app.join("venv").exists());
        println!("✓ 신규 설치 전체 흐름");
    }

    /// 런타임 설치 직후 중단된 뒤 다시 실행: 기록된 런타임을 재사용해 앱 설치를 이어감
    #[tokio::test]
    async fn test_interrupted_first_install_resumes_with_recorded_runtime() {
        let root = TempDir::new().unwrap();
        let runtime_home = TempDir::new().unwrap();
        let runtime = fake_runtime(runtime_home.path());
        let url = serve_archive(release_zip()).await;

        let store = Arc::new(MemoryStore::with_state(InstallState::runtime_only(&runtime)));
        let mut h = harness(
            Box::new(SharedStore(store.clone())),
            |mut p| {
                p.install_path = Some(root.path().to_path_buf());
                p
            },
            Some(metadata("1.3.0")),
        );
        h.pipeline = h.pipeline.with_release_source(ReleaseSource::Fixed(url));

        assert_eq!(h.pipeline.run().await, PipelineOutcome::Launched);

        let history = h.pipeline.history();
        assert!(history.windows(2).all(|w| w[0].can_transition(w[1])));
        assert!(history.contains(&PipelineStep::PickInstallPath));
        assert!(history.contains(&PipelineStep::DownloadApplication));
        assert!(!history.contains(&PipelineStep::DownloadRuntime));
        assert!(root.path().join("exvr/main.py").is_file());
        assert_eq!(store.snapshot(), Some(InstallState::new(root.path(), &runtime)));
        println!("✓ 중단된 신규 설치 재개");
    }

    /// 두 경로가 모두 기록됐지만 exvr/ 가 비어 있는 경우에도 앱을 다시 받음
    #[tokio::test]
    async fn test_record_with_missing_app_downloads_application() {
        let root = TempDir::new().unwrap();
        let runtime = fake_runtime(root.path());
        let url = serve_archive(release_zip()).await;

        let store = Arc::new(MemoryStore::with_state(InstallState::new(root.path(), &runtime)));
        let mut h = harness(
            Box::new(SharedStore(store.clone())),
            |mut p| {
                p.install_path = Some(root.path().to_path_buf());
                p
            },
            Some(metadata("1.3.0")),
        );
        h.pipeline = h.pipeline.with_release_source(ReleaseSource::Fixed(url));

        assert_eq!(h.pipeline.run().await, PipelineOutcome::Launched);
        assert!(h.pipeline.history().contains(&PipelineStep::DownloadApplication));
        assert!(root.path().join("exvr/main.py").is_file());
        assert_eq!(h.launcher.launched.lock().unwrap().len(), 1);
        println!("✓ 앱 파일 없는 기록 → 재다운로드");
    }

    #[tokio::test]
    async fn test_register_write_failure_is_fatal() {
        let root = TempDir::new().unwrap();
        fake_runtime(root.path());
        let url = serve_archive(release_zip()).await;

        let store = BrokenStore {
            fail_load: false,
            inner: MemoryStore::new(),
        };
        let mut h = harness(
            Box::new(store),
            |mut p| {
                p.install_path = Some(root.path().to_path_buf());
                p
            },
            None,
        );
        h.pipeline = h.pipeline.with_release_source(ReleaseSource::Fixed(url));

        let outcome = h.pipeline.run().await;
        match outcome {
            PipelineOutcome::Failed(e) => assert_eq!(e.kind(), crate::ErrorKind::Config),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(h.pipeline.current_step(), PipelineStep::FatalError);
        assert_eq!(h.log.lock().unwrap().errors.len(), 1);
        assert!(h.launcher.launched.lock().unwrap().is_empty());
    }

    /// 테스트에서 결과를 확인할 수 있도록 Arc로 공유하는 저장소
    struct SharedStore(Arc<MemoryStore>);

    impl ConfigStore for SharedStore {
        fn load(&self) -> crate::Result<InstallState> {
            self.0.load()
        }
        fn save(&self, state: &InstallState) -> crate::Result<()> {
            self.0.save(state)
        }
        fn delete(&self) -> crate::Result<()> {
            self.0.delete()
        }
    }
}
