//! # ExVR 런처 엔진
//!
//! 실행할 때마다 대상 애플리케이션이 설치되어 있고 최신인지 확인하고,
//! 필요하면 다운로드 → 압축 해제 → 런타임/의존성 준비 → 실행까지 진행합니다.
//!
//! ## 아키텍처
//! - **파이프라인(pipeline.rs)**: 단계 상태 기계. 어떤 워커를 다음에 실행할지 결정
//! - **워커(worker.rs)**: 취소 가능한 장시간 작업 공통 기반, 단일 활성 워커 슬롯
//! - **이벤트(event.rs)**: 워커 → 컨트롤러 단일 채널 (`Progress | Log | Finished | Failed`)
//! - **다운로드/압축 해제/프로비저닝**: 각각의 워커 구현
//! - **병합 복사(merge.rs)**: 무시 목록을 존중하는 디렉터리 병합
//! - **런타임(runtime.rs)**: 파이썬 버전 탐지와 무인 설치
//! - **메타데이터(metadata.rs)**: 원격 버전/공지 조회, 릴리스 URL 결정
//!
//! ## 외부 경계
//! 표시 계층(`Presenter`), 설치 기록 저장소(`ConfigStore`), 메타데이터 공급원(`MetadataSource`),
//! 앱 실행기(`ApplicationLauncher`)는 트레이트로 분리되어 있어 바이너리와 테스트가 각각 구현을 넣습니다.

// ══════════════════════════════════════════════════════
// 모듈
// ══════════════════════════════════════════════════════

pub mod download;
pub mod error;
pub mod event;
pub mod extract;
pub mod launch;
pub mod merge;
pub mod metadata;
pub mod pipeline;
pub mod presenter;
pub mod process;
pub mod provision;
pub mod runtime;
pub mod settings;
pub mod state;
pub mod worker;

#[cfg(test)]
mod tests;

/// 컴파일된 런처 버전. 원격 `lau_version`이 이보다 크면 런처 교체가 필요
pub const LAUNCHER_VERSION: u32 = 1;

// Re-exports for convenience
pub use download::{http_client, DownloadWorker};
pub use error::{ErrorKind, LauncherError, Result};
pub use event::{EventReceiver, EventSink, WorkerEvent, WorkerOutput};
pub use extract::ExtractWorker;
pub use launch::{ApplicationLauncher, LaunchSpec, ProcessLauncher};
pub use merge::{merge_copy, unwrap_single_root};
pub use metadata::{Board, HttpMetadataSource, MetadataSource, ReleaseSource, RemoteMetadata, StaticMetadata};
pub use pipeline::{register_install, Pipeline, PipelineOutcome, PipelineStep};
pub use presenter::Presenter;
pub use provision::ProvisionWorker;
pub use runtime::{RuntimeInstaller, RuntimeProbe};
pub use settings::{AssetMapping, LauncherSettings};
pub use state::{ConfigStore, InstallState, MemoryStore};
pub use worker::{StopOutcome, Worker, WorkerContext, WorkerHandle, WorkerSlot};
