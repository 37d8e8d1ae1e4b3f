//! 워커 → 컨트롤러 이벤트 채널
//!
//! 워커 하나당 채널 하나. 이벤트는 `Progress | Log | Finished | Failed` 네 종류이며,
//! 종료 이벤트(`Finished`/`Failed`)는 워커 수명 동안 정확히 한 번만 전송됩니다.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::error::LauncherError;

/// 워커가 성공적으로 끝났을 때의 결과물
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutput {
    /// 다운로드된 파일 경로
    Downloaded(PathBuf),
    /// 최종적으로 파일이 배치된 디렉터리 (최종 경로가 없으면 임시 추출 경로)
    Extracted(PathBuf),
    /// 프로비저닝된 가상환경의 인터프리터 경로
    Provisioned(PathBuf),
}

impl WorkerOutput {
    pub fn into_path(self) -> PathBuf {
        match self {
            WorkerOutput::Downloaded(p) | WorkerOutput::Extracted(p) | WorkerOutput::Provisioned(p) => p,
        }
    }
}

/// 워커가 내보내는 이벤트
#[derive(Debug)]
pub enum WorkerEvent {
    /// 진행률 0–100, 한 워커 안에서 단조 증가
    Progress(u8),
    /// 자유 형식 로그 한 줄
    Log(String),
    /// 성공 종료
    Finished(WorkerOutput),
    /// 실패 종료 (취소 포함)
    Failed(LauncherError),
}

impl WorkerEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerEvent::Finished(_) | WorkerEvent::Failed(_))
    }
}

pub type EventReceiver = mpsc::UnboundedReceiver<WorkerEvent>;

/// 워커 쪽 송신기
///
/// 진행률은 이전 값보다 클 때만 전송되므로 수신 측은 항상 비감소 수열을 관찰합니다.
/// blocking 스레드에서도 그대로 사용할 수 있습니다.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<WorkerEvent>,
    last_progress: Arc<Mutex<u8>>,
    terminated: Arc<AtomicBool>,
}

impl EventSink {
    pub fn channel() -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Self {
            tx,
            last_progress: Arc::new(Mutex::new(0)),
            terminated: Arc::new(AtomicBool::new(false)),
        };
        (sink, rx)
    }

    pub fn progress(&self, percent: u8) {
        let percent = percent.min(100);
        let mut last = self.last_progress.lock().unwrap_or_else(|e| e.into_inner());
        if percent <= *last {
            return;
        }
        *last = percent;
        let _ = self.tx.send(WorkerEvent::Progress(percent));
    }

    /// `done / total` 비율을 `[from, to]` 구간으로 환산해서 보고
    pub fn scaled_progress(&self, done: usize, total: usize, from: u8, to: u8) {
        if total == 0 {
            self.progress(to);
            return;
        }
        let span = to.saturating_sub(from) as usize;
        let value = from as usize + (done.min(total) * span) / total;
        self.progress(value as u8);
    }

    pub fn log(&self, message: impl Into<String>) {
        let _ = self.tx.send(WorkerEvent::Log(message.into()));
    }

    pub fn last_progress(&self) -> u8 {
        *self.last_progress.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 성공 종료: 100%를 보장한 뒤 결과 전송
    pub(crate) fn finish(&self, output: WorkerOutput) {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return;
        }
        self.progress(100);
        let _ = self.tx.send(WorkerEvent::Finished(output));
    }

    pub(crate) fn fail(&self, error: LauncherError) {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.send(WorkerEvent::Failed(error));
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }
}
