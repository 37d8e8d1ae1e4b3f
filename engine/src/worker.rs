//! 취소 가능한 워커 공통 기반
//!
//! ## 구조
//! - `Worker`: 장시간 작업 하나 (다운로드, 압축 해제, 프로비저닝)
//! - `WorkerHandle`: 실행 중인 워커에 대한 핸들. `request_stop` → `join`, 또는 `stop`
//! - `WorkerSlot`: 동시에 최대 하나의 워커만 살아 있도록 보장
//!
//! ## 정지 절차
//! 1. 취소 토큰 설정 (워커가 청크/엔트리/출력 줄 사이에서 확인)
//! 2. 제한 시간 동안 종료 대기
//! 3. 시간 초과 시 태스크 강제 중단 (abort)
//! 4. blocking 스레드로 넘긴 작업이 끝날 때까지 대기 (취소 토큰을 보고 곧 빠져나옴)
//!
//! 살아 있는 워커 수는 async 태스크와 `WorkerContext::spawn_blocking`으로
//! 시작한 작업이 모두 끝나야 줄어듭니다.

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{LauncherError, Result};
use crate::event::{EventReceiver, EventSink, WorkerOutput};

/// 기본 정지 대기 시간
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_millis(3000);

/// abort 이후 blocking 작업 종료를 기다리는 상한
const BLOCKING_DRAIN_LIMIT: Duration = Duration::from_secs(10);

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

/// 독립적으로 실행되는 장시간 작업 단위
pub trait Worker: Send + 'static {
    /// 로그 표시용 이름
    fn name(&self) -> &'static str;

    /// 작업 본문. 취소 확인은 `ctx.check_cancelled()`로 안전 지점마다 수행
    fn run(self, ctx: WorkerContext) -> impl Future<Output = Result<WorkerOutput>> + Send;
}

/// 워커에 전달되는 실행 컨텍스트
#[derive(Clone)]
pub struct WorkerContext {
    cancel: CancellationToken,
    events: EventSink,
    guard: Arc<LiveGuard>,
}

impl WorkerContext {
    fn new(cancel: CancellationToken, events: EventSink, guard: Arc<LiveGuard>) -> Self {
        Self { cancel, events, guard }
    }

    /// 동기 작업을 blocking 스레드에서 실행
    ///
    /// 작업이 끝날 때까지 이 워커는 살아 있는 것으로 집계되며,
    /// 강제 정지도 작업 종료를 기다립니다. 작업 안에서 취소 토큰을 확인해야 합니다.
    pub fn spawn_blocking<F, R>(&self, f: F) -> JoinHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let guard = self.guard.clone();
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            f()
        })
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(LauncherError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// `stop()` 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// 이미 끝나 있었음
    AlreadyFinished,
    /// 협조적 취소로 종료
    Graceful,
    /// 제한 시간 초과로 강제 종료
    Forced,
}

/// 실행 중인 워커 핸들
pub struct WorkerHandle {
    id: u64,
    name: &'static str,
    cancel: CancellationToken,
    join: JoinHandle<()>,
    exited: oneshot::Receiver<()>,
}

impl WorkerHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// 취소 플래그만 설정 (대기하지 않음)
    pub fn request_stop(&self) {
        self.cancel.cancel();
    }

    /// 워커 루프와 blocking 작업이 모두 끝날 때까지 대기
    pub async fn join(self) {
        let _ = self.join.await;
        let _ = self.exited.await;
    }

    /// 취소 요청 → 제한 시간 대기 → 강제 종료. 어떤 경우에도 반환됩니다.
    pub async fn stop(mut self, grace: Duration) -> StopOutcome {
        if self.join.is_finished() {
            let _ = (&mut self.join).await;
            self.cancel.cancel();
            self.wait_exited().await;
            return StopOutcome::AlreadyFinished;
        }

        tracing::info!("[Worker] Stopping {} #{}", self.name, self.id);
        self.cancel.cancel();

        let outcome = match tokio::time::timeout(grace, &mut self.join).await {
            Ok(_) => StopOutcome::Graceful,
            Err(_) => {
                tracing::warn!(
                    "[Worker] {} #{} did not stop within {}ms, aborting",
                    self.name,
                    self.id,
                    grace.as_millis()
                );
                self.join.abort();
                let _ = (&mut self.join).await;
                StopOutcome::Forced
            }
        };
        self.wait_exited().await;
        outcome
    }

    /// abort로 멈출 수 없는 blocking 작업의 종료 대기
    async fn wait_exited(&mut self) {
        if tokio::time::timeout(BLOCKING_DRAIN_LIMIT, &mut self.exited).await.is_err() {
            tracing::error!(
                "[Worker] {} #{} blocking work still running after {}s",
                self.name,
                self.id,
                BLOCKING_DRAIN_LIMIT.as_secs()
            );
        }
    }
}

/// 살아 있는 워커 수 카운터
///
/// 태스크 future와 blocking 작업이 공유하며 마지막 참조가 사라질 때 감소합니다.
/// 감소 직후 `_exited` 송신자가 drop되어 핸들 쪽 수신기가 깨어납니다.
struct LiveGuard {
    counter: Arc<AtomicUsize>,
    _exited: oneshot::Sender<()>,
}

impl LiveGuard {
    fn new(counter: Arc<AtomicUsize>) -> (Arc<Self>, oneshot::Receiver<()>) {
        counter.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        (Arc::new(Self { counter, _exited: tx }), rx)
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 워커를 tokio 태스크로 실행하고 핸들과 이벤트 수신기를 반환
pub fn spawn_worker<W: Worker>(worker: W, live: Arc<AtomicUsize>) -> (WorkerHandle, EventReceiver) {
    let (sink, rx) = EventSink::channel();
    let cancel = CancellationToken::new();
    let (guard, exited) = LiveGuard::new(live);
    let ctx = WorkerContext::new(cancel.clone(), sink.clone(), guard);
    let id = NEXT_WORKER_ID.fetch_add(1, Ordering::SeqCst);
    let name = worker.name();

    let join = tokio::spawn(async move {
        tracing::debug!("[Worker] {} #{} started", name, id);

        match worker.run(ctx.clone()).await {
            Ok(_) if ctx.is_cancelled() => sink.fail(LauncherError::Cancelled),
            Ok(output) => sink.finish(output),
            Err(e) => {
                if !e.is_cancelled() {
                    sink.log(format!("{} error: {}", name, e));
                }
                sink.fail(e);
            }
        }

        tracing::debug!("[Worker] {} #{} exited", name, id);
    });

    (WorkerHandle { id, name, cancel, join, exited }, rx)
}

/// 단일 활성 워커 슬롯
///
/// 새 워커를 시작하기 전에 이전 워커를 완전히 정지시키므로
/// 서로 다른 단계의 이벤트가 섞이지 않습니다.
pub struct WorkerSlot {
    active: Option<WorkerHandle>,
    grace: Duration,
    live: Arc<AtomicUsize>,
}

impl WorkerSlot {
    pub fn new(grace: Duration) -> Self {
        Self {
            active: None,
            grace,
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// 이전 워커를 정지한 뒤 새 워커 시작
    pub async fn start<W: Worker>(&mut self, worker: W) -> EventReceiver {
        self.stop_active().await;
        let (handle, rx) = spawn_worker(worker, self.live.clone());
        tracing::info!("[Worker] Started {} #{}", handle.name(), handle.id());
        self.active = Some(handle);
        rx
    }

    /// 활성 워커 정지 (없으면 None)
    pub async fn stop_active(&mut self) -> Option<StopOutcome> {
        let handle = self.active.take()?;
        Some(handle.stop(self.grace).await)
    }

    /// 정상 종료 이벤트를 받은 뒤 호출: 태스크 정리만 수행
    pub async fn release(&mut self) {
        if let Some(handle) = self.active.take() {
            handle.join().await;
        }
    }

    pub fn request_stop(&self) {
        if let Some(handle) = &self.active {
            handle.request_stop();
        }
    }

    pub fn active_name(&self) -> Option<&'static str> {
        self.active.as_ref().map(|h| h.name())
    }

    /// 현재 살아 있는 워커 태스크 수
    pub fn live_workers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn live_counter(&self) -> Arc<AtomicUsize> {
        self.live.clone()
    }
}

impl Default for WorkerSlot {
    fn default() -> Self {
        Self::new(DEFAULT_STOP_GRACE)
    }
}
