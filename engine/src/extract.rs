//! ZIP 압축 해제 워커
//!
//! ## 단계
//! 1. 아카이브 전체를 임시 디렉터리에 해제 (진행률 0–50%, 최종 경로가 없으면 0–100%)
//! 2. 최상위 디렉터리가 하나뿐이면 그 안을 실제 루트로 간주 (unwrap)
//! 3. 최종 경로로 병합 복사 (50–100%, 무시 목록 적용)
//!
//! 엔트리 사이와 64 KiB 청크 사이마다 취소를 확인하므로 큰 파일 하나를 쓰는 중에도 멈춥니다.

use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use crate::error::{LauncherError, Result};
use crate::event::{EventSink, WorkerOutput};
use crate::merge::{copy_chunked, count_files, merge_copy, unwrap_single_root};
use crate::worker::{Worker, WorkerContext};

pub struct ExtractWorker {
    archive: PathBuf,
    temp_dir: PathBuf,
    final_dest: Option<PathBuf>,
    ignored: Vec<String>,
}

impl ExtractWorker {
    pub fn new(
        archive: impl Into<PathBuf>,
        temp_dir: impl Into<PathBuf>,
        final_dest: Option<PathBuf>,
        ignored: Vec<String>,
    ) -> Self {
        Self {
            archive: archive.into(),
            temp_dir: temp_dir.into(),
            final_dest,
            ignored,
        }
    }
}

impl Worker for ExtractWorker {
    fn name(&self) -> &'static str {
        "Extract"
    }

    async fn run(self, ctx: WorkerContext) -> Result<WorkerOutput> {
        ctx.check_cancelled()?;
        tracing::info!(
            "[Extract] {} → {}",
            self.archive.display(),
            self.final_dest.as_deref().unwrap_or(self.temp_dir.as_path()).display()
        );

        let cancel = ctx.cancel_token().clone();
        let events = ctx.events().clone();

        // zip 크레이트는 동기 I/O라 blocking 스레드에서 실행
        let placed = ctx.spawn_blocking(move || {
            extract_blocking(
                &self.archive,
                &self.temp_dir,
                self.final_dest.as_deref(),
                &self.ignored,
                &cancel,
                &events,
            )
        })
        .await
        .map_err(|e| LauncherError::Archive(format!("extraction task failed: {}", e)))??;

        Ok(WorkerOutput::Extracted(placed))
    }
}

fn extract_blocking(
    archive_path: &Path,
    temp_dir: &Path,
    final_dest: Option<&Path>,
    ignored: &[String],
    cancel: &CancellationToken,
    events: &EventSink,
) -> Result<PathBuf> {
    let file = std::fs::File::open(archive_path)
        .map_err(|e| LauncherError::fs("open", archive_path, e))?;
    let mut archive = zip::ZipArchive::new(file)?;
    std::fs::create_dir_all(temp_dir).map_err(|e| LauncherError::fs("create_dir", temp_dir, e))?;

    let total = archive.len();
    let extract_ceiling = if final_dest.is_some() { 50 } else { 100 };
    events.log(format!("Extracting {} entries", total));

    for i in 0..total {
        if cancel.is_cancelled() {
            return Err(LauncherError::Cancelled);
        }

        let mut entry = archive.by_index(i)?;
        let relative = match entry.enclosed_name() {
            Some(p) => p.to_path_buf(),
            None => {
                tracing::warn!("[Extract] Skipping entry with unsafe path: {}", entry.name());
                continue;
            }
        };
        let out_path = temp_dir.join(&relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|e| LauncherError::fs("create_dir", &out_path, e))?;
        } else {
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| LauncherError::fs("create_dir", parent, e))?;
            }
            let mut outfile = std::fs::File::create(&out_path)
                .map_err(|e| LauncherError::fs("create", &out_path, e))?;
            if let Err(e) = copy_chunked(&mut entry, &mut outfile, Some(cancel), &out_path) {
                if e.is_cancelled() {
                    tracing::info!("[Extract] Cancelled while writing {}", out_path.display());
                }
                return Err(e);
            }
        }

        events.scaled_progress(i + 1, total, 0, extract_ceiling);
    }

    let root = unwrap_single_root(temp_dir)?;
    if root != temp_dir {
        tracing::info!("[Extract] Unwrapped single top-level directory {}", root.display());
    }

    let dest = match final_dest {
        Some(dest) => dest,
        None => return Ok(root),
    };

    let file_count = count_files(&root, ignored)?;
    events.log(format!("Copying {} files to {}", file_count, dest.display()));
    merge_copy(&root, dest, ignored, Some(cancel), &mut |copied| {
        events.scaled_progress(copied, file_count, 50, 100);
    })?;

    tracing::info!("[Extract] Placed {} files in {}", file_count, dest.display());
    Ok(dest.to_path_buf())
}
