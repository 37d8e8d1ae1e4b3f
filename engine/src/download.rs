//! HTTP 다운로드 워커
//!
//! 응답 본문을 청크 단위로 스트리밍하여 파일에 기록합니다.
//! `Content-Length`가 있으면 백분율을 보고하고, 없으면 완료 시 100%만 보고합니다.
//! 취소/에러 시 부분 파일은 그대로 남기며 정리는 컨트롤러의 임시 디렉터리가 담당합니다.

use futures_util::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::error::{LauncherError, Result};
use crate::event::WorkerOutput;
use crate::worker::{Worker, WorkerContext};

/// 런처 공통 HTTP 클라이언트 생성
pub fn http_client(connect_timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("exvr-launcher/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(connect_timeout)
        .build()
        .map_err(|e| LauncherError::network(format!("failed to create HTTP client: {}", e)))
}

pub struct DownloadWorker {
    client: reqwest::Client,
    url: String,
    dest: PathBuf,
    read_timeout: Duration,
}

impl DownloadWorker {
    pub fn new(client: reqwest::Client, url: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            client,
            url: url.into(),
            dest: dest.into(),
            read_timeout: Duration::from_secs(30),
        }
    }

    /// 청크 사이 최대 대기 시간
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

impl Worker for DownloadWorker {
    fn name(&self) -> &'static str {
        "Download"
    }

    async fn run(self, ctx: WorkerContext) -> Result<WorkerOutput> {
        ctx.check_cancelled()?;
        tracing::info!("[Download] {} → {}", self.url, self.dest.display());
        ctx.events().log(format!("Downloading {}", self.url));

        let response = tokio::select! {
            biased;
            _ = ctx.cancel_token().cancelled() => return Err(LauncherError::Cancelled),
            resp = tokio::time::timeout(self.read_timeout, self.client.get(&self.url).send()) => match resp {
                Ok(resp) => resp?,
                Err(_) => return Err(LauncherError::network(format!("request to {} timed out", self.url))),
            },
        };

        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::network(format!("HTTP {} for {}", status, self.url)));
        }

        let total = response.content_length().filter(|&n| n > 0);
        if total.is_none() {
            tracing::debug!("[Download] No Content-Length, progress will be reported on completion");
        }

        if let Some(parent) = self.dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::fs("create_dir", parent, e))?;
        }
        let mut file = tokio::fs::File::create(&self.dest)
            .await
            .map_err(|e| LauncherError::fs("create", &self.dest, e))?;

        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = ctx.cancel_token().cancelled() => {
                    tracing::info!("[Download] Cancelled after {} bytes", downloaded);
                    return Err(LauncherError::Cancelled);
                }
                next = tokio::time::timeout(self.read_timeout, stream.next()) => next,
            };

            let chunk = match next {
                Err(_) => {
                    return Err(LauncherError::network(format!(
                        "no data received from {} for {}s",
                        self.url,
                        self.read_timeout.as_secs()
                    )))
                }
                Ok(None) => break,
                Ok(Some(chunk)) => chunk?,
            };

            file.write_all(&chunk)
                .await
                .map_err(|e| LauncherError::fs("write", &self.dest, e))?;
            downloaded += chunk.len() as u64;

            if let Some(total) = total {
                let percent = (downloaded.saturating_mul(100) / total).min(100);
                ctx.events().progress(percent as u8);
            }
        }

        file.flush()
            .await
            .map_err(|e| LauncherError::fs("flush", &self.dest, e))?;

        tracing::info!("[Download] Completed {} ({} bytes)", self.dest.display(), downloaded);
        Ok(WorkerOutput::Downloaded(self.dest))
    }
}
