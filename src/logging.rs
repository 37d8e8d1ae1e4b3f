//! 로깅 초기화
//!
//! 실행마다 `<logs>/installer_YYYYmmdd_HHMMSS.log` 파일을 만들고,
//! `--log` 옵션이 있으면 같은 내용을 stderr에도 출력합니다.
//! 필터는 `RUST_LOG`, 없으면 `info`.

use anyhow::Context;
use chrono::NaiveDateTime;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub fn log_file_name(at: NaiveDateTime) -> String {
    format!("installer_{}.log", at.format("%Y%m%d_%H%M%S"))
}

/// 전역 subscriber 설치. 생성된 로그 파일 경로를 반환
pub fn init(log_dir: &Path, console: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(log_dir).with_context(|| format!("failed to create {}", log_dir.display()))?;
    let path = log_dir.join(log_file_name(chrono::Local::now().naive_local()));
    let file = File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false);
    let console_layer = console.then(|| fmt::layer().with_writer(std::io::stderr).with_target(false));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("logging already initialized")?;

    Ok(path)
}
