//! 런처 설정 로드
//!
//! ## 위치
//! - 기준 디렉터리: `$EXVR_LAUNCHER_HOME`, 없으면 현재 디렉터리
//! - 설정 파일: `<base>/launcher.toml` (없으면 전부 기본값)
//! - 설치 기록: `<base>/exvr_config.json` (`store.rs`)

mod store;

pub use store::JsonFileStore;

use anyhow::Context;
use exvr_launcher_engine::LauncherSettings;
use std::path::{Path, PathBuf};

pub const HOME_ENV: &str = "EXVR_LAUNCHER_HOME";
pub const SETTINGS_FILE: &str = "launcher.toml";
pub const STATE_FILE: &str = "exvr_config.json";

/// 런처 데이터 기준 디렉터리
pub fn launcher_home() -> PathBuf {
    if let Ok(dir) = std::env::var(HOME_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

pub fn settings_path(base: &Path) -> PathBuf {
    base.join(SETTINGS_FILE)
}

/// TOML 파일에서 설정 로드. 파일이 없으면 기본값, 형식이 잘못되면 에러
pub fn load_settings(path: &Path) -> anyhow::Result<LauncherSettings> {
    if !path.exists() {
        tracing::debug!("[Config] {} not found, using defaults", path.display());
        return Ok(LauncherSettings::default());
    }

    let content = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let settings: LauncherSettings =
        toml::from_str(&content).with_context(|| format!("invalid settings file {}", path.display()))?;
    tracing::info!("[Config] Loaded settings from {}", path.display());
    Ok(settings)
}

/// 기준 디렉터리 기준으로 설정을 로드하고 로그 디렉터리를 채움
pub fn load_for_home(base: &Path, override_path: Option<&Path>) -> anyhow::Result<LauncherSettings> {
    let path = override_path.map(Path::to_path_buf).unwrap_or_else(|| settings_path(base));
    let mut settings = load_settings(&path)?;
    if settings.log_dir.is_none() {
        settings.log_dir = Some(base.join("logs"));
    }
    Ok(settings)
}
