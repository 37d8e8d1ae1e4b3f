//! 설치 기록 (설치 경로 + 런타임 경로)
//!
//! 컨트롤러만 읽고 씁니다. 워커는 접근하지 않습니다.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallState {
    pub install_path: Option<PathBuf>,
    pub runtime_path: Option<PathBuf>,
}

impl InstallState {
    pub fn new(install_path: impl Into<PathBuf>, runtime_path: impl Into<PathBuf>) -> Self {
        Self {
            install_path: Some(install_path.into()),
            runtime_path: Some(runtime_path.into()),
        }
    }

    /// 런타임만 설치되고 앱은 아직 배치되지 않은 상태
    pub fn runtime_only(runtime_path: impl Into<PathBuf>) -> Self {
        Self {
            install_path: None,
            runtime_path: Some(runtime_path.into()),
        }
    }

    /// 두 경로가 모두 있어야 기존 설치로 간주
    pub fn is_complete(&self) -> bool {
        self.install_path.is_some() && self.runtime_path.is_some()
    }

    pub fn install_path(&self) -> Option<&Path> {
        self.install_path.as_deref()
    }

    pub fn runtime_path(&self) -> Option<&Path> {
        self.runtime_path.as_deref()
    }
}

/// 설치 기록 저장소
pub trait ConfigStore: Send + Sync {
    /// 기록이 없으면 빈 `InstallState`
    fn load(&self) -> Result<InstallState>;
    fn save(&self, state: &InstallState) -> Result<()>;
    /// 기록 전체 삭제. 없으면 아무 것도 하지 않음
    fn delete(&self) -> Result<()>;
}

/// 메모리 저장소
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<Option<InstallState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: InstallState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
        }
    }

    pub fn snapshot(&self) -> Option<InstallState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self) -> Result<InstallState> {
        Ok(self.snapshot().unwrap_or_default())
    }

    fn save(&self, state: &InstallState) -> Result<()> {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = Some(state.clone());
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}
