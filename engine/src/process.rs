//! 서브프로세스 공통 헬퍼 (플랫폼별 플래그, 인터프리터 경로 규칙)

use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Windows에서 콘솔 창이 뜨지 않도록 플래그 적용. 그 외 플랫폼에서는 아무 것도 하지 않음
#[cfg(target_os = "windows")]
pub fn apply_creation_flags(cmd: &mut Command) -> &mut Command {
    const CREATE_NO_WINDOW: u32 = 0x08000000;
    cmd.creation_flags(CREATE_NO_WINDOW)
}

#[cfg(not(target_os = "windows"))]
pub fn apply_creation_flags(cmd: &mut Command) -> &mut Command {
    cmd
}

/// 런처 종료 후에도 살아남도록 분리 실행 플래그 적용
#[cfg(target_os = "windows")]
pub fn apply_detached_flags(cmd: &mut Command) -> &mut Command {
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x00000200;
    const CREATE_NO_WINDOW: u32 = 0x08000000;
    cmd.creation_flags(CREATE_NEW_PROCESS_GROUP | CREATE_NO_WINDOW)
}

#[cfg(not(target_os = "windows"))]
pub fn apply_detached_flags(cmd: &mut Command) -> &mut Command {
    // 새 프로세스 그룹으로 분리해서 런처의 Ctrl+C가 전달되지 않게 함
    cmd.process_group(0)
}

/// venv 내부 인터프리터 경로
pub fn venv_python(venv_dir: &Path) -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        venv_dir.join("Scripts").join("python.exe")
    }
    #[cfg(not(target_os = "windows"))]
    {
        venv_dir.join("bin").join("python")
    }
}

/// 런타임 설치 디렉터리 안의 인터프리터 경로
pub fn runtime_executable(install_dir: &Path) -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        install_dir.join("python.exe")
    }
    #[cfg(not(target_os = "windows"))]
    {
        install_dir.join("bin").join("python3")
    }
}

/// venv의 site-packages 경로
///
/// Windows는 `Lib/site-packages` 고정, 그 외에는 `lib/python3.X/site-packages`를 탐색
pub fn site_packages(venv_dir: &Path) -> Option<PathBuf> {
    let windows_layout = venv_dir.join("Lib").join("site-packages");
    if cfg!(target_os = "windows") || windows_layout.is_dir() {
        return Some(windows_layout);
    }

    let lib = venv_dir.join("lib");
    std::fs::read_dir(&lib)
        .ok()?
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().starts_with("python"))
        .map(|e| e.path().join("site-packages"))
        .find(|p| p.is_dir())
}
