//! 런처 설정
//!
//! 모든 필드에 기본값이 있으므로 `launcher.toml`에는 바꾸고 싶은 값만 적으면 됩니다.
//!
//! ```toml
//! runtime_version = "3.11"
//! ignored_folders = ["config"]
//!
//! [[asset_mappings]]
//! source = "modules/palm_detection_lite.tflite"
//! target = "mediapipe/modules/palm_detection/palm_detection_lite.tflite"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 설치 후 앱 디렉터리의 파일을 venv site-packages 안으로 복사하는 규칙
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMapping {
    /// 앱 디렉터리 기준 상대 경로
    pub source: String,
    /// site-packages 기준 상대 경로
    pub target: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherSettings {
    /// 원격 메타데이터 URL 목록 (순서대로 시도, 첫 성공 사용)
    pub metadata_urls: Vec<String>,
    pub metadata_timeout_secs: u64,

    /// 고정 릴리스 URL. 지정하면 GitHub API 조회를 건너뜀
    pub release_url: Option<String>,
    pub github_owner: String,
    pub github_repo: String,
    /// GitHub API/다운로드 앞에 붙이는 프록시 접두사
    pub github_proxy: String,
    /// API 조회 실패 시 사용할 아카이브 URL
    pub release_fallback_url: String,

    pub runtime_download_url: String,
    /// `--version` 출력에서 찾을 버전 (`Python <runtime_version>`)
    pub runtime_version: String,
    pub runtime_dir_name: String,
    pub probe_timeout_secs: u64,

    pub request_timeout_secs: u64,
    pub package_index_url: String,

    pub app_dir_name: String,
    pub requirements_file: String,
    pub entry_point: String,
    pub version_file: String,
    pub version_key: String,
    pub ignored_folders: Vec<String>,
    pub asset_mappings: Vec<AssetMapping>,

    pub stop_grace_ms: u64,
    pub launch_grace_ms: u64,
    /// 앱에 `--log-dir`로 전달할 디렉터리 (비어 있으면 `<base>/logs`)
    pub log_dir: Option<PathBuf>,
}

const DOC_DATA_PATH: &str = "ExVR-Doc/ExVR-Doc.github.io/main/docs/exvrserverdata.json";

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            metadata_urls: vec![
                format!("https://gh-proxy.com/raw.githubusercontent.com/{}", DOC_DATA_PATH),
                format!("https://gh-proxy.com/https://raw.githubusercontent.com/{}", DOC_DATA_PATH),
                format!("https://hub.gitmirror.com/https://raw.githubusercontent.com/{}", DOC_DATA_PATH),
                format!("https://raw.githubusercontent.com/{}", DOC_DATA_PATH),
            ],
            metadata_timeout_secs: 5,
            release_url: None,
            github_owner: "xiaofeiyu0723".to_string(),
            github_repo: "ExVR".to_string(),
            github_proxy: "https://gh-proxy.com/".to_string(),
            release_fallback_url:
                "https://gh-proxy.com/https://github.com/xiaofeiyu0723/ExVR/archive/refs/heads/main.zip"
                    .to_string(),
            runtime_download_url: "https://mirrors.huaweicloud.com/python/3.11.9/python-3.11.9-amd64.exe"
                .to_string(),
            runtime_version: "3.11".to_string(),
            runtime_dir_name: "python".to_string(),
            probe_timeout_secs: 5,
            request_timeout_secs: 10,
            package_index_url: "https://pypi.tuna.tsinghua.edu.cn/simple".to_string(),
            app_dir_name: "exvr".to_string(),
            requirements_file: "requirements.txt".to_string(),
            entry_point: "main.py".to_string(),
            version_file: "settings/config.json".to_string(),
            version_key: "Version".to_string(),
            ignored_folders: Vec::new(),
            asset_mappings: vec![
                AssetMapping {
                    source: "modules/palm_detection_lite.tflite".to_string(),
                    target: "mediapipe/modules/palm_detection/palm_detection_lite.tflite".to_string(),
                },
                AssetMapping {
                    source: "modules/hand_landmark_tracking_cpu.binarypb".to_string(),
                    target: "mediapipe/modules/hand_landmark/hand_landmark_tracking_cpu.binarypb"
                        .to_string(),
                },
            ],
            stop_grace_ms: 3000,
            launch_grace_ms: 1000,
            log_dir: None,
        }
    }
}

impl LauncherSettings {
    pub fn github_api_url(&self) -> String {
        format!(
            "{}https://api.github.com/repos/{}/{}/releases/latest",
            self.github_proxy, self.github_owner, self.github_repo
        )
    }

    pub fn app_dir(&self, install_root: &Path) -> PathBuf {
        install_root.join(&self.app_dir_name)
    }

    pub fn runtime_dir(&self, install_root: &Path) -> PathBuf {
        install_root.join(&self.runtime_dir_name)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    pub fn launch_grace(&self) -> Duration {
        Duration::from_millis(self.launch_grace_ms)
    }
}
