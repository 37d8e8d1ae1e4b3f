//! 런처 에러 타입
//!
//! ## 분류
//! - 네트워크: 연결 실패, 타임아웃, 2xx 이외 응답
//! - 파일 시스템: 권한, 경로 없음, 디스크 부족
//! - 아카이브: 손상되었거나 지원하지 않는 형식
//! - 서브프로세스: 실행 파일 없음, 0 이외 종료 코드
//! - 설정: 설치 기록 읽기/쓰기 실패
//! - 사용자 취소: 에러가 아닌 안내로 처리

use std::fmt;
use std::path::Path;

/// 에러 종류: 로그 및 다이얼로그 제목 결정에 사용
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    FileSystem,
    Archive,
    Subprocess,
    Config,
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Network => "network",
            ErrorKind::FileSystem => "filesystem",
            ErrorKind::Archive => "archive",
            ErrorKind::Subprocess => "subprocess",
            ErrorKind::Config => "config",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// 파이프라인 전 단계에서 공통으로 사용하는 에러
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LauncherError {
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("File system error during {operation} on '{path}': {message}")]
    FileSystem {
        operation: String,
        path: String,
        message: String,
    },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Subprocess '{program}' failed: {message}")]
    Subprocess { program: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("The operation has been canceled by the user.")]
    Cancelled,
}

impl LauncherError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    /// 파일 시스템 에러 생성 헬퍼
    pub fn fs(operation: &str, path: &Path, err: impl fmt::Display) -> Self {
        Self::FileSystem {
            operation: operation.to_string(),
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    pub fn subprocess(program: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::Subprocess {
            program: program.as_ref().display().to_string(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::Network,
            Self::FileSystem { .. } => ErrorKind::FileSystem,
            Self::Archive(_) => ErrorKind::Archive,
            Self::Subprocess { .. } => ErrorKind::Subprocess,
            Self::Config(_) => ErrorKind::Config,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// 사용자에게 표시할 다이얼로그 제목
    pub fn title(&self) -> &'static str {
        match self {
            Self::Cancelled => "Cancelled",
            Self::Network { .. } => "Download Error",
            Self::Config(_) => "Configuration Error",
            _ => "Installation Error",
        }
    }
}

impl From<reqwest::Error> for LauncherError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::network(format!("request timed out: {}", e))
        } else if let Some(status) = e.status() {
            Self::network(format!("HTTP {}: {}", status, e))
        } else {
            Self::network(e.to_string())
        }
    }
}

impl From<zip::result::ZipError> for LauncherError {
    fn from(e: zip::result::ZipError) -> Self {
        match e {
            zip::result::ZipError::Io(io) => Self::Archive(format!("I/O error while reading archive: {}", io)),
            other => Self::Archive(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for LauncherError {
    fn from(e: serde_json::Error) -> Self {
        Self::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LauncherError>;
