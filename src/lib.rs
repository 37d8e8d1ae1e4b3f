//! ExVR 런처 바이너리 지원 모듈
//!
//! 엔진(`exvr-launcher-engine`)이 정의한 외부 경계의 실제 구현:
//! - `config`: `launcher.toml` 설정, `exvr_config.json` 설치 기록
//! - `console`: 터미널 `Presenter`
//! - `logging`: 파일 + 콘솔 tracing 설정
//! - `cli`: 명령줄 인자

pub mod cli;
pub mod config;
pub mod console;
pub mod logging;
