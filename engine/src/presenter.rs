//! 사용자 표시 계층 경계
//!
//! 파이프라인은 다이얼로그/진행 표시줄/경로 선택을 직접 다루지 않고 이 트레이트만 호출합니다.
//! 모든 메서드는 컨트롤러 태스크에서만 호출되며, 워커가 실행 중일 때는
//! `progress`만 호출됩니다.

use std::path::PathBuf;

use crate::metadata::Board;

pub trait Presenter: Send {
    /// 설치 경로 선택. `None`이면 사용자가 중단한 것
    fn pick_install_path(&mut self) -> Option<PathBuf>;

    /// 업데이트 여부 확인
    fn confirm_update(&mut self, local_version: &str, remote_version: &str) -> bool;

    /// 런처 자체가 구버전일 때 안내
    fn show_launcher_notice(&mut self, announcement: Option<&str>);

    fn show_announcement(&mut self, board: &Board);

    fn begin_step(&mut self, title: &str, label: &str);
    fn progress(&mut self, percent: u8);
    fn end_step(&mut self);

    fn show_error(&mut self, title: &str, message: &str);
    fn show_info(&mut self, title: &str, message: &str);
}
