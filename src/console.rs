//! 터미널 표시 계층
//!
//! ## 기능
//! - 설치 경로 입력 및 검증 (존재, 쓰기 가능한 디렉터리, 한자 불가)
//! - 업데이트 확인 (`Y/n`, 빈 입력은 예. 입력 스트림이 닫히면 아니오)
//! - 공지/오류/안내 출력
//! - 단계별 한 줄 진행 표시줄

use exvr_launcher_engine::{Board, Presenter};
use std::fmt;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

const BAR_WIDTH: usize = 30;

/// 설치 경로 검증 실패 사유
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathIssue {
    Empty,
    NotFound,
    NotDirectory,
    ContainsCjk,
    NotWritable,
}

impl fmt::Display for PathIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            PathIssue::Empty => "Please enter a path",
            PathIssue::NotFound => "Path does not exist",
            PathIssue::NotDirectory => "Path is not a directory",
            PathIssue::ContainsCjk => "Path must not contain Chinese characters",
            PathIssue::NotWritable => "No write permission",
        };
        f.write_str(msg)
    }
}

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

/// 설치 경로로 쓸 수 있는지 검사
pub fn validate_install_path(path: &Path) -> Result<(), PathIssue> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(PathIssue::Empty);
    }
    if text.chars().any(is_cjk) {
        return Err(PathIssue::ContainsCjk);
    }
    if !path.exists() {
        return Err(PathIssue::NotFound);
    }
    if !path.is_dir() {
        return Err(PathIssue::NotDirectory);
    }

    let probe = path.join(".exvr-write-test");
    match std::fs::write(&probe, b"") {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
            Ok(())
        }
        Err(_) => Err(PathIssue::NotWritable),
    }
}

/// 공지 본문의 HTML 태그 제거
pub fn strip_markup(text: &str) -> String {
    let text = text
        .replace("<br>", "\n")
        .replace("<br/>", "\n")
        .replace("<br />", "\n");
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}

pub fn render_bar(label: &str, percent: u8) -> String {
    let percent = percent.min(100);
    let filled = BAR_WIDTH * percent as usize / 100;
    format!(
        "{} [{}{}] {:>3}%",
        label,
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        percent
    )
}

pub struct ConsolePresenter {
    input: Box<dyn BufRead + Send>,
    output: Box<dyn Write + Send>,
    preset_path: Option<PathBuf>,
    assume_yes: bool,
    label: String,
    bar_open: bool,
}

impl ConsolePresenter {
    pub fn new(input: Box<dyn BufRead + Send>, output: Box<dyn Write + Send>) -> Self {
        Self {
            input,
            output,
            preset_path: None,
            assume_yes: false,
            label: String::new(),
            bar_open: false,
        }
    }

    /// stdin 입력, stderr 출력
    pub fn stdio() -> Self {
        Self::new(Box::new(BufReader::new(std::io::stdin())), Box::new(std::io::stderr()))
    }

    /// 경로 입력 없이 주어진 경로 사용 (검증은 동일)
    pub fn with_install_path(mut self, path: Option<PathBuf>) -> Self {
        self.preset_path = path;
        self
    }

    /// 업데이트 확인에 자동으로 "예"
    pub fn assume_yes(mut self, yes: bool) -> Self {
        self.assume_yes = yes;
        self
    }

    fn read_line(&mut self, prompt: &str) -> Option<String> {
        let _ = write!(self.output, "{}", prompt);
        let _ = self.output.flush();
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }

    fn close_bar(&mut self) {
        if self.bar_open {
            let _ = writeln!(self.output);
            self.bar_open = false;
        }
    }
}

impl Presenter for ConsolePresenter {
    fn pick_install_path(&mut self) -> Option<PathBuf> {
        if let Some(path) = self.preset_path.take() {
            return match validate_install_path(&path) {
                Ok(()) => Some(path),
                Err(issue) => {
                    let _ = writeln!(self.output, "✗ {}: {}", issue, path.display());
                    None
                }
            };
        }

        let _ = writeln!(self.output, "Select the folder to install ExVR into.");
        loop {
            let line = self.read_line("Install directory (leave empty to cancel): ")?;
            if line.is_empty() {
                return None;
            }
            let path = PathBuf::from(line);
            match validate_install_path(&path) {
                Ok(()) => return Some(path),
                Err(issue) => {
                    let _ = writeln!(self.output, "✗ {}", issue);
                }
            }
        }
    }

    fn confirm_update(&mut self, local_version: &str, remote_version: &str) -> bool {
        let _ = writeln!(
            self.output,
            "New version available: {} (installed: {})",
            remote_version, local_version
        );
        if self.assume_yes {
            return true;
        }
        match self.read_line("Do you want to update? [Y/n]: ") {
            Some(answer) => matches!(answer.to_ascii_lowercase().as_str(), "" | "y" | "yes"),
            // 비대화형 실행에서는 자동 업데이트하지 않음
            None => false,
        }
    }

    fn show_launcher_notice(&mut self, announcement: Option<&str>) {
        self.close_bar();
        let _ = writeln!(self.output, "A new launcher version is available. Please download it.");
        if let Some(text) = announcement {
            let _ = writeln!(self.output, "{}", strip_markup(text));
        }
    }

    fn show_announcement(&mut self, board: &Board) {
        self.close_bar();
        let _ = writeln!(self.output, "─── {} ───", board.title);
        let _ = writeln!(self.output, "{}", strip_markup(&board.text));
    }

    fn begin_step(&mut self, title: &str, label: &str) {
        self.close_bar();
        let _ = writeln!(self.output, "▶ {}", title);
        self.label = label.to_string();
    }

    fn progress(&mut self, percent: u8) {
        let _ = write!(self.output, "\r{}", render_bar(&self.label, percent));
        let _ = self.output.flush();
        self.bar_open = true;
    }

    fn end_step(&mut self) {
        self.close_bar();
        self.label.clear();
    }

    fn show_error(&mut self, title: &str, message: &str) {
        self.close_bar();
        let _ = writeln!(self.output, "✗ {}: {}", title, message);
    }

    fn show_info(&mut self, title: &str, message: &str) {
        self.close_bar();
        let _ = writeln!(self.output, "ℹ {}: {}", title, message);
    }
}
