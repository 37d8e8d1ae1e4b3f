//! 명령줄 인자
//!
//! ```text
//! exvr-launcher [-log] [--config <file>] [--install-path <dir>] [--yes] [--reset]
//! ```

use anyhow::bail;
use std::path::PathBuf;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CliArgs {
    /// 콘솔 로그 출력 + 앱에 `-log` 전달
    pub log: bool,
    pub config: Option<PathBuf>,
    pub install_path: Option<PathBuf>,
    pub yes: bool,
    /// 설치 기록 삭제 후 시작
    pub reset: bool,
    pub help: bool,
    pub version: bool,
}

pub fn parse<I, S>(args: I) -> anyhow::Result<CliArgs>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut out = CliArgs::default();
    let mut iter = args.into_iter().map(Into::into);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-log" | "--log" => out.log = true,
            "--config" => match iter.next() {
                Some(v) => out.config = Some(PathBuf::from(v)),
                None => bail!("--config requires a file path"),
            },
            "--install-path" => match iter.next() {
                Some(v) => out.install_path = Some(PathBuf::from(v)),
                None => bail!("--install-path requires a directory"),
            },
            "-y" | "--yes" => out.yes = true,
            "--reset" => out.reset = true,
            "-h" | "--help" => out.help = true,
            "-V" | "--version" => out.version = true,
            // 알 수 없는 인자는 무시
            other => tracing::debug!("[Cli] Ignoring unknown argument {}", other),
        }
    }
    Ok(out)
}

pub fn print_help() {
    println!("ExVR Launcher {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("USAGE:");
    println!("  exvr-launcher [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -log, --log              Mirror logs to the console and pass -log to ExVR");
    println!("  --config <file>          Settings file (default: <home>/launcher.toml)");
    println!("  --install-path <dir>     Install into <dir> without prompting");
    println!("  -y, --yes                Accept updates without prompting");
    println!("  --reset                  Forget the recorded installation before starting");
    println!("  -h, --help               Show this help");
    println!("  -V, --version            Show the launcher version");
    println!();
    println!("ENVIRONMENT:");
    println!("  EXVR_LAUNCHER_HOME       Directory for launcher.toml, exvr_config.json and logs");
    println!("  RUST_LOG                 Log filter (default: info)");
}
