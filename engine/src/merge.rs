//! 디렉터리 트리 병합 복사
//!
//! 업데이트 파일을 기존 설치본 위에 덮어쓸 때 사용합니다.
//!
//! ## 규칙
//! - 무시 목록에 있는 이름의 디렉터리: 대상에 없으면 빈 디렉터리만 만들고 내용은 건드리지 않음
//!   (깊이와 무관하게 이름으로 매칭)
//! - 그 외 디렉터리: 재귀적으로 병합
//! - 파일: 항상 덮어씀

use std::io::{Read, Write};
use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::error::{LauncherError, Result};

fn is_ignored(name: &str, ignored: &[String]) -> bool {
    ignored.iter().any(|i| i == name)
}

const COPY_CHUNK: usize = 64 * 1024;

/// 청크 단위 복사. 청크 사이마다 취소를 확인하며 복사한 바이트 수를 반환
///
/// `path`는 에러 메시지용 대상 경로입니다.
pub fn copy_chunked(
    reader: &mut dyn Read,
    writer: &mut dyn Write,
    cancel: Option<&CancellationToken>,
    path: &Path,
) -> Result<u64> {
    let mut buf = vec![0u8; COPY_CHUNK];
    let mut written: u64 = 0;
    loop {
        if cancel.map(|c| c.is_cancelled()).unwrap_or(false) {
            return Err(LauncherError::Cancelled);
        }
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(LauncherError::fs("read", path, e)),
        };
        writer.write_all(&buf[..n]).map_err(|e| LauncherError::fs("write", path, e))?;
        written += n as u64;
    }
    writer.flush().map_err(|e| LauncherError::fs("flush", path, e))?;
    Ok(written)
}

fn copy_file(src: &Path, dst: &Path, cancel: Option<&CancellationToken>) -> Result<()> {
    let mut input = std::fs::File::open(src).map_err(|e| LauncherError::fs("open", src, e))?;
    let permissions = input
        .metadata()
        .map_err(|e| LauncherError::fs("metadata", src, e))?
        .permissions();
    let mut output = std::fs::File::create(dst).map_err(|e| LauncherError::fs("create", dst, e))?;
    copy_chunked(&mut input, &mut output, cancel, dst)?;
    std::fs::set_permissions(dst, permissions).map_err(|e| LauncherError::fs("set_permissions", dst, e))?;
    Ok(())
}

/// 복사 대상 파일 수 (무시 디렉터리 내부는 제외)
pub fn count_files(src: &Path, ignored: &[String]) -> Result<usize> {
    let mut total = 0;
    let entries = std::fs::read_dir(src).map_err(|e| LauncherError::fs("read_dir", src, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| LauncherError::fs("read_dir", src, e))?;
        let path = entry.path();
        if path.is_dir() {
            if is_ignored(&entry.file_name().to_string_lossy(), ignored) {
                continue;
            }
            total += count_files(&path, ignored)?;
        } else {
            total += 1;
        }
    }
    Ok(total)
}

/// `src`를 `dst`에 병합 복사하고 복사한 파일 수를 반환
///
/// `on_file`은 파일 하나를 복사할 때마다 누적 개수와 함께 호출됩니다.
/// 취소 토큰이 주어지면 엔트리 사이와 파일 청크 사이마다 확인합니다.
pub fn merge_copy(
    src: &Path,
    dst: &Path,
    ignored: &[String],
    cancel: Option<&CancellationToken>,
    on_file: &mut dyn FnMut(usize),
) -> Result<usize> {
    let mut copied = 0;
    merge_inner(src, dst, ignored, cancel, on_file, &mut copied)?;
    Ok(copied)
}

fn merge_inner(
    src: &Path,
    dst: &Path,
    ignored: &[String],
    cancel: Option<&CancellationToken>,
    on_file: &mut dyn FnMut(usize),
    copied: &mut usize,
) -> Result<()> {
    std::fs::create_dir_all(dst).map_err(|e| LauncherError::fs("create_dir", dst, e))?;

    let entries = std::fs::read_dir(src).map_err(|e| LauncherError::fs("read_dir", src, e))?;
    for entry in entries {
        if cancel.map(|c| c.is_cancelled()).unwrap_or(false) {
            return Err(LauncherError::Cancelled);
        }

        let entry = entry.map_err(|e| LauncherError::fs("read_dir", src, e))?;
        let path = entry.path();
        let name = entry.file_name();
        let target = dst.join(&name);

        if path.is_dir() {
            if is_ignored(&name.to_string_lossy(), ignored) {
                if !target.exists() {
                    std::fs::create_dir_all(&target)
                        .map_err(|e| LauncherError::fs("create_dir", &target, e))?;
                }
                tracing::debug!("[Merge] Preserved {}", target.display());
                continue;
            }
            merge_inner(&path, &target, ignored, cancel, on_file, copied)?;
        } else {
            copy_file(&path, &target, cancel)?;
            *copied += 1;
            on_file(*copied);
        }
    }
    Ok(())
}

/// 최상위에 디렉터리 하나만 있으면 그 디렉터리를, 아니면 `root` 자체를 반환
pub fn unwrap_single_root(root: &Path) -> Result<std::path::PathBuf> {
    let mut entries = std::fs::read_dir(root)
        .map_err(|e| LauncherError::fs("read_dir", root, e))?
        .filter_map(|e| e.ok());

    let first = match entries.next() {
        Some(first) => first,
        None => return Ok(root.to_path_buf()),
    };
    if entries.next().is_some() {
        return Ok(root.to_path_buf());
    }

    let path = first.path();
    if path.is_dir() {
        Ok(path)
    } else {
        Ok(root.to_path_buf())
    }
}
