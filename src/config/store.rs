//! JSON 파일 설치 기록 저장소
//!
//! `{"InstallPath": "...", "PythonPath": "..."}` 형식. 다른 키는 저장 시 그대로 보존합니다.

use exvr_launcher_engine::{ConfigStore, InstallState, LauncherError, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

const INSTALL_KEY: &str = "InstallPath";
const RUNTIME_KEY: &str = "PythonPath";

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_object(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let text = std::fs::read_to_string(&self.path).map_err(|e| LauncherError::fs("read", &self.path, e))?;
        match serde_json::from_str::<Value>(&text)? {
            Value::Object(map) => Ok(map),
            other => Err(LauncherError::Config(format!(
                "{} must contain a JSON object, found {}",
                self.path.display(),
                other
            ))),
        }
    }
}

fn path_field(map: &Map<String, Value>, key: &str) -> Option<PathBuf> {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

impl ConfigStore for JsonFileStore {
    fn load(&self) -> Result<InstallState> {
        let map = self.read_object()?;
        Ok(InstallState {
            install_path: path_field(&map, INSTALL_KEY),
            runtime_path: path_field(&map, RUNTIME_KEY),
        })
    }

    fn save(&self, state: &InstallState) -> Result<()> {
        // 손상된 파일은 덮어씀
        let mut map = self.read_object().unwrap_or_else(|e| {
            tracing::warn!("[Store] Replacing unreadable record {}: {}", self.path.display(), e);
            Map::new()
        });

        for (key, value) in [(INSTALL_KEY, state.install_path()), (RUNTIME_KEY, state.runtime_path())] {
            match value {
                Some(p) => {
                    map.insert(key.to_string(), Value::String(p.display().to_string()));
                }
                None => {
                    map.remove(key);
                }
            }
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| LauncherError::fs("create_dir", parent, e))?;
            }
        }
        let text = serde_json::to_string_pretty(&Value::Object(map))?;
        std::fs::write(&self.path, text).map_err(|e| LauncherError::fs("write", &self.path, e))?;
        tracing::debug!("[Store] Wrote {}", self.path.display());
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!("[Store] Deleted install record {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LauncherError::fs("remove_file", &self.path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty_state() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("exvr_config.json"));
        assert_eq!(store.load().unwrap(), InstallState::default());
        store.delete().unwrap();
    }

    #[test]
    fn test_save_preserves_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("exvr_config.json");
        std::fs::write(&path, r#"{"Theme": "dark", "InstallPath": "/old"}"#).unwrap();

        let store = JsonFileStore::new(&path);
        let state = InstallState::new("/opt/exvr", "/opt/exvr/python/python.exe");
        store.save(&state).unwrap();
        store.save(&state).unwrap();

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["Theme"], "dark");
        assert_eq!(raw["InstallPath"], "/opt/exvr");
        assert_eq!(store.load().unwrap(), state);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("exvr_config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = JsonFileStore::new(&path);
        let err = store.load().unwrap_err();
        assert_eq!(err.kind(), exvr_launcher_engine::ErrorKind::Config);

        // 저장은 손상된 내용을 덮어씀
        store.save(&InstallState::new("/a", "/b")).unwrap();
        assert!(store.load().unwrap().is_complete());
    }

    #[test]
    fn test_delete_removes_record() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("exvr_config.json"));
        store.save(&InstallState::new("/a", "/b")).unwrap();
        store.delete().unwrap();
        assert!(!store.path().exists());
        assert_eq!(store.load().unwrap(), InstallState::default());
    }
}
