//! 원격 메타데이터 및 릴리스 URL 조회
//!
//! 메타데이터는 실행마다 한 번만 가져와 불변 스냅샷으로 파이프라인에 전달됩니다.
//! 조회 실패는 치명적이지 않으며 "메타데이터 없음"으로 처리합니다.

use futures_util::future::BoxFuture;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::time::Duration;

use crate::settings::LauncherSettings;

/// 공지 보드
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Board {
    #[serde(default = "default_board_title")]
    pub title: String,
    #[serde(default)]
    pub text: String,
}

fn default_board_title() -> String {
    "Announcement".to_string()
}

/// 서버 데이터 문서
///
/// ```json
/// { "lau_version": 2, "lau_board": "<b>...</b>", "version": "1.3.0",
///   "board": { "title": "...", "text": "..." } }
/// ```
///
/// 서버 파일은 손으로 편집되므로 필드 타입이 어긋나도 문서 전체를 버리지 않습니다.
/// `version: 1.3`, `lau_version: 2.0`, `lau_version: "2"` 모두 허용하며
/// 해석할 수 없는 필드는 없는 것으로 취급합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RemoteMetadata {
    #[serde(rename = "lau_version", default, deserialize_with = "lenient_launcher_version")]
    pub launcher_version: Option<u32>,
    #[serde(rename = "lau_board", default, deserialize_with = "lenient_text")]
    pub launcher_announcement: Option<String>,
    #[serde(rename = "version", default, deserialize_with = "lenient_version")]
    pub application_version: Option<String>,
    #[serde(rename = "board", default, deserialize_with = "lenient_board")]
    pub board: Option<Board>,
}

/// 버전 값을 문자열로 정규화 (빈 문자열, 숫자 외 타입은 None)
pub fn version_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// 런처 버전 정수화. 소수는 올림하여 정수 현재 버전과의 엄격 비교 결과를 보존
fn launcher_version_number(value: &Value) -> Option<u32> {
    let number = match value {
        Value::Number(n) => match n.as_u64() {
            Some(v) => return u32::try_from(v).ok(),
            None => n.as_f64()?,
        },
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if number.is_finite() && number >= 0.0 && number <= u32::MAX as f64 {
        Some(number.ceil() as u32)
    } else {
        None
    }
}

fn lenient_launcher_version<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    let value = Value::deserialize(d)?;
    let parsed = launcher_version_number(&value);
    if parsed.is_none() && !value.is_null() {
        tracing::warn!("[Metadata] Ignoring unreadable lau_version: {}", value);
    }
    Ok(parsed)
}

fn lenient_version<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(d)?;
    let parsed = version_string(&value);
    if parsed.is_none() && !value.is_null() {
        tracing::warn!("[Metadata] Ignoring unreadable version: {}", value);
    }
    Ok(parsed)
}

fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    })
}

fn lenient_board<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Board>, D::Error> {
    let value = Value::deserialize(d)?;
    if value.is_null() {
        return Ok(None);
    }
    match serde_json::from_value(value) {
        Ok(board) => Ok(Some(board)),
        Err(e) => {
            tracing::warn!("[Metadata] Ignoring malformed board: {}", e);
            Ok(None)
        }
    }
}

impl RemoteMetadata {
    pub fn parse(text: &str) -> Option<Self> {
        match serde_json::from_str(text) {
            Ok(meta) => Some(meta),
            Err(e) => {
                tracing::warn!("[Metadata] Malformed server data: {}", e);
                None
            }
        }
    }

    /// 원격 런처 버전이 현재 버전보다 엄격히 큰 경우
    pub fn launcher_outdated(&self, current: u32) -> bool {
        self.launcher_version.map(|v| v > current).unwrap_or(false)
    }
}

/// 메타데이터 공급원
pub trait MetadataSource: Send + Sync {
    fn fetch(&self) -> BoxFuture<'_, Option<RemoteMetadata>>;
}

/// 설정된 URL을 순서대로 시도, 첫 성공 응답 사용
pub struct HttpMetadataSource {
    client: reqwest::Client,
    urls: Vec<String>,
    timeout: Duration,
}

impl HttpMetadataSource {
    pub fn new(client: reqwest::Client, urls: Vec<String>, timeout: Duration) -> Self {
        Self { client, urls, timeout }
    }

    pub fn from_settings(client: reqwest::Client, settings: &LauncherSettings) -> Self {
        Self::new(client, settings.metadata_urls.clone(), settings.metadata_timeout())
    }

    async fn fetch_one(&self, url: &str) -> Result<RemoteMetadata, String> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }
        let text = response.text().await.map_err(|e| e.to_string())?;
        serde_json::from_str(&text).map_err(|e| format!("invalid JSON: {}", e))
    }
}

impl MetadataSource for HttpMetadataSource {
    fn fetch(&self) -> BoxFuture<'_, Option<RemoteMetadata>> {
        Box::pin(async move {
            for url in &self.urls {
                match self.fetch_one(url).await {
                    Ok(meta) => {
                        tracing::info!("[Metadata] Server data loaded from {}", url);
                        return Some(meta);
                    }
                    Err(e) => tracing::warn!("[Metadata] {} failed: {}", url, e),
                }
            }
            tracing::warn!("[Metadata] No metadata source reachable, continuing without update checks");
            None
        })
    }
}

/// 미리 정해진 메타데이터 (테스트, 오프라인 실행)
#[derive(Debug, Clone, Default)]
pub struct StaticMetadata(pub Option<RemoteMetadata>);

impl MetadataSource for StaticMetadata {
    fn fetch(&self) -> BoxFuture<'_, Option<RemoteMetadata>> {
        Box::pin(async move { self.0.clone() })
    }
}

#[derive(Deserialize)]
struct LatestRelease {
    #[serde(default)]
    zipball_url: Option<String>,
}

/// 애플리케이션 아카이브 URL 결정 방식
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseSource {
    Fixed(String),
    GitHubLatest {
        api_url: String,
        proxy_prefix: String,
        fallback: String,
    },
}

impl ReleaseSource {
    pub fn from_settings(settings: &LauncherSettings) -> Self {
        match &settings.release_url {
            Some(url) => Self::Fixed(url.clone()),
            None => Self::GitHubLatest {
                api_url: settings.github_api_url(),
                proxy_prefix: settings.github_proxy.clone(),
                fallback: settings.release_fallback_url.clone(),
            },
        }
    }

    /// 다운로드할 URL. 실패하지 않으며 최악의 경우 대체 URL을 반환
    pub async fn resolve(&self, client: &reqwest::Client) -> String {
        let (api_url, proxy_prefix, fallback) = match self {
            Self::Fixed(url) => return url.clone(),
            Self::GitHubLatest { api_url, proxy_prefix, fallback } => (api_url, proxy_prefix, fallback),
        };

        tracing::info!("[Metadata] Resolving latest release from {}", api_url);
        let result = async {
            let response = client
                .get(api_url)
                .timeout(Duration::from_secs(5))
                .send()
                .await
                .map_err(|e| e.to_string())?;
            if !response.status().is_success() {
                return Err(format!("HTTP {}", response.status()));
            }
            response.json::<LatestRelease>().await.map_err(|e| e.to_string())
        }
        .await;

        match result {
            Ok(LatestRelease { zipball_url: Some(url) }) if url.contains("zipball") => {
                let resolved = format!("{}{}", proxy_prefix, url);
                tracing::info!("[Metadata] Latest release archive: {}", resolved);
                resolved
            }
            Ok(_) => {
                tracing::warn!("[Metadata] Release response has no zipball, using {}", fallback);
                fallback.clone()
            }
            Err(e) => {
                tracing::warn!("[Metadata] Release lookup failed ({}), using {}", e, fallback);
                fallback.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_document() {
        let meta = RemoteMetadata::parse(
            r#"{"lau_version": 2, "lau_board": "get the new launcher", "version": "1.3.0",
                "board": {"title": "News", "text": "<b>hello</b>"}}"#,
        )
        .unwrap();
        assert_eq!(meta.launcher_version, Some(2));
        assert_eq!(meta.application_version.as_deref(), Some("1.3.0"));
        assert_eq!(meta.board.as_ref().unwrap().title, "News");
        assert!(meta.launcher_outdated(1));
    }

    #[test]
    fn partial_document_is_accepted() {
        let meta = RemoteMetadata::parse(r#"{"version": "1.2.0", "board": {"text": "hi"}}"#).unwrap();
        assert_eq!(meta.launcher_version, None);
        assert!(!meta.launcher_outdated(1));
        assert_eq!(meta.board.unwrap().title, "Announcement");
    }

    #[test]
    fn launcher_version_comparison_is_strict() {
        let meta = RemoteMetadata { launcher_version: Some(1), ..Default::default() };
        assert!(!meta.launcher_outdated(1));
        assert!(!meta.launcher_outdated(2));
    }

    #[test]
    fn numeric_application_version_is_accepted() {
        let meta = RemoteMetadata::parse(r#"{"lau_version": 1, "version": 1.3}"#).unwrap();
        assert_eq!(meta.application_version.as_deref(), Some("1.3"));
        assert_eq!(meta.launcher_version, Some(1));

        let meta = RemoteMetadata::parse(r#"{"version": 2}"#).unwrap();
        assert_eq!(meta.application_version.as_deref(), Some("2"));
    }

    #[test]
    fn loosely_typed_launcher_version_keeps_strict_comparison() {
        let meta = RemoteMetadata::parse(r#"{"lau_version": 2.0, "version": "1.3.0"}"#).unwrap();
        assert_eq!(meta.launcher_version, Some(2));
        assert!(meta.launcher_outdated(1));
        assert!(!meta.launcher_outdated(2));

        let meta = RemoteMetadata::parse(r#"{"lau_version": 1.5}"#).unwrap();
        assert!(meta.launcher_outdated(1));
        assert!(!meta.launcher_outdated(2));

        let meta = RemoteMetadata::parse(r#"{"lau_version": "3"}"#).unwrap();
        assert_eq!(meta.launcher_version, Some(3));
    }

    #[test]
    fn mistyped_fields_do_not_discard_document() {
        let meta = RemoteMetadata::parse(
            r#"{"lau_version": "soon", "version": "1.4.0", "board": "plain text", "lau_board": null}"#,
        )
        .unwrap();
        assert_eq!(meta.launcher_version, None);
        assert_eq!(meta.application_version.as_deref(), Some("1.4.0"));
        assert_eq!(meta.board, None);
        assert_eq!(meta.launcher_announcement, None);

        let meta = RemoteMetadata::parse(r#"{"version": ""}"#).unwrap();
        assert_eq!(meta.application_version, None);
    }

    #[test]
    fn garbage_is_none() {
        assert!(RemoteMetadata::parse("<html>502 Bad Gateway</html>").is_none());
    }

    #[tokio::test]
    async fn fixed_release_source_needs_no_network() {
        let client = reqwest::Client::new();
        let src = ReleaseSource::Fixed("http://example.invalid/app.zip".into());
        assert_eq!(src.resolve(&client).await, "http://example.invalid/app.zip");
    }

    #[tokio::test]
    async fn unreachable_metadata_is_none() {
        let client = reqwest::Client::new();
        let source = HttpMetadataSource::new(
            client,
            vec!["http://127.0.0.1:1/exvrserverdata.json".into()],
            Duration::from_millis(500),
        );
        assert!(source.fetch().await.is_none());
    }
}
