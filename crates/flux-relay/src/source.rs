use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::warn;
use url::Url;

/// 允许的 URL 协议
const ALLOWED_SCHEMES: &[&str] = &["http", "https", "rtmp", "rtmps"];

/// 原生推拉流协议
const STREAM_SCHEMES: &[&str] = &["rtmp", "rtmps"];

/// 流媒体清单扩展名（HLS / DASH）
const MANIFEST_EXTENSIONS: &[&str] = &[".m3u8", ".mpd"];

/// 视频源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// 本地文件
    File,
    /// HTTP(S) 地址
    Url,
    /// 流媒体协议（RTMP、HLS、DASH）
    StreamProtocol,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::File => write!(f, "file"),
            SourceKind::Url => write!(f, "url"),
            SourceKind::StreamProtocol => write!(f, "stream"),
        }
    }
}

/// 视频源
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub locator: String,
    pub kind: SourceKind,
    pub valid: bool,
}

impl Source {
    /// 解析并分类视频源
    ///
    /// URL 不做网络探测，一律视为有效；本地文件仅在路径存在时有效。
    pub fn classify(locator: &str) -> Self {
        if let Some(kind) = classify_url(locator) {
            return Self {
                locator: locator.to_string(),
                kind,
                valid: true,
            };
        }

        let valid = Path::new(locator).exists();
        if !valid {
            warn!(source = %locator, "Local source file not found");
        }

        Self {
            locator: locator.to_string(),
            kind: SourceKind::File,
            valid,
        }
    }

    /// 占位视频；是否存在由引擎在启动时检查
    pub fn placeholder(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            kind: SourceKind::File,
            valid: true,
        }
    }

    pub fn is_remote(&self) -> bool {
        self.kind != SourceKind::File
    }

    /// 远程源的主机名
    pub fn host(&self) -> Option<String> {
        if !self.is_remote() {
            return None;
        }
        Url::parse(&self.locator)
            .ok()
            .and_then(|url| url.host_str().map(|h| h.to_ascii_lowercase()))
    }
}

fn classify_url(locator: &str) -> Option<SourceKind> {
    let url = Url::parse(locator).ok()?;
    let scheme = url.scheme();

    if !ALLOWED_SCHEMES.contains(&scheme) || url.host_str().is_none() {
        return None;
    }

    let path = url.path().to_ascii_lowercase();
    if STREAM_SCHEMES.contains(&scheme)
        || MANIFEST_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
    {
        Some(SourceKind::StreamProtocol)
    } else {
        Some(SourceKind::Url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_classify_http_url() {
        let source = Source::classify("https://cdn.example.com/videos/intro.mp4");
        assert_eq!(source.kind, SourceKind::Url);
        assert!(source.valid);
        assert_eq!(source.host().as_deref(), Some("cdn.example.com"));
    }

    #[test]
    fn test_classify_manifests_and_rtmp() {
        let hls = Source::classify("https://cdn.example.com/live/index.M3U8?token=1");
        assert_eq!(hls.kind, SourceKind::StreamProtocol);

        let dash = Source::classify("http://cdn.example.com/vod/manifest.mpd");
        assert_eq!(dash.kind, SourceKind::StreamProtocol);

        let rtmp = Source::classify("rtmp://origin.example.com/live/stream");
        assert_eq!(rtmp.kind, SourceKind::StreamProtocol);
        assert!(rtmp.valid);
    }

    #[test]
    fn test_classify_existing_file() {
        let file = NamedTempFile::new().unwrap();
        let locator = file.path().to_str().unwrap();

        let source = Source::classify(locator);
        assert_eq!(source.kind, SourceKind::File);
        assert!(source.valid);
        assert!(source.host().is_none());
    }

    #[test]
    fn test_classify_missing_file() {
        let source = Source::classify("/definitely/not/here/clip.mp4");
        assert_eq!(source.kind, SourceKind::File);
        assert!(!source.valid);
    }

    #[test]
    fn test_unlisted_scheme_is_treated_as_file() {
        let source = Source::classify("ftp://files.example.com/clip.mp4");
        assert_eq!(source.kind, SourceKind::File);
        assert!(!source.valid);
    }
}
