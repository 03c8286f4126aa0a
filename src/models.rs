use std::path::PathBuf;

use serde::Deserialize;

use crate::config::AudioFormat;

pub const DEFAULT_ARTIST: &str = "Unknown";
pub const DEFAULT_TITLE: &str = "Untitled";
pub const DEFAULT_ALBUM: &str = "YouTube";

/// 파일에 기록되는 설명 태그.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackTags {
    pub artist: String,
    pub title: String,
    pub album: String,
    pub source_url: Option<String>,
}

impl TrackTags {
    pub fn new(artist: &str, title: &str, album: &str) -> Self {
        Self {
            artist: artist.to_string(),
            title: title.to_string(),
            album: album.to_string(),
            source_url: None,
        }
    }

    pub fn summary(&self) -> String {
        format!("{} - {} [{}]", self.artist, self.title, self.album)
    }
}

/// 원장 한 줄: 한 번 수집된 원본 URL과 채널.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub source_id: String,
    pub channel: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thumbnail {
    pub url: String,
    #[serde(default)]
    pub width: Option<u64>,
    #[serde(default)]
    pub height: Option<u64>,
}

impl Thumbnail {
    pub fn area(&self) -> u64 {
        self.width.unwrap_or(0) * self.height.unwrap_or(0)
    }
}

/// 다운로드 도구의 정보 조회 결과.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteInfo {
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub thumbnails: Vec<Thumbnail>,
}

impl RemoteInfo {
    /// 면적(가로 × 세로)이 가장 큰 썸네일.
    pub fn best_thumbnail(&self) -> Option<&Thumbnail> {
        self.thumbnails
            .iter()
            .filter(|t| !t.url.is_empty())
            .max_by_key(|t| t.area())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl PlaylistEntry {
    /// 항목의 원본 URL. 절대 URL이 없으면 id로 템플릿을 채운다.
    pub fn source_url(&self, watch_url_template: &str) -> Option<String> {
        if let Some(url) = self
            .url
            .as_deref()
            .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
        {
            return Some(url.to_string());
        }
        self.id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(|id| watch_url_template.replace("{id}", id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Audio,
    Video,
}

impl ContentKind {
    pub fn extension(self, audio_format: AudioFormat) -> &'static str {
        match self {
            ContentKind::Audio => audio_format.extension(),
            ContentKind::Video => "webm",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub kind: ContentKind,
    pub quality: Option<String>,
    pub force: bool,
    pub artist_override: Option<String>,
}

/// 다운로드 도구에 넘기는 옵션.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub kind: ContentKind,
    pub quality: Option<String>,
    pub audio_format: AudioFormat,
}

/// 한 번의 수집 동안만 존재하는 스테이징 파일.
#[derive(Debug, Clone)]
pub struct StagedTrack {
    pub local_path: PathBuf,
    pub tags: TrackTags,
    pub source_id: String,
    pub thumbnail_url: Option<String>,
}

/// 라이브러리에 배치된 파일과 내장 메타데이터.
#[derive(Debug, Clone)]
pub struct LibraryTrack {
    pub directory: String,
    pub filename: String,
    pub path: PathBuf,
    pub tags: Option<TrackTags>,
}

impl LibraryTrack {
    pub fn meta_artist(&self) -> Option<&str> {
        self.tags
            .as_ref()
            .map(|t| t.artist.as_str())
            .filter(|a| !a.is_empty())
    }
}

/// 카탈로그 내보내기 한 줄.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CatalogRecord {
    pub directory: String,
    pub filename: String,
    pub new_name: Option<String>,
    pub meta_artist: Option<String>,
    pub source_url: Option<String>,
    pub tags: Option<String>,
}

impl From<&LibraryTrack> for CatalogRecord {
    fn from(track: &LibraryTrack) -> Self {
        CatalogRecord {
            directory: track.directory.clone(),
            filename: track.filename.clone(),
            new_name: None,
            meta_artist: track.meta_artist().map(str::to_string),
            source_url: track.tags.as_ref().and_then(|t| t.source_url.clone()),
            tags: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyInLedger,
    AlreadyInLibrary,
}

/// 배치한 파일의 태그 기록 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagStatus {
    Tagged,
    /// 태그를 지원하지 않는 컨테이너(영상)라 기록을 건너뛰었다.
    Unsupported,
    /// 기록에 실패한 부분 성공. 원장에 남기지 않는다.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Downloaded { path: PathBuf, tagging: TagStatus },
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub downloaded: usize,
    /// 태그 기록에 실패한 항목.
    pub partial: usize,
    /// 태그를 지원하지 않아 건너뛴 항목.
    pub untagged: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thumb(url: &str, w: Option<u64>, h: Option<u64>) -> Thumbnail {
        Thumbnail {
            url: url.to_string(),
            width: w,
            height: h,
        }
    }

    #[test]
    fn test_best_thumbnail_by_area() {
        let info = RemoteInfo {
            uploader: None,
            title: None,
            album: None,
            thumbnails: vec![
                thumb("a", Some(1280), Some(720)),
                thumb("b", Some(1920), Some(1080)),
                thumb("c", None, Some(4000)),
            ],
        };
        assert_eq!(info.best_thumbnail().map(|t| t.url.as_str()), Some("b"));
    }

    #[test]
    fn test_best_thumbnail_empty() {
        let info: RemoteInfo = serde_json::from_str(r#"{"title": "x"}"#).unwrap();
        assert!(info.best_thumbnail().is_none());
    }

    #[test]
    fn test_playlist_entry_url() {
        let template = "https://www.youtube.com/watch?v={id}";
        let by_id = PlaylistEntry {
            id: Some("abc".into()),
            url: Some("abc".into()),
        };
        assert_eq!(
            by_id.source_url(template).as_deref(),
            Some("https://www.youtube.com/watch?v=abc")
        );

        let by_url = PlaylistEntry {
            id: Some("abc".into()),
            url: Some("https://example.com/v/abc".into()),
        };
        assert_eq!(
            by_url.source_url(template).as_deref(),
            Some("https://example.com/v/abc")
        );

        let empty = PlaylistEntry { id: None, url: None };
        assert!(empty.source_url(template).is_none());
    }
}
