pub mod artwork;
pub mod ollama;
pub mod ytdlp;

use std::path::Path;

use crate::error::Result;
use crate::models::{FetchOptions, PlaylistEntry, RemoteInfo};
use crate::progress::ProgressSink;

/// 원격 영상 정보를 조회하고 내려받는 외부 도구.
pub trait FetchTool {
    /// 다운로드 도구와 변환 도구가 모두 있는지 확인한다.
    fn preflight(&self) -> Result<()>;
    /// 단일 항목의 메타데이터를 조회한다.
    fn fetch_info(&self, url: &str) -> Result<RemoteInfo>;
    /// 플레이리스트 항목을 평면 목록으로 조회한다.
    fn list_playlist(&self, url: &str) -> Result<Vec<PlaylistEntry>>;
    /// `staging` 디렉토리에 정확히 파일 하나를 내려받는다.
    fn download(
        &self,
        url: &str,
        options: &FetchOptions,
        staging: &Path,
        progress: &mut dyn ProgressSink,
    ) -> Result<()>;
}

/// 자유 형식 지시문을 받아 한 줄 응답을 돌려주는 텍스트 생성 서비스.
pub trait TextGenerator {
    fn generate(&self, prompt: &str) -> Result<String>;
}

/// 커버 이미지의 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverMime {
    Jpeg,
    Png,
}

impl CoverMime {
    /// URL 경로의 확장자로 형식을 추정한다. 애매하면 PNG.
    pub fn from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
        if path.ends_with(".jpg") || path.ends_with(".jpeg") {
            CoverMime::Jpeg
        } else {
            CoverMime::Png
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CoverMime::Jpeg => "image/jpeg",
            CoverMime::Png => "image/png",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoverArt {
    pub data: Vec<u8>,
    pub mime: CoverMime,
}

/// 커버 아트 이미지를 가져온다.
pub trait ArtworkSource {
    fn fetch_cover(&self, url: &str) -> Result<CoverArt>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cover_mime_from_url() {
        assert_eq!(CoverMime::from_url("https://i.ytimg.com/vi/x/maxresdefault.jpg"), CoverMime::Jpeg);
        assert_eq!(CoverMime::from_url("https://x/y.JPEG?sqp=abc"), CoverMime::Jpeg);
        assert_eq!(CoverMime::from_url("https://x/y.png"), CoverMime::Png);
        assert_eq!(CoverMime::from_url("https://x/y.webp"), CoverMime::Png);
        assert_eq!(CoverMime::from_url("https://x/cover"), CoverMime::Png);
    }
}
