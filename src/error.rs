use std::path::{Path, PathBuf};

use thiserror::Error;

/// 수집/정리 파이프라인 전반에서 쓰이는 오류 분류.
#[derive(Error, Debug)]
pub enum Error {
    #[error("필수 외부 도구를 찾을 수 없습니다: {0}")]
    ToolMissing(String),

    #[error("메타데이터를 가져오지 못했습니다: {0}")]
    Metadata(String),

    #[error("다운로드 프로세스가 실패했습니다: {0}")]
    FetchProcess(String),

    #[error("파일 작업 실패 ({path}): {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("지원하지 않는 형식입니다: {0}")]
    UnsupportedFormat(String),

    #[error("네트워크 오류: {0}")]
    Network(String),

    #[error("태그 기록 실패: {0}")]
    Tag(String),

    #[error("카탈로그 오류: {0}")]
    Catalog(String),

    #[error("사용자에 의해 중단되었습니다")]
    Interrupted,
}

impl Error {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// 배치 전체를 중단시켜야 하는 오류인지 여부.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ToolMissing(_) | Error::Io { .. } | Error::Interrupted
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Network(e.to_string())
    }
}

impl From<id3::Error> for Error {
    fn from(e: id3::Error) -> Self {
        Error::Tag(e.to_string())
    }
}

impl From<lofty::error::LoftyError> for Error {
    fn from(e: lofty::error::LoftyError) -> Self {
        Error::Tag(e.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Error::Catalog(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
