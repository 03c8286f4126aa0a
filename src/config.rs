use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub normalizer: NormalizerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// 라이브러리 루트. 비어 있으면 `$HOME/Music/musicshelf`.
    pub root: Option<PathBuf>,
    pub staging_dir: String,
    pub ledger_file: String,
    /// 카탈로그 내보내기 위치. 비어 있으면 라이브러리 루트.
    pub export_dir: Option<PathBuf>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            root: None,
            staging_dir: "_staging".to_string(),
            ledger_file: "ledger.csv".to_string(),
            export_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub ytdlp: String,
    pub ffmpeg: String,
    pub audio_format: AudioFormat,
    pub watch_url_template: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            ytdlp: "yt-dlp".to_string(),
            ffmpeg: "ffmpeg".to_string(),
            audio_format: AudioFormat::M4a,
            watch_url_template: "https://www.youtube.com/watch?v={id}".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    M4a,
    Mp3,
}

impl AudioFormat {
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::M4a => "m4a",
            AudioFormat::Mp3 => "mp3",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub artwork_timeout_secs: u64,
    /// 다운로드 도구의 정보/플레이리스트 조회 제한 시간.
    pub info_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            artwork_timeout_secs: 30,
            info_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    pub url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub merge_policy: MergePolicy,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            timeout_secs: 60,
            merge_policy: MergePolicy::Merge,
        }
    }
}

/// 정규화된 아티스트 폴더명이 이미 존재할 때의 처리 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    #[default]
    Merge,
    Reject,
}

/// 설정에서 한 번 계산되어 모든 구성요소에 전달되는 경로/옵션 묶음.
#[derive(Debug, Clone)]
pub struct Settings {
    pub library_root: PathBuf,
    pub staging_dir_name: String,
    pub ledger_file: String,
    pub export_dir: PathBuf,
    pub download: DownloadConfig,
    pub artwork_timeout: Duration,
    pub info_timeout: Duration,
    pub normalizer: NormalizerConfig,
}

impl Settings {
    pub fn from_config(config: &Config, library_override: Option<PathBuf>) -> Self {
        let library_root = library_override
            .or_else(|| config.library.root.clone())
            .unwrap_or_else(default_library_root);
        let export_dir = config
            .library
            .export_dir
            .clone()
            .unwrap_or_else(|| library_root.clone());

        Self {
            library_root,
            staging_dir_name: config.library.staging_dir.clone(),
            ledger_file: config.library.ledger_file.clone(),
            export_dir,
            download: config.download.clone(),
            artwork_timeout: Duration::from_secs(config.network.artwork_timeout_secs),
            info_timeout: Duration::from_secs(config.network.info_timeout_secs),
            normalizer: config.normalizer.clone(),
        }
    }

    /// 기본 설정에 라이브러리 루트만 지정한다.
    pub fn for_library(root: &Path) -> Self {
        Self::from_config(&Config::default(), Some(root.to_path_buf()))
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.library_root.join(&self.staging_dir_name)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.library_root.join(&self.ledger_file)
    }

    pub fn catalog_csv_path(&self) -> PathBuf {
        self.export_dir.join("catalog.csv")
    }

    pub fn catalog_markdown_path(&self) -> PathBuf {
        self.export_dir.join("catalog.md")
    }

    pub fn normalizer_timeout(&self) -> Duration {
        Duration::from_secs(self.normalizer.timeout_secs)
    }
}

fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
}

fn default_library_root() -> PathBuf {
    home_dir().join("Music").join("musicshelf")
}

fn config_path() -> PathBuf {
    home_dir()
        .join(".config")
        .join("musicshelf")
        .join("config.toml")
}

pub fn load_config() -> Config {
    let path = config_path();
    if !path.exists() {
        return Config::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
            log::warn!("ignoring unparsable config {}: {}", path.display(), e);
            Config::default()
        }),
        Err(_) => Config::default(),
    }
}

pub fn save_config(config: &Config) -> Result<()> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(&path, content)?;
    Ok(())
}
