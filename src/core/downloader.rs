use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::core::ledger::Ledger;
use crate::core::placement::{self, Placement};
use crate::core::tagger::{self, ArtworkStatus};
use crate::error::{Error, Result};
use crate::interrupt;
use crate::models::{
    BatchSummary, DownloadRequest, FetchOptions, ItemOutcome, RemoteInfo, SkipReason,
    StagedTrack, TagStatus, TrackTags, DEFAULT_ALBUM, DEFAULT_ARTIST, DEFAULT_TITLE,
};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::sources::{ArtworkSource, FetchTool};

/// 원격 항목을 내려받아 라이브러리에 배치하고 태그를 달고 원장에 기록한다.
pub struct Downloader<'a> {
    settings: &'a Settings,
    ledger: &'a Ledger,
    fetcher: &'a dyn FetchTool,
    artwork: &'a dyn ArtworkSource,
}

/// 스테이징 디렉토리를 비운 상태로 준비하고, 범위를 벗어나면 다시 비운다.
struct StagingGuard<'p> {
    dir: &'p Path,
}

impl<'p> StagingGuard<'p> {
    fn prepare(dir: &'p Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        clear_dir(dir).map_err(|e| Error::io(dir, e))?;
        Ok(Self { dir })
    }
}

impl Drop for StagingGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = clear_dir(self.dir) {
            log::warn!("failed to clear staging {}: {}", self.dir.display(), e);
        }
    }
}

fn clear_dir(dir: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// 스테이징에서 결과 파일을 고른다. 기대한 확장자를 우선한다.
fn find_staged_file(dir: &Path, ext: &str) -> Result<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| Error::io(dir, e))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            !matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("part") | Some("ytdl") | Some("temp")
            )
        })
        .collect();
    files.sort();

    let preferred = files.iter().position(|p| {
        p.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(ext))
    });
    match preferred {
        Some(i) => Ok(files.swap_remove(i)),
        None => files.into_iter().next().ok_or_else(|| {
            Error::FetchProcess(format!(
                "스테이징 디렉토리에 결과 파일이 없습니다: {}",
                dir.display()
            ))
        }),
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// 원격 정보와 요청으로 태그를 만든다. 아티스트 덮어쓰기가 업로더보다 우선한다.
fn resolve_tags(url: &str, info: &RemoteInfo, request: &DownloadRequest) -> TrackTags {
    let artist = non_empty(request.artist_override.as_deref())
        .or_else(|| non_empty(info.uploader.as_deref()))
        .unwrap_or_else(|| DEFAULT_ARTIST.to_string());
    let title = non_empty(info.title.as_deref()).unwrap_or_else(|| DEFAULT_TITLE.to_string());
    let album = non_empty(info.album.as_deref()).unwrap_or_else(|| DEFAULT_ALBUM.to_string());

    TrackTags {
        artist,
        title,
        album,
        source_url: Some(url.to_string()),
    }
}

impl<'a> Downloader<'a> {
    pub fn new(
        settings: &'a Settings,
        ledger: &'a Ledger,
        fetcher: &'a dyn FetchTool,
        artwork: &'a dyn ArtworkSource,
    ) -> Self {
        Self {
            settings,
            ledger,
            fetcher,
            artwork,
        }
    }

    /// 단일 항목을 수집한다.
    pub fn download_single(
        &self,
        url: &str,
        request: &DownloadRequest,
        progress: &mut dyn ProgressSink,
    ) -> Result<ItemOutcome> {
        self.fetcher.preflight()?;
        self.ingest(url, request, None, progress)
    }

    /// 플레이리스트의 각 항목을 독립적으로 수집한다.
    /// 항목 하나의 실패는 집계만 하고 계속 진행하며, 치명적 오류만 배치를 멈춘다.
    pub fn download_playlist(
        &self,
        url: &str,
        request: &DownloadRequest,
        progress: &mut dyn ProgressSink,
    ) -> Result<BatchSummary> {
        self.fetcher.preflight()?;
        let entries = self.fetcher.list_playlist(url)?;
        let total = entries.len();
        let mut summary = BatchSummary {
            total,
            ..Default::default()
        };

        for (idx, entry) in entries.iter().enumerate() {
            interrupt::check()?;
            let Some(item_url) = entry.source_url(&self.settings.download.watch_url_template)
            else {
                log::warn!("playlist entry {} has neither id nor url", idx + 1);
                summary.failed += 1;
                continue;
            };

            match self.ingest(&item_url, request, Some((idx + 1, total)), progress) {
                Ok(ItemOutcome::Downloaded { tagging, .. }) => {
                    summary.downloaded += 1;
                    match tagging {
                        TagStatus::Tagged => {}
                        TagStatus::Unsupported => summary.untagged += 1,
                        TagStatus::Failed => summary.partial += 1,
                    }
                }
                Ok(ItemOutcome::Skipped(_)) => summary.skipped += 1,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    progress.emit(ProgressEvent::Message(format!(
                        "  건너뜀 [{}/{}] {}: {}",
                        idx + 1,
                        total,
                        item_url,
                        e
                    )));
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }

    fn ingest(
        &self,
        url: &str,
        request: &DownloadRequest,
        position: Option<(usize, usize)>,
        progress: &mut dyn ProgressSink,
    ) -> Result<ItemOutcome> {
        interrupt::check()?;

        if !request.force && self.ledger.contains(url)? {
            progress.emit(ProgressEvent::Message(format!(
                "이미 원장에 있습니다. 건너뜁니다: {}",
                url
            )));
            return Ok(ItemOutcome::Skipped(SkipReason::AlreadyInLedger));
        }

        let info = self.fetcher.fetch_info(url)?;
        let tags = resolve_tags(url, &info, request);
        let ext = request.kind.extension(self.settings.download.audio_format);
        let artist_dir = self
            .settings
            .library_root
            .join(placement::artist_dir_name(&tags.artist));
        let filename = placement::build_filename(&tags, ext);

        if !request.force && artist_dir.join(&filename).exists() {
            progress.emit(ProgressEvent::Message(format!(
                "이미 라이브러리에 있습니다. 건너뜁니다: {}",
                artist_dir.join(&filename).display()
            )));
            return Ok(ItemOutcome::Skipped(SkipReason::AlreadyInLibrary));
        }

        let staging_dir = self.settings.staging_dir();
        let _staging = StagingGuard::prepare(&staging_dir)?;

        let label = match position {
            Some((idx, total)) => format!("[{}/{}] {}", idx, total, tags.title),
            None => tags.title.clone(),
        };
        progress.emit(ProgressEvent::Started { label });
        let options = FetchOptions {
            kind: request.kind,
            quality: request.quality.clone(),
            audio_format: self.settings.download.audio_format,
        };
        let fetched = self.fetcher.download(url, &options, &staging_dir, progress);
        progress.emit(ProgressEvent::Finished);
        fetched?;

        let staged = StagedTrack {
            local_path: find_staged_file(&staging_dir, ext)?,
            tags,
            source_id: url.to_string(),
            thumbnail_url: info.best_thumbnail().map(|t| t.url.clone()),
        };

        let path = match placement::place(&staged.local_path, &artist_dir, &filename, request.force)? {
            Placement::Placed(path) => path,
            Placement::AlreadyPresent(_) => {
                return Ok(ItemOutcome::Skipped(SkipReason::AlreadyInLibrary))
            }
        };
        progress.emit(ProgressEvent::Message(format!(
            "라이브러리로 이동했습니다: {}",
            path.display()
        )));

        // 태그 기록 실패는 배치를 되돌리지 않는다.
        // 태그를 달 수 없는 형식만 수집 완료로 보고 원장에 남긴다.
        let tagging = match tagger::tag_with_artwork(
            &path,
            &staged.tags,
            staged.thumbnail_url.as_deref(),
            self.artwork,
        ) {
            Ok(ArtworkStatus::Unavailable(reason)) => {
                progress.emit(ProgressEvent::Message(format!(
                    "  커버 아트 없이 태그를 기록했습니다: {}",
                    reason
                )));
                TagStatus::Tagged
            }
            Ok(_) => TagStatus::Tagged,
            Err(e @ Error::UnsupportedFormat(_)) => {
                progress.emit(ProgressEvent::Message(format!(
                    "  태그 기록을 건너뜁니다: {}",
                    e
                )));
                TagStatus::Unsupported
            }
            Err(e) => {
                log::warn!("tagging {} failed: {}", path.display(), e);
                progress.emit(ProgressEvent::Message(format!(
                    "  태그를 기록하지 못했습니다: {}",
                    e
                )));
                TagStatus::Failed
            }
        };

        if tagging != TagStatus::Failed {
            self.ledger.append(&staged.source_id, &staged.tags.artist)?;
        }
        Ok(ItemOutcome::Downloaded { path, tagging })
    }
}
