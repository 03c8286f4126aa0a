use std::path::Path;

use crate::core::tagger::{self, TagFormat};
use crate::error::{Error, Result};
use crate::models::{CatalogRecord, LibraryTrack};

/// 라이브러리를 재귀 탐색하여 지원하는 모든 오디오 파일을 읽는다.
/// `skip_dir` 이름의 최상위 폴더(스테이징)는 건너뛴다.
pub fn scan_library(root: &Path, skip_dir: &str) -> Result<Vec<LibraryTrack>> {
    if !root.is_dir() {
        return Err(Error::io(
            root,
            std::io::Error::new(std::io::ErrorKind::NotFound, "디렉토리가 아닙니다"),
        ));
    }
    let mut tracks = Vec::new();
    collect_tracks(root, root, skip_dir, &mut tracks)?;
    tracks.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(tracks)
}

/// 스캔 결과를 카탈로그 행으로 투영한다.
pub fn catalog_records(tracks: &[LibraryTrack]) -> Vec<CatalogRecord> {
    tracks.iter().map(CatalogRecord::from).collect()
}

fn collect_tracks(
    root: &Path,
    dir: &Path,
    skip_dir: &str,
    tracks: &mut Vec<LibraryTrack>,
) -> Result<()> {
    for entry in std::fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();

        if path.is_dir() {
            if dir == root && entry.file_name() == skip_dir {
                continue;
            }
            collect_tracks(root, &path, skip_dir, tracks)?;
        } else if TagFormat::is_supported(&path) {
            tracks.push(load_track(root, &path));
        }
    }
    Ok(())
}

/// 파일 하나를 읽는다. 태그를 읽지 못해도 목록에는 남긴다.
fn load_track(root: &Path, path: &Path) -> LibraryTrack {
    let directory = path
        .parent()
        .and_then(|p| p.strip_prefix(root).ok())
        .map(|p| p.to_string_lossy().into_owned())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| ".".to_string());
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let tags = match tagger::read_tags(path) {
        Ok(tags) => tags,
        Err(e) => {
            log::warn!("could not read tags from {}: {}", path.display(), e);
            None
        }
    };

    LibraryTrack {
        directory,
        filename,
        path: path.to_path_buf(),
        tags,
    }
}
