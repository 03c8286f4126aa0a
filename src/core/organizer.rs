use std::path::{Path, PathBuf};

use crate::config::{MergePolicy, Settings};
use crate::core::normalizer::Normalizer;
use crate::core::placement;
use crate::error::{Error, Result};
use crate::interrupt;

/// 보고서에 남길 파일 이름 변경 예시의 최대 개수.
pub const RENAME_SAMPLE_LIMIT: usize = 10;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OrganizeReport {
    pub dirs_renamed: usize,
    pub dirs_merged: usize,
    pub dirs_rejected: usize,
    pub files_processed: usize,
    pub files_renamed: usize,
    pub artist_changes: Vec<(String, String)>,
    pub file_samples: Vec<(String, String)>,
}

/// 라이브러리의 아티스트 폴더와 파일 이름을 정규화한다.
///
/// 연결 확인에 실패하면 어떤 파일도 건드리지 않고 오류를 돌려준다.
pub fn organize_library(settings: &Settings, normalizer: &Normalizer) -> Result<OrganizeReport> {
    let root = &settings.library_root;
    if !root.is_dir() {
        return Err(Error::io(
            root,
            std::io::Error::new(std::io::ErrorKind::NotFound, "라이브러리가 없습니다"),
        ));
    }

    normalizer.preflight()?;

    let mut report = OrganizeReport::default();
    for (name, dir) in artist_dirs(root, &settings.staging_dir_name)? {
        interrupt::check()?;
        let dir = organize_artist_dir(
            root,
            &name,
            dir,
            normalizer,
            settings.normalizer.merge_policy,
            &mut report,
        )?;
        organize_files(&dir, normalizer, &mut report)?;
    }

    log::info!(
        "organize finished: {} dirs renamed, {} merged, {} files renamed",
        report.dirs_renamed,
        report.dirs_merged,
        report.files_renamed
    );
    Ok(report)
}

/// 스테이징 폴더를 뺀 최상위 디렉토리 목록. 이름순.
fn artist_dirs(root: &Path, staging_name: &str) -> Result<Vec<(String, PathBuf)>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(root).map_err(|e| Error::io(root, e))? {
        let entry = entry.map_err(|e| Error::io(root, e))?;
        let path = entry.path();
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            log::warn!("skipping non UTF-8 directory {}", path.display());
            continue;
        };
        if path.is_dir() && name != staging_name {
            dirs.push((name, path));
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// 폴더 이름을 정규화하고 최종 폴더 경로를 돌려준다.
fn organize_artist_dir(
    root: &Path,
    name: &str,
    dir: PathBuf,
    normalizer: &Normalizer,
    policy: MergePolicy,
    report: &mut OrganizeReport,
) -> Result<PathBuf> {
    let normalized = placement::artist_dir_name(&normalizer.normalize_artist(name));
    if normalized == name {
        return Ok(dir);
    }
    let target = root.join(&normalized);

    if !target.exists() {
        println!("폴더 이름 변경: {} → {}", name, normalized);
        std::fs::rename(&dir, &target).map_err(|e| Error::io(&dir, e))?;
        report.dirs_renamed += 1;
        report.artist_changes.push((name.to_string(), normalized));
        return Ok(target);
    }

    match policy {
        MergePolicy::Reject => {
            log::warn!(
                "not merging {} into existing {}: merge policy is reject",
                name,
                normalized
            );
            report.dirs_rejected += 1;
            Ok(dir)
        }
        MergePolicy::Merge => {
            println!("폴더 병합: {} → {}", name, normalized);
            merge_into(&dir, &target)?;
            report.dirs_merged += 1;
            report.artist_changes.push((name.to_string(), normalized));
            Ok(target)
        }
    }
}

/// `source`의 파일을 하나씩 `target`으로 옮기고 빈 `source`를 지운다.
fn merge_into(source: &Path, target: &Path) -> Result<()> {
    for entry in std::fs::read_dir(source).map_err(|e| Error::io(source, e))? {
        let entry = entry.map_err(|e| Error::io(source, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let mut dest = target.join(entry.file_name());
        if dest.exists() {
            dest = placement::disambiguate(&dest);
        }
        placement::move_file(&path, &dest)?;
    }
    // 하위 폴더가 남아 있으면 지우지 않는다.
    if let Err(e) = std::fs::remove_dir(source) {
        log::warn!("could not remove merged directory {}: {}", source.display(), e);
    }
    Ok(())
}

fn organize_files(dir: &Path, normalizer: &Normalizer, report: &mut OrganizeReport) -> Result<()> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| Error::io(dir, e))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    files.sort();

    for path in files {
        interrupt::check()?;
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let new_name = placement::sanitize_component(&normalizer.normalize_file(&name, &ext));
        if new_name != name {
            let renamed = placement::rename_within(&path, &new_name)?;
            let final_name = renamed
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or(new_name);
            report.files_renamed += 1;
            if report.file_samples.len() < RENAME_SAMPLE_LIMIT {
                report.file_samples.push((name, final_name));
            }
        }
        report.files_processed += 1;
    }
    Ok(())
}
