use crate::config::Settings;
use crate::core::{parser, tagger};
use crate::core::tagger::TagFormat;
use crate::error::{Error, Result};
use crate::interrupt;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RetagReport {
    pub found: usize,
    pub updated: usize,
    pub failed: usize,
}

/// 각 아티스트 폴더의 파일 이름에서 태그를 다시 만들어 기록한다.
pub fn retag_library(settings: &Settings) -> Result<RetagReport> {
    let root = &settings.library_root;
    let mut report = RetagReport::default();

    let mut dirs: Vec<_> = std::fs::read_dir(root)
        .map_err(|e| Error::io(root, e))?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir() && e.file_name() != settings.staging_dir_name.as_str())
        .collect();
    dirs.sort_by_key(|e| e.file_name());

    for dir in dirs {
        let artist = dir.file_name().to_string_lossy().into_owned();
        let mut files: Vec<_> = std::fs::read_dir(dir.path())
            .map_err(|e| Error::io(dir.path(), e))?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && TagFormat::is_supported(p))
            .collect();
        files.sort();

        for path in files {
            interrupt::check()?;
            report.found += 1;
            let tags = parser::parse_library_filename(&artist, &path);
            match tagger::set_tags(&path, &tags, None) {
                Ok(()) => {
                    log::info!("retagged {}: {}", path.display(), tags.summary());
                    report.updated += 1;
                }
                Err(e) => {
                    println!("  태그 기록 실패 {}: {}", path.display(), e);
                    report.failed += 1;
                }
            }
        }
    }
    Ok(report)
}
