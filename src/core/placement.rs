use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::models::{TrackTags, DEFAULT_ARTIST};

/// 경로 구분자를 `-`로 치환한다.
pub fn sanitize_component(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '/' | '\\' => '-',
            '\0' => '_',
            c => c,
        })
        .collect()
}

/// 아티스트 폴더명. 비었거나 `.`/`..`이면 기본값을 쓴다.
pub fn artist_dir_name(artist: &str) -> String {
    let name = sanitize_component(artist.trim());
    if name.is_empty() || name == "." || name == ".." {
        DEFAULT_ARTIST.to_string()
    } else {
        name
    }
}

/// `"{artist}_{title}_{album}.{ext}"` 형식의 파일명을 만든다.
pub fn build_filename(tags: &TrackTags, ext: &str) -> String {
    sanitize_component(&format!(
        "{}_{}_{}.{}",
        tags.artist, tags.title, tags.album, ext
    ))
}

/// 확장자 앞에 `_alt`, `_alt2`, `_alt3`, ... 를 붙여 존재하지 않는 첫 경로를 고른다.
pub fn disambiguate(path: &Path) -> PathBuf {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut n = 1u32;
    loop {
        let suffix = if n == 1 {
            "_alt".to_string()
        } else {
            format!("_alt{}", n)
        };
        let candidate = dir.join(format!("{}{}{}", stem, suffix, ext));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    Placed(PathBuf),
    /// 같은 경로에 파일이 이미 있어 아무것도 하지 않았다.
    AlreadyPresent(PathBuf),
}

/// 파일을 옮긴다. 파일시스템을 넘는 경우 복사 후 원본을 지운다.
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to).map_err(|e| Error::io(to, e))?;
    std::fs::remove_file(from).map_err(|e| Error::io(from, e))?;
    Ok(())
}

/// 스테이징 파일을 `artist_dir/filename`으로 배치한다.
///
/// 대상이 없으면 옮기고, 있으면서 `force`가 아니면 건드리지 않는다.
/// `force`면 접미사를 붙인 새 이름으로 옮긴다.
pub fn place(staged: &Path, artist_dir: &Path, filename: &str, force: bool) -> Result<Placement> {
    let dest = artist_dir.join(filename);

    if dest.exists() {
        if !force {
            return Ok(Placement::AlreadyPresent(dest));
        }
        let alt = disambiguate(&dest);
        log::info!("{} exists, placing as {}", dest.display(), alt.display());
        move_file(staged, &alt)?;
        return Ok(Placement::Placed(alt));
    }

    std::fs::create_dir_all(artist_dir).map_err(|e| Error::io(artist_dir, e))?;
    move_file(staged, &dest)?;
    Ok(Placement::Placed(dest))
}

/// 같은 디렉토리 안에서 이름을 바꾼다. 충돌하면 접미사를 붙인다.
/// 이미 같은 이름이면 현재 경로를 그대로 반환한다.
pub fn rename_within(old_path: &Path, new_name: &str) -> Result<PathBuf> {
    let dir = old_path.parent().unwrap_or_else(|| Path::new("."));
    let mut new_path = dir.join(new_name);

    if old_path == new_path {
        return Ok(new_path);
    }
    if new_path.exists() {
        new_path = disambiguate(&new_path);
    }
    std::fs::rename(old_path, &new_path).map_err(|e| Error::io(old_path, e))?;
    Ok(new_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sanitize_component_replaces_separators() {
        assert_eq!(sanitize_component("AC/DC\\Live"), "AC-DC-Live");
        assert_eq!(sanitize_component("a\0b"), "a_b");
    }

    #[test]
    fn test_sanitize_component_normal_text() {
        assert_eq!(sanitize_component("아이유 - 좋은날"), "아이유 - 좋은날");
    }

    #[test]
    fn test_build_filename() {
        let tags = TrackTags::new("AC/DC", "Back In Black", "YouTube");
        assert_eq!(build_filename(&tags, "m4a"), "AC-DC_Back In Black_YouTube.m4a");
    }

    #[test]
    fn test_artist_dir_name_fallback() {
        assert_eq!(artist_dir_name("  "), DEFAULT_ARTIST);
        assert_eq!(artist_dir_name(".."), DEFAULT_ARTIST);
        assert_eq!(artist_dir_name(" Foo/Bar "), "Foo-Bar");
    }

    #[test]
    fn test_place_moves_and_creates_artist_dir() {
        let dir = tempdir().unwrap();
        let staged = dir.path().join("staged.m4a");
        std::fs::write(&staged, b"audio").unwrap();
        let artist_dir = dir.path().join("Artist");

        let result = place(&staged, &artist_dir, "a_t_b.m4a", false).unwrap();
        assert_eq!(result, Placement::Placed(artist_dir.join("a_t_b.m4a")));
        assert!(!staged.exists());
        assert_eq!(std::fs::read(artist_dir.join("a_t_b.m4a")).unwrap(), b"audio");
    }

    #[test]
    fn test_place_existing_without_force_is_noop() {
        let dir = tempdir().unwrap();
        let artist_dir = dir.path().join("Artist");
        std::fs::create_dir_all(&artist_dir).unwrap();
        std::fs::write(artist_dir.join("x.m4a"), b"old").unwrap();
        let staged = dir.path().join("staged.m4a");
        std::fs::write(&staged, b"new").unwrap();

        let result = place(&staged, &artist_dir, "x.m4a", false).unwrap();
        assert_eq!(result, Placement::AlreadyPresent(artist_dir.join("x.m4a")));
        assert_eq!(std::fs::read(artist_dir.join("x.m4a")).unwrap(), b"old");
        assert_eq!(std::fs::read_dir(&artist_dir).unwrap().count(), 1);
        assert!(staged.exists());
    }

    #[test]
    fn test_place_forced_collision_gets_suffix() {
        let dir = tempdir().unwrap();
        let artist_dir = dir.path().join("Artist");
        std::fs::create_dir_all(&artist_dir).unwrap();
        std::fs::write(artist_dir.join("x.m4a"), b"old").unwrap();

        for (i, expected) in ["x_alt.m4a", "x_alt2.m4a"].iter().enumerate() {
            let staged = dir.path().join(format!("staged{}.m4a", i));
            std::fs::write(&staged, b"new").unwrap();
            let result = place(&staged, &artist_dir, "x.m4a", true).unwrap();
            assert_eq!(result, Placement::Placed(artist_dir.join(expected)));
        }
        assert_eq!(std::fs::read(artist_dir.join("x.m4a")).unwrap(), b"old");
    }

    #[test]
    fn test_disambiguate_without_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("README");
        assert_eq!(disambiguate(&path), dir.path().join("README_alt"));
    }

    #[test]
    fn test_rename_within_collision() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.mp3");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(dir.path().join("b.mp3"), b"b").unwrap();

        let renamed = rename_within(&a, "b.mp3").unwrap();
        assert_eq!(renamed, dir.path().join("b_alt.mp3"));
        assert!(!a.exists());
        assert_eq!(rename_within(&renamed, "b_alt.mp3").unwrap(), renamed);
    }
}
