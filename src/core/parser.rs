use std::path::Path;

use crate::models::{TrackTags, DEFAULT_ALBUM};

/// Derive tags for a library file from its artist directory and file name.
///
/// Library files are named `{artist}_{title}_{album}.{ext}`; the directory name is
/// always used as the artist.
///
/// Supported patterns:
/// - "Artist_Title_Album.m4a" (artist prefix matches the directory)
/// - "Other_Title_Album.m4a" (first segment dropped, last segment is the album)
/// - "Other_Title.m4a" (second segment is the title)
/// - "Title.m4a" (fallback: whole stem is the title)
pub fn parse_library_filename(artist_dir: &str, path: &Path) -> TrackTags {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .trim();

    let mut tags = TrackTags::new(artist_dir, stem, DEFAULT_ALBUM);

    // Titles may contain underscores; prefer the directory prefix when it is there.
    if let Some(rest) = stem
        .strip_prefix(artist_dir)
        .and_then(|r| r.strip_prefix('_'))
    {
        if let Some((title, album)) = split_album(rest) {
            tags.title = title.to_string();
            tags.album = album.to_string();
        } else if !rest.is_empty() {
            tags.title = rest.to_string();
        }
        return tags;
    }

    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() >= 2 && !parts[1].trim().is_empty() {
        tags.title = parts[1].trim().to_string();
    }
    if parts.len() >= 3 && !parts[parts.len() - 1].trim().is_empty() {
        tags.title = parts[1..parts.len() - 1].join("_").trim().to_string();
        tags.album = parts[parts.len() - 1].trim().to_string();
    }
    tags
}

fn split_album(rest: &str) -> Option<(&str, &str)> {
    let (title, album) = rest.rsplit_once('_')?;
    let (title, album) = (title.trim(), album.trim());
    if title.is_empty() || album.is_empty() {
        return None;
    }
    Some((title, album))
}
