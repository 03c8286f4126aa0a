use std::path::Path;

use id3::{Tag as Id3Tag, TagLike, Version};
use lofty::config::{ParseOptions, WriteOptions};
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::{ItemKey, Tag as LoftyTag, TagType};

use crate::error::{Error, Result};
use crate::models::TrackTags;
use crate::sources::{ArtworkSource, CoverArt, CoverMime};

/// 태그를 기록할 수 있는 컨테이너 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagFormat {
    /// MPEG-4 (`.m4a`), `ilst` 네 글자 아톰.
    Mp4,
    /// ID3v2 (`.mp3`).
    Id3,
}

impl TagFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "m4a" => Ok(TagFormat::Mp4),
            "mp3" => Ok(TagFormat::Id3),
            _ => Err(Error::UnsupportedFormat(format!(
                "{} (.{})",
                path.display(),
                ext
            ))),
        }
    }

    pub fn is_supported(path: &Path) -> bool {
        Self::from_path(path).is_ok()
    }
}

/// 커버 아트 처리 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtworkStatus {
    NotRequested,
    Embedded,
    /// 가져오지 못해 커버 없이 태그만 기록했다.
    Unavailable(String),
}

/// 아티스트/제목/앨범(과 원본 URL)을 기록한다. 커버가 있으면 앞표지로 교체한다.
pub fn set_tags(path: &Path, tags: &TrackTags, cover: Option<&CoverArt>) -> Result<()> {
    match TagFormat::from_path(path)? {
        TagFormat::Mp4 => write_mp4(path, tags, cover),
        TagFormat::Id3 => write_id3(path, tags, cover),
    }
}

/// 썸네일 URL이 있으면 커버를 받아 함께 기록한다.
/// 커버를 받지 못해도 태그 기록은 계속한다.
pub fn tag_with_artwork(
    path: &Path,
    tags: &TrackTags,
    thumbnail_url: Option<&str>,
    artwork: &dyn ArtworkSource,
) -> Result<ArtworkStatus> {
    // 형식이 맞지 않으면 네트워크 요청 전에 실패한다.
    TagFormat::from_path(path)?;

    let (cover, status) = match thumbnail_url {
        None => (None, ArtworkStatus::NotRequested),
        Some(url) => match artwork.fetch_cover(url) {
            Ok(cover) => (Some(cover), ArtworkStatus::Embedded),
            Err(e) => {
                log::warn!("cover art unavailable for {}: {}", path.display(), e);
                (None, ArtworkStatus::Unavailable(e.to_string()))
            }
        },
    };

    set_tags(path, tags, cover.as_ref())?;
    Ok(status)
}

/// 아티스트 필드만 덮어쓴다.
pub fn set_artist(path: &Path, artist: &str) -> Result<()> {
    match TagFormat::from_path(path)? {
        TagFormat::Mp4 => {
            let mut tagged_file = open_mp4(path)?;
            let tag = ilst_mut(&mut tagged_file)?;
            tag.set_artist(artist.to_string());
            tag.save_to_path(path, WriteOptions::default())?;
        }
        TagFormat::Id3 => {
            let mut tag = Id3Tag::read_from_path(path).unwrap_or_else(|_| Id3Tag::new());
            tag.set_artist(artist);
            tag.write_to_path(path, Version::Id3v24)?;
        }
    }
    Ok(())
}

/// 태그를 읽는다. 태그가 없거나 아티스트/제목/앨범이 모두 비어 있으면 None.
pub fn read_tags(path: &Path) -> Result<Option<TrackTags>> {
    let tags = match TagFormat::from_path(path)? {
        TagFormat::Mp4 => read_mp4(path)?,
        TagFormat::Id3 => read_id3(path)?,
    };
    Ok(tags.filter(|t| !(t.artist.is_empty() && t.title.is_empty() && t.album.is_empty())))
}

/// 태그만 필요하므로 오디오 속성은 읽지 않는다.
fn open_mp4(path: &Path) -> Result<lofty::file::TaggedFile> {
    Ok(Probe::open(path)?
        .options(ParseOptions::new().read_properties(false))
        .read()?)
}

fn ilst_mut(tagged_file: &mut lofty::file::TaggedFile) -> Result<&mut LoftyTag> {
    if tagged_file.tag(TagType::Mp4Ilst).is_none() {
        tagged_file.insert_tag(LoftyTag::new(TagType::Mp4Ilst));
    }
    tagged_file
        .tag_mut(TagType::Mp4Ilst)
        .ok_or_else(|| Error::Tag("MP4 ilst 태그를 만들 수 없습니다".to_string()))
}

fn write_mp4(path: &Path, tags: &TrackTags, cover: Option<&CoverArt>) -> Result<()> {
    let mut tagged_file = open_mp4(path)?;
    let tag = ilst_mut(&mut tagged_file)?;

    tag.set_title(tags.title.clone());
    tag.set_artist(tags.artist.clone());
    tag.set_album(tags.album.clone());
    if let Some(ref url) = tags.source_url {
        tag.set_comment(url.clone());
    }
    if let Some(cover) = cover {
        let mime = match cover.mime {
            CoverMime::Jpeg => MimeType::Jpeg,
            CoverMime::Png => MimeType::Png,
        };
        // covr에는 그림 종류가 없으므로 기존 그림을 모두 교체한다.
        while tag.picture_count() > 0 {
            tag.remove_picture(0);
        }
        tag.push_picture(
            Picture::unchecked(cover.data.clone())
                .pic_type(PictureType::CoverFront)
                .mime_type(mime)
                .build(),
        );
    }

    tag.save_to_path(path, WriteOptions::default())?;
    Ok(())
}

fn read_mp4(path: &Path) -> Result<Option<TrackTags>> {
    let tagged_file = open_mp4(path)?;
    let Some(tag) = tagged_file
        .tag(TagType::Mp4Ilst)
        .or_else(|| tagged_file.primary_tag())
    else {
        return Ok(None);
    };

    // ©ART가 없으면 aART(앨범 아티스트)로 대신한다.
    let artist = tag
        .artist()
        .map(|a| a.into_owned())
        .or_else(|| tag.get_string(ItemKey::AlbumArtist).map(str::to_string))
        .unwrap_or_default();

    Ok(Some(TrackTags {
        artist,
        title: tag.title().map(|t| t.into_owned()).unwrap_or_default(),
        album: tag.album().map(|a| a.into_owned()).unwrap_or_default(),
        source_url: tag
            .comment()
            .map(|c| c.into_owned())
            .filter(|c| c.starts_with("http")),
    }))
}

fn write_id3(path: &Path, tags: &TrackTags, cover: Option<&CoverArt>) -> Result<()> {
    let mut tag = Id3Tag::read_from_path(path).unwrap_or_else(|_| Id3Tag::new());

    tag.set_title(tags.title.as_str());
    tag.set_artist(tags.artist.as_str());
    tag.set_album(tags.album.as_str());
    if let Some(ref url) = tags.source_url {
        tag.remove("WOAS");
        tag.add_frame(id3::Frame::with_content(
            "WOAS",
            id3::Content::Link(url.clone()),
        ));
    }
    if let Some(cover) = cover {
        tag.remove_all_pictures();
        tag.add_frame(id3::frame::Picture {
            mime_type: cover.mime.as_str().to_string(),
            picture_type: id3::frame::PictureType::CoverFront,
            description: "Cover".to_string(),
            data: cover.data.clone(),
        });
    }

    tag.write_to_path(path, Version::Id3v24)?;
    Ok(())
}

fn read_id3(path: &Path) -> Result<Option<TrackTags>> {
    let tag = match Id3Tag::read_from_path(path) {
        Ok(tag) => tag,
        Err(id3::Error {
            kind: id3::ErrorKind::NoTag,
            ..
        }) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    Ok(Some(TrackTags {
        artist: tag.artist().unwrap_or_default().to_string(),
        title: tag.title().unwrap_or_default().to_string(),
        album: tag.album().unwrap_or_default().to_string(),
        source_url: tag
            .get("WOAS")
            .and_then(|f| f.content().link())
            .map(str::to_string),
    }))
}
