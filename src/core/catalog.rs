use std::fs::File;
use std::path::Path;

use crate::config::Settings;
use crate::core::tagger;
use crate::error::{Error, Result};
use crate::models::CatalogRecord;

const HEADERS: [&str; 6] = ["Directory", "Filename", "NewName", "MetaArtist", "URL", "Tags"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Directory,
    Filename,
    NewName,
    MetaArtist,
    Url,
    Tags,
}

/// 대소문자/공백/구분 기호를 무시하고 열 이름을 알아본다.
fn match_column(header: &str) -> Option<Column> {
    let key: String = header
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .collect();
    match key.as_str() {
        "directory" | "diretório" | "diretorio" | "dir" | "folder" => Some(Column::Directory),
        "filename" | "nomearquivo" | "file" | "name" => Some(Column::Filename),
        "newname" | "novonome" | "rename" => Some(Column::NewName),
        "metaartist" | "metaartista" | "artist" | "artista" => Some(Column::MetaArtist),
        "url" | "sourceurl" | "link" => Some(Column::Url),
        "tags" => Some(Column::Tags),
        _ => None,
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

pub fn export_csv(records: &[CatalogRecord], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(HEADERS)?;
    for r in records {
        writer.write_record([
            r.directory.as_str(),
            r.filename.as_str(),
            r.new_name.as_deref().unwrap_or(""),
            r.meta_artist.as_deref().unwrap_or(""),
            r.source_url.as_deref().unwrap_or(""),
            r.tags.as_deref().unwrap_or(""),
        ])?;
    }
    writer.flush().map_err(|e| Error::io(path, e))?;
    Ok(())
}

fn md_cell(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', " ")
}

pub fn render_markdown(records: &[CatalogRecord]) -> String {
    let mut out = String::from("# 음악 라이브러리\n\n");
    out.push_str(&format!("| {} |\n", HEADERS.join(" | ")));
    out.push_str("| --------- | -------- | ------- | ---------- | --- | ---- |\n");
    for r in records {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            md_cell(&r.directory),
            md_cell(&r.filename),
            md_cell(r.new_name.as_deref().unwrap_or("")),
            md_cell(r.meta_artist.as_deref().unwrap_or("")),
            md_cell(r.source_url.as_deref().unwrap_or("")),
            md_cell(r.tags.as_deref().unwrap_or("")),
        ));
    }
    out
}

pub fn export_markdown(records: &[CatalogRecord], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    std::fs::write(path, render_markdown(records)).map_err(|e| Error::io(path, e))
}

/// 편집된 카탈로그 CSV를 읽는다. 모르는 열은 경고만 하고 무시한다.
pub fn read_catalog(path: &Path) -> Result<Vec<CatalogRecord>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);

    let columns: Vec<Option<Column>> = reader
        .headers()?
        .iter()
        .map(|h| {
            let column = match_column(h);
            if column.is_none() {
                log::warn!("ignoring unrecognized catalog column {:?}", h);
            }
            column
        })
        .collect();

    for required in [Column::Directory, Column::Filename] {
        if !columns.contains(&Some(required)) {
            log::warn!("catalog {} has no {:?} column", path.display(), required);
        }
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let mut record = CatalogRecord::default();
        for (value, column) in row.iter().zip(&columns) {
            let Some(column) = column else { continue };
            match column {
                Column::Directory => record.directory = value.trim().to_string(),
                Column::Filename => record.filename = value.trim().to_string(),
                Column::NewName => record.new_name = non_empty(Some(value)),
                Column::MetaArtist => record.meta_artist = non_empty(Some(value)),
                Column::Url => record.source_url = non_empty(Some(value)),
                Column::Tags => record.tags = non_empty(Some(value)),
            }
        }
        records.push(record);
    }
    Ok(records)
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    pub tagged: usize,
    pub renamed: usize,
    pub missing: usize,
    pub failed: usize,
}

/// 카탈로그의 아티스트/새 이름을 라이브러리 파일에 반영한다.
/// 새 이름의 파일이 이미 있으면 덮어쓰지 않는다.
pub fn apply_updates(settings: &Settings, records: &[CatalogRecord]) -> UpdateReport {
    let mut report = UpdateReport::default();

    for record in records {
        if record.directory.is_empty() || record.filename.is_empty() {
            continue;
        }
        let dir = settings.library_root.join(&record.directory);
        let path = dir.join(&record.filename);
        if !path.is_file() {
            log::warn!("catalog row points at missing file {}", path.display());
            report.missing += 1;
            continue;
        }

        if let Some(ref artist) = record.meta_artist {
            match tagger::set_artist(&path, artist) {
                Ok(()) => report.tagged += 1,
                Err(e) => {
                    println!("  메타데이터 기록 실패 {}: {}", path.display(), e);
                    report.failed += 1;
                }
            }
        }

        let Some(ref new_name) = record.new_name else {
            continue;
        };
        if *new_name == record.filename {
            continue;
        }
        let new_path = dir.join(with_extension_of(new_name, &path));
        if new_path.exists() {
            println!("  이미 존재하여 이름을 바꾸지 않습니다: {}", new_path.display());
            continue;
        }
        match std::fs::rename(&path, &new_path) {
            Ok(()) => report.renamed += 1,
            Err(e) => {
                println!("  이름 변경 실패 {}: {}", path.display(), e);
                report.failed += 1;
            }
        }
    }
    report
}

/// 새 이름에 원본 파일의 확장자가 없으면 붙인다.
fn with_extension_of(new_name: &str, original: &Path) -> String {
    let new_name = crate::core::placement::sanitize_component(new_name);
    match original.extension().and_then(|e| e.to_str()) {
        Some(ext) if !new_name.to_lowercase().ends_with(&format!(".{}", ext.to_lowercase())) => {
            format!("{}.{}", new_name, ext)
        }
        _ => new_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(dir: &str, file: &str) -> CatalogRecord {
        CatalogRecord {
            directory: dir.to_string(),
            filename: file.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_column_aliases() {
        assert_eq!(match_column(" Meta Artist "), Some(Column::MetaArtist));
        assert_eq!(match_column("meta_artista"), Some(Column::MetaArtist));
        assert_eq!(match_column("Diretório"), Some(Column::Directory));
        assert_eq!(match_column("Nome_arquivo"), Some(Column::Filename));
        assert_eq!(match_column("Novo_Nome"), Some(Column::NewName));
        assert_eq!(match_column("NEWNAME"), Some(Column::NewName));
        assert_eq!(match_column("Rating"), None);
    }

    #[test]
    fn test_export_then_read_with_renamed_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.csv");
        std::fs::write(
            &path,
            "Diretório,Nome_arquivo,Novo_Nome,meta artista,URL,Tags,Rating\n\
             Foo,a.m4a,,New Artist,https://y/1,,5\n\
             Bar,\"b, live.m4a\",B Live,,,rock,\n",
        )
        .unwrap();

        let records = read_catalog(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].directory, "Foo");
        assert_eq!(records[0].meta_artist.as_deref(), Some("New Artist"));
        assert_eq!(records[0].new_name, None);
        assert_eq!(records[1].filename, "b, live.m4a");
        assert_eq!(records[1].new_name.as_deref(), Some("B Live"));
        assert_eq!(records[1].tags.as_deref(), Some("rock"));
    }

    #[test]
    fn test_export_csv_header_and_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("catalog.csv");
        let mut r = record("Foo", "a.m4a");
        r.meta_artist = Some("Foo".to_string());
        export_csv(&[r.clone()], &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Directory,Filename,NewName,MetaArtist,URL,Tags\n"));
        assert_eq!(read_catalog(&path).unwrap(), vec![r]);
    }

    #[test]
    fn test_markdown_escapes_pipes() {
        let md = render_markdown(&[record("A|B", "x.m4a")]);
        assert!(md.contains("| A\\|B | x.m4a |"));
        assert!(md.starts_with("# 음악 라이브러리"));
    }

    #[test]
    fn test_apply_updates() {
        let lib = tempdir().unwrap();
        let root = lib.path();
        let artist_dir = root.join("Foo");
        std::fs::create_dir_all(&artist_dir).unwrap();
        std::fs::write(artist_dir.join("a.mp3"), [0u8; 256]).unwrap();
        std::fs::write(artist_dir.join("b.mp3"), [0u8; 256]).unwrap();
        std::fs::write(artist_dir.join("taken.mp3"), [0u8; 256]).unwrap();

        let mut tag_and_rename = record("Foo", "a.mp3");
        tag_and_rename.meta_artist = Some("Real Foo".to_string());
        tag_and_rename.new_name = Some("Renamed".to_string());
        let mut blocked = record("Foo", "b.mp3");
        blocked.new_name = Some("taken.mp3".to_string());
        let missing = record("Foo", "gone.mp3");
        let incomplete = record("", "a.mp3");

        let report = apply_updates(
            &Settings::for_library(root),
            &[tag_and_rename, blocked, missing, incomplete],
        );

        assert_eq!(
            report,
            UpdateReport { tagged: 1, renamed: 1, missing: 1, failed: 0 }
        );
        let renamed = artist_dir.join("Renamed.mp3");
        assert!(renamed.exists());
        assert_eq!(tagger::read_tags(&renamed).unwrap().unwrap().artist, "Real Foo");
        assert!(artist_dir.join("b.mp3").exists());
    }

    #[test]
    fn test_with_extension_of() {
        assert_eq!(with_extension_of("x", Path::new("a.m4a")), "x.m4a");
        assert_eq!(with_extension_of("x.M4A", Path::new("a.m4a")), "x.M4A");
        assert_eq!(with_extension_of("a/b", Path::new("a.mp3")), "a-b.mp3");
    }
}
