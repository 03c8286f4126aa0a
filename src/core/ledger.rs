use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::models::LedgerEntry;

const HEADER: [&str; 2] = ["Video URL", "Channel"];

/// 이미 수집한 원본 URL을 기록하는 추가 전용 CSV 원장.
/// 단일 프로세스, 단일 작성자만 가정한다.
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    /// 원장을 연다. 파일이 없으면 헤더만 있는 파일을 만든다.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
            let file = File::create(path).map_err(|e| Error::io(path, e))?;
            let mut writer = csv::Writer::from_writer(file);
            writer.write_record(HEADER)?;
            writer.flush().map_err(|e| Error::io(path, e))?;
            log::info!("created ledger {}", path.display());
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> Result<Vec<LedgerEntry>> {
        let file = File::open(&self.path).map_err(|e| Error::io(&self.path, e))?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let mut entries = Vec::new();
        for record in reader.records() {
            let record = record?;
            let Some(source_id) = record.get(0).filter(|s| !s.is_empty()) else {
                continue;
            };
            entries.push(LedgerEntry {
                source_id: source_id.to_string(),
                channel: record.get(1).unwrap_or_default().to_string(),
            });
        }
        Ok(entries)
    }

    pub fn contains(&self, source_id: &str) -> Result<bool> {
        Ok(self.entries()?.iter().any(|e| e.source_id == source_id))
    }

    /// 한 줄을 추가한다. 이미 있으면 아무것도 하지 않고 false.
    pub fn append(&self, source_id: &str, channel: &str) -> Result<bool> {
        if self.contains(source_id)? {
            return Ok(false);
        }
        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::io(&self.path, e))?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record([source_id, channel])?;
        writer.flush().map_err(|e| Error::io(&self.path, e))?;
        Ok(true)
    }
}
