use std::time::Duration;

use crate::error::{Error, Result};
use crate::sources::{ArtworkSource, CoverArt, CoverMime};

/// HTTP로 썸네일을 받아오는 커버 아트 소스.
pub struct HttpArtwork {
    client: reqwest::blocking::Client,
}

impl HttpArtwork {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl ArtworkSource for HttpArtwork {
    fn fetch_cover(&self, url: &str) -> Result<CoverArt> {
        let resp = self.client.get(url).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Network(format!("썸네일 응답 {}: {}", status, url)));
        }
        let data = resp.bytes()?.to_vec();
        if data.is_empty() {
            return Err(Error::Network(format!("빈 썸네일: {}", url)));
        }
        Ok(CoverArt {
            data,
            mime: CoverMime::from_url(url),
        })
    }
}
