use crate::error::{Error, Result};
use crate::sources::TextGenerator;

const ARTIST_PROMPT: &str = "\
Normalize the following music artist name: fix capitalization and formatting and remove \
unnecessary special characters. Keep only letters, digits, spaces and hyphens. Do not use \
underscores. Reply with ONLY the normalized name, no explanation.
Original name: ";

const FILE_PROMPT: &str = "\
Normalize the following music file name, keeping the important information such as title and \
artist but removing unnecessary special characters and improving formatting. Keep only letters, \
digits, spaces and hyphens. Reply with ONLY the normalized name, no explanation.
Original name: ";

const PREFLIGHT_PROMPT: &str = "Reply only with 'OK' if you are working correctly.";

/// 텍스트 생성 서비스로 아티스트/파일 이름을 정규화한다.
/// 서비스가 실패하거나 쓸 수 없는 답을 주면 항상 원래 이름을 돌려준다.
pub struct Normalizer<'a> {
    generator: &'a dyn TextGenerator,
}

impl<'a> Normalizer<'a> {
    pub fn new(generator: &'a dyn TextGenerator) -> Self {
        Self { generator }
    }

    /// 연결 확인. 응답에 `OK`가 없으면 실패.
    pub fn preflight(&self) -> Result<()> {
        let reply = self.generator.generate(PREFLIGHT_PROMPT)?;
        if reply.to_uppercase().contains("OK") {
            Ok(())
        } else {
            Err(Error::Network(format!(
                "정규화 서비스가 예상과 다른 응답을 보냈습니다: {}",
                reply.trim()
            )))
        }
    }

    pub fn normalize_artist(&self, name: &str) -> String {
        self.ask(ARTIST_PROMPT, name)
            .unwrap_or_else(|| name.to_string())
    }

    /// 확장자를 떼고 정규화한 뒤 다시 붙인다.
    pub fn normalize_file(&self, name: &str, ext: &str) -> String {
        let base = if ext.is_empty() {
            name
        } else {
            strip_extension(name, ext)
        };
        match self.ask(FILE_PROMPT, base) {
            Some(normalized) if ext.is_empty() => normalized,
            Some(normalized) => format!("{}.{}", normalized, ext),
            None => name.to_string(),
        }
    }

    fn ask(&self, instruction: &str, original: &str) -> Option<String> {
        let reply = match self.generator.generate(&format!("{}{}", instruction, original)) {
            Ok(reply) => reply,
            Err(e) => {
                log::warn!("normalization failed for {:?}: {}", original, e);
                return None;
            }
        };
        let cleaned = clean_reply(&reply);
        if cleaned.chars().count() < 2 {
            log::debug!("discarding short normalization {:?} for {:?}", cleaned, original);
            return None;
        }
        Some(cleaned)
    }
}

/// 대소문자를 무시하고 `.{ext}` 접미사를 뗀다.
fn strip_extension<'n>(name: &'n str, ext: &str) -> &'n str {
    let suffix_len = ext.len() + 1;
    if name.len() > suffix_len && name.is_char_boundary(name.len() - suffix_len) {
        let (base, suffix) = name.split_at(name.len() - suffix_len);
        if suffix.starts_with('.') && suffix[1..].eq_ignore_ascii_case(ext) {
            return base;
        }
    }
    name
}

/// 응답의 첫 번째 비어 있지 않은 줄에서 경로 구분자를 치환하고 따옴표/공백을 걷어낸다.
fn clean_reply(reply: &str) -> String {
    let line = reply.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    line.replace(['/', '\\', ':'], "-")
        .trim_matches(|c: char| c.is_whitespace() || c == '"' || c == '\'' || c == '`')
        .to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// 원본 이름별로 정해진 답을 돌려주는 생성기. 알 수 없는 이름은 그대로 돌려준다.
    pub(crate) struct MapGenerator {
        pub replies: HashMap<String, String>,
        pub calls: RefCell<usize>,
    }

    impl MapGenerator {
        pub(crate) fn new(pairs: &[(&str, &str)]) -> Self {
            Self {
                replies: pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                calls: RefCell::new(0),
            }
        }
    }

    impl TextGenerator for MapGenerator {
        fn generate(&self, prompt: &str) -> Result<String> {
            *self.calls.borrow_mut() += 1;
            if prompt == PREFLIGHT_PROMPT {
                return Ok("OK".to_string());
            }
            let original = prompt.rsplit("Original name: ").next().unwrap_or("");
            Ok(self
                .replies
                .get(original)
                .cloned()
                .unwrap_or_else(|| original.to_string()))
        }
    }

    pub(crate) struct DownGenerator;

    impl TextGenerator for DownGenerator {
        fn generate(&self, _prompt: &str) -> Result<String> {
            Err(Error::Network("connection refused".to_string()))
        }
    }

    #[test]
    fn test_normalize_artist_uses_reply() {
        let gen = MapGenerator::new(&[("the  beatles!!", "The Beatles\n")]);
        assert_eq!(Normalizer::new(&gen).normalize_artist("the  beatles!!"), "The Beatles");
    }

    #[test]
    fn test_normalize_artist_falls_back_when_unreachable() {
        assert_eq!(Normalizer::new(&DownGenerator).normalize_artist("Foo "), "Foo ");
    }

    #[test]
    fn test_normalize_artist_falls_back_on_short_reply() {
        for reply in ["", "X", "  \n", "\"a\""] {
            let gen = MapGenerator::new(&[("Foo", reply)]);
            assert_eq!(Normalizer::new(&gen).normalize_artist("Foo"), "Foo");
        }
    }

    #[test]
    fn test_separators_replaced() {
        let gen = MapGenerator::new(&[("acdc", "AC/DC: Live\\Set")]);
        assert_eq!(Normalizer::new(&gen).normalize_artist("acdc"), "AC-DC- Live-Set");
    }

    #[test]
    fn test_normalize_file_keeps_extension() {
        let gen = MapGenerator::new(&[("foo_bar (official video)", "Foo - Bar")]);
        let n = Normalizer::new(&gen);
        assert_eq!(n.normalize_file("foo_bar (official video).m4a", "m4a"), "Foo - Bar.m4a");
        assert_eq!(n.normalize_file("Song.MP3", "mp3"), "Song.mp3");
    }

    #[test]
    fn test_normalize_file_falls_back() {
        let n = Normalizer::new(&DownGenerator);
        assert_eq!(n.normalize_file("a b.m4a", "m4a"), "a b.m4a");
    }

    #[test]
    fn test_preflight() {
        assert!(Normalizer::new(&MapGenerator::new(&[])).preflight().is_ok());
        assert!(Normalizer::new(&DownGenerator).preflight().is_err());

        struct Chatty;
        impl TextGenerator for Chatty {
            fn generate(&self, _prompt: &str) -> Result<String> {
                Ok("I am a language model".to_string())
            }
        }
        assert!(matches!(
            Normalizer::new(&Chatty).preflight(),
            Err(Error::Network(_))
        ));
    }

    #[test]
    fn test_strip_extension() {
        assert_eq!(strip_extension("a.b.m4a", "m4a"), "a.b");
        assert_eq!(strip_extension("m4a", "m4a"), "m4a");
        assert_eq!(strip_extension("song", "mp3"), "song");
    }
}
