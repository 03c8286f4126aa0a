use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::config::DownloadConfig;
use crate::error::{Error, Result};
use crate::interrupt;
use crate::models::{ContentKind, FetchOptions, PlaylistEntry, RemoteInfo};
use crate::progress::{parse_percent, ProgressEvent, ProgressSink};
use crate::sources::FetchTool;

/// `yt-dlp` 실행 파일을 감싸는 다운로드 도구. 오디오 변환에는 `ffmpeg`가 필요하다.
pub struct YtDlp {
    ytdlp: String,
    ffmpeg: String,
    info_timeout: Duration,
}

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Deserialize)]
struct PlaylistData {
    #[serde(default)]
    entries: Option<Vec<Option<PlaylistEntry>>>,
}

impl YtDlp {
    pub fn new(config: &DownloadConfig, info_timeout: Duration) -> Self {
        Self {
            ytdlp: config.ytdlp.clone(),
            ffmpeg: config.ffmpeg.clone(),
            info_timeout,
        }
    }

    fn check_installed(program: &str, version_flag: &str) -> Result<()> {
        match Command::new(program)
            .arg(version_flag)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(_) => Ok(()),
            Err(e) => {
                log::debug!("version check of {} failed: {}", program, e);
                Err(Error::ToolMissing(program.to_string()))
            }
        }
    }

    /// JSON 모드로 실행해 표준 출력을 돌려준다.
    /// 제한 시간 안에 끝나지 않으면 프로세스를 종료하고 `Metadata` 오류를 낸다.
    fn run_json(&self, args: &[&str]) -> Result<String> {
        let socket_timeout = self.info_timeout.as_secs().max(1).to_string();
        log::info!(
            "running {} --socket-timeout {} {}",
            self.ytdlp,
            socket_timeout,
            args.join(" ")
        );
        let mut child = Command::new(&self.ytdlp)
            .arg("--socket-timeout")
            .arg(&socket_timeout)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdout_reader = child.stdout.take().map(drain);
        let stderr_reader = child.stderr.take().map(drain);

        let deadline = Instant::now() + self.info_timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if interrupt::requested() => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(Error::Interrupted);
                }
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(Error::Metadata(format!(
                        "{} 응답 시간 초과 ({:?})",
                        self.ytdlp, self.info_timeout
                    )));
                }
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    return Err(Error::Metadata(format!("프로세스 대기 실패: {}", e)));
                }
            }
        };
        let stdout = collect(stdout_reader);
        let stderr = collect(stderr_reader);

        if !status.success() {
            return Err(Error::Metadata(format!(
                "{} 종료 상태 {}: {}",
                self.ytdlp,
                status,
                last_line(&String::from_utf8_lossy(&stderr))
            )));
        }

        String::from_utf8(stdout)
            .map_err(|e| Error::Metadata(format!("출력이 UTF-8이 아닙니다: {}", e)))
    }

    fn spawn_error(&self, e: std::io::Error) -> Error {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::ToolMissing(self.ytdlp.clone())
        } else {
            Error::FetchProcess(format!("{} 실행 실패: {}", self.ytdlp, e))
        }
    }
}

/// 다운로드 모드 인자 목록.
pub fn download_args(url: &str, options: &FetchOptions, staging: &Path) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    match options.kind {
        ContentKind::Video => match options.quality.as_deref() {
            Some(q) => {
                args.push("-f".into());
                args.push(format!(
                    "bestvideo[height<={q}]+bestaudio/best[height<={q}]"
                ));
            }
            None => {
                args.push("-f".into());
                args.push("best".into());
            }
        },
        ContentKind::Audio => {
            args.push("-x".into());
            args.push("--audio-format".into());
            args.push(options.audio_format.extension().into());
            args.push("--audio-quality".into());
            args.push(options.quality.clone().unwrap_or_else(|| "0".into()));
        }
    }
    args.push("--newline".into());
    args.push("--no-playlist".into());
    args.push("-o".into());
    args.push(staging.join("%(title)s.%(ext)s").to_string_lossy().into_owned());
    args.push(url.to_string());
    args
}

/// 파이프가 가득 차서 자식이 멈추지 않도록 별도 스레드에서 끝까지 읽는다.
fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

fn last_line(s: &str) -> &str {
    s.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("").trim()
}

impl FetchTool for YtDlp {
    fn preflight(&self) -> Result<()> {
        Self::check_installed(&self.ffmpeg, "-version")?;
        Self::check_installed(&self.ytdlp, "--version")?;
        Ok(())
    }

    fn fetch_info(&self, url: &str) -> Result<RemoteInfo> {
        let json = self.run_json(&["-J", "--no-warnings", "--no-playlist", url])?;
        serde_json::from_str(&json)
            .map_err(|e| Error::Metadata(format!("정보 JSON 파싱 실패: {}", e)))
    }

    fn list_playlist(&self, url: &str) -> Result<Vec<PlaylistEntry>> {
        let json = self.run_json(&["--flat-playlist", "-J", "--no-warnings", url])?;
        let data: PlaylistData = serde_json::from_str(&json)
            .map_err(|e| Error::Metadata(format!("플레이리스트 JSON 파싱 실패: {}", e)))?;
        match data.entries {
            Some(entries) => Ok(entries.into_iter().flatten().collect()),
            None => Err(Error::Metadata(format!(
                "플레이리스트에서 항목을 찾을 수 없습니다: {}",
                url
            ))),
        }
    }

    fn download(
        &self,
        url: &str,
        options: &FetchOptions,
        staging: &Path,
        progress: &mut dyn ProgressSink,
    ) -> Result<()> {
        let args = download_args(url, options, staging);
        log::info!("running {} {}", self.ytdlp, args.join(" "));

        let mut child = Command::new(&self.ytdlp)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stderr_reader = child.stderr.take().map(drain);

        // UTF-8이 아닌 줄도 건너뛰기만 하고 EOF까지 계속 읽는다.
        if let Some(stdout) = child.stdout.take() {
            let mut reader = BufReader::new(stdout);
            let mut raw = Vec::new();
            loop {
                raw.clear();
                match reader.read_until(b'\n', &mut raw) {
                    Ok(0) => break,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&raw);
                        match parse_percent(&line) {
                            Some(percent) => progress.emit(ProgressEvent::Percent(percent)),
                            None => log::trace!("{}", line.trim_end()),
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        log::warn!("reading {} output failed: {}", self.ytdlp, e);
                        break;
                    }
                }
            }
        }

        let status = child
            .wait()
            .map_err(|e| Error::FetchProcess(format!("프로세스 대기 실패: {}", e)))?;
        let stderr = String::from_utf8_lossy(&collect(stderr_reader)).into_owned();

        interrupt::check()?;

        if !status.success() {
            return Err(Error::FetchProcess(format!(
                "종료 상태 {}: {}",
                status,
                last_line(&stderr)
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AudioFormat;
    use std::path::PathBuf;

    fn options(kind: ContentKind, quality: Option<&str>) -> FetchOptions {
        FetchOptions {
            kind,
            quality: quality.map(str::to_string),
            audio_format: AudioFormat::M4a,
        }
    }

    #[test]
    fn test_audio_args() {
        let args = download_args(
            "https://y/watch?v=1",
            &options(ContentKind::Audio, None),
            &PathBuf::from("/lib/_staging"),
        );
        assert_eq!(args[..6], ["-x", "--audio-format", "m4a", "--audio-quality", "0", "--newline"]);
        assert_eq!(args.last().map(String::as_str), Some("https://y/watch?v=1"));
        assert!(args.contains(&"/lib/_staging/%(title)s.%(ext)s".to_string()));
    }

    #[test]
    fn test_video_args_with_quality() {
        let args = download_args(
            "u",
            &options(ContentKind::Video, Some("720")),
            &PathBuf::from("/s"),
        );
        assert_eq!(args[0], "-f");
        assert_eq!(args[1], "bestvideo[height<=720]+bestaudio/best[height<=720]");
    }

    #[test]
    fn test_video_args_default() {
        let args = download_args("u", &options(ContentKind::Video, None), &PathBuf::from("/s"));
        assert_eq!(args[..2], ["-f", "best"]);
    }

    #[test]
    fn test_missing_tool_is_reported() {
        let tool = YtDlp {
            ytdlp: "definitely-not-a-real-fetch-tool".into(),
            ffmpeg: "definitely-not-a-real-transcoder".into(),
            info_timeout: Duration::from_secs(30),
        };
        match tool.preflight() {
            Err(Error::ToolMissing(name)) => {
                assert_eq!(name, "definitely-not-a-real-transcoder")
            }
            other => panic!("unexpected: {:?}", other.err()),
        }
    }

    #[test]
    fn test_last_line() {
        assert_eq!(last_line("a\nERROR: boom\n\n"), "ERROR: boom");
        assert_eq!(last_line(""), "");
    }

    /// 주어진 셸 스크립트를 실행하는 가짜 다운로드 도구.
    #[cfg(unix)]
    fn scripted_tool(dir: &Path, script: &str, info_timeout: Duration) -> YtDlp {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-yt-dlp");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        YtDlp {
            ytdlp: path.to_string_lossy().into_owned(),
            ffmpeg: "ffmpeg".into(),
            info_timeout,
        }
    }

    #[derive(Default)]
    struct Recorder(Vec<ProgressEvent>);

    impl ProgressSink for Recorder {
        fn emit(&mut self, event: ProgressEvent) {
            self.0.push(event);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_info_query_gives_up_after_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let tool = scripted_tool(dir.path(), "exec sleep 10", Duration::from_millis(300));

        let started = Instant::now();
        match tool.fetch_info("https://y/watch?v=1") {
            Err(Error::Metadata(msg)) => assert!(msg.contains("시간 초과"), "{}", msg),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(started.elapsed() < Duration::from_secs(5));

        let started = Instant::now();
        assert!(matches!(
            tool.list_playlist("https://y/playlist?list=1"),
            Err(Error::Metadata(_))
        ));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[test]
    fn test_info_query_passes_socket_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let script = r#"case "$*" in
  *"--socket-timeout 7 "*) echo '{"uploader": "Chan", "title": "Song"}' ;;
  *) exit 3 ;;
esac"#;
        let tool = scripted_tool(dir.path(), script, Duration::from_secs(7));

        let info = tool.fetch_info("https://y/watch?v=1").unwrap();
        assert_eq!(info.uploader.as_deref(), Some("Chan"));
        assert_eq!(info.title.as_deref(), Some("Song"));
    }

    #[cfg(unix)]
    #[test]
    fn test_info_query_failure_is_metadata_error() {
        let dir = tempfile::tempdir().unwrap();
        let tool = scripted_tool(
            dir.path(),
            "echo 'ERROR: private video' >&2; exit 1",
            Duration::from_secs(5),
        );
        match tool.fetch_info("https://y/watch?v=1") {
            Err(Error::Metadata(msg)) => assert!(msg.contains("private video"), "{}", msg),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_download_reads_past_invalid_utf8_output() {
        let dir = tempfile::tempdir().unwrap();
        let script = r#"printf '\377\376 garbage\n'
printf '[download]  50.0%% of 1.00MiB\n'
head -c 300000 /dev/zero | tr '\000' 'a'
echo
printf '\377 more\n'
exit 0"#;
        let tool = scripted_tool(dir.path(), script, Duration::from_secs(5));
        let staging = dir.path().join("_staging");
        std::fs::create_dir_all(&staging).unwrap();

        let mut recorder = Recorder::default();
        tool.download(
            "https://y/watch?v=1",
            &options(ContentKind::Audio, None),
            &staging,
            &mut recorder,
        )
        .unwrap();
        assert!(recorder.0.contains(&ProgressEvent::Percent(50.0)));
    }
}
