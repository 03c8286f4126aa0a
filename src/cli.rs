use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand};
use comfy_table::{Cell, Table};
use dialoguer::{Input, Select};

use crate::config::{self, AudioFormat, Config, MergePolicy, Settings};
use crate::core::downloader::Downloader;
use crate::core::ledger::Ledger;
use crate::core::normalizer::Normalizer;
use crate::core::{catalog, organizer, retag, scanner};
use crate::models::{
    BatchSummary, CatalogRecord, ContentKind, DownloadRequest, ItemOutcome, SkipReason, TagStatus,
};
use crate::progress::BarProgress;
use crate::sources::artwork::HttpArtwork;
use crate::sources::ollama::OllamaClient;
use crate::sources::ytdlp::YtDlp;

#[derive(Parser)]
#[command(name = "musicshelf", about = "YouTube 음원 수집 및 음악 라이브러리 정리 도구")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 라이브러리 루트 (설정 파일보다 우선)
    #[arg(long, global = true, value_name = "DIR")]
    pub library: Option<PathBuf>,

    /// 자세한 로그 출력
    #[arg(long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 영상 또는 플레이리스트를 내려받아 라이브러리에 추가
    Get(GetArgs),
    /// 원장에 기록된 수집 목록 표시
    List,
    /// 아티스트 폴더와 파일 이름 정규화
    Organize,
    /// 편집한 catalog.csv를 라이브러리에 반영
    Update,
    /// 라이브러리를 스캔하여 카탈로그 내보내기
    Catalog,
    /// 파일 이름에서 태그를 다시 기록
    Retag,
    /// 설정 편집
    Config,
}

#[derive(Args)]
#[command(group(ArgGroup::new("source").required(true).args(["music", "playlist"])))]
pub struct GetArgs {
    /// 단일 영상 URL
    #[arg(short = 'm', long = "music", value_name = "URL")]
    pub music: Option<String>,

    /// 플레이리스트 URL
    #[arg(short = 'p', long = "playlist", value_name = "URL")]
    pub playlist: Option<String>,

    /// 오디오로 받기 (기본값)
    #[arg(short = 'a', long, conflicts_with = "video")]
    pub audio: bool,

    /// 영상으로 받기
    #[arg(short = 'v', long)]
    pub video: bool,

    /// 오디오 품질 또는 영상 최대 높이
    #[arg(short = 'q', long)]
    pub quality: Option<String>,

    /// 원장/라이브러리에 있어도 다시 받기
    #[arg(short = 'f', long)]
    pub force: bool,

    /// 업로더 대신 사용할 아티스트 이름
    #[arg(short = 'n', long = "artist", value_name = "ARTIST")]
    pub artist: Option<String>,

    /// 플레이리스트에 쓸 아티스트 이름을 입력받기
    #[arg(long, conflicts_with = "artist", requires = "playlist")]
    pub ask_artist: bool,
}

pub fn run(cli: Cli) -> Result<()> {
    let cfg = config::load_config();
    let settings = Settings::from_config(&cfg, cli.library);
    log::info!("library root: {}", settings.library_root.display());

    match cli.command {
        Commands::Get(args) => cmd_get(&settings, args),
        Commands::List => cmd_list(&settings),
        Commands::Organize => cmd_organize(&settings),
        Commands::Update => cmd_update(&settings),
        Commands::Catalog => cmd_catalog(&settings),
        Commands::Retag => cmd_retag(&settings),
        Commands::Config => cmd_config(cfg),
    }
}

fn cmd_get(settings: &Settings, args: GetArgs) -> Result<()> {
    let kind = if args.video && !args.audio {
        ContentKind::Video
    } else {
        ContentKind::Audio
    };
    let artist_override = match args.artist {
        Some(artist) => Some(artist),
        None if args.ask_artist && args.playlist.is_some() => prompt_artist()?,
        None => None,
    };
    let request = DownloadRequest {
        kind,
        quality: args.quality,
        force: args.force,
        artist_override,
    };

    std::fs::create_dir_all(&settings.library_root).with_context(|| {
        format!(
            "라이브러리 디렉토리를 만들 수 없습니다: {}",
            settings.library_root.display()
        )
    })?;
    let ledger = Ledger::open(&settings.ledger_path()).context("원장을 열 수 없습니다")?;
    let fetcher = YtDlp::new(&settings.download, settings.info_timeout);
    let artwork = HttpArtwork::new(settings.artwork_timeout)?;
    let downloader = Downloader::new(settings, &ledger, &fetcher, &artwork);
    let mut progress = BarProgress::new();

    if let Some(url) = args.music {
        let outcome = downloader
            .download_single(&url, &request, &mut progress)
            .with_context(|| format!("수집 실패: {}", url))?;
        match outcome {
            ItemOutcome::Downloaded {
                path,
                tagging: TagStatus::Tagged,
            } => {
                println!("완료: {}", path.display());
            }
            ItemOutcome::Downloaded {
                path,
                tagging: TagStatus::Unsupported,
            } => {
                println!("완료 (태그를 지원하지 않는 형식): {}", path.display());
            }
            ItemOutcome::Downloaded {
                path,
                tagging: TagStatus::Failed,
            } => {
                println!("완료 (태그 기록 실패): {}", path.display());
            }
            ItemOutcome::Skipped(SkipReason::AlreadyInLedger) => {
                println!("이미 수집한 항목입니다. 다시 받으려면 -f 옵션을 사용하세요.");
            }
            ItemOutcome::Skipped(SkipReason::AlreadyInLibrary) => {
                println!("같은 이름의 파일이 이미 라이브러리에 있습니다. 다시 받으려면 -f 옵션을 사용하세요.");
            }
        }
    } else if let Some(url) = args.playlist {
        let summary = downloader
            .download_playlist(&url, &request, &mut progress)
            .with_context(|| format!("플레이리스트 수집 실패: {}", url))?;
        print_batch_summary(&summary);
    }
    Ok(())
}

/// 빈 입력이면 업로더 이름을 그대로 쓴다.
fn prompt_artist() -> Result<Option<String>> {
    let artist: String = Input::new()
        .with_prompt("아티스트 이름 (비우면 업로더 이름 사용)")
        .allow_empty(true)
        .interact_text()?;
    let artist = artist.trim();
    Ok((!artist.is_empty()).then(|| artist.to_string()))
}

fn print_batch_summary(summary: &BatchSummary) {
    let mut table = Table::new();
    table.set_header(vec!["전체", "완료", "태그 실패", "태그 없음", "건너뜀", "실패"]);
    table.add_row(vec![
        Cell::new(summary.total),
        Cell::new(summary.downloaded),
        Cell::new(summary.partial),
        Cell::new(summary.untagged),
        Cell::new(summary.skipped),
        Cell::new(summary.failed),
    ]);
    println!("{table}");
}

fn cmd_list(settings: &Settings) -> Result<()> {
    let path = settings.ledger_path();
    if !path.exists() {
        println!("아직 수집한 항목이 없습니다.");
        return Ok(());
    }
    let ledger = Ledger::open(&path)?;
    let entries = ledger.entries().context("원장을 읽을 수 없습니다")?;
    if entries.is_empty() {
        println!("아직 수집한 항목이 없습니다.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["#", "URL", "채널"]);
    for (idx, entry) in entries.iter().enumerate() {
        table.add_row(vec![
            Cell::new(idx + 1),
            Cell::new(&entry.source_id),
            Cell::new(&entry.channel),
        ]);
    }
    println!("{table}");
    println!("\n총 {}개 항목 ({})", entries.len(), ledger.path().display());
    Ok(())
}

fn cmd_organize(settings: &Settings) -> Result<()> {
    let client = OllamaClient::new(
        &settings.normalizer.url,
        &settings.normalizer.model,
        settings.normalizer_timeout(),
    )?;
    let normalizer = Normalizer::new(&client);

    println!("정규화 서비스: {} ({})", settings.normalizer.url, settings.normalizer.model);
    let report = organizer::organize_library(settings, &normalizer)
        .context("라이브러리 정리에 실패했습니다")?;

    if !report.artist_changes.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["기존 아티스트", "정규화된 아티스트"]);
        for (old, new) in &report.artist_changes {
            table.add_row(vec![Cell::new(old), Cell::new(new)]);
        }
        println!("{table}");
    }
    if !report.file_samples.is_empty() {
        println!("\n파일 이름 변경 예시:");
        for (old, new) in &report.file_samples {
            println!("  {} -> {}", old, new);
        }
    }

    println!(
        "\n완료: 폴더 {}개 이름 변경, {}개 병합, {}개 거부 / 파일 {}개 중 {}개 이름 변경",
        report.dirs_renamed,
        report.dirs_merged,
        report.dirs_rejected,
        report.files_processed,
        report.files_renamed,
    );
    Ok(())
}

/// 라이브러리를 스캔하여 CSV와 마크다운 카탈로그를 쓴다.
fn export_catalog(settings: &Settings) -> Result<Vec<CatalogRecord>> {
    let tracks = scanner::scan_library(&settings.library_root, &settings.staging_dir_name)
        .context("라이브러리를 스캔할 수 없습니다")?;
    let records = scanner::catalog_records(&tracks);

    let csv_path = settings.catalog_csv_path();
    let md_path = settings.catalog_markdown_path();
    catalog::export_csv(&records, &csv_path)?;
    catalog::export_markdown(&records, &md_path)?;
    println!("카탈로그를 저장했습니다: {}, {}", csv_path.display(), md_path.display());
    Ok(records)
}

fn cmd_catalog(settings: &Settings) -> Result<()> {
    let records = export_catalog(settings)?;
    if records.is_empty() {
        println!("{}에서 음악 파일을 찾을 수 없습니다", settings.library_root.display());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["폴더", "파일", "아티스트", "URL"]);
    for r in &records {
        table.add_row(vec![
            Cell::new(&r.directory),
            Cell::new(&r.filename),
            Cell::new(r.meta_artist.as_deref().unwrap_or("-")),
            Cell::new(r.source_url.as_deref().unwrap_or("-")),
        ]);
    }
    println!("{table}");
    println!(
        "\n총 {} 파일 (아티스트 태그 있음: {}, 없음: {})",
        records.len(),
        records.iter().filter(|r| r.meta_artist.is_some()).count(),
        records.iter().filter(|r| r.meta_artist.is_none()).count(),
    );
    Ok(())
}

fn cmd_update(settings: &Settings) -> Result<()> {
    let path = settings.catalog_csv_path();
    if !path.exists() {
        anyhow::bail!(
            "카탈로그가 없습니다: {}. 먼저 'musicshelf catalog'를 실행하세요.",
            path.display()
        );
    }

    let records = catalog::read_catalog(&path)
        .with_context(|| format!("카탈로그를 읽을 수 없습니다: {}", path.display()))?;
    println!("카탈로그 {}개 행을 반영합니다.", records.len());

    let report = catalog::apply_updates(settings, &records);
    println!(
        "완료: 태그 {}개, 이름 변경 {}개, 없는 파일 {}개, 실패 {}개",
        report.tagged, report.renamed, report.missing, report.failed
    );

    export_catalog(settings)?;
    Ok(())
}

fn cmd_retag(settings: &Settings) -> Result<()> {
    let report = retag::retag_library(settings).context("태그를 다시 기록할 수 없습니다")?;
    println!(
        "완료: 파일 {}개 중 {}개 갱신, {}개 실패",
        report.found, report.updated, report.failed
    );
    Ok(())
}

fn cmd_config(mut cfg: Config) -> Result<()> {
    println!("musicshelf 설정\n");

    let current_root = cfg
        .library
        .root
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    let root: String = Input::new()
        .with_prompt("라이브러리 루트 (비우면 기본 위치)")
        .with_initial_text(current_root)
        .allow_empty(true)
        .interact_text()?;
    cfg.library.root = Some(root.trim())
        .filter(|r| !r.is_empty())
        .map(PathBuf::from);

    cfg.download.ytdlp = Input::new()
        .with_prompt("yt-dlp 경로")
        .with_initial_text(cfg.download.ytdlp.clone())
        .interact_text()?;
    cfg.download.ffmpeg = Input::new()
        .with_prompt("ffmpeg 경로")
        .with_initial_text(cfg.download.ffmpeg.clone())
        .interact_text()?;

    let formats = [AudioFormat::M4a, AudioFormat::Mp3];
    let current = formats
        .iter()
        .position(|f| *f == cfg.download.audio_format)
        .unwrap_or(0);
    let selection = Select::new()
        .with_prompt("오디오 형식")
        .items(&["m4a", "mp3"])
        .default(current)
        .interact()?;
    cfg.download.audio_format = formats[selection];

    cfg.normalizer.url = Input::new()
        .with_prompt("정규화 서비스 URL")
        .with_initial_text(cfg.normalizer.url.clone())
        .interact_text()?;
    cfg.normalizer.model = Input::new()
        .with_prompt("정규화 모델")
        .with_initial_text(cfg.normalizer.model.clone())
        .interact_text()?;

    let policies = [MergePolicy::Merge, MergePolicy::Reject];
    let current = policies
        .iter()
        .position(|p| *p == cfg.normalizer.merge_policy)
        .unwrap_or(0);
    let selection = Select::new()
        .with_prompt("정규화된 폴더가 이미 있을 때")
        .items(&["병합", "건너뛰기"])
        .default(current)
        .interact()?;
    cfg.normalizer.merge_policy = policies[selection];

    config::save_config(&cfg)?;
    println!("\n설정이 저장되었습니다!");
    Ok(())
}
