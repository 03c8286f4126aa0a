use indicatif::{ProgressBar, ProgressStyle};

/// 다운로드 도중 오케스트레이터가 내보내는 진행 이벤트.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Started { label: String },
    Percent(f32),
    Message(String),
    Finished,
}

pub trait ProgressSink {
    fn emit(&mut self, event: ProgressEvent);
}

/// 이벤트를 버린다.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn emit(&mut self, _event: ProgressEvent) {}
}

/// 터미널 진행 막대.
#[derive(Default)]
pub struct BarProgress {
    bar: Option<ProgressBar>,
}

impl BarProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for BarProgress {
    fn emit(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { label } => {
                let bar = ProgressBar::new(100);
                if let Ok(style) =
                    ProgressStyle::with_template("{msg:32} [{bar:40}] {pos:>3}%")
                {
                    bar.set_style(style.progress_chars("=> "));
                }
                bar.set_message(label);
                self.bar = Some(bar);
            }
            ProgressEvent::Percent(p) => {
                if let Some(bar) = &self.bar {
                    bar.set_position(p.clamp(0.0, 100.0) as u64);
                }
            }
            ProgressEvent::Message(msg) => match &self.bar {
                Some(bar) => bar.println(msg),
                None => println!("{}", msg),
            },
            ProgressEvent::Finished => {
                if let Some(bar) = self.bar.take() {
                    bar.finish_and_clear();
                }
            }
        }
    }
}

/// 다운로드 도구 출력 한 줄에서 백분율을 뽑는다.
/// `[download]  42.3% of 3.2MiB` 같은 줄을 기대하며 해석할 수 없으면 None.
pub fn parse_percent(line: &str) -> Option<f32> {
    line.split_whitespace()
        .find_map(|token| token.strip_suffix('%'))
        .and_then(|num| num.parse::<f32>().ok())
        .filter(|p| (0.0..=100.0).contains(p))
}
