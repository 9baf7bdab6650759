use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use imgfetch_core::{CompletionSink, DownloadResult, ErrorKind};

/// How results are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Spinner,
    Json,
}

/// Message shown to the user for a failed request.
pub fn user_message(reason: ErrorKind) -> &'static str {
    match reason {
        ErrorKind::NetworkError => "Error downloading image, please check the requested URL.",
        ErrorKind::CorruptImage => "image is corrupted, please check the requested URL.",
    }
}

/// Renders one request as an indicatif spinner (or a JSON line).
///
/// The spinner plays the part of a progress dialog: shown on `on_start`,
/// finished or abandoned on `on_complete`.
pub struct TerminalSink {
    url: String,
    via: &'static str,
    mode: OutputMode,
    multi: MultiProgress,
    bar: Mutex<Option<ProgressBar>>,
    succeeded: AtomicBool,
}

impl TerminalSink {
    pub fn new(url: String, via: &'static str, mode: OutputMode, multi: MultiProgress) -> Self {
        Self {
            url,
            via,
            mode,
            multi,
            bar: Mutex::new(None),
            succeeded: AtomicBool::new(false),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded.load(Ordering::SeqCst)
    }

    fn print_json(&self, result: &DownloadResult) {
        let line = match result {
            DownloadResult::Success { image } => serde_json::json!({
                "url": self.url,
                "status": "success",
                "width": image.width(),
                "height": image.height(),
                "bytes": image.pixels().len(),
            }),
            DownloadResult::Failure { reason, detail } => serde_json::json!({
                "url": self.url,
                "status": "failure",
                "reason": reason,
                "detail": detail,
            }),
        };
        println!("{}", line);
    }
}

#[async_trait]
impl CompletionSink for TerminalSink {
    async fn on_start(&self) {
        if self.mode != OutputMode::Spinner {
            return;
        }

        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(style);
        pb.set_message(format!("{} (downloading via {})", self.url, self.via));
        pb.enable_steady_tick(Duration::from_millis(100));

        if let Ok(mut bar) = self.bar.lock() {
            *bar = Some(pb);
        }
    }

    async fn on_complete(&self, result: DownloadResult) {
        self.succeeded.store(result.is_success(), Ordering::SeqCst);

        if self.mode == OutputMode::Json {
            self.print_json(&result);
            return;
        }

        let bar = self.bar.lock().ok().and_then(|mut bar| bar.take());
        let Some(pb) = bar else {
            return;
        };
        match &result {
            DownloadResult::Success { image } => {
                pb.finish_with_message(format!("{}: {}x{} image", self.url, image.width(), image.height()));
            }
            DownloadResult::Failure { reason, .. } => {
                pb.abandon_with_message(format!("{}: {}", self.url, user_message(*reason)));
            }
        }
    }
}
