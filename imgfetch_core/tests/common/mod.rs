#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use imgfetch_core::{CompletionSink, DownloadResult};

/// Address nothing listens on.
pub const UNREACHABLE_URL: &str = "http://127.0.0.1:1/image.png";

/// Encodes a small deterministic RGB image as PNG.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 251) as u8, (y % 251) as u8, 128])
    });
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

pub const HTML_PAGE: &str = "<!doctype html><html><body>not an image</body></html>";

/// Test sink that records lifecycle calls. The `SinkRecord` half outlives the
/// sink so tests can inspect what happened after the host dropped it.
pub struct RecordingSink {
    events: Arc<Mutex<Vec<&'static str>>>,
    completions: Arc<AtomicUsize>,
    tx: mpsc::UnboundedSender<DownloadResult>,
}

pub struct SinkRecord {
    pub events: Arc<Mutex<Vec<&'static str>>>,
    pub completions: Arc<AtomicUsize>,
    rx: mpsc::UnboundedReceiver<DownloadResult>,
}

impl RecordingSink {
    pub fn new() -> (Arc<Self>, SinkRecord) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let completions = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Arc::new(Self {
            events: Arc::clone(&events),
            completions: Arc::clone(&completions),
            tx,
        });
        (
            sink,
            SinkRecord {
                events,
                completions,
                rx,
            },
        )
    }
}

#[async_trait]
impl CompletionSink for RecordingSink {
    async fn on_start(&self) {
        self.events.lock().unwrap().push("start");
    }

    async fn on_complete(&self, result: DownloadResult) {
        self.events.lock().unwrap().push("complete");
        self.completions.fetch_add(1, Ordering::SeqCst);
        let _ = self.tx.send(result);
    }
}

impl SinkRecord {
    /// Waits for the sink's terminal result.
    pub async fn result(&mut self) -> DownloadResult {
        tokio::time::timeout(Duration::from_secs(15), self.rx.recv())
            .await
            .expect("sink should be notified within timeout")
            .expect("sink dropped before completing")
    }

    pub fn completions(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }
}
