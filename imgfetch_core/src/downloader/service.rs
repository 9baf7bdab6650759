use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use reqwest::Client;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::ServiceConfig;
use crate::delivery::{CompletionSink, Delivery, DirectDispatcher, Dispatcher};
use crate::downloader::fetcher::{decode_file, fetch_bytes, save_bytes};
use crate::types::{DownloadError, DownloadRequest, DownloadResult, ServiceReply};

/// Started-service style downloader: the worker stores the image on disk
/// and replies with the file path; decoding happens on the reply side.
///
/// Handlers spawned by `submit` deliver through the service's dispatcher
/// (`DirectDispatcher` unless `with_dispatcher` says otherwise).
pub struct DownloadService {
    client: Client,
    config: ServiceConfig,
    dispatcher: Arc<dyn Dispatcher>,
}

/// Returned by `DownloadService::start`.
pub struct StartedDownload {
    pub request_id: String,
    pub url: String,
    pub task: JoinHandle<()>,
}

impl DownloadService {
    pub fn new(config: ServiceConfig) -> Result<Self, DownloadError> {
        let client = config.network.build_client()?;
        Ok(Self {
            client,
            config,
            dispatcher: Arc::new(DirectDispatcher),
        })
    }

    /// Routes `on_complete` calls made by `submit`'s handlers through
    /// `dispatcher`, e.g. an `EventLoopDispatcher` shared with a pipeline.
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Spawns a worker that downloads `url` into the download directory and
    /// posts exactly one `ServiceReply` to `reply_to`. An empty URL is
    /// replaced by the configured default.
    pub fn start(&self, url: &str, reply_to: mpsc::Sender<ServiceReply>) -> StartedDownload {
        let request_id = Uuid::new_v4().to_string();
        let url = DownloadRequest::new(url).resolve_url(&self.config.default_url);

        let client = self.client.clone();
        let download_dir = self.config.download_dir.clone();
        let task_id = request_id.clone();
        let task_url = url.clone();

        log::info!("[DownloadService::start] request={}: downloading {}", request_id, url);
        let task = tokio::spawn(async move {
            let outcome = download_to_file(&client, &task_url, download_dir).await;
            if let Err(e) = &outcome {
                log::error!("[DownloadService] request={}: {}: {}", task_id, task_url, e);
            }

            let reply = ServiceReply {
                request_id: task_id,
                url: task_url,
                outcome,
            };
            if let Err(mpsc::error::SendError(reply)) = reply_to.send(reply).await {
                log::debug!(
                    "[DownloadService] request={}: reply handler is gone, discarding reply",
                    reply.request_id
                );
            }
        });

        StartedDownload {
            request_id,
            url,
            task,
        }
    }

    /// Convenience wrapper: calls `sink.on_start()`, starts the download and
    /// spawns a `ReplyHandler` bound to `sink` for its single reply.
    pub async fn submit<S: CompletionSink>(&self, request: DownloadRequest, sink: &Arc<S>) -> StartedDownload {
        sink.on_start().await;

        let (reply_tx, reply_rx) = mpsc::channel(1);
        let handler = ReplyHandler::new(sink)
            .with_dispatcher(Arc::clone(&self.dispatcher))
            .retaining_files(self.config.retain_files);
        let started = self.start(&request.url, reply_tx);

        let worker = started.task;
        let task = tokio::spawn(async move {
            handler.run(reply_rx).await;
            if let Err(e) = worker.await {
                log::error!("[DownloadService] worker task failed: {}", e);
            }
        });

        StartedDownload {
            request_id: started.request_id,
            url: started.url,
            task,
        }
    }
}

async fn download_to_file(client: &Client, url: &str, download_dir: PathBuf) -> Result<PathBuf, DownloadError> {
    let bytes = fetch_bytes(client, url).await?;
    save_bytes(&download_dir, &bytes).await
}

/// Receives `ServiceReply`s and turns each into one `on_complete` call,
/// delivered through a `Dispatcher`.
///
/// Holds only a `Weak` to its sink; once the host drops the sink, replies
/// are discarded without decoding. Downloaded files are removed once
/// consumed or discarded, unless retention is switched on.
pub struct ReplyHandler {
    sink: Weak<dyn CompletionSink>,
    dispatcher: Arc<dyn Dispatcher>,
    retain_files: bool,
}

impl ReplyHandler {
    pub fn new<S: CompletionSink>(sink: &Arc<S>) -> Self {
        let weak: Weak<S> = Arc::downgrade(sink);
        Self {
            sink: weak,
            dispatcher: Arc::new(DirectDispatcher),
            retain_files: false,
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn retaining_files(mut self, retain: bool) -> Self {
        self.retain_files = retain;
        self
    }

    /// Drains replies until every sender has been dropped.
    pub async fn run(self, mut replies: mpsc::Receiver<ServiceReply>) {
        while let Some(reply) = replies.recv().await {
            self.handle_reply(reply).await;
        }
    }

    async fn handle_reply(&self, reply: ServiceReply) {
        if self.sink.strong_count() == 0 {
            log::debug!(
                "[ReplyHandler] request={}: host is gone, dropping reply",
                reply.request_id
            );
            if let Ok(path) = &reply.outcome {
                self.discard(path).await;
            }
            return;
        }

        let result: DownloadResult = match reply.outcome {
            Ok(path) => {
                let decoded: DownloadResult = decode_file(path.clone()).await.into();
                self.discard(&path).await;
                decoded
            }
            Err(e) => DownloadResult::Failure {
                reason: e.kind(),
                detail: e.to_string(),
            },
        };

        if let DownloadResult::Failure { reason, detail } = &result {
            log::error!(
                "[ReplyHandler] request={}: {} for {}: {}",
                reply.request_id,
                reason,
                reply.url,
                detail
            );
        }

        self.dispatcher
            .dispatch(Delivery {
                request_id: reply.request_id,
                sink: self.sink.clone(),
                result,
            })
            .await;
    }

    async fn discard(&self, path: &Path) {
        if self.retain_files {
            return;
        }
        if let Err(e) = tokio::fs::remove_file(path).await {
            log::debug!("[ReplyHandler] could not remove {}: {}", path.display(), e);
        }
    }
}
