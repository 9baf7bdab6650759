use std::sync::{Arc, Weak};

use reqwest::Client;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::delivery::{CompletionSink, Delivery, Dispatcher};
use crate::downloader::fetcher::{decode_off_thread, fetch_bytes};
use crate::types::{DecodedImage, DownloadError, DownloadRequest, DownloadResult, RequestState};

/// Runs one fetch-and-decode per `submit` on its own tokio task and hands
/// the terminal result to a `Dispatcher`.
///
/// The pipeline keeps no per-request state after submission, so it can be
/// reused indefinitely, including after failures.
pub struct FetchPipeline {
    client: Client,
    config: PipelineConfig,
    dispatcher: Arc<dyn Dispatcher>,
}

impl FetchPipeline {
    pub fn new(config: PipelineConfig, dispatcher: Arc<dyn Dispatcher>) -> Result<Self, DownloadError> {
        let client = config.network.build_client()?;
        Ok(Self::with_client(client, config, dispatcher))
    }

    /// Builds a pipeline around an existing client, ignoring `config.network`.
    pub fn with_client(client: Client, config: PipelineConfig, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            client,
            config,
            dispatcher,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Schedules a download and returns immediately.
    ///
    /// `sink.on_start()` is awaited before the worker is spawned. The worker
    /// only keeps a `Weak` to the sink, so dropping the last `Arc` cancels
    /// delivery but not the download itself.
    pub async fn submit<S: CompletionSink>(&self, request: DownloadRequest, sink: &Arc<S>) -> DownloadHandle {
        let id = Uuid::new_v4().to_string();
        let url = request.resolve_url(&self.config.default_url);
        let (state_tx, state_rx) = watch::channel(RequestState::Pending);

        sink.on_start().await;

        let weak: Weak<S> = Arc::downgrade(sink);
        let worker = Worker {
            request_id: id.clone(),
            url: url.clone(),
            client: self.client.clone(),
            dispatcher: Arc::clone(&self.dispatcher),
            sink: weak,
            state: state_tx,
        };

        log::info!("[FetchPipeline::submit] request={}: scheduling {}", id, url);
        let task = tokio::spawn(worker.run());

        DownloadHandle {
            id,
            url,
            state: state_rx,
            task,
        }
    }
}

/// Everything one background request needs, moved onto its task.
struct Worker {
    request_id: String,
    url: String,
    client: Client,
    dispatcher: Arc<dyn Dispatcher>,
    sink: Weak<dyn CompletionSink>,
    state: watch::Sender<RequestState>,
}

impl Worker {
    async fn run(self) {
        let result: DownloadResult = self.fetch_and_decode().await.into();

        if let DownloadResult::Failure { reason, detail } = &result {
            log::error!(
                "[FetchPipeline] request={}: {} while downloading {}: {}",
                self.request_id,
                reason,
                self.url,
                detail
            );
        }

        let outcome = result.outcome();
        self.dispatcher
            .dispatch(Delivery {
                request_id: self.request_id.clone(),
                sink: self.sink,
                result,
            })
            .await;
        advance(&self.state, &self.request_id, RequestState::Delivered(outcome));
    }

    async fn fetch_and_decode(&self) -> Result<DecodedImage, DownloadError> {
        advance(&self.state, &self.request_id, RequestState::Fetching);
        let bytes = fetch_bytes(&self.client, &self.url).await?;

        // Cancellation, if added, is checked here, before decoding.
        advance(&self.state, &self.request_id, RequestState::Decoding);
        decode_off_thread(bytes).await
    }
}

/// Moves the request to `next` if the state machine allows it.
fn advance(state: &watch::Sender<RequestState>, request_id: &str, next: RequestState) {
    state.send_modify(|current| {
        if current.can_transition_to(&next) {
            *current = next;
        } else {
            log::warn!(
                "[FetchPipeline] request={}: ignoring illegal transition {:?} -> {:?}",
                request_id,
                current,
                next
            );
        }
    });
}

/// Caller-side view of a submitted request.
pub struct DownloadHandle {
    id: String,
    url: String,
    state: watch::Receiver<RequestState>,
    task: JoinHandle<()>,
}

impl DownloadHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The URL actually fetched, after default substitution.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> RequestState {
        *self.state.borrow()
    }

    /// Resolves once the request reaches `Delivered`.
    pub async fn wait(&mut self) -> RequestState {
        let done = match self.state.wait_for(RequestState::is_terminal).await {
            Ok(state) => Some(*state),
            Err(_) => None,
        };
        done.unwrap_or_else(|| *self.state.borrow())
    }

    /// Awaits the worker task itself.
    pub async fn join(self) -> Result<(), DownloadError> {
        self.task
            .await
            .map_err(|e| DownloadError::Worker(e.to_string()))
    }
}
