//! Asynchronous single-image download-and-decode with weakly held
//! completion sinks.
//!
//! Two front doors share the same fetch and decode primitives:
//! - [`FetchPipeline`] runs fetch and decode on a worker task and hands the
//!   result to a [`Dispatcher`].
//! - [`DownloadService`] stores the image on disk and replies with the path;
//!   a [`ReplyHandler`] decodes it and notifies the sink.

pub mod config;
pub mod delivery;
pub mod downloader;
pub mod types;

pub use config::{NetworkConfig, PipelineConfig, ServiceConfig, DEFAULT_IMAGE_URL};
pub use delivery::{CompletionSink, Delivery, DirectDispatcher, Dispatcher, EventLoop, EventLoopDispatcher};
pub use downloader::pipeline::{DownloadHandle, FetchPipeline};
pub use downloader::service::{DownloadService, ReplyHandler, StartedDownload};
pub use types::{
    DecodedImage, DownloadError, DownloadRequest, DownloadResult, ErrorKind, Outcome, RequestState, ServiceReply,
};
