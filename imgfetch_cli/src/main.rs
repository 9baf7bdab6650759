use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use futures::future::join_all;
use indicatif::MultiProgress;

use imgfetch_core::{
    DownloadError, DownloadRequest, DownloadService, EventLoop, FetchPipeline, PipelineConfig, ServiceConfig,
    DEFAULT_IMAGE_URL,
};

mod terminal_sink;
use terminal_sink::{OutputMode, TerminalSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Via {
    /// Fetch and decode on a background task, deliver on the event loop
    Task,
    /// Save to disk on a background task, decode on the reply handler
    Service,
}

#[derive(Parser)]
#[command(name = "imgfetch", about = "Download and decode images in the background")]
struct Args {
    /// Image URLs to fetch. An empty string, or no URL at all, fetches the default image
    urls: Vec<String>,

    #[arg(long, value_enum, default_value = "task")]
    via: Via,

    /// Image fetched in place of an empty URL
    #[arg(long, default_value = DEFAULT_IMAGE_URL)]
    default_url: String,

    /// Where `--via service` stores downloaded files (default: system temp dir)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Keep files written by `--via service` instead of deleting them once decoded
    #[arg(long)]
    keep_files: bool,

    #[arg(long)]
    connect_timeout_secs: Option<u64>,

    /// Print one JSON object per result instead of spinners
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let urls = if args.urls.is_empty() {
        vec![String::new()]
    } else {
        args.urls.clone()
    };
    let mode = if args.json { OutputMode::Json } else { OutputMode::Spinner };

    let start = Instant::now();
    let outcome = match args.via {
        Via::Task => run_task(&args, urls, mode).await,
        Via::Service => run_service(&args, urls, mode).await,
    };

    match outcome {
        Ok(all_ok) => {
            log::info!("finished in {:.2}s", start.elapsed().as_secs_f64());
            if all_ok {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("imgfetch: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Task variant: results hop back onto a single event loop task, the way
/// they would onto a UI thread.
async fn run_task(args: &Args, urls: Vec<String>, mode: OutputMode) -> Result<bool, DownloadError> {
    let mut config = PipelineConfig::default().with_default_url(args.default_url.clone());
    if let Some(secs) = args.connect_timeout_secs {
        config = config.with_connect_timeout(Duration::from_secs(secs));
    }

    let (event_loop, dispatcher) = EventLoop::new();
    let loop_task = tokio::spawn(event_loop.run());
    let pipeline = FetchPipeline::new(config, Arc::new(dispatcher))?;

    let multi = MultiProgress::new();
    let mut sinks = Vec::with_capacity(urls.len());
    let mut handles = Vec::with_capacity(urls.len());
    for url in urls {
        let request = DownloadRequest::new(url);
        let shown = request.resolve_url(&pipeline.config().default_url);
        let sink = Arc::new(TerminalSink::new(shown, "task", mode, multi.clone()));
        handles.push(pipeline.submit(request, &sink).await);
        sinks.push(sink);
    }

    for joined in join_all(handles.into_iter().map(|h| h.join())).await {
        if let Err(e) = joined {
            log::error!("[run_task] {}", e);
        }
    }

    // Dropping the pipeline releases the last dispatcher, so the loop drains
    // and exits.
    drop(pipeline);
    loop_task.await.map_err(|e| DownloadError::Worker(e.to_string()))?;

    Ok(sinks.iter().all(|s| s.succeeded()))
}

/// Service variant: each download lands in `--out-dir` and is decoded by a
/// reply handler bound to its sink; results still hop onto one event loop.
async fn run_service(args: &Args, urls: Vec<String>, mode: OutputMode) -> Result<bool, DownloadError> {
    let mut config = ServiceConfig::default().with_default_url(args.default_url.clone());
    if let Some(dir) = &args.out_dir {
        config = config.with_download_dir(dir.clone());
    }
    if let Some(secs) = args.connect_timeout_secs {
        config = config.with_connect_timeout(Duration::from_secs(secs));
    }
    config = config.with_retained_files(args.keep_files);

    let (event_loop, dispatcher) = EventLoop::new();
    let loop_task = tokio::spawn(event_loop.run());
    let service = DownloadService::new(config)?.with_dispatcher(Arc::new(dispatcher));
    log::info!(
        "[run_service] saving downloads under {}",
        service.config().download_dir.display()
    );

    let multi = MultiProgress::new();
    let mut sinks = Vec::with_capacity(urls.len());
    let mut tasks = Vec::with_capacity(urls.len());
    for url in urls {
        let request = DownloadRequest::new(url);
        let shown = request.resolve_url(&service.config().default_url);
        let sink = Arc::new(TerminalSink::new(shown, "service", mode, multi.clone()));
        tasks.push(service.submit(request, &sink).await.task);
        sinks.push(sink);
    }

    for joined in join_all(tasks).await {
        if let Err(e) = joined {
            log::error!("[run_service] reply handler failed: {}", e);
        }
    }

    drop(service);
    loop_task.await.map_err(|e| DownloadError::Worker(e.to_string()))?;

    Ok(sinks.iter().all(|s| s.succeeded()))
}
