use std::sync::Weak;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::sink::CompletionSink;
use crate::types::DownloadResult;

/// Capacity of the event loop queue. Workers wait for room; the
/// submitting task never touches this queue.
const EVENT_LOOP_CAPACITY: usize = 256;

/// A terminal result on its way to a sink.
pub struct Delivery {
    pub request_id: String,
    pub sink: Weak<dyn CompletionSink>,
    pub result: DownloadResult,
}

impl Delivery {
    /// Hands the result to the sink if its host is still alive.
    /// Returns `false` when the delivery was dropped.
    pub async fn deliver(self) -> bool {
        match self.sink.upgrade() {
            Some(sink) => {
                sink.on_complete(self.result).await;
                true
            }
            None => {
                log::debug!(
                    "[Delivery] request={}: host is gone, dropping result",
                    self.request_id
                );
                false
            }
        }
    }
}

/// Moves a `Delivery` into whatever execution context the sink requires.
#[async_trait]
pub trait Dispatcher: Send + Sync + 'static {
    async fn dispatch(&self, delivery: Delivery);
}

/// Calls the sink directly on the worker task. For sinks that do not care
/// which task they run on.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectDispatcher;

#[async_trait]
impl Dispatcher for DirectDispatcher {
    async fn dispatch(&self, delivery: Delivery) {
        delivery.deliver().await;
    }
}

/// Posts deliveries to an `EventLoop`.
#[derive(Clone)]
pub struct EventLoopDispatcher {
    tx: mpsc::Sender<Delivery>,
}

#[async_trait]
impl Dispatcher for EventLoopDispatcher {
    async fn dispatch(&self, delivery: Delivery) {
        if let Err(mpsc::error::SendError(delivery)) = self.tx.send(delivery).await {
            log::debug!(
                "[EventLoopDispatcher] request={}: event loop has stopped, dropping result",
                delivery.request_id
            );
        }
    }
}

/// Single-consumer loop that runs every sink callback on one task, one at a
/// time, in arrival order. Stands in for a UI thread.
///
/// `run` returns once every `EventLoopDispatcher` clone has been dropped and
/// the queue is drained.
pub struct EventLoop {
    rx: mpsc::Receiver<Delivery>,
}

impl EventLoop {
    pub fn new() -> (Self, EventLoopDispatcher) {
        let (tx, rx) = mpsc::channel(EVENT_LOOP_CAPACITY);
        (Self { rx }, EventLoopDispatcher { tx })
    }

    pub async fn run(mut self) {
        let mut delivered: u64 = 0;
        let mut dropped: u64 = 0;

        while let Some(delivery) = self.rx.recv().await {
            if delivery.deliver().await {
                delivered += 1;
            } else {
                dropped += 1;
            }
        }

        log::debug!(
            "[EventLoop] stopped: delivered={}, dropped={}",
            delivered,
            dropped
        );
    }
}
