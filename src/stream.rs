//! Incremental delivery of rendered chunks.
//!
//! The interpreter is synchronous, so a streamed render runs on a blocking tokio
//! thread and forwards each chunk through a bounded channel. The consumer reads
//! chunks in document order while the render is still in progress; a slow consumer
//! applies back-pressure once the channel is full.

use crate::render::finish_output;
use async_channel::{Receiver, Sender};
use qweb_template::{OutputSink, QWebError};
use tokio::task::JoinHandle;

/// Forwards chunks into a bounded channel, blocking while it is full.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<String>,
}

impl ChannelSink {
    pub fn new(tx: Sender<String>) -> Self {
        Self { tx }
    }
}

impl OutputSink for ChannelSink {
    fn write(&mut self, chunk: &str) -> Result<(), QWebError> {
        if chunk.is_empty() {
            return Ok(());
        }
        log::trace!("streaming chunk of {} bytes", chunk.len());
        self.tx
            .send_blocking(chunk.to_string())
            .map_err(|_| QWebError::evaluation("render stream was dropped by its consumer"))
    }
}

/// The chunks of one render, finite and not restartable.
///
/// Chunks end when the render finishes or fails; [`RenderStream::finish`] then
/// reports which of the two happened.
#[derive(Debug)]
pub struct RenderStream {
    chunks: Receiver<String>,
    task: JoinHandle<Result<(), QWebError>>,
    keep_empty_lines: bool,
}

impl RenderStream {
    pub(crate) fn new(
        chunks: Receiver<String>,
        task: JoinHandle<Result<(), QWebError>>,
        keep_empty_lines: bool,
    ) -> Self {
        Self {
            chunks,
            task,
            keep_empty_lines,
        }
    }

    /// The next chunk, or `None` once the render stopped producing output.
    pub async fn next_chunk(&mut self) -> Option<String> {
        self.chunks.recv().await.ok()
    }

    /// Waits for the render and returns its outcome.
    ///
    /// Chunks not read yet are discarded; the render still runs to its end.
    pub async fn finish(mut self) -> Result<(), QWebError> {
        while self.next_chunk().await.is_some() {}
        join(self.task).await
    }

    /// Drains every chunk and returns the whole output, normalized like
    /// [`Engine::render`](crate::Engine::render) does.
    pub async fn collect(mut self) -> Result<String, QWebError> {
        let mut output = String::new();
        while let Some(chunk) = self.next_chunk().await {
            output.push_str(&chunk);
        }
        join(self.task).await?;
        Ok(finish_output(output, self.keep_empty_lines))
    }
}

async fn join(task: JoinHandle<Result<(), QWebError>>) -> Result<(), QWebError> {
    task.await
        .map_err(|e| QWebError::evaluation(format!("render task failed: {}", e)))?
}
