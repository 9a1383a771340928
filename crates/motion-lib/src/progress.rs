//! Job progress channel
//!
//! Single-producer, single-consumer unbounded FIFO carrying textual progress
//! terminated by exactly one sentinel. The producer never blocks. Dropping a
//! `ProgressSender` without finishing it, e.g. when the job panics, delivers
//! [`ABORTED_MESSAGE`] and then the sentinel, so a consumer always sees a
//! textual failure instead of a silent end.

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

/// Last message of a job whose sender was dropped unfinished
pub const ABORTED_MESSAGE: &str = "error: job aborted";

/// Item carried by the progress channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Message(String),
    /// Terminal marker, always the last event of a job
    Done,
}

/// Create a connected progress sender and receiver
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ProgressSender { tx, finished: false },
        ProgressReceiver { rx, done: false },
    )
}

/// Producer half, owned by the background job
#[derive(Debug)]
pub struct ProgressSender {
    tx: mpsc::UnboundedSender<ProgressEvent>,
    finished: bool,
}

impl ProgressSender {
    /// Queue a progress message
    pub fn send(&self, message: impl Into<String>) {
        if self.tx.send(ProgressEvent::Message(message.into())).is_err() {
            debug!("Progress consumer gone, dropping message");
        }
    }

    /// Push the sentinel and close the producer side
    pub fn finish(mut self) {
        self.push_sentinel();
    }

    fn push_sentinel(&mut self) {
        if !self.finished {
            self.finished = true;
            let _ = self.tx.send(ProgressEvent::Done);
        }
    }
}

impl Drop for ProgressSender {
    fn drop(&mut self) {
        if !self.finished {
            warn!(panicking = std::thread::panicking(), "Progress sender dropped unfinished");
            let _ = self
                .tx
                .send(ProgressEvent::Message(ABORTED_MESSAGE.to_string()));
        }
        self.push_sentinel();
    }
}

/// Consumer half, owned by the presentation layer
#[derive(Debug)]
pub struct ProgressReceiver {
    rx: mpsc::UnboundedReceiver<ProgressEvent>,
    done: bool,
}

impl ProgressReceiver {
    /// Next message, or `None` once the sentinel has been observed
    pub async fn recv(&mut self) -> Option<String> {
        if self.done {
            return None;
        }
        match self.rx.recv().await {
            Some(ProgressEvent::Message(message)) => Some(message),
            Some(ProgressEvent::Done) | None => {
                self.done = true;
                None
            }
        }
    }

    /// Drain every message up to the sentinel
    pub async fn collect(mut self) -> Vec<String> {
        let mut messages = Vec::new();
        while let Some(message) = self.recv().await {
            messages.push(message);
        }
        messages
    }

    /// Adapt into a stream that ends at the sentinel
    pub fn into_stream(self) -> impl Stream<Item = String> {
        UnboundedReceiverStream::new(self.rx)
            .take_while(|event| matches!(event, ProgressEvent::Message(_)))
            .filter_map(|event| match event {
                ProgressEvent::Message(message) => Some(message),
                ProgressEvent::Done => None,
            })
    }

    /// Raw events including the sentinel, for protocol-level checks
    pub fn try_events(&mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_then_sentinel() {
        let (tx, mut rx) = progress_channel();
        tx.send("one");
        tx.send("two");
        tx.send("three");
        tx.finish();

        assert_eq!(rx.recv().await.as_deref(), Some("one"));
        assert_eq!(rx.recv().await.as_deref(), Some("two"));
        assert_eq!(rx.recv().await.as_deref(), Some("three"));
        assert_eq!(rx.recv().await, None);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_unfinished_drop_reports_abort_then_sentinel() {
        let (tx, mut rx) = progress_channel();
        tx.send("partial");
        drop(tx);

        assert_eq!(
            rx.try_events(),
            vec![
                ProgressEvent::Message("partial".to_string()),
                ProgressEvent::Message(ABORTED_MESSAGE.to_string()),
                ProgressEvent::Done
            ]
        );
    }

    #[tokio::test]
    async fn test_panicking_job_surfaces_abort_message() {
        let (tx, rx) = progress_channel();
        let job = tokio::task::spawn_blocking(move || {
            tx.send("Epoch [10/60]");
            panic!("class index out of range");
        });
        assert!(job.await.unwrap_err().is_panic());

        let messages = rx.collect().await;
        assert_eq!(messages, vec!["Epoch [10/60]", ABORTED_MESSAGE]);
    }

    #[tokio::test]
    async fn test_finish_does_not_duplicate_sentinel() {
        let (tx, mut rx) = progress_channel();
        tx.finish();
        let events = rx.try_events();
        assert_eq!(events, vec![ProgressEvent::Done]);
    }

    #[tokio::test]
    async fn test_stream_stops_at_sentinel() {
        let (tx, rx) = progress_channel();
        let producer = tokio::spawn(async move {
            for i in 0..5 {
                tx.send(format!("epoch {}", i));
            }
            tx.finish();
        });

        let messages: Vec<String> = rx.into_stream().collect().await;
        producer.await.unwrap();
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0], "epoch 0");
        assert_eq!(messages[4], "epoch 4");
    }

    #[test]
    fn test_send_after_consumer_dropped_is_silent() {
        let (tx, rx) = progress_channel();
        drop(rx);
        tx.send("nobody listening");
        tx.finish();
    }
}
