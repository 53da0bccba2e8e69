//! Per-task progress bus
//!
//! Emitters append ordered events to a task's queue; one listener per task
//! drains the queue as a stream, receiving buffered history first. A
//! synthesized `connected` event is delivered on attach and keepalives at a
//! one-second cadence while idle, so transports can detect liveness. The
//! stream ends on a terminal event or after a stretch of inactivity, after
//! which the task is collected.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::models::{ProgressEvent, ProgressStatus};

/// Observer contract for components that report progress.
///
/// Callers without interest pass [`NoopSink`].
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Sink that drops every event
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn emit(&self, _event: ProgressEvent) {}
}

struct Task {
    tx: mpsc::UnboundedSender<ProgressEvent>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<ProgressEvent>>>,
}

/// Supervisor-owned map of task queues
#[derive(Default)]
pub struct ProgressBus {
    tasks: DashMap<String, Arc<Task>>,
}

impl ProgressBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn task(&self, task_id: &str) -> Arc<Task> {
        self.tasks
            .entry(task_id.to_string())
            .or_insert_with(|| {
                let (tx, rx) = mpsc::unbounded_channel();
                Arc::new(Task {
                    tx,
                    rx: Mutex::new(Some(rx)),
                })
            })
            .clone()
    }

    /// Append an event to its task's queue.
    ///
    /// The queue is created on first emit, so a listener that attaches later
    /// still receives the full history in order.
    pub fn emit(&self, event: ProgressEvent) {
        let task = self.task(&event.task_id);
        let _ = task.tx.send(event);
    }

    /// Number of live tasks
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Subscribe to a task's event stream.
    ///
    /// The stream opens with a synthesized `connected` event, then yields
    /// buffered and live events in emit order, interleaving keepalives while
    /// idle. It terminates on a `completed`/`failed` event or once no event
    /// has arrived for `timeout`, and the task is collected afterwards.
    pub fn listen(
        self: &Arc<Self>,
        task_id: &str,
        timeout: Duration,
    ) -> mpsc::UnboundedReceiver<ProgressEvent> {
        let task = self.task(task_id);
        let rx = task.rx.lock().take();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        let bus = Arc::clone(self);
        let task_id = task_id.to_string();
        tokio::spawn(async move {
            let _ = out_tx.send(ProgressEvent::new(
                task_id.as_str(),
                "connected",
                ProgressStatus::Pending,
                "",
            ));

            // another listener already owns this task's queue
            let Some(mut rx) = rx else {
                return;
            };

            let mut last_activity = Instant::now();
            loop {
                match tokio::time::timeout(Duration::from_secs(1), rx.recv()).await {
                    Ok(Some(event)) => {
                        last_activity = Instant::now();
                        let terminal = event.status.is_terminal();
                        if out_tx.send(event).is_err() || terminal {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(_) => {
                        if last_activity.elapsed() > timeout {
                            tracing::warn!("progress stream timeout for task: {}", task_id);
                            break;
                        }
                        let keepalive = ProgressEvent::new(
                            task_id.as_str(),
                            "keepalive",
                            ProgressStatus::Pending,
                            "",
                        );
                        if out_tx.send(keepalive).is_err() {
                            break;
                        }
                    }
                }
            }

            bus.tasks.remove(&task_id);
            tracing::debug!("cleaned up progress task: {}", task_id);
        });

        out_rx
    }

    /// Graceful close: every live task receives a synthetic terminal event
    /// so attached listeners finish cleanly
    pub fn close(&self) {
        for entry in self.tasks.iter() {
            let _ = entry.value().tx.send(ProgressEvent::new(
                entry.key().as_str(),
                "shutdown",
                ProgressStatus::Completed,
                "service shutting down",
            ));
        }
    }
}

impl ProgressSink for ProgressBus {
    fn emit(&self, event: ProgressEvent) {
        ProgressBus::emit(self, event);
    }
}
