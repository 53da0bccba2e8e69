//! Filesystem change watcher with per-path debouncing
//!
//! Raw notify events are coalesced per path: every new event for a path
//! resets that path's quiet window, and only the latest effective kind
//! survives. A burst of writes to one file therefore becomes a single
//! reindex once the window expires. While paused (during rebuilds) arriving
//! notifications are discarded; shutdown flushes whatever is still pending
//! before the observer stops.

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::core::tags;
use crate::error::{LibraryError, Result};

/// Work dispatched to the index writer after debouncing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// File was created or modified; re-read its tags and upsert
    Reindex(PathBuf),
    /// File is gone; drop its row
    Delete(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingKind {
    Reindex,
    Delete,
}

#[derive(Debug)]
struct Pending {
    kind: PendingKind,
    deadline: Instant,
}

/// Per-path coalescing state shared between the notify callback thread and
/// the pump task
#[derive(Default)]
struct DebounceState {
    pending: HashMap<PathBuf, Pending>,
}

impl DebounceState {
    /// Record an observed kind for a path, resetting its quiet window
    fn push(&mut self, path: PathBuf, kind: PendingKind, debounce: Duration) {
        self.pending.insert(
            path,
            Pending {
                kind,
                deadline: Instant::now() + debounce,
            },
        );
    }

    /// Take entries whose quiet window has elapsed
    fn drain_expired(&mut self, now: Instant) -> Vec<(PathBuf, PendingKind)> {
        let expired: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|path| {
                let pending = self.pending.remove(&path)?;
                Some((path, pending.kind))
            })
            .collect()
    }

    /// Take everything regardless of deadline (shutdown flush)
    fn drain_all(&mut self) -> Vec<(PathBuf, PendingKind)> {
        self.pending
            .drain()
            .map(|(path, pending)| (path, pending.kind))
            .collect()
    }
}

/// Live filesystem observer over the library root
pub struct ChangeWatcher {
    _watcher: RecommendedWatcher,
    stop: Arc<AtomicBool>,
    pump: JoinHandle<()>,
}

impl ChangeWatcher {
    /// Start watching `root` recursively.
    ///
    /// Debounced change events are sent to `events`; while `paused` is set,
    /// arriving notifications are discarded at the source.
    pub fn start(
        root: &Path,
        debounce: Duration,
        paused: Arc<AtomicBool>,
        events: UnboundedSender<ChangeEvent>,
    ) -> Result<Self> {
        let state = Arc::new(Mutex::new(DebounceState::default()));

        let handler_state = Arc::clone(&state);
        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    if paused.load(Ordering::SeqCst) {
                        return;
                    }
                    handle_event(&handler_state, event, debounce);
                }
            },
            Config::default(),
        )
        .map_err(|e| LibraryError::Fatal(format!("failed to create watcher: {e}")))?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| LibraryError::Fatal(format!("failed to watch {}: {e}", root.display())))?;

        let stop = Arc::new(AtomicBool::new(false));
        let pump = tokio::spawn(pump_loop(state, events, Arc::clone(&stop)));

        Ok(Self {
            _watcher: watcher,
            stop,
            pump,
        })
    }

    /// Flush pending debounced events, then stop the observer
    pub async fn shutdown(self) {
        self.stop.store(true, Ordering::SeqCst);
        let _ = self.pump.await;
    }
}

/// Forward expired entries to the writer queue at a fixed cadence
async fn pump_loop(
    state: Arc<Mutex<DebounceState>>,
    events: UnboundedSender<ChangeEvent>,
    stop: Arc<AtomicBool>,
) {
    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let stopping = stop.load(Ordering::SeqCst);
        let ready = {
            let mut state = state.lock();
            if stopping {
                state.drain_all()
            } else {
                state.drain_expired(Instant::now())
            }
        };

        for (path, kind) in ready {
            let event = match kind {
                PendingKind::Reindex => ChangeEvent::Reindex(path),
                PendingKind::Delete => ChangeEvent::Delete(path),
            };
            if events.send(event).is_err() {
                return;
            }
        }

        if stopping {
            return;
        }
    }
}

/// Classify one raw notify event into pending per-path kinds
fn handle_event(state: &Mutex<DebounceState>, event: Event, debounce: Duration) {
    match event.kind {
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::Both if event.paths.len() == 2 => {
                push_if_audio(state, &event.paths[0], PendingKind::Delete, debounce);
                push_if_audio(state, &event.paths[1], PendingKind::Reindex, debounce);
            }
            RenameMode::From => {
                for path in &event.paths {
                    push_if_audio(state, path, PendingKind::Delete, debounce);
                }
            }
            RenameMode::To => {
                for path in &event.paths {
                    push_if_audio(state, path, PendingKind::Reindex, debounce);
                }
            }
            _ => {
                // rename with unknown direction: resolve by existence
                for path in &event.paths {
                    let kind = if path.exists() {
                        PendingKind::Reindex
                    } else {
                        PendingKind::Delete
                    };
                    push_if_audio(state, path, kind, debounce);
                }
            }
        },
        EventKind::Create(_) | EventKind::Modify(_) => {
            for path in &event.paths {
                push_if_audio(state, path, PendingKind::Reindex, debounce);
            }
        }
        EventKind::Remove(_) => {
            for path in &event.paths {
                push_if_audio(state, path, PendingKind::Delete, debounce);
            }
        }
        _ => {}
    }
}

fn push_if_audio(state: &Mutex<DebounceState>, path: &Path, kind: PendingKind, debounce: Duration) {
    if path.is_dir() || !tags::is_supported(path) {
        return;
    }
    state.lock().push(path.to_path_buf(), kind, debounce);
}
