//! Pull-based stream of ready patch files

use crate::debounce::Debouncer;
use crate::filter::{PatchFilter, DEFAULT_PATTERNS};
use crate::scan::scan_backlog;
use crate::WatchError;
use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// Capacity of the channel bridging notify's thread to the stream
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Where the stream is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchPhase {
    Idle,
    /// Reading the backlog of files present at startup
    Scanning,
    /// Waiting for events
    Listening,
    /// At least one path is waiting out its settle delay
    Debouncing,
    /// A ready path was handed to the consumer
    Dispatching,
    Stopped,
}

impl fmt::Display for WatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WatchPhase::Idle => "idle",
            WatchPhase::Scanning => "scanning",
            WatchPhase::Listening => "listening",
            WatchPhase::Debouncing => "debouncing",
            WatchPhase::Dispatching => "dispatching",
            WatchPhase::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Watch settings
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Directory to watch (non-recursive)
    pub dir: PathBuf,
    /// Glob patterns a file name must match
    pub patterns: Vec<String>,
    /// Settle delay before a changed file is yielded
    pub debounce: Duration,
}

impl WatchConfig {
    /// Config for `dir` with default patterns and a 100ms settle delay
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            patterns: DEFAULT_PATTERNS.iter().map(|p| p.to_string()).collect(),
            debounce: Duration::from_millis(100),
        }
    }
}

/// Control side of a [`PatchStream`]
///
/// Dropping every handle stops the stream.
#[derive(Debug, Clone)]
pub struct WatchHandle {
    shutdown: Arc<watch::Sender<bool>>,
    phase: watch::Receiver<WatchPhase>,
}

impl WatchHandle {
    /// Ask the stream to stop; safe to call at any time and more than once
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    /// Current phase of the stream
    pub fn phase(&self) -> WatchPhase {
        *self.phase.borrow()
    }

    /// Wait until the stream reaches `phase`; false if the stream was dropped first
    pub async fn wait_for(&self, phase: WatchPhase) -> bool {
        let mut rx = self.phase.clone();
        let reached = rx.wait_for(|p| *p == phase).await.is_ok();
        reached
    }
}

/// Stream of patch files ready to be dispatched
///
/// The OS watch is registered before the backlog scan, so a file created
/// while the scan runs is either in the backlog or arrives as an event.
/// The consumer handles [`PatchStream::backlog`] first, then calls
/// [`PatchStream::listen`] and pulls with [`PatchStream::next`].
pub struct PatchStream {
    dir: PathBuf,
    filter: PatchFilter,
    debouncer: Debouncer,
    /// Must stay alive for events to flow
    _watcher: RecommendedWatcher,
    events: mpsc::Receiver<notify::Result<Event>>,
    backlog: Vec<PathBuf>,
    /// Size and mtime of each backlog file when it was scanned
    scanned: HashMap<PathBuf, Fingerprint>,
    ready: VecDeque<PathBuf>,
    listening: bool,
    phase: watch::Sender<WatchPhase>,
    shutdown: watch::Receiver<bool>,
}

impl PatchStream {
    /// Register the watch on `config.dir` and scan the backlog
    pub fn open(config: WatchConfig) -> Result<(Self, WatchHandle), WatchError> {
        let (phase_tx, phase_rx) = watch::channel(WatchPhase::Idle);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let filter = PatchFilter::new(&config.dir, &config.patterns)?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // Receiver gone means the stream was dropped
            let _ = tx.blocking_send(res);
        })?;
        watcher.watch(&config.dir, RecursiveMode::NonRecursive)?;

        phase_tx.send_replace(WatchPhase::Scanning);
        let backlog = scan_backlog(&config.dir, &filter)?;
        let scanned = backlog
            .iter()
            .filter_map(|p| Fingerprint::of(p).map(|f| (p.clone(), f)))
            .collect();
        info!(
            dir = %config.dir.display(),
            backlog = backlog.len(),
            "Watching for patches"
        );

        let stream = Self {
            dir: config.dir,
            filter,
            debouncer: Debouncer::new(config.debounce),
            _watcher: watcher,
            events: rx,
            backlog,
            scanned,
            ready: VecDeque::new(),
            listening: false,
            phase: phase_tx,
            shutdown: shutdown_rx,
        };
        let handle = WatchHandle {
            shutdown: Arc::new(shutdown_tx),
            phase: phase_rx,
        };

        Ok((stream, handle))
    }

    /// Patch files present when the stream was opened, sorted by name
    pub fn backlog(&self) -> &[PathBuf] {
        &self.backlog
    }

    /// Whether [`WatchHandle::stop`] has been called
    pub fn is_stop_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Finish the backlog phase and start yielding events
    ///
    /// A buffered event for a backlog file is dropped only while that file is
    /// unchanged since the scan (a patch that failed and was kept). A file
    /// written again under a backlog name is scheduled like any other.
    pub fn listen(&mut self) {
        while let Ok(res) = self.events.try_recv() {
            match res {
                Ok(event) => self.handle_event(event, true),
                Err(e) => warn!("Watch error: {}", e),
            }
        }
        self.scanned.clear();

        self.listening = true;
        self.refresh_phase();
        debug!(pending = self.debouncer.len(), "Backlog done; listening");
    }

    /// Next patch file whose settle delay has elapsed
    ///
    /// Returns `None` once the stream is stopped. The file's existence is
    /// re-checked just before it is yielded.
    pub async fn next(&mut self) -> Option<PathBuf> {
        if !self.listening {
            self.listen();
        }

        loop {
            if *self.shutdown.borrow() {
                return self.finish();
            }

            if let Some(path) = self.ready.pop_front() {
                if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    self.set_phase(WatchPhase::Dispatching);
                    return Some(path);
                }
                debug!(path = %path.display(), "Patch vanished before dispatch");
                continue;
            }

            self.refresh_phase();
            let deadline = self.debouncer.next_deadline();

            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        return self.finish();
                    }
                }
                res = self.events.recv() => match res {
                    Some(Ok(event)) => self.handle_event(event, false),
                    Some(Err(e)) => warn!("Watch error: {}", e),
                    None => return self.finish(),
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.ready.extend(self.debouncer.pop_ready());
                }
            }
        }
    }

    fn handle_event(&mut self, event: Event, buffered: bool) {
        let removed = matches!(
            event.kind,
            EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From))
        );
        let relevant = removed || matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_));
        if !relevant {
            return;
        }

        for path in event.paths {
            if !self.filter.matches(&path) {
                continue;
            }
            if buffered && !removed && self.is_unchanged_backlog(&path) {
                debug!(path = %path.display(), "Backlog file unchanged since scan");
                continue;
            }
            if removed {
                if self.debouncer.cancel(&path) {
                    debug!(path = %path.display(), "Pending patch removed");
                }
            } else {
                debug!(path = %path.display(), kind = ?event.kind, "Patch event");
                self.debouncer.schedule(path);
            }
        }
    }

    fn is_unchanged_backlog(&self, path: &Path) -> bool {
        match self.scanned.get(path) {
            Some(scanned) => Fingerprint::of(path).as_ref() == Some(scanned),
            None => false,
        }
    }

    fn refresh_phase(&self) {
        let phase = if self.debouncer.is_empty() {
            WatchPhase::Listening
        } else {
            WatchPhase::Debouncing
        };
        self.set_phase(phase);
    }

    fn set_phase(&self, phase: WatchPhase) {
        self.phase.send_if_modified(|current| {
            if *current == phase {
                false
            } else {
                *current = phase;
                true
            }
        });
    }

    fn finish(&mut self) -> Option<PathBuf> {
        if *self.phase.borrow() != WatchPhase::Stopped {
            info!(dir = %self.dir.display(), "Patch stream stopped");
        }
        self.set_phase(WatchPhase::Stopped);
        None
    }
}

/// Identity of a file's content as far as the watcher cares
#[derive(Debug, Clone, PartialEq, Eq)]
struct Fingerprint {
    len: u64,
    modified: Option<SystemTime>,
}

impl Fingerprint {
    fn of(path: &Path) -> Option<Self> {
        let meta = std::fs::metadata(path).ok()?;
        Some(Self {
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}
