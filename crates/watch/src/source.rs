use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    Created,
    Modified,
    Removed,
    Other,
}

/// A filesystem notification reduced to what the watcher needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub path: PathBuf,
    pub kind: FsEventKind,
    pub is_dir: bool,
}

impl FsEvent {
    pub fn created_file(path: impl Into<PathBuf>) -> Self {
        FsEvent {
            path: path.into(),
            kind: FsEventKind::Created,
            is_dir: false,
        }
    }

    pub fn created_dir(path: impl Into<PathBuf>) -> Self {
        FsEvent {
            path: path.into(),
            kind: FsEventKind::Created,
            is_dir: true,
        }
    }
}

/// Ordered stream of folder events. `None` means the source is exhausted.
pub trait EventSource {
    fn next_event(&mut self) -> impl Future<Output = Option<FsEvent>> + Send;
}

/// Event source fed by an in-process channel.
pub struct ChannelEventSource {
    rx: mpsc::UnboundedReceiver<FsEvent>,
}

impl ChannelEventSource {
    pub fn new(rx: mpsc::UnboundedReceiver<FsEvent>) -> Self {
        Self { rx }
    }

    /// A source plus the sender that feeds it.
    pub fn pair() -> (mpsc::UnboundedSender<FsEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::new(rx))
    }
}

impl EventSource for ChannelEventSource {
    async fn next_event(&mut self) -> Option<FsEvent> {
        self.rx.recv().await
    }
}

fn translate(event: notify::Event) -> Vec<FsEvent> {
    use notify::event::CreateKind;
    use notify::EventKind;

    let (kind, folder_hint) = match event.kind {
        EventKind::Create(CreateKind::Folder) => (FsEventKind::Created, true),
        EventKind::Create(_) => (FsEventKind::Created, false),
        EventKind::Modify(_) => (FsEventKind::Modified, false),
        EventKind::Remove(_) => (FsEventKind::Removed, false),
        _ => (FsEventKind::Other, false),
    };
    event
        .paths
        .into_iter()
        .map(|path| {
            let is_dir = folder_hint || path.is_dir();
            FsEvent { path, kind, is_dir }
        })
        .collect()
}

/// Spawn a notify watcher on `watch_dir` that forwards create events to `tx`.
/// Watching stops when the returned watcher is dropped.
pub fn spawn_intake_watcher(
    watch_dir: &Path,
    tx: mpsc::UnboundedSender<FsEvent>,
) -> notify::Result<notify::RecommendedWatcher> {
    use notify::{RecursiveMode, Watcher};

    let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
        match event {
            Ok(ev) => {
                for fs_event in translate(ev) {
                    // Only creations start work; writes to an existing file do not.
                    if fs_event.kind == FsEventKind::Created {
                        let _ = tx.send(fs_event);
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "watch error"),
        }
    })?;

    watcher.watch(watch_dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

/// [`EventSource`] over a live directory.
pub struct NotifyEventSource {
    _watcher: notify::RecommendedWatcher,
    inner: ChannelEventSource,
}

impl NotifyEventSource {
    pub fn watch(watch_dir: &Path) -> notify::Result<Self> {
        let (tx, inner) = ChannelEventSource::pair();
        let watcher = spawn_intake_watcher(watch_dir, tx)?;
        Ok(Self {
            _watcher: watcher,
            inner,
        })
    }
}

impl EventSource for NotifyEventSource {
    async fn next_event(&mut self) -> Option<FsEvent> {
        self.inner.next_event().await
    }
}
