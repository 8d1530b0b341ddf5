use ledgerdrop_core::TransactionSink;
use ledgerdrop_import::{format_total, read_batch, summarize, IngestPipeline, PipelineReport};
use std::fmt;
use std::path::Path;
use tokio::sync::watch;

use crate::error::ProcessError;
use crate::router::{timestamp_tag, Router};
use crate::settle::SettleStrategy;
use crate::source::{EventSource, FsEvent, FsEventKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Idle,
    FileDetected,
    Settling,
    Processing,
    Succeeded,
    Failed,
}

impl fmt::Display for WatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Terminal result for one source file.
#[derive(Debug)]
pub enum ProcessingOutcome {
    Succeeded {
        rows_inserted: u64,
        report: PipelineReport,
    },
    Failed {
        reason: String,
        error: ProcessError,
    },
}

impl ProcessingOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessingOutcome::Succeeded { .. })
    }
}

/// Folder watcher: consumes events one at a time, runs each matching file
/// through the pipeline and the sink, then routes it.
pub struct FolderWatcher<S: TransactionSink> {
    pipeline: IngestPipeline,
    sink: S,
    router: Router,
    settle: SettleStrategy,
    extension: String,
    state: WatcherState,
}

impl<S: TransactionSink> FolderWatcher<S> {
    pub fn new(pipeline: IngestPipeline, sink: S, router: Router) -> Self {
        Self {
            pipeline,
            sink,
            router,
            settle: SettleStrategy::default(),
            extension: "csv".to_string(),
            state: WatcherState::Idle,
        }
    }

    pub fn with_settle(mut self, settle: SettleStrategy) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Whether an event should start processing: a created, non-directory
    /// path with the watched extension.
    pub fn accepts(&self, event: &FsEvent) -> bool {
        event.kind == FsEventKind::Created
            && !event.is_dir
            && event
                .path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension))
    }

    fn transition(&mut self, next: WatcherState) {
        tracing::debug!(from = %self.state, to = %next, "watcher state");
        self.state = next;
    }

    /// Drive one event to a terminal state. Ignored events return `None`.
    pub async fn handle_event(&mut self, event: FsEvent) -> Option<ProcessingOutcome> {
        if !self.accepts(&event) {
            tracing::trace!(path = %event.path.display(), kind = ?event.kind, "ignoring event");
            return None;
        }

        self.transition(WatcherState::FileDetected);
        tracing::info!(path = %event.path.display(), "new file detected");

        self.transition(WatcherState::Settling);
        self.settle.wait(&event.path).await;

        self.transition(WatcherState::Processing);
        let outcome = self.process_file(&event.path).await;

        self.transition(if outcome.is_success() {
            WatcherState::Succeeded
        } else {
            WatcherState::Failed
        });
        self.transition(WatcherState::Idle);
        Some(outcome)
    }

    pub async fn process_file(&self, path: &Path) -> ProcessingOutcome {
        self.process_file_at(path, &timestamp_tag()).await
    }

    /// Process and route `path`, tagging moved files with `timestamp`.
    pub async fn process_file_at(&self, path: &Path, timestamp: &str) -> ProcessingOutcome {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match self.ingest(path, &file_name).await {
            Ok((rows_inserted, report)) => {
                match self.router.route_success(path, timestamp).await {
                    Ok(dest) => tracing::info!(
                        file = %file_name,
                        rows_inserted,
                        moved_to = %dest.display(),
                        "file processed"
                    ),
                    // Rows are already stored; the file stays behind for an operator.
                    Err(e) => tracing::error!(
                        file = %file_name,
                        rows_inserted,
                        error = %e,
                        "stored rows but could not move file to processed"
                    ),
                }
                ProcessingOutcome::Succeeded {
                    rows_inserted,
                    report,
                }
            }
            Err(error) => {
                let reason = error.to_string();
                tracing::error!(file = %file_name, error = %reason, "file failed");
                match self.router.route_failure(path, timestamp, &reason).await {
                    Ok(artifacts) => tracing::info!(
                        moved_to = %artifacts.moved_to.display(),
                        error_log = %artifacts.error_log.display(),
                        "file routed to failed"
                    ),
                    Err(e) => tracing::error!(
                        file = %file_name,
                        error = %e,
                        "could not route file to failed"
                    ),
                }
                ProcessingOutcome::Failed { reason, error }
            }
        }
    }

    async fn ingest(
        &self,
        path: &Path,
        file_name: &str,
    ) -> Result<(u64, PipelineReport), ProcessError> {
        let bytes = tokio::fs::read(path).await?;
        let batch = read_batch(bytes.as_slice())?;
        tracing::info!(file = %file_name, rows = batch.len(), "loaded");

        let report = self.pipeline.run(batch)?;

        let summary = summarize(&report.records);
        for c in &summary.categories {
            tracing::info!(
                category = %c.category,
                count = c.count,
                total = %format_total(c.total),
                "category"
            );
        }

        let rows_inserted = self.sink.insert_batch(file_name, &report.records).await?;
        Ok((rows_inserted, report))
    }

    /// Consume events until the source ends or `shutdown` turns true. The
    /// stop signal is only observed between files. Returns how many files
    /// reached a terminal state.
    pub async fn run<E: EventSource>(
        &mut self,
        mut source: E,
        mut shutdown: watch::Receiver<bool>,
    ) -> usize {
        let mut handled = 0;
        loop {
            if *shutdown.borrow() {
                break;
            }
            let event = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                event = source.next_event() => event,
            };
            let Some(event) = event else {
                tracing::info!("event source closed");
                break;
            };
            if self.handle_event(event).await.is_some() {
                handled += 1;
            }
        }
        tracing::info!(handled, "watcher stopped");
        handled
    }
}
