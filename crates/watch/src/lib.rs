pub mod error;
pub mod router;
pub mod settle;
pub mod source;
pub mod watcher;

pub use error::ProcessError;
pub use router::{timestamp_tag, FailureArtifacts, Router};
pub use settle::SettleStrategy;
pub use source::{
    spawn_intake_watcher, ChannelEventSource, EventSource, FsEvent, FsEventKind,
    NotifyEventSource,
};
pub use watcher::{FolderWatcher, ProcessingOutcome, WatcherState};
