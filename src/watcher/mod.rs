//! Filesystem change sources
//!
//! The reconciler only sees a [`ChangeFeed`]: something it can point at a
//! set of paths, and a stream of debounced `(kind, path)` batches coming
//! back. [`NotifyChangeSource`] watches the real filesystem;
//! [`ChannelChangeSource`] lets tests inject batches directly.

mod channel;
mod notify_watcher;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;

pub use channel::{ChangeInjector, ChannelChangeSource};
pub use notify_watcher::NotifyChangeSource;

use crate::core::errors::BackendResult;

/// What happened to a path. Ordered so that the first kind wins when one
/// batch holds several events for the same path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

pub type ChangeBatch = Vec<(ChangeKind, PathBuf)>;

/// A subscribable source of filesystem changes
pub trait ChangeSource: Send {
    /// Replace the set of watched paths.
    fn subscribe(&mut self, paths: &[PathBuf]) -> BackendResult<()>;

    /// Stop delivering changes. Pending batches are dropped.
    fn close(&mut self);
}

pub struct ChangeFeed {
    source: Box<dyn ChangeSource>,
    batches: mpsc::UnboundedReceiver<ChangeBatch>,
}

impl std::fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeed").finish_non_exhaustive()
    }
}

impl ChangeFeed {
    pub fn new(source: Box<dyn ChangeSource>, batches: mpsc::UnboundedReceiver<ChangeBatch>) -> Self {
        Self { source, batches }
    }

    /// A feed over the real filesystem.
    pub fn notify(debounce: Duration) -> BackendResult<Self> {
        let (source, batches) = NotifyChangeSource::start(debounce)?;
        Ok(Self::new(Box::new(source), batches))
    }

    /// A feed driven by hand, plus the handle that drives it.
    pub fn channel() -> (Self, ChangeInjector) {
        let (source, injector, batches) = ChannelChangeSource::new();
        (Self::new(Box::new(source), batches), injector)
    }

    pub fn subscribe(&mut self, paths: &[PathBuf]) -> BackendResult<()> {
        self.source.subscribe(paths)
    }

    /// The next batch, or `None` once the source is closed.
    pub async fn next_batch(&mut self) -> Option<ChangeBatch> {
        self.batches.recv().await
    }

    pub fn close(&mut self) {
        self.source.close();
        self.batches.close();
    }
}

/// Collapse the events of one batch to a single kind per path.
///
/// A deletion wins when the path is really gone; otherwise the earliest
/// kind in `Added < Modified < Deleted` order does.
pub fn coalesce(events: impl IntoIterator<Item = (ChangeKind, PathBuf)>) -> ChangeBatch {
    let mut per_path: BTreeMap<PathBuf, Vec<ChangeKind>> = BTreeMap::new();
    for (kind, path) in events {
        per_path.entry(path).or_default().push(kind);
    }
    per_path
        .into_iter()
        .filter_map(|(path, kinds)| {
            let kind = if kinds.contains(&ChangeKind::Deleted) && !path.exists() {
                ChangeKind::Deleted
            } else {
                kinds.into_iter().min()?
            };
            Some((kind, path))
        })
        .collect()
}
