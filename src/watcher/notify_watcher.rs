//! Change source over the `notify` crate
//!
//! Raw events arrive on notify's own thread and are forwarded into a tokio
//! task that gathers them until the debounce window passes quietly, then
//! emits one coalesced batch.

use std::path::PathBuf;
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Config as NotifyConfig, Event, EventKind, PollWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::{coalesce, ChangeBatch, ChangeKind, ChangeSource};
use crate::core::errors::BackendResult;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct NotifyChangeSource {
    watcher: Box<dyn Watcher + Send>,
    watched: Vec<PathBuf>,
    debounce_task: JoinHandle<()>,
}

impl std::fmt::Debug for NotifyChangeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyChangeSource")
            .field("watched", &self.watched)
            .finish_non_exhaustive()
    }
}

impl NotifyChangeSource {
    /// Start watching nothing yet. Must be called inside a tokio runtime.
    pub fn start(
        debounce: Duration,
    ) -> BackendResult<(Self, mpsc::UnboundedReceiver<ChangeBatch>)> {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<(ChangeKind, PathBuf)>();
        let (batch_tx, batch_rx) = mpsc::unbounded_channel();

        let handler = move |result: Result<Event, notify::Error>| match result {
            Ok(event) => {
                for change in classify(&event) {
                    // The receiver is gone once the source is closed
                    let _ = raw_tx.send(change);
                }
            }
            Err(e) => warn!("File watcher error: {}", e),
        };

        let watcher: Box<dyn Watcher + Send> = match notify::recommended_watcher(handler.clone()) {
            Ok(watcher) => Box::new(watcher),
            Err(e) => {
                warn!("Native file watching unavailable ({}), falling back to polling", e);
                Box::new(PollWatcher::new(
                    handler,
                    NotifyConfig::default().with_poll_interval(POLL_INTERVAL),
                )?)
            }
        };

        let debounce_task = tokio::spawn(debounce_events(raw_rx, batch_tx, debounce));
        Ok((
            Self {
                watcher,
                watched: Vec::new(),
                debounce_task,
            },
            batch_rx,
        ))
    }
}

impl ChangeSource for NotifyChangeSource {
    fn subscribe(&mut self, paths: &[PathBuf]) -> BackendResult<()> {
        for path in self.watched.drain(..) {
            if let Err(e) = self.watcher.unwatch(&path) {
                trace!("Could not unwatch {:?}: {}", path, e);
            }
        }
        for path in paths {
            let mode = if path.is_dir() {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };
            self.watcher.watch(path, mode)?;
            self.watched.push(path.clone());
        }
        debug!("Watching {} paths", self.watched.len());
        Ok(())
    }

    fn close(&mut self) {
        for path in self.watched.drain(..) {
            let _ = self.watcher.unwatch(&path);
        }
        self.debounce_task.abort();
    }
}

impl Drop for NotifyChangeSource {
    fn drop(&mut self) {
        self.debounce_task.abort();
    }
}

fn classify(event: &Event) -> Vec<(ChangeKind, PathBuf)> {
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Added,
        EventKind::Remove(_) => ChangeKind::Deleted,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => ChangeKind::Deleted,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => ChangeKind::Added,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut changes = Vec::new();
            if let Some(from) = event.paths.first() {
                changes.push((ChangeKind::Deleted, from.clone()));
            }
            if let Some(to) = event.paths.get(1) {
                changes.push((ChangeKind::Added, to.clone()));
            }
            return changes;
        }
        EventKind::Modify(_) => ChangeKind::Modified,
        _ => return Vec::new(),
    };
    event.paths.iter().map(|path| (kind, path.clone())).collect()
}

async fn debounce_events(
    mut raw: mpsc::UnboundedReceiver<(ChangeKind, PathBuf)>,
    batches: mpsc::UnboundedSender<ChangeBatch>,
    debounce: Duration,
) {
    while let Some(first) = raw.recv().await {
        let mut pending = vec![first];
        loop {
            match tokio::time::timeout(debounce, raw.recv()).await {
                Ok(Some(change)) => pending.push(change),
                Ok(None) => break,
                Err(_) => break,
            }
        }
        let batch = coalesce(pending);
        trace!("Debounced {} changed paths", batch.len());
        if batches.send(batch).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renames_become_delete_plus_add() {
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/a.glif"))
            .add_path(PathBuf::from("/b.glif"));
        assert_eq!(
            classify(&event),
            vec![
                (ChangeKind::Deleted, PathBuf::from("/a.glif")),
                (ChangeKind::Added, PathBuf::from("/b.glif")),
            ]
        );
    }

    #[test]
    fn access_events_are_ignored() {
        let event = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(PathBuf::from("/a.glif"));
        assert!(classify(&event).is_empty());
    }

    #[tokio::test]
    async fn raw_events_are_debounced_into_one_batch() {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (batch_tx, mut batch_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(debounce_events(raw_rx, batch_tx, Duration::from_millis(20)));

        raw_tx.send((ChangeKind::Added, PathBuf::from("/x/a.glif"))).unwrap();
        raw_tx.send((ChangeKind::Modified, PathBuf::from("/x/a.glif"))).unwrap();
        raw_tx.send((ChangeKind::Modified, PathBuf::from("/x/b.glif"))).unwrap();

        let batch = batch_rx.recv().await.unwrap();
        assert_eq!(
            batch,
            vec![
                (ChangeKind::Added, PathBuf::from("/x/a.glif")),
                (ChangeKind::Modified, PathBuf::from("/x/b.glif")),
            ]
        );
        task.abort();
    }
}
