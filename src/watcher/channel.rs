//! A change source fed by hand

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use super::{ChangeBatch, ChangeSource};
use crate::core::errors::BackendResult;

#[derive(Debug)]
pub struct ChannelChangeSource {
    subscribed: Arc<Mutex<Vec<PathBuf>>>,
    closed: Arc<Mutex<bool>>,
}

/// Sends batches into a [`ChannelChangeSource`] and reports what it was
/// asked to watch.
#[derive(Debug, Clone)]
pub struct ChangeInjector {
    sender: mpsc::UnboundedSender<ChangeBatch>,
    subscribed: Arc<Mutex<Vec<PathBuf>>>,
    closed: Arc<Mutex<bool>>,
}

impl ChannelChangeSource {
    pub fn new() -> (Self, ChangeInjector, mpsc::UnboundedReceiver<ChangeBatch>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let subscribed = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(Mutex::new(false));
        let source = Self {
            subscribed: subscribed.clone(),
            closed: closed.clone(),
        };
        let injector = ChangeInjector {
            sender,
            subscribed,
            closed,
        };
        (source, injector, receiver)
    }
}

impl ChangeSource for ChannelChangeSource {
    fn subscribe(&mut self, paths: &[PathBuf]) -> BackendResult<()> {
        let mut subscribed = self.subscribed.lock().unwrap_or_else(|e| e.into_inner());
        *subscribed = paths.to_vec();
        Ok(())
    }

    fn close(&mut self) {
        *self.closed.lock().unwrap_or_else(|e| e.into_inner()) = true;
    }
}

impl ChangeInjector {
    /// Deliver `batch`. Returns false once the receiving side is gone.
    pub fn send(&self, batch: ChangeBatch) -> bool {
        self.sender.send(batch).is_ok()
    }

    pub fn subscribed(&self) -> Vec<PathBuf> {
        self.subscribed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap_or_else(|e| e.into_inner())
    }
}
