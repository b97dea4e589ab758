//! Reconciling external edits
//!
//! Batches of filesystem events arrive through a [`ChangeFeed`]. An edit
//! of the designspace document itself reloads everything. Edits of glyph
//! files are matched against the modification times this backend recorded
//! for its own writes; only the ones it did not cause are reported.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{default_glyphs_dir, modification_time, BackendKind, DesignspaceBackend, SavedModTimes};
use crate::core::errors::BackendResult;
use crate::designspace::document::normalize_path;
use crate::designspace::DesignspaceDocument;
use crate::ufo::glif::{extract_name_and_codepoints, static_glyph_from_norad};
use crate::watcher::{ChangeBatch, ChangeFeed, ChangeKind};

/// What clients should re-fetch after a change
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reload", rename_all = "camelCase")]
pub enum ReloadPattern {
    /// The project was reloaded from scratch
    Everything,
    /// Sources changed; every glyph may read differently
    AllGlyphs,
    #[serde(rename_all = "camelCase")]
    Partial {
        /// Glyphs edited externally
        glyphs: BTreeSet<String>,
        /// Glyph map entries that changed; `None` marks a removed glyph
        glyph_map: BTreeMap<String, Option<Vec<u32>>>,
    },
}

#[derive(Debug, Default)]
struct ExternalChanges {
    changed: BTreeSet<String>,
    added: BTreeSet<String>,
    deleted: BTreeSet<String>,
    rebuild_contents: bool,
}

impl DesignspaceBackend {
    /// Report external changes arriving through `feed`, replacing any feed
    /// installed before.
    pub fn watch_external_changes(&mut self, mut feed: ChangeFeed) -> BackendResult<()> {
        feed.subscribe(&self.watched_paths())?;
        if let Some(mut previous) = self.watcher.replace(feed) {
            previous.close();
        }
        Ok(())
    }

    /// Watch the project files on disk.
    pub fn watch_filesystem(&mut self) -> BackendResult<()> {
        let feed = ChangeFeed::notify(self.options.debounce)?;
        self.watch_external_changes(feed)
    }

    /// The next change clients need to know about. `None` once the change
    /// feed is closed, or right away when nothing is being watched.
    pub async fn next_external_change(&mut self) -> BackendResult<Option<ReloadPattern>> {
        loop {
            if let Some(pattern) = self.pending_patterns.pop_front() {
                return Ok(Some(pattern));
            }
            let Some(watcher) = self.watcher.as_mut() else {
                return Ok(None);
            };
            let Some(batch) = watcher.next_batch().await else {
                return Ok(None);
            };
            if let Some(pattern) = self.process_external_changes(batch).await? {
                return Ok(Some(pattern));
            }
        }
    }

    /// Reconcile one batch with the in-memory state. `None` when every
    /// event was an echo of this backend's own writes.
    pub async fn process_external_changes(
        &mut self,
        batch: ChangeBatch,
    ) -> BackendResult<Option<ReloadPattern>> {
        if self.document_changed_externally(&batch) {
            if let Some(path) = self.document.path.clone() {
                info!("Designspace {:?} changed on disk, reloading", path);
                let document = DesignspaceDocument::load(&path)?;
                self.initialize(document)?;
                return Ok(Some(ReloadPattern::Everything));
            }
        }

        let mut changes = ExternalChanges::default();
        for (kind, path) in &batch {
            if path.extension().is_some_and(|ext| ext == "glif") {
                self.analyze_glyph_change(*kind, path, &mut changes);
            }
        }

        if changes.rebuild_contents {
            // Listings may be written after the glyph files they describe.
            tokio::time::sleep(self.options.settle_delay).await;
            for package in self.ufos.packages_mut() {
                for glyph_set in package.glyph_sets_mut() {
                    if let Err(e) = glyph_set.rebuild_contents() {
                        warn!("Could not rebuild listing of {:?}: {}", glyph_set.dir(), e);
                    }
                }
            }
            self.build_glif_file_names();
        }

        let mut glyph_map_updates = BTreeMap::new();
        for glyph_name in &changes.added {
            match self.read_default_codepoints(glyph_name) {
                Some(codepoints) => {
                    glyph_map_updates.insert(glyph_name.clone(), Some(codepoints));
                }
                None => info!("New glyph '{}' is not in the default source", glyph_name),
            }
        }
        for glyph_name in &changes.deleted {
            if self.glyph_map.contains_key(glyph_name) {
                glyph_map_updates.insert(glyph_name.clone(), None);
            }
        }
        for (glyph_name, codepoints) in &glyph_map_updates {
            match codepoints {
                Some(codepoints) => {
                    self.glyph_map.insert(glyph_name.clone(), codepoints.clone());
                }
                None => {
                    self.glyph_map.remove(glyph_name);
                }
            }
        }

        for glyph_name in changes.changed.iter().chain(&changes.added) {
            self.refresh_dependencies(glyph_name);
        }
        for glyph_name in &changes.deleted {
            self.dependencies.update(glyph_name, BTreeSet::new());
        }

        if changes.changed.is_empty() && glyph_map_updates.is_empty() {
            return Ok(None);
        }
        Ok(Some(ReloadPattern::Partial {
            glyphs: changes.changed,
            glyph_map: glyph_map_updates,
        }))
    }

    fn document_changed_externally(&self, batch: &ChangeBatch) -> bool {
        if self.kind != BackendKind::Designspace {
            return false;
        }
        let Some(document_path) = self.document.path.as_deref() else {
            return false;
        };
        // Watchers may report the document through another spelling of its
        // path, so any designspace event triggers the time check.
        let mentioned = batch
            .iter()
            .any(|(_, path)| path.extension().is_some_and(|ext| ext == "designspace"));
        if !mentioned {
            return false;
        }
        match modification_time(document_path) {
            Some(mtime) if Some(mtime) != self.document_mtime => true,
            Some(_) => {
                debug!("Designspace event is an echo of our own write");
                false
            }
            None => {
                warn!("Designspace {:?} disappeared; keeping the loaded state", document_path);
                false
            }
        }
    }

    fn analyze_glyph_change(&mut self, kind: ChangeKind, path: &Path, changes: &mut ExternalChanges) {
        let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            return;
        };
        let mut glyph_name = self.glif_file_names.get(&file_name).cloned();

        match kind {
            ChangeKind::Deleted => {
                changes.rebuild_contents = true;
                let default_dir = self
                    .default_source()
                    .map(|source| canonical_path(&default_glyphs_dir(&source.layer.path)));
                let event_dir = path.parent().map(canonical_path);
                if default_dir.is_some() && event_dir == default_dir {
                    // Gone from the default source: the glyph itself is gone.
                    self.glif_file_names.remove(&file_name);
                    if let Some(name) = &glyph_name {
                        changes.deleted.insert(name.clone());
                    }
                }
            }
            ChangeKind::Added => {
                changes.rebuild_contents = true;
                if glyph_name.is_none() {
                    let parsed = fs::read_to_string(path)
                        .map_err(|e| e.to_string())
                        .and_then(|text| extract_name_and_codepoints(&text));
                    match parsed {
                        Ok((name, _)) => {
                            self.glif_file_names.insert(file_name, name.clone());
                            changes.added.insert(name);
                        }
                        Err(e) => warn!("Skipping new glyph file {:?}: {}", path, e),
                    }
                    return;
                }
            }
            ChangeKind::Modified => {}
        }

        let Some(glyph_name) = glyph_name.take() else {
            return;
        };
        if self.is_external_edit(&glyph_name, path) {
            info!("External change to '{}'", glyph_name);
            changes.changed.insert(glyph_name);
        }
    }

    /// Whether the current state of `path` is not one this backend wrote.
    /// A matching recorded time is consumed.
    fn is_external_edit(&mut self, glyph_name: &str, path: &Path) -> bool {
        let mtime = modification_time(path);
        match self.saved_mod_times.get_mut(glyph_name) {
            Some(SavedModTimes::Deleted) => false,
            Some(SavedModTimes::Times(times)) => match times.iter().position(|t| *t == mtime) {
                Some(index) => {
                    times.remove(index);
                    debug!("Ignoring echo of our own write to '{}'", glyph_name);
                    false
                }
                None => true,
            },
            None => true,
        }
    }

    fn read_default_codepoints(&self, glyph_name: &str) -> Option<Vec<u32>> {
        let layer = &self.default_source()?.layer;
        let path = self
            .ufos
            .glyph_set(&layer.path, &layer.name)?
            .glif_path(glyph_name)?;
        let text = fs::read_to_string(&path).ok()?;
        match extract_name_and_codepoints(&text) {
            Ok((_, codepoints)) => Some(codepoints),
            Err(e) => {
                warn!("Unreadable glyph file {:?}: {}", path, e);
                None
            }
        }
    }

    /// Re-read the components of an externally edited glyph.
    fn refresh_dependencies(&self, glyph_name: &str) {
        if !self.dependencies.is_ready() {
            return;
        }
        let Some(layer) = self.default_source().map(|source| source.layer.clone()) else {
            return;
        };
        let Some(glyph_set) = self.ufos.glyph_set(&layer.path, &layer.name) else {
            return;
        };
        if !glyph_set.contains(glyph_name) {
            self.dependencies.update(glyph_name, BTreeSet::new());
            return;
        }
        match glyph_set.read_glyph(glyph_name) {
            Ok(glyph) => {
                let components = static_glyph_from_norad(&glyph)
                    .components
                    .into_iter()
                    .map(|component| component.name)
                    .collect();
                self.dependencies.update(glyph_name, components);
            }
            Err(e) => warn!("Glyph '{}' vanished while reloading: {}", glyph_name, e),
        }
    }
}

/// `path` with symlinks resolved, or lexically normalized when it is gone.
fn canonical_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| normalize_path(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_patterns_serialize_with_a_tag() {
        let pattern = ReloadPattern::Partial {
            glyphs: BTreeSet::from(["A".to_string()]),
            glyph_map: BTreeMap::from([("B".to_string(), None)]),
        };
        let json = serde_json::to_value(&pattern).unwrap();
        assert_eq!(json["reload"], "partial");
        assert_eq!(json["glyphs"][0], "A");
        assert!(json["glyphMap"]["B"].is_null());
        assert_eq!(
            serde_json::to_value(ReloadPattern::AllGlyphs).unwrap()["reload"],
            "allGlyphs"
        );
    }
}
