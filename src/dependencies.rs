//! Component-usage graph
//!
//! [`GlyphDependencies`] maps glyphs to the glyphs they use as components
//! and back. [`DependencyCache`] builds it once, lazily, on a blocking
//! thread, and patches it incrementally on every write after that. Callers
//! arriving while the build runs all wait for the same build.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::core::errors::{BackendError, BackendResult};
use crate::ufo::glif::static_glyph_from_norad;
use crate::ufo::GlyphSet;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlyphDependencies {
    uses: HashMap<String, BTreeSet<String>>,
    used_by: HashMap<String, BTreeSet<String>>,
}

impl GlyphDependencies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the out-edges of `glyph_name`.
    pub fn update(&mut self, glyph_name: &str, component_names: BTreeSet<String>) {
        if let Some(previous) = self.uses.remove(glyph_name) {
            for component in previous {
                if let Some(users) = self.used_by.get_mut(&component) {
                    users.remove(glyph_name);
                    if users.is_empty() {
                        self.used_by.remove(&component);
                    }
                }
            }
        }
        for component in &component_names {
            self.used_by
                .entry(component.clone())
                .or_default()
                .insert(glyph_name.to_string());
        }
        if !component_names.is_empty() {
            self.uses.insert(glyph_name.to_string(), component_names);
        }
    }

    pub fn uses(&self, glyph_name: &str) -> Vec<String> {
        self.uses
            .get(glyph_name)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Sorted names of the glyphs using `glyph_name` as a component.
    pub fn used_by(&self, glyph_name: &str) -> Vec<String> {
        self.used_by
            .get(glyph_name)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Scan every glyph of a glyph-set directory.
    pub fn scan(glyph_set_dir: &std::path::Path) -> BackendResult<Self> {
        let glyph_set = GlyphSet::open(glyph_set_dir)?;
        let mut dependencies = Self::new();
        for glyph_name in glyph_set.names() {
            let glyph = match glyph_set.read_glyph(glyph_name) {
                Ok(glyph) => glyph,
                Err(e) => {
                    warn!("Skipping '{}' while scanning components: {}", glyph_name, e);
                    continue;
                }
            };
            let components: BTreeSet<String> = static_glyph_from_norad(&glyph)
                .components
                .into_iter()
                .map(|component| component.name)
                .collect();
            dependencies.update(glyph_name, components);
        }
        Ok(dependencies)
    }
}

#[derive(Debug, Default)]
enum BuildState {
    #[default]
    Idle,
    Building {
        handle: JoinHandle<()>,
        done: watch::Receiver<bool>,
    },
    Ready(GlyphDependencies),
}

#[derive(Debug, Default)]
struct Inner {
    state: BuildState,
    /// Updates made while a build is in flight, replayed onto its result
    queued: Vec<(String, BTreeSet<String>)>,
    last_error: Option<String>,
    builds_started: usize,
    /// Bumped on every reset; a build only stores its result when this
    /// is unchanged since it started
    generation: u64,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyCache {
    inner: Arc<Mutex<Inner>>,
}

impl DependencyCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record new out-edges for `glyph_name`. A no-op until the graph has
    /// been requested once.
    pub fn update(&self, glyph_name: &str, component_names: BTreeSet<String>) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        match &mut inner.state {
            BuildState::Idle => {}
            BuildState::Building { .. } => {
                inner
                    .queued
                    .push((glyph_name.to_string(), component_names));
            }
            BuildState::Ready(dependencies) => dependencies.update(glyph_name, component_names),
        }
    }

    /// Run `f` over the graph, building it from `glyph_set_dir` first if
    /// needed. Without a glyph set the graph is empty.
    pub async fn with<R>(
        &self,
        glyph_set_dir: Option<PathBuf>,
        f: impl FnOnce(&GlyphDependencies) -> R,
    ) -> BackendResult<R> {
        let mut done = {
            let mut inner = self.lock();
            match &inner.state {
                BuildState::Ready(dependencies) => return Ok(f(dependencies)),
                BuildState::Building { done, .. } => done.clone(),
                BuildState::Idle => match glyph_set_dir {
                    None => {
                        let dependencies = GlyphDependencies::new();
                        let result = f(&dependencies);
                        inner.state = BuildState::Ready(dependencies);
                        return Ok(result);
                    }
                    Some(dir) => self.start_build(&mut inner, dir),
                },
            }
        };

        done.wait_for(|finished| *finished)
            .await
            .map_err(|_| BackendError::DependenciesCancelled)?;

        let inner = self.lock();
        match &inner.state {
            BuildState::Ready(dependencies) => Ok(f(dependencies)),
            _ => Err(match &inner.last_error {
                Some(message) => BackendError::DependencyScan(message.clone()),
                None => BackendError::DependenciesCancelled,
            }),
        }
    }

    fn start_build(&self, inner: &mut Inner, dir: PathBuf) -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        let shared = self.inner.clone();
        inner.builds_started += 1;
        inner.last_error = None;
        info!("Scanning component dependencies in {:?}", dir);

        let generation = inner.generation;
        let handle = tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || GlyphDependencies::scan(&dir)).await;
            if finish_build(&shared, generation, result) {
                let _ = tx.send(true);
            }
        });

        inner.state = BuildState::Building {
            handle,
            done: rx.clone(),
        };
        rx
    }

    /// Sorted names of glyphs that use `glyph_name` as a component.
    pub async fn find_glyphs_that_use_glyph(
        &self,
        glyph_set_dir: Option<PathBuf>,
        glyph_name: &str,
    ) -> BackendResult<Vec<String>> {
        self.with(glyph_set_dir, |dependencies| dependencies.used_by(glyph_name))
            .await
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.lock().state, BuildState::Ready(_))
    }

    pub fn builds_started(&self) -> usize {
        self.lock().builds_started
    }

    /// Cancel any build in flight and forget the graph.
    pub fn reset(&self) {
        let mut inner = self.lock();
        if let BuildState::Building { handle, .. } = &inner.state {
            handle.abort();
        }
        inner.state = BuildState::Idle;
        inner.queued.clear();
        inner.generation += 1;
    }

    pub fn close(&self) {
        self.reset();
    }
}

/// Store the outcome of the build started at `generation`. Returns false
/// when the cache was reset in the meantime and the outcome was dropped.
fn finish_build(
    shared: &Mutex<Inner>,
    generation: u64,
    result: Result<BackendResult<GlyphDependencies>, JoinError>,
) -> bool {
    let mut inner = shared.lock().unwrap_or_else(|e| e.into_inner());
    if inner.generation != generation {
        debug!("Discarding a cancelled component dependency scan");
        return false;
    }
    match result {
        Ok(Ok(mut dependencies)) => {
            for (glyph_name, components) in inner.queued.drain(..) {
                dependencies.update(&glyph_name, components);
            }
            debug!("Component dependencies ready");
            inner.state = BuildState::Ready(dependencies);
        }
        Ok(Err(e)) => {
            warn!("Component dependency scan failed: {}", e);
            inner.last_error = Some(e.to_string());
            inner.queued.clear();
            inner.state = BuildState::Idle;
        }
        Err(e) => {
            warn!("Component dependency scan did not finish: {}", e);
            inner.last_error = Some(e.to_string());
            inner.queued.clear();
            inner.state = BuildState::Idle;
        }
    }
    true
}
