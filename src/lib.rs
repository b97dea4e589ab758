//! Bezy designspace backend
//!
//! A `.designspace` document and the UFO packages it lists, served as one
//! font of variable glyphs. See [`designspace::DesignspaceBackend`].

pub mod core;
pub mod dependencies;
pub mod designspace;
pub mod logging;
pub mod model;
pub mod space;
pub mod ufo;
pub mod watcher;

#[cfg(test)]
mod tests;

pub use designspace::{BackendOptions, DesignspaceBackend, ReloadPattern};
