//! OpenType feature text
//!
//! Reads come from the default package. `include(...)` statements are
//! inlined so clients get self-contained text; writes go to every package.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use super::DesignspaceBackend;
use crate::core::errors::BackendResult;
use crate::model::OpenTypeFeatures;

const FEA_LANGUAGE: &str = "fea";
const MAX_INCLUDE_DEPTH: usize = 50;

/// Position and target of one `include(...)` statement, end exclusive and
/// past the trailing semicolon if there is one.
fn next_include(text: &str, from: usize) -> Option<(usize, usize, String)> {
    let bytes = text.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'#' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    i += 1;
                }
                i += 1;
            }
            b'i' if text[i..].starts_with("include")
                && (i == 0 || !is_name_char(bytes[i - 1])) =>
            {
                let mut j = i + "include".len();
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                if bytes.get(j) != Some(&b'(') {
                    i = j;
                    continue;
                }
                let close = text[j..].find(')')? + j;
                let target = text[j + 1..close].trim().to_string();
                let mut end = close + 1;
                let rest = &text[end..];
                let trimmed = rest.trim_start();
                if trimmed.starts_with(';') {
                    end += rest.len() - trimmed.len() + 1;
                }
                return Some((i, end, target));
            }
            _ => i += 1,
        }
    }
    None
}

fn is_name_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'.'
}

/// Inline every `include(...)` whose file exists under `include_dir`.
/// Unresolvable statements are left in place.
pub fn resolve_feature_includes(text: &str, include_dir: &Path) -> String {
    resolve(text, include_dir, &mut BTreeSet::new(), 0)
}

fn resolve(text: &str, include_dir: &Path, active: &mut BTreeSet<PathBuf>, depth: usize) -> String {
    if !text.contains("include") {
        return text.to_string();
    }
    let mut resolved = String::with_capacity(text.len());
    let mut cursor = 0;
    while let Some((start, end, target)) = next_include(text, cursor) {
        resolved.push_str(&text[cursor..start]);
        let path = include_dir.join(&target);
        let statement = &text[start..end];
        cursor = end;

        if depth >= MAX_INCLUDE_DEPTH || active.contains(&path) {
            warn!("Not following recursive feature include {:?}", path);
            resolved.push_str(statement);
            continue;
        }
        match fs::read_to_string(&path) {
            Ok(included) => {
                active.insert(path.clone());
                resolved.push_str(&resolve(&included, include_dir, active, depth + 1));
                active.remove(&path);
            }
            Err(e) => {
                warn!("Could not resolve feature include {:?}: {}", path, e);
                resolved.push_str(statement);
            }
        }
    }
    resolved.push_str(&text[cursor..]);
    resolved
}

impl DesignspaceBackend {
    pub fn get_features(&self) -> BackendResult<OpenTypeFeatures> {
        let Some(source) = self.default_source() else {
            return Ok(OpenTypeFeatures::fea(""));
        };
        let text = self.ufos.get(&source.layer.path)?.read_features()?;
        Ok(OpenTypeFeatures::fea(resolve_feature_includes(
            &text,
            &self.ufo_dir(),
        )))
    }

    /// Write feature text to every package.
    pub fn put_features(&mut self, features: &OpenTypeFeatures) -> BackendResult<()> {
        if features.language != FEA_LANGUAGE {
            warn!(
                "Skipping features in unsupported language '{}'",
                features.language
            );
            return Ok(());
        }
        let paths: BTreeSet<PathBuf> = self.layers.iter().map(|layer| layer.path.clone()).collect();
        for path in paths {
            self.ufos.open(&path)?.write_features(&features.text)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn includes_are_inlined() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("kern.fea"), "pos A V -50;\n").unwrap();
        let text = "languagesystem DFLT dflt;\ninclude(kern.fea);\nfeature liga {} liga;\n";
        let resolved = resolve_feature_includes(text, dir.path());
        assert_eq!(
            resolved,
            "languagesystem DFLT dflt;\npos A V -50;\n\nfeature liga {} liga;\n"
        );
    }

    #[test]
    fn missing_and_commented_includes_stay() {
        let dir = tempfile::tempdir().unwrap();
        let text = "# include(kern.fea);\ninclude (missing.fea) ;\n";
        assert_eq!(resolve_feature_includes(text, dir.path()), text);
    }

    #[test]
    fn self_include_is_not_followed_forever() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("loop.fea"), "include(loop.fea);").unwrap();
        let resolved = resolve_feature_includes("include(loop.fea);", dir.path());
        assert_eq!(resolved, "include(loop.fea);");
    }
}
