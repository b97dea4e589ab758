//! Kerning across sources
//!
//! Every non-sparse package holds its own groups and pairs. Clients see one
//! table: groups merged over all packages, and per pair one value per
//! source. Group names lose their `public.kern1.`/`public.kern2.` prefix
//! and appear in pair keys as `@name`.

use std::collections::BTreeMap;

use tracing::{debug, error};

use super::DesignspaceBackend;
use crate::core::errors::{BackendError, BackendResult};
use crate::model::Kerning;
use crate::ufo::{Groups, KerningPairs};

pub const KERN_TABLE: &str = "kern";

const SIDE1_PREFIX: &str = "public.kern1.";
const SIDE2_PREFIX: &str = "public.kern2.";
const GROUP_MARKER: &str = "@";

/// Union of two group sets. Groups present in both keep `a`'s members, with
/// members only `b` has appended in `b`'s order.
pub fn merge_kern_groups(a: Groups, b: Groups) -> Groups {
    let mut merged = a;
    for (name, members_b) in b {
        match merged.get_mut(&name) {
            None => {
                merged.insert(name, members_b);
            }
            Some(members_a) if *members_a == members_b => {}
            Some(members_a) => {
                for member in members_b {
                    if !members_a.contains(&member) {
                        members_a.push(member);
                    }
                }
            }
        }
    }
    merged
}

/// Side 1 and side 2 kerning groups with their prefixes stripped. Groups
/// that are neither are dropped.
pub fn split_groups(groups: Groups) -> (Groups, Groups) {
    let mut side1 = Groups::new();
    let mut side2 = Groups::new();
    for (name, members) in groups {
        if let Some(stripped) = name.strip_prefix(SIDE1_PREFIX) {
            side1.insert(stripped.to_string(), members);
        } else if let Some(stripped) = name.strip_prefix(SIDE2_PREFIX) {
            side2.insert(stripped.to_string(), members);
        }
    }
    (side1, side2)
}

fn prefix_groups(groups: &Groups, prefix: &str) -> Groups {
    groups
        .iter()
        .map(|(name, members)| (format!("{prefix}{name}"), members.clone()))
        .collect()
}

/// `public.kern1.O` and `public.kern2.O` become `@O`.
fn strip_group_prefix(key: &str) -> String {
    match key
        .strip_prefix(SIDE1_PREFIX)
        .or_else(|| key.strip_prefix(SIDE2_PREFIX))
    {
        Some(name) => format!("{GROUP_MARKER}{name}"),
        None => key.to_string(),
    }
}

/// `@O` becomes `<prefix>O`; glyph names pass through.
fn add_group_prefix(key: &str, prefix: &str) -> String {
    match key.strip_prefix(GROUP_MARKER) {
        Some(name) => format!("{prefix}{name}"),
        None => key.to_string(),
    }
}

impl DesignspaceBackend {
    pub fn get_kerning(&self) -> BackendResult<BTreeMap<String, Kerning>> {
        let sources: Vec<_> = self.sources.iter().filter(|s| !s.is_sparse()).collect();
        let source_identifiers: Vec<String> =
            sources.iter().map(|s| s.identifier.clone()).collect();

        let mut groups = Groups::new();
        // left -> right -> source index -> value
        let mut pairs: BTreeMap<String, BTreeMap<String, BTreeMap<usize, f64>>> = BTreeMap::new();
        for (index, source) in sources.iter().enumerate() {
            let package = self.ufos.get(&source.layer.path)?;
            groups = merge_kern_groups(groups, package.read_groups()?);
            for (left, rights) in package.read_kerning()? {
                let row = pairs.entry(strip_group_prefix(&left)).or_default();
                for (right, value) in rights {
                    row.entry(strip_group_prefix(&right))
                        .or_default()
                        .insert(index, value);
                }
            }
        }

        let values = pairs
            .into_iter()
            .map(|(left, rights)| {
                let rights = rights
                    .into_iter()
                    .map(|(right, per_source)| {
                        let values = (0..sources.len())
                            .map(|index| per_source.get(&index).copied())
                            .collect();
                        (right, values)
                    })
                    .collect();
                (left, rights)
            })
            .collect();

        let (groups_side1, groups_side2) = split_groups(groups);
        let kerning = Kerning {
            groups_side1,
            groups_side2,
            source_identifiers,
            values,
        };
        Ok(BTreeMap::from([(KERN_TABLE.to_string(), kerning)]))
    }

    pub fn put_kerning(&mut self, tables: &BTreeMap<String, Kerning>) -> BackendResult<()> {
        for (kern_type, table) in tables {
            let mut unknown = Vec::new();
            let mut sparse = Vec::new();
            for identifier in &table.source_identifiers {
                match self.sources.find_first(&[("identifier", identifier.into())]) {
                    None => unknown.push(identifier.clone()),
                    Some(source) if source.is_sparse() => sparse.push(identifier.clone()),
                    Some(_) => {}
                }
            }
            if !unknown.is_empty() {
                return Err(BackendError::UnknownKerningSources(unknown));
            }
            if !sparse.is_empty() {
                return Err(BackendError::SparseKerningSources(sparse));
            }

            if kern_type != KERN_TABLE {
                error!(
                    "Kerning type '{}' is not supported for UFO sources; dropped",
                    kern_type
                );
                continue;
            }

            let mut per_source: BTreeMap<&str, KerningPairs> = BTreeMap::new();
            for (left, rights) in &table.values {
                let left = add_group_prefix(left, SIDE1_PREFIX);
                for (right, values) in rights {
                    let right = add_group_prefix(right, SIDE2_PREFIX);
                    for (identifier, value) in table.source_identifiers.iter().zip(values) {
                        if let Some(value) = value {
                            per_source
                                .entry(identifier.as_str())
                                .or_default()
                                .entry(left.clone())
                                .or_default()
                                .insert(right.clone(), *value);
                        }
                    }
                }
            }

            let mut groups = prefix_groups(&table.groups_side1, SIDE1_PREFIX);
            groups.extend(prefix_groups(&table.groups_side2, SIDE2_PREFIX));

            for source in self.sources.iter().filter(|s| !s.is_sparse()) {
                let package = self.ufos.get(&source.layer.path)?;
                package.write_groups(&groups)?;
                let pairs = per_source
                    .get(source.identifier.as_str())
                    .cloned()
                    .unwrap_or_default();
                package.write_kerning(&pairs)?;
                debug!(
                    "Wrote {} kerning rows to source '{}'",
                    pairs.len(),
                    source.identifier
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups(entries: &[(&str, &[&str])]) -> Groups {
        entries
            .iter()
            .map(|(name, members)| {
                (
                    name.to_string(),
                    members.iter().map(|m| m.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn overlapping_groups_merge_without_duplicates() {
        let merged = merge_kern_groups(
            groups(&[("@O1", &["A", "B"]), ("@H", &["H"])]),
            groups(&[("@O1", &["A", "B", "C"]), ("@N", &["N"])]),
        );
        assert_eq!(merged["@O1"], vec!["A", "B", "C"]);
        assert_eq!(merged["@H"], vec!["H"]);
        assert_eq!(merged["@N"], vec!["N"]);
    }

    #[test]
    fn identical_groups_stay_as_they_are() {
        let merged = merge_kern_groups(
            groups(&[("@O1", &["B", "A"])]),
            groups(&[("@O1", &["B", "A"])]),
        );
        assert_eq!(merged["@O1"], vec!["B", "A"]);
    }

    #[test]
    fn groups_split_by_side() {
        let (side1, side2) = split_groups(groups(&[
            ("public.kern1.O", &["O"]),
            ("public.kern2.O", &["O", "Q"]),
            ("other", &["x"]),
        ]));
        assert_eq!(side1.keys().collect::<Vec<_>>(), vec!["O"]);
        assert_eq!(side2["O"], vec!["O", "Q"]);
    }

    #[test]
    fn pair_keys_switch_prefixes() {
        assert_eq!(strip_group_prefix("public.kern1.O"), "@O");
        assert_eq!(strip_group_prefix("public.kern2.O"), "@O");
        assert_eq!(strip_group_prefix("A"), "A");
        assert_eq!(add_group_prefix("@O", SIDE2_PREFIX), "public.kern2.O");
        assert_eq!(add_group_prefix("A", SIDE1_PREFIX), "A");
    }
}
