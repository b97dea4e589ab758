//! File names for glyphs and layers
//!
//! Both go through norad's UFO user-name conversion, so names match what
//! other norad-based tools write. `existing` holds the lowercased names
//! already taken in the target directory.

use std::collections::HashSet;

fn unique_file_name(
    user_name: &str,
    existing: &HashSet<String>,
    prefix: &str,
    suffix: &str,
) -> String {
    norad::user_name_to_file_name(user_name, prefix, suffix, |candidate| {
        !existing.contains(candidate)
    })
    .to_string_lossy()
    .into_owned()
}

/// File name of a glyph's `.glif` file.
pub fn glyph_file_name(glyph_name: &str, existing: &HashSet<String>) -> String {
    unique_file_name(glyph_name, existing, "", ".glif")
}

/// Directory name of a non-default layer.
pub fn layer_dir_name(layer_name: &str, existing: &HashSet<String>) -> String {
    unique_file_name(layer_name, existing, "glyphs.", "")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(user: &str) -> String {
        glyph_file_name(user, &HashSet::new())
    }

    #[test]
    fn glyph_names_map_to_case_safe_file_names() {
        assert_eq!(name("a"), "a.glif");
        assert_eq!(name("A"), "A_.glif");
        assert_eq!(name("A.alt"), "A_.alt.glif");
        assert_eq!(name("T_H"), "T__H_.glif");
        assert_eq!(name(".notdef"), "_notdef.glif");
        assert_eq!(name("con"), "_con.glif");
        assert_eq!(name("lpt7"), "_lpt7.glif");
        assert_eq!(name("paren(left)"), "paren_left_.glif");
    }

    #[test]
    fn clashes_get_a_counter() {
        let existing = HashSet::from(["a.glif".to_string()]);
        assert_eq!(glyph_file_name("a", &existing), "a01.glif");
        let existing = HashSet::from(["a.glif".to_string(), "a01.glif".to_string()]);
        assert_eq!(glyph_file_name("A", &HashSet::from(["a_.glif".to_string()])), "A_01.glif");
        assert_eq!(glyph_file_name("a", &existing), "a02.glif");
    }

    #[test]
    fn layer_directories_are_prefixed() {
        assert_eq!(
            layer_dir_name("support.S.middle", &HashSet::new()),
            "glyphs.support.S_.middle"
        );
        let existing = HashSet::from(["glyphs.bold".to_string()]);
        assert_eq!(layer_dir_name("bold", &existing), "glyphs.bold01");
    }
}
