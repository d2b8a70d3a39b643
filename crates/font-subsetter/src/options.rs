//! Closure policy and table-level constants.

use read_fonts::types::Tag;

/// How substitution rules extend the retained glyph set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClosurePolicy {
    /// A rule fires only once its entire input sequence is retained.
    #[default]
    Strict,
    /// A rule fires as soon as any input glyph is retained. Every output is
    /// kept regardless of context.
    Permissive,
}

/// Default bound on composite nesting.
pub const DEFAULT_COMPOSITE_DEPTH_LIMIT: u16 = 16;

/// Variable font tables. Their per-glyph data cannot be carried across a
/// renumbering, so they are dropped.
pub const VF_TABLES_TO_DROP: &[Tag] = &[
    Tag::new(b"HVAR"),
    Tag::new(b"MVAR"),
    Tag::new(b"STAT"),
    Tag::new(b"avar"),
    Tag::new(b"fvar"),
    Tag::new(b"gvar"),
    Tag::new(b"cvar"),
    Tag::new(b"VVAR"),
];

/// Other glyph-indexed tables that are never rebuilt.
pub const GLYPH_INDEXED_TABLES_TO_DROP: &[Tag] = &[
    Tag::new(b"COLR"),
    Tag::new(b"CPAL"),
    Tag::new(b"CBDT"),
    Tag::new(b"CBLC"),
    Tag::new(b"EBDT"),
    Tag::new(b"EBLC"),
    Tag::new(b"EBSC"),
    Tag::new(b"sbix"),
    Tag::new(b"SVG "),
    Tag::new(b"hdmx"),
    Tag::new(b"LTSH"),
    Tag::new(b"kern"),
    Tag::new(b"VORG"),
    Tag::new(b"DSIG"),
    Tag::new(b"JSTF"),
    Tag::new(b"MATH"),
    Tag::new(b"BASE"),
];

/// Whether a table is removed outright instead of passed through.
pub fn is_dropped_table(tag: Tag) -> bool {
    VF_TABLES_TO_DROP.contains(&tag) || GLYPH_INDEXED_TABLES_TO_DROP.contains(&tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_strict() {
        assert_eq!(ClosurePolicy::default(), ClosurePolicy::Strict);
    }

    #[test]
    fn test_dropped_tables() {
        assert!(is_dropped_table(Tag::new(b"gvar")));
        assert!(is_dropped_table(Tag::new(b"DSIG")));
        assert!(!is_dropped_table(Tag::new(b"name")));
        assert!(!is_dropped_table(Tag::new(b"OS/2")));
    }
}
