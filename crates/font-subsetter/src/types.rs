//! Domain newtypes shared by every pipeline stage.

use std::{
    collections::{BTreeSet, btree_set},
    fmt::{self, Display, Formatter},
};

use font_types::GlyphId16;

/// A glyph index in a font's glyph table.
///
/// Glyph 0 is the missing glyph (`.notdef`) and survives every subset.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlyphId(pub u16);

impl GlyphId {
    pub const NOTDEF: GlyphId = GlyphId(0);

    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    pub const fn to_u16(self) -> u16 {
        self.0
    }

    pub const fn to_u32(self) -> u32 {
        self.0 as u32
    }

    pub const fn to_usize(self) -> usize {
        self.0 as usize
    }
}

impl From<u16> for GlyphId {
    fn from(id: u16) -> Self {
        Self(id)
    }
}

impl From<GlyphId> for u16 {
    fn from(id: GlyphId) -> Self {
        id.0
    }
}

impl From<GlyphId16> for GlyphId {
    fn from(id: GlyphId16) -> Self {
        Self(id.to_u16())
    }
}

impl From<GlyphId> for GlyphId16 {
    fn from(id: GlyphId) -> Self {
        GlyphId16::new(id.0)
    }
}

impl Display for GlyphId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "GID{}", self.0)
    }
}

/// A Unicode scalar value. Surrogates and values past U+10FFFF cannot be
/// represented.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Codepoint(u32);

impl Codepoint {
    /// Returns `None` for surrogates and out-of-range values.
    pub fn new(cp: u32) -> Option<Self> {
        char::from_u32(cp).map(Self::from)
    }

    pub const fn to_u32(self) -> u32 {
        self.0
    }

    pub fn to_char(self) -> char {
        // Construction only admits scalar values.
        char::from_u32(self.0).unwrap_or(char::REPLACEMENT_CHARACTER)
    }

    pub const fn is_bmp(self) -> bool {
        self.0 <= 0xFFFF
    }
}

impl From<char> for Codepoint {
    fn from(c: char) -> Self {
        Self(c as u32)
    }
}

impl From<Codepoint> for u32 {
    fn from(cp: Codepoint) -> Self {
        cp.0
    }
}

impl Display for Codepoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "U+{:04X}", self.0)
    }
}

/// The set of characters a subset must render.
///
/// Produced outside the engine (from a text file, a range list, a legacy
/// encoding table...). Iteration is in ascending codepoint order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CharacterSet(BTreeSet<Codepoint>);

impl CharacterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every character of `text`, duplicates collapsed.
    pub fn from_text(text: &str) -> Self {
        text.chars().collect()
    }

    /// Adds every scalar value in `start..=end`; surrogates are skipped.
    pub fn insert_range(&mut self, start: u32, end: u32) {
        self.0.extend((start..=end).filter_map(Codepoint::new));
    }

    pub fn with_range(mut self, start: u32, end: u32) -> Self {
        self.insert_range(start, end);
        self
    }

    pub fn insert(&mut self, cp: impl Into<Codepoint>) -> bool {
        self.0.insert(cp.into())
    }

    pub fn contains(&self, cp: Codepoint) -> bool {
        self.0.contains(&cp)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Codepoint> + '_ {
        self.0.iter().copied()
    }

    pub fn extend_from(&mut self, other: &CharacterSet) {
        self.0.extend(other.iter());
    }
}

impl<T: Into<Codepoint>> FromIterator<T> for CharacterSet {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Codepoint>> Extend<T> for CharacterSet {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(Into::into));
    }
}

impl IntoIterator for CharacterSet {
    type Item = Codepoint;
    type IntoIter = btree_set::IntoIter<Codepoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glyph_id() {
        let gid = GlyphId::new(42);
        assert_eq!(gid.to_u16(), 42);
        assert_eq!(format!("{}", gid), "GID42");
        assert_eq!(GlyphId16::from(gid), GlyphId16::new(42));
    }

    #[test]
    fn test_codepoint_rejects_surrogates() {
        assert!(Codepoint::new(0xD800).is_none());
        assert!(Codepoint::new(0x110000).is_none());
        let cp = Codepoint::new(0x20BB7).unwrap();
        assert_eq!(format!("{}", cp), "U+20BB7");
        assert!(!cp.is_bmp());
        assert_eq!(Codepoint::from('A').to_char(), 'A');
    }

    #[test]
    fn test_character_set_range_skips_surrogates() {
        let set = CharacterSet::new().with_range(0xD7FE, 0xE001);
        // D7FE, D7FF, E000, E001
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn test_character_set_from_text_dedups() {
        let set = CharacterSet::from_text("一二一A");
        assert_eq!(set.len(), 3);
        let first: Vec<u32> = set.iter().map(u32::from).collect();
        assert_eq!(first, vec![0x41, 0x4E00, 0x4E8C]);
    }
}
