//! The old-to-new glyph ID mapping every rebuilt table goes through.

use std::collections::BTreeMap;

use read_fonts::types::Tag;

use crate::{
    closure::RetainedSet,
    error::{Result, SubsetError},
    types::GlyphId,
};

/// Injective, order-preserving map from source glyph IDs to subset glyph IDs.
///
/// New ID `n` is the `n`-th smallest retained source ID, so `.notdef` stays
/// at 0 and relative order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdRemap {
    forward: BTreeMap<GlyphId, GlyphId>,
    // new id -> old id, indexed by new id
    reverse: Vec<GlyphId>,
}

impl IdRemap {
    pub fn new(retained: &RetainedSet) -> Result<Self> {
        if retained.len() > u16::MAX as usize {
            return Err(SubsetError::TooManyGlyphs);
        }
        let reverse: Vec<GlyphId> = retained.iter().collect();
        let forward = reverse
            .iter()
            .enumerate()
            .map(|(new, old)| (*old, GlyphId::new(new as u16)))
            .collect();
        Ok(Self { forward, reverse })
    }

    /// New ID of `old`, or `None` if it was not retained.
    pub fn get(&self, old: GlyphId) -> Option<GlyphId> {
        self.forward.get(&old).copied()
    }

    pub fn get_u16(&self, old: u16) -> Option<u16> {
        self.get(GlyphId::new(old)).map(GlyphId::to_u16)
    }

    /// Like [`IdRemap::get`], but a missing glyph is an internal invariant
    /// violation attributed to `table`.
    pub fn require(&self, old: GlyphId, table: Tag) -> Result<GlyphId> {
        self.get(old)
            .ok_or(SubsetError::RemapGap { table, glyph: old })
    }

    /// Source IDs in subset order.
    pub fn old_ids(&self) -> &[GlyphId] {
        &self.reverse
    }

    pub fn len(&self) -> usize {
        self.reverse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reverse.is_empty()
    }

    pub fn num_glyphs(&self) -> u16 {
        self.reverse.len() as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remap(ids: &[u16]) -> IdRemap {
        IdRemap::new(&RetainedSet::from_iter(ids.iter().copied().map(GlyphId::new))).unwrap()
    }

    #[test]
    fn test_dense_monotonic() {
        let remap = remap(&[0, 5, 900, 901, 902]);
        assert_eq!(remap.len(), 5);
        assert_eq!(remap.get(GlyphId::new(0)), Some(GlyphId::new(0)));
        assert_eq!(remap.get(GlyphId::new(5)), Some(GlyphId::new(1)));
        assert_eq!(remap.get(GlyphId::new(902)), Some(GlyphId::new(4)));
        assert_eq!(remap.get(GlyphId::new(6)), None);
        assert_eq!(remap.old_ids()[2], GlyphId::new(900));
    }

    #[test]
    fn test_require_reports_gap() {
        let remap = remap(&[0, 3]);
        match remap.require(GlyphId::new(4), Tag::new(b"glyf")) {
            Err(SubsetError::RemapGap { table, glyph }) => {
                assert_eq!(table, Tag::new(b"glyf"));
                assert_eq!(glyph, GlyphId::new(4));
            }
            other => panic!("expected RemapGap, got {:?}", other),
        }
    }

    #[test]
    fn test_notdef_always_zero() {
        let remap = remap(&[7, 9]);
        // RetainedSet always carries .notdef
        assert_eq!(remap.get(GlyphId::NOTDEF), Some(GlyphId::NOTDEF));
        assert_eq!(remap.get(GlyphId::new(7)), Some(GlyphId::new(1)));
    }
}
