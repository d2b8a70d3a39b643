//! cmap rebuild from the covered mappings.

use std::collections::BTreeMap;

use read_fonts::types;
use write_fonts::{dump_table, tables::cmap::Cmap};

use crate::{
    directory::CMAP,
    error::{Result, SubsetError},
    remap::IdRemap,
    types::{Codepoint, GlyphId},
};

/// Builds a cmap for exactly the covered codepoints, in subset glyph IDs.
///
/// write-fonts emits a format 4 subtable for the BMP and adds format 12 when
/// supplementary codepoints are present.
pub fn rebuild_cmap(covered: &BTreeMap<Codepoint, GlyphId>, remap: &IdRemap) -> Result<Vec<u8>> {
    let mappings = covered
        .iter()
        .map(|(cp, old)| {
            let new = remap.require(*old, CMAP)?;
            Ok((cp.to_char(), types::GlyphId::new(new.to_u32())))
        })
        .collect::<Result<Vec<_>>>()?;

    let cmap = Cmap::from_mappings(mappings)
        .map_err(|_| SubsetError::malformed("conflicting cmap mappings"))?;
    Ok(dump_table(&cmap)?)
}

#[cfg(test)]
mod tests {
    use read_fonts::{FontData, FontRead, tables::cmap::Cmap as ReadCmap};

    use super::*;
    use crate::closure::RetainedSet;

    #[test]
    fn test_rebuild_uses_new_ids() {
        let remap =
            IdRemap::new(&RetainedSet::from_iter([5, 900].map(GlyphId::new))).unwrap();
        let covered = BTreeMap::from([
            (Codepoint::from('A'), GlyphId::new(5)),
            (Codepoint::from('一'), GlyphId::new(900)),
            (Codepoint::from('𠮷'), GlyphId::new(900)),
        ]);

        let bytes = rebuild_cmap(&covered, &remap).unwrap();
        let cmap = ReadCmap::read(FontData::new(&bytes)).unwrap();
        assert_eq!(cmap.map_codepoint('A'), Some(types::GlyphId::new(1)));
        assert_eq!(cmap.map_codepoint('一'), Some(types::GlyphId::new(2)));
        assert_eq!(cmap.map_codepoint('𠮷'), Some(types::GlyphId::new(2)));
        assert_eq!(cmap.map_codepoint('B'), None);
    }

    #[test]
    fn test_unretained_glyph_is_gap() {
        let remap = IdRemap::new(&RetainedSet::default()).unwrap();
        let covered = BTreeMap::from([(Codepoint::from('A'), GlyphId::new(5))]);
        assert!(matches!(
            rebuild_cmap(&covered, &remap),
            Err(SubsetError::RemapGap { .. })
        ));
    }
}
