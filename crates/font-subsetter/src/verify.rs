//! Re-parse and validate a freshly serialized subset before it is returned.

use std::collections::BTreeMap;

use log::debug;
use read_fonts::TableProvider;

use crate::{
    charmap::CharacterMap,
    directory::{GLYF, HEAD, SourceFont},
    error::{Result, SubsetError},
    serialize::{CHECKSUM_MAGIC, checksum, head_checksum},
    tables::{for_each_component, is_composite, read_u16},
    types::{Codepoint, GlyphId},
};

/// What the emitted binary is expected to contain.
pub struct Expectations<'a> {
    /// Size of the retained set.
    pub num_glyphs: u16,
    /// Covered codepoints and the new glyph each must resolve to.
    pub mappings: &'a BTreeMap<Codepoint, GlyphId>,
}

/// Checks `data` against `expected`.
///
/// Any mismatch is reported as [`SubsetError::VerificationFailed`].
pub fn verify(data: &[u8], expected: &Expectations) -> Result<()> {
    let font = SourceFont::new(data)
        .map_err(|e| SubsetError::verification(format!("output does not parse: {e}")))?;

    check_checksums(&font)?;

    if font.num_glyphs() != expected.num_glyphs {
        return Err(SubsetError::verification(format!(
            "maxp.numGlyphs is {}, expected {}",
            font.num_glyphs(),
            expected.num_glyphs
        )));
    }

    check_outlines(&font)?;
    check_cmap(&font, expected.mappings)?;

    debug!(
        "verified {} bytes, {} glyphs, {} mappings",
        data.len(),
        expected.num_glyphs,
        expected.mappings.len()
    );
    Ok(())
}

fn check_checksums(font: &SourceFont) -> Result<()> {
    for record in font.directory().records() {
        let table = font
            .table_bytes(record.tag)
            .ok_or_else(|| SubsetError::verification(format!("'{}' is out of bounds", record.tag)))?;
        let actual = if record.tag == HEAD {
            head_checksum(table)
        } else {
            checksum(table)
        };
        if actual != record.checksum {
            return Err(SubsetError::verification(format!(
                "checksum mismatch in '{}': directory {:#010X}, computed {:#010X}",
                record.tag, record.checksum, actual
            )));
        }
    }

    let file_sum = checksum(font.data());
    if file_sum != CHECKSUM_MAGIC {
        return Err(SubsetError::verification(format!(
            "file checksum is {file_sum:#010X}, expected {CHECKSUM_MAGIC:#010X}"
        )));
    }
    Ok(())
}

fn check_outlines(font: &SourceFont) -> Result<()> {
    let num_glyphs = font.num_glyphs();
    let loca = font
        .loca(None)
        .map_err(|e| SubsetError::verification(format!("loca unreadable: {e}")))?;
    // read-fonts reports the glyph count, one less than the offset count
    let entries = loca.len() + 1;
    if loca.len() != usize::from(num_glyphs) {
        return Err(SubsetError::verification(format!(
            "loca has {entries} entries for {num_glyphs} glyphs"
        )));
    }

    let glyf = font.table_bytes(GLYF).unwrap_or_default();
    for gid in 0..num_glyphs {
        let idx = usize::from(gid);
        let (Some(start), Some(end)) = (loca.get_raw(idx), loca.get_raw(idx + 1)) else {
            return Err(SubsetError::verification(format!("loca entry missing for GID{gid}")));
        };
        let glyph = glyf.get(start as usize..end as usize).ok_or_else(|| {
            SubsetError::verification(format!("GID{gid} spans {start}..{end} outside glyf"))
        })?;
        if !is_composite(glyph) {
            continue;
        }
        for_each_component(glyph, |pos| {
            let component = read_u16(glyph, pos)?;
            if component >= num_glyphs {
                return Err(SubsetError::verification(format!(
                    "GID{gid} references component GID{component} beyond glyph count {num_glyphs}"
                )));
            }
            Ok(())
        })
        .map_err(|e| match e {
            SubsetError::VerificationFailed { .. } => e,
            other => SubsetError::verification(other.to_string()),
        })?;
    }
    Ok(())
}

fn check_cmap(font: &SourceFont, mappings: &BTreeMap<Codepoint, GlyphId>) -> Result<()> {
    let cmap = font
        .cmap()
        .map_err(|e| SubsetError::verification(format!("cmap unreadable: {e}")))?;
    let map = CharacterMap::new(&cmap);
    for (&cp, &expected) in mappings {
        let actual = map.map(cp);
        if actual != Some(expected) {
            return Err(SubsetError::verification(format!(
                "{cp} resolves to {}, expected {expected}",
                actual.map_or_else(|| "nothing".to_string(), |gid| gid.to_string())
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_rejects_garbage() {
        let mappings = BTreeMap::new();
        let expected = Expectations { num_glyphs: 1, mappings: &mappings };
        let err = verify(&[0u8; 8], &expected).unwrap_err();
        assert!(matches!(err, SubsetError::VerificationFailed { .. }));
    }
}
