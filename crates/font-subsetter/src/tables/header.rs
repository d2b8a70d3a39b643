//! head, maxp, post and OS/2.

use std::collections::BTreeMap;

use font_types::{GlyphId16, Version16Dot16};
use log::debug;
use read_fonts::{TableProvider, tables::post::Post as ReadPost};
use write_fonts::{dump_table, tables::post::Post};

use crate::{
    directory::{HEAD, MAXP, OS2, SourceFont},
    error::{Result, SubsetError},
    remap::IdRemap,
    tables::glyf::LocaFormat,
    types::{Codepoint, GlyphId},
};

const CHECKSUM_ADJUSTMENT_OFFSET: usize = 8;
const INDEX_TO_LOC_FORMAT_OFFSET: usize = 50;
const NUM_GLYPHS_OFFSET: usize = 4;
const FIRST_CHAR_INDEX_OFFSET: usize = 64;

const POST_VERSION_2: Version16Dot16 = Version16Dot16::new(2, 0);
const POST_VERSION_3: Version16Dot16 = Version16Dot16::new(3, 0);

fn patch(table: &[u8], offset: usize, value: &[u8], tag: &str) -> Result<Vec<u8>> {
    let mut out = table.to_vec();
    out.get_mut(offset..offset + value.len())
        .ok_or_else(|| SubsetError::malformed(format!("{tag} table is truncated")))?
        .copy_from_slice(value);
    Ok(out)
}

/// head with the new loca format and a zeroed checksum adjustment.
///
/// Without a loca format (CFF outlines) the field is left alone.
pub fn rebuild_head(font: &SourceFont, loca_format: Option<LocaFormat>) -> Result<Vec<u8>> {
    let head = font.table_bytes(HEAD).ok_or(SubsetError::MissingTable(HEAD))?;
    let mut out = patch(head, CHECKSUM_ADJUSTMENT_OFFSET, &[0; 4], "head")?;
    if let Some(format) = loca_format {
        out = patch(
            &out,
            INDEX_TO_LOC_FORMAT_OFFSET,
            &format.index_to_loc_format().to_be_bytes(),
            "head",
        )?;
    }
    Ok(out)
}

/// maxp with numGlyphs set to the retained count. Profile maxima are kept.
pub fn rebuild_maxp(font: &SourceFont, remap: &IdRemap) -> Result<Vec<u8>> {
    let maxp = font.table_bytes(MAXP).ok_or(SubsetError::MissingTable(MAXP))?;
    patch(maxp, NUM_GLYPHS_OFFSET, &remap.num_glyphs().to_be_bytes(), "maxp")
}

/// OS/2 with usFirstCharIndex and usLastCharIndex narrowed to the covered
/// codepoints, clamped to the BMP. Both are 0 when nothing is covered.
pub fn rebuild_os2(
    font: &SourceFont,
    covered: &BTreeMap<Codepoint, GlyphId>,
) -> Result<Option<Vec<u8>>> {
    let Some(os2) = font.table_bytes(OS2) else {
        return Ok(None);
    };
    patch_char_index(os2, covered).map(Some)
}

fn patch_char_index(os2: &[u8], covered: &BTreeMap<Codepoint, GlyphId>) -> Result<Vec<u8>> {
    let bmp = |cp: &Codepoint| cp.to_u32().min(0xFFFF) as u16;
    let first = covered.keys().next().map_or(0, bmp);
    let last = covered.keys().next_back().map_or(0, bmp);

    let mut value = [0u8; 4];
    value[..2].copy_from_slice(&first.to_be_bytes());
    value[2..].copy_from_slice(&last.to_be_bytes());
    debug!("OS/2 character range U+{first:04X}..U+{last:04X}");
    patch(os2, FIRST_CHAR_INDEX_OFFSET, &value, "OS/2")
}

/// post reduced to version 3.0, or version 2.0 names in subset order when
/// `retain_glyph_names` is set and the source has names to carry.
pub fn rebuild_post(
    font: &SourceFont,
    remap: &IdRemap,
    retain_glyph_names: bool,
) -> Result<Option<Vec<u8>>> {
    let Ok(source) = font.post() else {
        return Ok(None);
    };

    let has_names = source.version() == POST_VERSION_2;
    let mut post = if retain_glyph_names && has_names {
        let names: Vec<String> = remap
            .old_ids()
            .iter()
            .map(|old| {
                source
                    .glyph_name(GlyphId16::new(old.to_u16()))
                    .map(str::to_owned)
                    .unwrap_or_else(|| format!("glyph{}", old.to_u16()))
            })
            .collect();
        Post::new_v2(names.iter().map(String::as_str).collect::<Vec<_>>())
    } else {
        if retain_glyph_names {
            debug!("post version {:?} carries no names to retain", source.version());
        }
        Post {
            version: POST_VERSION_3,
            num_glyphs: None,
            glyph_name_index: None,
            string_data: None,
            italic_angle: source.italic_angle(),
            underline_position: source.underline_position(),
            underline_thickness: source.underline_thickness(),
            is_fixed_pitch: source.is_fixed_pitch(),
            min_mem_type42: 0,
            max_mem_type42: 0,
            min_mem_type1: 0,
            max_mem_type1: 0,
        }
    };
    copy_metrics(&source, &mut post);

    Ok(Some(dump_table(&post)?))
}

fn copy_metrics(source: &ReadPost, post: &mut Post) {
    post.italic_angle = source.italic_angle();
    post.underline_position = source.underline_position();
    post.underline_thickness = source.underline_thickness();
    post.is_fixed_pitch = source.is_fixed_pitch();
    post.min_mem_type42 = source.min_mem_type42();
    post.max_mem_type42 = source.max_mem_type42();
    post.min_mem_type1 = source.min_mem_type1();
    post.max_mem_type1 = source.max_mem_type1();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_in_bounds() {
        let table = vec![0u8; 6];
        let out = patch(&table, 4, &[0x12, 0x34], "maxp").unwrap();
        assert_eq!(out, vec![0, 0, 0, 0, 0x12, 0x34]);
    }

    #[test]
    fn test_char_index_from_covered() {
        let covered = BTreeMap::from([
            (Codepoint::from('A'), GlyphId::new(1)),
            (Codepoint::from('一'), GlyphId::new(2)),
            (Codepoint::from('𠮷'), GlyphId::new(3)),
        ]);
        let out = patch_char_index(&[0xAA; 78], &covered).unwrap();
        assert_eq!(&out[64..68], &[0x00, 0x41, 0xFF, 0xFF]);
        assert_eq!(out[63], 0xAA);
        assert_eq!(out[68], 0xAA);

        let out = patch_char_index(&[0xAA; 78], &BTreeMap::new()).unwrap();
        assert_eq!(&out[64..68], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_patch_truncated() {
        assert!(matches!(
            patch(&[0u8; 4], 4, &[0, 1], "maxp"),
            Err(SubsetError::MalformedContainer { .. })
        ));
    }
}
