//! glyf/loca rebuild.
//!
//! Outlines are never decoded: each retained glyph's bytes are copied
//! verbatim in subset order and only the component glyph IDs of composites
//! are patched in place.

use read_fonts::{TableProvider, tables::loca::Loca};

use crate::{
    directory::{GLYF, SourceFont},
    error::{Result, SubsetError},
    remap::IdRemap,
    types::GlyphId,
};

const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
const WE_HAVE_A_SCALE: u16 = 0x0008;
const MORE_COMPONENTS: u16 = 0x0020;
const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;

const GLYPH_HEADER_LEN: usize = 10;
/// Largest glyf length a short loca (offset / 2 in a u16) can address.
const MAX_SHORT_LOCA_GLYF_LEN: usize = 0x1FFFE;

/// Which loca entry width to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocaFormat {
    Short,
    Long,
}

impl LocaFormat {
    /// `head.indexToLocFormat` value.
    pub fn index_to_loc_format(self) -> i16 {
        match self {
            LocaFormat::Short => 0,
            LocaFormat::Long => 1,
        }
    }
}

/// A rebuilt glyf/loca pair.
#[derive(Debug, Clone)]
pub struct GlyfLoca {
    pub glyf: Vec<u8>,
    pub loca: Vec<u8>,
    pub format: LocaFormat,
}

/// Byte range of `gid` in glyf, or `None` for an empty glyph.
fn glyph_range(loca: &Loca, gid: GlyphId, glyf_len: usize) -> Result<Option<(usize, usize)>> {
    let idx = gid.to_usize();
    let (Some(start), Some(end)) = (loca.get_raw(idx), loca.get_raw(idx + 1)) else {
        return Err(SubsetError::malformed(format!("loca has no entry for {gid}")));
    };
    let (start, end) = (start as usize, end as usize);
    if start > end || end > glyf_len {
        return Err(SubsetError::malformed(format!(
            "{gid} spans {start}..{end} outside glyf of {glyf_len} bytes"
        )));
    }
    Ok((start < end).then_some((start, end)))
}

/// Walks the component records of a composite glyph, calling `visit` with
/// the byte offset of each component's glyph index.
pub(crate) fn for_each_component(
    glyph: &[u8],
    mut visit: impl FnMut(usize) -> Result<()>,
) -> Result<()> {
    let mut pos = GLYPH_HEADER_LEN;
    loop {
        let flags = read_u16(glyph, pos)?;
        visit(pos + 2)?;
        pos += 4;
        pos += if flags & ARG_1_AND_2_ARE_WORDS != 0 { 4 } else { 2 };
        if flags & WE_HAVE_A_SCALE != 0 {
            pos += 2;
        } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            pos += 4;
        } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
            pos += 8;
        }
        if flags & MORE_COMPONENTS == 0 {
            return Ok(());
        }
    }
}

pub(crate) fn is_composite(glyph: &[u8]) -> bool {
    glyph.len() >= 2 && i16::from_be_bytes([glyph[0], glyph[1]]) < 0
}

pub(crate) fn read_u16(data: &[u8], pos: usize) -> Result<u16> {
    data.get(pos..pos + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| SubsetError::malformed(format!("truncated glyph data at byte {pos}")))
}

fn rewrite_components(glyph: &mut [u8], remap: &IdRemap) -> Result<()> {
    let mut patches = Vec::new();
    let data: &[u8] = glyph;
    for_each_component(data, |pos| {
        let old = GlyphId::new(read_u16(data, pos)?);
        patches.push((pos, remap.require(old, GLYF)?));
        Ok(())
    })?;
    for (pos, new) in patches {
        glyph[pos..pos + 2].copy_from_slice(&new.to_u16().to_be_bytes());
    }
    Ok(())
}

/// Re-emits retained glyphs in subset order.
pub fn rebuild_glyf_loca(font: &SourceFont, remap: &IdRemap) -> Result<GlyfLoca> {
    let loca = font.loca(None)?;
    let glyf = font
        .table_bytes(GLYF)
        .ok_or(SubsetError::MissingTable(GLYF))?;

    let mut new_glyf = Vec::with_capacity(glyf.len() / 2);
    let mut offsets = Vec::with_capacity(remap.len() + 1);

    for &old in remap.old_ids() {
        offsets.push(new_glyf.len());
        let Some((start, end)) = glyph_range(&loca, old, glyf.len())? else {
            continue;
        };
        let mut glyph = glyf[start..end].to_vec();
        if is_composite(&glyph) {
            rewrite_components(&mut glyph, remap)?;
        }
        new_glyf.extend_from_slice(&glyph);
        while new_glyf.len() % 4 != 0 {
            new_glyf.push(0);
        }
    }
    offsets.push(new_glyf.len());

    let format = if new_glyf.len() <= MAX_SHORT_LOCA_GLYF_LEN {
        LocaFormat::Short
    } else {
        LocaFormat::Long
    };
    let loca = build_loca(&offsets, format);

    Ok(GlyfLoca {
        glyf: new_glyf,
        loca,
        format,
    })
}

fn build_loca(offsets: &[usize], format: LocaFormat) -> Vec<u8> {
    let mut data = Vec::new();
    match format {
        LocaFormat::Short => {
            for &offset in offsets {
                data.extend_from_slice(&((offset / 2) as u16).to_be_bytes());
            }
        }
        LocaFormat::Long => {
            for &offset in offsets {
                data.extend_from_slice(&(offset as u32).to_be_bytes());
            }
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::closure::RetainedSet;

    // numberOfContours = -1, bbox, then components
    fn composite(components: &[(u16, u16)]) -> Vec<u8> {
        let mut data = vec![0xFF, 0xFF, 0, 0, 0, 0, 0, 10, 0, 10];
        for (i, (flags, gid)) in components.iter().enumerate() {
            let more = if i + 1 < components.len() { MORE_COMPONENTS } else { 0 };
            data.extend_from_slice(&(flags | more).to_be_bytes());
            data.extend_from_slice(&gid.to_be_bytes());
            if flags & ARG_1_AND_2_ARE_WORDS != 0 {
                data.extend_from_slice(&[0; 4]);
            } else {
                data.extend_from_slice(&[0; 2]);
            }
            if flags & WE_HAVE_A_SCALE != 0 {
                data.extend_from_slice(&[0x40, 0]);
            } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
                data.extend_from_slice(&[0; 8]);
            }
        }
        data
    }

    fn components_of(glyph: &[u8]) -> Vec<u16> {
        let mut out = Vec::new();
        for_each_component(glyph, |pos| {
            out.push(read_u16(glyph, pos)?);
            Ok(())
        })
        .unwrap();
        out
    }

    #[test]
    fn test_walk_mixed_component_flags() {
        let glyph = composite(&[
            (ARG_1_AND_2_ARE_WORDS, 901),
            (WE_HAVE_A_SCALE, 902),
            (WE_HAVE_A_TWO_BY_TWO, 7),
        ]);
        assert!(is_composite(&glyph));
        assert_eq!(components_of(&glyph), vec![901, 902, 7]);
    }

    #[test]
    fn test_rewrite_components() {
        let remap = IdRemap::new(&RetainedSet::from_iter(
            [900, 901, 902].map(GlyphId::new),
        ))
        .unwrap();
        let mut glyph = composite(&[(0, 901), (ARG_1_AND_2_ARE_WORDS, 902)]);
        rewrite_components(&mut glyph, &remap).unwrap();
        assert_eq!(components_of(&glyph), vec![2, 3]);
    }

    #[test]
    fn test_rewrite_missing_component_is_gap() {
        let remap = IdRemap::new(&RetainedSet::from_iter([GlyphId::new(900)])).unwrap();
        let mut glyph = composite(&[(0, 901)]);
        assert!(matches!(
            rewrite_components(&mut glyph, &remap),
            Err(SubsetError::RemapGap { .. })
        ));
    }

    #[test]
    fn test_truncated_composite() {
        let mut glyph = composite(&[(0, 5)]);
        glyph[10..12].copy_from_slice(&MORE_COMPONENTS.to_be_bytes());
        assert!(for_each_component(&glyph, |_| Ok(())).is_err());
    }

    #[test]
    fn test_build_loca_formats() {
        assert_eq!(build_loca(&[0, 8, 12], LocaFormat::Short), vec![0, 0, 0, 4, 0, 6]);
        assert_eq!(
            build_loca(&[0, 8], LocaFormat::Long),
            vec![0, 0, 0, 0, 0, 0, 0, 8]
        );
        assert_eq!(LocaFormat::Long.index_to_loc_format(), 1);
    }
}
