//! Codepoint to glyph resolution of the target character set.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};
use read_fonts::{
    TableProvider,
    tables::cmap::{Cmap, Cmap4, Cmap12, CmapSubtable, PlatformId},
};

use crate::{
    directory::SourceFont,
    error::Result,
    types::{CharacterSet, Codepoint, GlyphId},
};

/// The Unicode subtables of a `cmap`.
///
/// The full-repertoire subtable (format 12) is consulted first; the BMP
/// subtable (format 4) is the fallback.
#[derive(Clone, Default)]
pub struct CharacterMap<'a> {
    full: Option<Cmap12<'a>>,
    bmp: Option<Cmap4<'a>>,
}

impl<'a> CharacterMap<'a> {
    pub fn new(cmap: &Cmap<'a>) -> Self {
        let mut map = Self::default();
        for record in cmap.encoding_records() {
            let platform = record.platform_id();
            let encoding = record.encoding_id();
            let Ok(subtable) = record.subtable(cmap.offset_data()) else {
                debug!(
                    "skipping unreadable cmap subtable ({:?}, {})",
                    platform, encoding
                );
                continue;
            };
            match subtable {
                CmapSubtable::Format12(f12)
                    if map.full.is_none()
                        && (platform == PlatformId::Unicode
                            || (platform == PlatformId::Windows && encoding == 10)) =>
                {
                    map.full = Some(f12);
                }
                CmapSubtable::Format4(f4)
                    if map.bmp.is_none()
                        && (platform == PlatformId::Unicode
                            || (platform == PlatformId::Windows && encoding == 1)) =>
                {
                    map.bmp = Some(f4);
                }
                _ => {}
            }
        }
        map
    }

    pub fn has_map(&self) -> bool {
        self.full.is_some() || self.bmp.is_some()
    }

    /// Maps a codepoint to its nominal glyph. Glyph 0 counts as unmapped.
    ///
    /// A format 12 entry wins even when it names glyph 0; format 4 is only
    /// asked about codepoints format 12 does not list.
    pub fn map(&self, cp: Codepoint) -> Option<GlyphId> {
        let from_full = self
            .full
            .as_ref()
            .and_then(|f12| f12.map_codepoint(cp.to_u32()));
        let gid = match from_full {
            Some(gid) => gid,
            None => self
                .bmp
                .as_ref()
                .filter(|_| cp.is_bmp())
                .and_then(|f4| f4.map_codepoint(cp.to_u32()))?,
        };
        let gid = u16::try_from(gid.to_u32()).ok()?;
        (gid != 0).then_some(GlyphId::new(gid))
    }

    /// Number of distinct codepoints with a non-zero glyph mapping.
    pub fn mapped_count(&self) -> usize {
        let mut codepoints = BTreeSet::new();
        if let Some(f12) = &self.full {
            codepoints.extend(f12.iter().filter(|(_, g)| g.to_u32() != 0).map(|(c, _)| c));
        }
        if let Some(f4) = &self.bmp {
            codepoints.extend(f4.iter().filter(|(_, g)| g.to_u32() != 0).map(|(c, _)| c));
        }
        codepoints.len()
    }
}

/// Outcome of resolving a target set against a font's `cmap`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CmapResolution {
    /// Target codepoints the font can render, with their source glyphs.
    pub covered: BTreeMap<Codepoint, GlyphId>,
    /// Target codepoints the font cannot render, ascending.
    pub uncovered: Vec<Codepoint>,
}

impl CmapResolution {
    /// Distinct glyphs referenced by `covered`, ascending.
    pub fn seed_glyphs(&self) -> Vec<GlyphId> {
        let mut glyphs: Vec<GlyphId> = self.covered.values().copied().collect();
        glyphs.sort_unstable();
        glyphs.dedup();
        glyphs
    }
}

/// Resolves `targets` against a character map of a font with `num_glyphs`
/// glyphs.
pub fn resolve_with(map: &CharacterMap, num_glyphs: u16, targets: &CharacterSet) -> CmapResolution {
    let mut resolution = CmapResolution::default();
    for cp in targets.iter() {
        match map.map(cp) {
            Some(gid) if gid.to_u16() < num_glyphs => {
                resolution.covered.insert(cp, gid);
            }
            Some(gid) => {
                warn!(
                    "{} maps to {}, beyond the font's {} glyphs; treating as uncovered",
                    cp, gid, num_glyphs
                );
                resolution.uncovered.push(cp);
            }
            None => resolution.uncovered.push(cp),
        }
    }
    resolution
}

/// Resolves `targets` against the source font's `cmap`.
pub fn resolve(font: &SourceFont, targets: &CharacterSet) -> Result<CmapResolution> {
    let cmap = font.cmap()?;
    let map = CharacterMap::new(&cmap);
    if !map.has_map() {
        warn!("cmap has no Unicode subtable; every target is uncovered");
    }
    let resolution = resolve_with(&map, font.num_glyphs(), targets);
    if !resolution.uncovered.is_empty() {
        warn!(
            "{} of {} requested characters are not covered by the font",
            resolution.uncovered.len(),
            targets.len()
        );
    }
    Ok(resolution)
}
