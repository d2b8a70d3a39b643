//! Character coverage inspection of an existing font.

use std::{fmt, path::Path};

use anyhow::{Context, Result};
use glyphtrim_font_subsetter::{CharacterMap, Codepoint, SourceFont};
use read_fonts::TableProvider;

use crate::io::FontFile;

/// Probe characters checked when none are given: a Latin letter, a common
/// hanzi, a rarer GB2312 hanzi and a CJK Extension B character.
pub const DEFAULT_PROBES: &str = "A我饕𠮷";

/// What `check` found in a font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub file_name: String,
    pub size_bytes: usize,
    /// Codepoints with a nominal glyph in the Unicode cmap subtables.
    pub mapped_count: usize,
    pub num_glyphs: u16,
    pub probes: Vec<(char, bool)>,
}

impl CheckReport {
    pub fn all_covered(&self) -> bool {
        self.probes.iter().all(|(_, covered)| *covered)
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "File:       {}", self.file_name)?;
        writeln!(f, "Size:       {:.2} MB", self.size_bytes as f64 / 1024.0 / 1024.0)?;
        writeln!(f, "Glyphs:     {}", self.num_glyphs)?;
        writeln!(f, "Characters: {}", self.mapped_count)?;
        write!(f, "Probes:")?;
        for (ch, covered) in &self.probes {
            let status = if *covered { "covered" } else { "missing" };
            write!(f, "\n  {ch} ({}): {status}", Codepoint::from(*ch))?;
        }
        Ok(())
    }
}

/// Inspects font data against `probes`.
pub fn inspect(file_name: &str, data: &[u8], probes: &str) -> Result<CheckReport> {
    let font = SourceFont::new(data)?;
    let cmap = font.cmap().context("Failed to read cmap")?;
    let map = CharacterMap::new(&cmap);

    let probes = probes
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|ch| (ch, map.map(Codepoint::from(ch)).is_some()))
        .collect();

    Ok(CheckReport {
        file_name: file_name.to_string(),
        size_bytes: data.len(),
        mapped_count: map.mapped_count(),
        num_glyphs: font.num_glyphs(),
        probes,
    })
}

/// Reads `path` and reports its coverage of `probes`.
pub fn check_font(path: &Path, probes: &str) -> Result<CheckReport> {
    let file = FontFile::new(path);
    let data = file.read()?;
    inspect(&file.file_name(), &data, probes)
        .with_context(|| format!("Failed to inspect {}", path.display()))
}

#[cfg(test)]
mod tests {
    use write_fonts::{
        FontBuilder,
        tables::{cmap::Cmap, head::Head, maxp::Maxp},
        types::{GlyphId, Tag},
    };

    use super::*;

    fn make_test_font(mappings: &[(char, u32)]) -> Vec<u8> {
        let head = Head {
            font_revision: font_types::Fixed::from_f64(1.0),
            checksum_adjustment: 0,
            magic_number: 0x5F0F3CF5,
            flags: write_fonts::tables::head::Flags::empty(),
            units_per_em: 1000,
            created: font_types::LongDateTime::new(0),
            modified: font_types::LongDateTime::new(0),
            x_min: 0,
            y_min: 0,
            x_max: 0,
            y_max: 0,
            mac_style: write_fonts::tables::head::MacStyle::empty(),
            lowest_rec_ppem: 8,
            font_direction_hint: 2,
            index_to_loc_format: 0,
        };
        let maxp = Maxp {
            num_glyphs: 4,
            max_points: None,
            max_contours: None,
            max_composite_points: None,
            max_composite_contours: None,
            max_zones: None,
            max_twilight_points: None,
            max_storage: None,
            max_function_defs: None,
            max_instruction_defs: None,
            max_stack_elements: None,
            max_size_of_instructions: None,
            max_component_elements: None,
            max_component_depth: None,
        };
        let cmap =
            Cmap::from_mappings(mappings.iter().map(|(ch, gid)| (*ch, GlyphId::new(*gid)))).unwrap();

        let mut builder = FontBuilder::new();
        builder.add_table(&head).unwrap();
        builder.add_table(&maxp).unwrap();
        builder.add_table(&cmap).unwrap();
        builder.add_raw(Tag::new(b"hhea"), vec![0u8; 36]);
        builder.add_raw(Tag::new(b"hmtx"), vec![0u8; 16]);
        builder.add_raw(Tag::new(b"glyf"), Vec::new());
        builder.add_raw(Tag::new(b"loca"), vec![0u8; 10]);
        builder.build()
    }

    #[test]
    fn test_inspect_probes() {
        let data = make_test_font(&[('A', 1), ('我', 2), ('𠮷', 3)]);
        let report = inspect("test.ttf", &data, DEFAULT_PROBES).unwrap();

        assert_eq!(report.mapped_count, 3);
        assert_eq!(report.num_glyphs, 4);
        assert_eq!(
            report.probes,
            vec![('A', true), ('我', true), ('饕', false), ('𠮷', true)]
        );
        assert!(!report.all_covered());

        let text = report.to_string();
        assert!(text.contains("Characters: 3"));
        assert!(text.contains("饕 (U+9955): missing"));
    }

    #[test]
    fn test_inspect_rejects_non_font() {
        assert!(inspect("junk", b"definitely not a font", "A").is_err());
    }
}
