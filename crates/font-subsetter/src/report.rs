//! Per-run coverage summary.

use std::fmt;

use read_fonts::types::Tag;

use crate::types::Codepoint;

/// What a subsetting run kept, missed, and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageReport {
    pub requested_count: usize,
    pub covered_count: usize,
    /// Requested codepoints the font has no glyph for, ascending.
    pub uncovered: Vec<Codepoint>,
    pub original_size_bytes: usize,
    pub subset_size_bytes: usize,
    pub retained_glyph_count: usize,
    /// Glyph-dependent tables removed rather than rebuilt.
    pub dropped_tables: Vec<Tag>,
}

impl CoverageReport {
    /// Size reduction in percent; `0.0` for an empty source.
    pub fn reduction_percent(&self) -> f64 {
        if self.original_size_bytes == 0 {
            return 0.0;
        }
        (1.0 - self.subset_size_bytes as f64 / self.original_size_bytes as f64) * 100.0
    }

    pub fn is_complete(&self) -> bool {
        self.uncovered.is_empty()
    }
}

impl fmt::Display for CoverageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let original_kb = self.original_size_bytes as f64 / 1024.0;
        let subset_kb = self.subset_size_bytes as f64 / 1024.0;
        write!(
            f,
            "{}/{} characters covered, {} glyphs retained ({original_kb:.1} KB -> {subset_kb:.1} KB, {:.1}% reduction)",
            self.covered_count,
            self.requested_count,
            self.retained_glyph_count,
            self.reduction_percent()
        )?;
        if !self.uncovered.is_empty() {
            const SHOWN: usize = 8;
            let listed: Vec<String> =
                self.uncovered.iter().take(SHOWN).map(ToString::to_string).collect();
            write!(f, "; uncovered: {}", listed.join(" "))?;
            if self.uncovered.len() > SHOWN {
                write!(f, " (+{} more)", self.uncovered.len() - SHOWN)?;
            }
        }
        if !self.dropped_tables.is_empty() {
            let tags: Vec<String> = self.dropped_tables.iter().map(Tag::to_string).collect();
            write!(f, "; dropped tables: {}", tags.join(", "))?;
        }
        Ok(())
    }
}
