//! The subsetting pipeline and its builder configuration.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use read_fonts::TableProvider;

use crate::{
    charmap,
    closure::{ClosureComputer, GlyfSource},
    directory::{CMAP, GSUB, OutlineFormat, SourceFont},
    error::{Result, SubsetError},
    options::{ClosurePolicy, DEFAULT_COMPOSITE_DEPTH_LIMIT},
    remap::IdRemap,
    report::CoverageReport,
    rules::{SubstitutionRule, extract_rules},
    serialize::serialize,
    tables::{RebuildContext, rebuild_tables},
    types::CharacterSet,
    verify::{Expectations, verify},
};

/// The result of a successful run.
#[derive(Debug, Clone)]
pub struct SubsetOutput {
    /// The verified subset font binary.
    pub data: Vec<u8>,
    pub report: CoverageReport,
    /// Source to subset glyph ID mapping.
    pub remap: IdRemap,
}

/// Font subsetter with builder pattern.
///
/// ```no_run
/// use glyphtrim_font_subsetter::{CharacterSet, ClosurePolicy, Subsetter};
///
/// let font_data: &[u8] = &[];
/// let targets = CharacterSet::from_text("Hello, 世界").with_range(0x20, 0x7E);
/// let output = Subsetter::new()
///     .closure_policy(ClosurePolicy::Permissive)
///     .retain_glyph_names(true)
///     .subset(font_data, &targets)?;
/// println!("{}", output.report);
/// # Ok::<(), glyphtrim_font_subsetter::SubsetError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Subsetter {
    closure_policy: ClosurePolicy,
    retain_layout_tables: bool,
    composite_depth_limit: u16,
    retain_glyph_names: bool,
}

impl Default for Subsetter {
    fn default() -> Self {
        Self {
            closure_policy: ClosurePolicy::default(),
            retain_layout_tables: true,
            composite_depth_limit: DEFAULT_COMPOSITE_DEPTH_LIMIT,
            retain_glyph_names: false,
        }
    }
}

impl Subsetter {
    /// Creates a subsetter with strict closure, layout tables retained, a
    /// composite depth limit of 16, and glyph names discarded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how substitution rules pull glyphs into the subset.
    pub fn closure_policy(mut self, policy: ClosurePolicy) -> Self {
        self.closure_policy = policy;
        self
    }

    /// Sets whether GSUB, GPOS and GDEF are rebuilt (`true`) or dropped.
    ///
    /// When dropped, substitution rules are not consulted during closure.
    pub fn retain_layout_tables(mut self, retain: bool) -> Self {
        self.retain_layout_tables = retain;
        self
    }

    /// Sets the maximum composite nesting depth. Must be non-zero.
    pub fn composite_depth_limit(mut self, limit: u16) -> Self {
        self.composite_depth_limit = limit;
        self
    }

    /// Sets whether `post` glyph names survive the subset.
    pub fn retain_glyph_names(mut self, retain: bool) -> Self {
        self.retain_glyph_names = retain;
        self
    }

    /// Subsets `data` to the glyphs needed by `targets`.
    ///
    /// The returned binary has already been re-parsed and verified. Target
    /// characters the font lacks are listed in the report, not treated as
    /// errors.
    pub fn subset(&self, data: &[u8], targets: &CharacterSet) -> Result<SubsetOutput> {
        if self.composite_depth_limit == 0 {
            return Err(SubsetError::InvalidConfig(
                "composite depth limit must be greater than zero",
            ));
        }

        let font = SourceFont::new(data)?;
        if font.outline_format() == OutlineFormat::Cff {
            return Err(SubsetError::UnsupportedOutlines);
        }
        debug!(
            "source: {} tables, {} glyphs, {} units/em",
            font.directory().len(),
            font.num_glyphs(),
            font.units_per_em()
        );

        let resolution = charmap::resolve(&font, targets)?;

        let rules = if self.retain_layout_tables {
            self.substitution_rules(&font)
        } else {
            Vec::new()
        };

        let source = GlyfSource::new(&font)?;
        let retained = ClosureComputer::new(&source)
            .rules(&rules, font.num_glyphs())
            .policy(self.closure_policy)
            .depth_limit(self.composite_depth_limit)
            .compute(resolution.seed_glyphs())?;
        debug!(
            "closure retained {} of {} glyphs",
            retained.len(),
            font.num_glyphs()
        );

        let remap = IdRemap::new(&retained)?;
        let ctx = RebuildContext {
            resolution: &resolution,
            remap: &remap,
            policy: self.closure_policy,
            retain_layout_tables: self.retain_layout_tables,
            retain_glyph_names: self.retain_glyph_names,
        };
        let (tables, dropped_tables) = rebuild_tables(&font, &ctx)?;
        let output = serialize(&tables)?;

        let mappings: BTreeMap<_, _> = resolution
            .covered
            .iter()
            .map(|(cp, old)| Ok((*cp, remap.require(*old, CMAP)?)))
            .collect::<Result<_>>()?;
        verify(
            &output,
            &Expectations {
                num_glyphs: remap.num_glyphs(),
                mappings: &mappings,
            },
        )?;

        let report = CoverageReport {
            requested_count: targets.len(),
            covered_count: resolution.covered.len(),
            uncovered: resolution.uncovered,
            original_size_bytes: data.len(),
            subset_size_bytes: output.len(),
            retained_glyph_count: remap.len(),
            dropped_tables,
        };
        info!("Subset: {report}");

        Ok(SubsetOutput { data: output, report, remap })
    }

    fn substitution_rules(&self, font: &SourceFont) -> Vec<SubstitutionRule> {
        if !font.has_table(GSUB) {
            return Vec::new();
        }
        match font.gsub() {
            Ok(gsub) => {
                let rules = extract_rules(&gsub);
                debug!("extracted {} substitution rules", rules.len());
                rules
            }
            Err(e) => {
                warn!("GSUB is unreadable ({e}); closing over composites only");
                Vec::new()
            }
        }
    }
}

/// Subsets `data` to `targets` with default settings.
///
/// Equivalent to `Subsetter::new().subset(data, targets)`.
pub fn subset(data: &[u8], targets: &CharacterSet) -> Result<SubsetOutput> {
    Subsetter::new().subset(data, targets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_chain() {
        let subsetter = Subsetter::new()
            .closure_policy(ClosurePolicy::Permissive)
            .retain_layout_tables(false)
            .composite_depth_limit(4)
            .retain_glyph_names(true);

        assert_eq!(subsetter.closure_policy, ClosurePolicy::Permissive);
        assert!(!subsetter.retain_layout_tables);
        assert_eq!(subsetter.composite_depth_limit, 4);
        assert!(subsetter.retain_glyph_names);
    }

    #[test]
    fn test_defaults() {
        let subsetter = Subsetter::new();
        assert_eq!(subsetter.closure_policy, ClosurePolicy::Strict);
        assert!(subsetter.retain_layout_tables);
        assert_eq!(subsetter.composite_depth_limit, 16);
        assert!(!subsetter.retain_glyph_names);
    }

    #[test]
    fn test_zero_depth_limit_is_rejected() {
        let err = Subsetter::new()
            .composite_depth_limit(0)
            .subset(&[], &CharacterSet::new())
            .unwrap_err();
        assert!(matches!(err, SubsetError::InvalidConfig(_)));
    }

    #[test]
    fn test_garbage_input_is_malformed() {
        let err = subset(&[0u8; 16], &CharacterSet::from_text("A")).unwrap_err();
        assert!(matches!(err, SubsetError::MalformedContainer { .. }));
    }
}
