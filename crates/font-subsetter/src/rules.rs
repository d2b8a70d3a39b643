//! Substitution rules extracted from GSUB for glyph closure.

use log::debug;
use read_fonts::{
    tables::gsub::{Gsub, SingleSubst, SubstitutionSubtables},
    types::{BigEndian, GlyphId16},
};

use crate::types::GlyphId;

/// A substitution the shaper may perform: `input` becomes `output`.
///
/// Alternates are flattened into one rule per source glyph with every
/// alternate as output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionRule {
    pub input: Vec<GlyphId>,
    pub output: Vec<GlyphId>,
}

impl SubstitutionRule {
    pub fn new(input: Vec<GlyphId>, output: Vec<GlyphId>) -> Self {
        Self { input, output }
    }

    /// Largest glyph ID mentioned by the rule.
    pub fn max_glyph(&self) -> Option<GlyphId> {
        self.input.iter().chain(&self.output).copied().max()
    }
}

fn glyphs(ids: &[BigEndian<GlyphId16>]) -> Vec<GlyphId> {
    ids.iter().map(|g| GlyphId::from(g.get())).collect()
}

/// Collects rules from every lookup of `gsub`.
///
/// Contextual lookups add nothing themselves: the lookups they invoke are
/// scanned on their own.
pub fn extract_rules(gsub: &Gsub) -> Vec<SubstitutionRule> {
    let mut rules = Vec::new();
    let Ok(lookup_list) = gsub.lookup_list() else {
        return rules;
    };

    for (lookup_idx, lookup) in lookup_list.lookups().iter().enumerate() {
        // extension lookups resolve to their wrapped subtables here
        let Ok(subtables) = lookup.and_then(|l| l.subtables()) else {
            debug!("GSUB lookup {lookup_idx} is unreadable; skipping");
            continue;
        };
        match subtables {
            SubstitutionSubtables::Single(subtables) => {
                for subtable in subtables.iter().filter_map(|s| s.ok()) {
                    match subtable {
                        SingleSubst::Format1(f1) => {
                            let Ok(coverage) = f1.coverage() else { continue };
                            let delta = f1.delta_glyph_id() as i32;
                            for gid in coverage.iter() {
                                let out = ((gid.to_u16() as i32 + delta) & 0xFFFF) as u16;
                                rules.push(SubstitutionRule::new(
                                    vec![gid.into()],
                                    vec![GlyphId::new(out)],
                                ));
                            }
                        }
                        SingleSubst::Format2(f2) => {
                            let Ok(coverage) = f2.coverage() else { continue };
                            for (gid, out) in coverage.iter().zip(f2.substitute_glyph_ids()) {
                                rules.push(SubstitutionRule::new(
                                    vec![gid.into()],
                                    vec![out.get().into()],
                                ));
                            }
                        }
                    }
                }
            }
            SubstitutionSubtables::Multiple(subtables) => {
                for subtable in subtables.iter().filter_map(|s| s.ok()) {
                    let Ok(coverage) = subtable.coverage() else { continue };
                    for (gid, seq) in coverage.iter().zip(subtable.sequences().iter()) {
                        if let Ok(seq) = seq {
                            rules.push(SubstitutionRule::new(
                                vec![gid.into()],
                                glyphs(seq.substitute_glyph_ids()),
                            ));
                        }
                    }
                }
            }
            SubstitutionSubtables::Alternate(subtables) => {
                for subtable in subtables.iter().filter_map(|s| s.ok()) {
                    let Ok(coverage) = subtable.coverage() else { continue };
                    for (gid, set) in coverage.iter().zip(subtable.alternate_sets().iter()) {
                        if let Ok(set) = set {
                            rules.push(SubstitutionRule::new(
                                vec![gid.into()],
                                glyphs(set.alternate_glyph_ids()),
                            ));
                        }
                    }
                }
            }
            SubstitutionSubtables::Ligature(subtables) => {
                for subtable in subtables.iter().filter_map(|s| s.ok()) {
                    let Ok(coverage) = subtable.coverage() else { continue };
                    for (first, set) in coverage.iter().zip(subtable.ligature_sets().iter()) {
                        let Ok(set) = set else { continue };
                        for lig in set.ligatures().iter().filter_map(|l| l.ok()) {
                            let mut input = vec![GlyphId::from(first)];
                            input.extend(glyphs(lig.component_glyph_ids()));
                            rules.push(SubstitutionRule::new(
                                input,
                                vec![lig.ligature_glyph().into()],
                            ));
                        }
                    }
                }
            }
            SubstitutionSubtables::Reverse(subtables) => {
                for subtable in subtables.iter().filter_map(|s| s.ok()) {
                    let Ok(coverage) = subtable.coverage() else { continue };
                    for (gid, out) in coverage.iter().zip(subtable.substitute_glyph_ids()) {
                        rules.push(SubstitutionRule::new(
                            vec![gid.into()],
                            vec![out.get().into()],
                        ));
                    }
                }
            }
            SubstitutionSubtables::Contextual(_) | SubstitutionSubtables::ChainContextual(_) => {}
        }
    }

    debug!("extracted {} substitution rules from GSUB", rules.len());
    rules
}
