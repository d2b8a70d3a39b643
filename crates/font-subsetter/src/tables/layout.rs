//! GSUB, GPOS and GDEF rebuild.
//!
//! Every glyph reference goes through the [`IdRemap`]. Records naming a
//! glyph outside the retained set are pruned, and arrays indexed in
//! parallel with a coverage table are pruned in step with it. Lookups left
//! without subtables are removed, then features and language systems are
//! renumbered to match.

use font_types::{BigEndian, GlyphId16};
use log::{debug, warn};
use read_fonts::{
    FontRead, ReadError, TableProvider,
    tables::{gdef as read_gdef, gpos as read_gpos, gsub as read_gsub, layout as read_layout},
    types::Tag,
};
use write_fonts::{
    dump_table,
    tables::{
        gdef::{Gdef, MarkGlyphSets},
        gpos::{
            AnchorTable, BaseArray, BaseRecord, Class1Record, Class2Record, ComponentRecord,
            CursivePosFormat1, EntryExitRecord, Gpos, LigatureArray, LigatureAttach, Mark2Array,
            Mark2Record, MarkArray, MarkBasePosFormat1, MarkLigPosFormat1, MarkMarkPosFormat1,
            MarkRecord, PairPos, PairPosFormat1, PairPosFormat2, PairSet, PairValueRecord,
            PositionChainContext, PositionLookup, PositionLookupList, PositionSequenceContext,
            SinglePos, SinglePosFormat1, SinglePosFormat2,
        },
        gsub::{
            AlternateSet, AlternateSubstFormat1, Gsub, Ligature, LigatureSet,
            LigatureSubstFormat1, MultipleSubstFormat1, ReverseChainSingleSubstFormat1,
            Sequence, SingleSubst, SubstitutionChainContext, SubstitutionLookup,
            SubstitutionLookupList, SubstitutionSequenceContext,
        },
        layout::{
            ChainedClassSequenceRule, ChainedClassSequenceRuleSet, ChainedSequenceContext,
            ChainedSequenceContextFormat1, ChainedSequenceContextFormat2,
            ChainedSequenceContextFormat3, ChainedSequenceRule, ChainedSequenceRuleSet, ClassDef,
            ClassSequenceRule, ClassSequenceRuleSet, CoverageTable, Feature, FeatureList,
            FeatureRecord, LangSys, LangSysRecord, Lookup, LookupFlag, Script, ScriptList, ScriptRecord,
            SequenceContext, SequenceContextFormat1, SequenceContextFormat2,
            SequenceContextFormat3, SequenceLookupRecord, SequenceRule, SequenceRuleSet,
        },
    },
};

use crate::{
    directory::{GDEF, GPOS, GSUB, SourceFont},
    error::Result,
    options::ClosurePolicy,
    remap::IdRemap,
    tables::convert::ToWrite,
};

/// Rebuilt layout tables; `None` means the table is omitted.
#[derive(Debug, Clone, Default)]
pub struct LayoutTables {
    pub gsub: Option<Vec<u8>>,
    pub gpos: Option<Vec<u8>>,
    pub gdef: Option<Vec<u8>>,
}

/// Rebuilds whichever layout tables the source font has.
pub fn rebuild_layout(
    font: &SourceFont,
    remap: &IdRemap,
    policy: ClosurePolicy,
) -> Result<LayoutTables> {
    let mut tables = LayoutTables::default();

    if let Some(gsub) = readable(font.gsub(), GSUB) {
        tables.gsub = match rebuild_gsub(&gsub, remap)? {
            Some(gsub) if keep(&gsub.lookup_list.lookups, policy) => Some(dump_table(&gsub)?),
            _ => {
                debug!("GSUB has no surviving subtables; dropping it");
                None
            }
        };
    }
    if let Some(gpos) = readable(font.gpos(), GPOS) {
        tables.gpos = match rebuild_gpos(&gpos, remap)? {
            Some(gpos) if keep(&gpos.lookup_list.lookups, policy) => Some(dump_table(&gpos)?),
            _ => {
                debug!("GPOS has no surviving subtables; dropping it");
                None
            }
        };
    }
    if let Some(gdef) = readable(font.gdef(), GDEF) {
        tables.gdef = Some(dump_table(&rebuild_gdef(&gdef, remap))?);
    }

    Ok(tables)
}

/// An absent table is silent; an unreadable one is dropped with a warning.
fn readable<T>(table: std::result::Result<T, ReadError>, tag: Tag) -> Option<T> {
    match table {
        Ok(table) => Some(table),
        Err(ReadError::TableIsMissing(_)) => None,
        Err(e) => {
            warn!("dropping unreadable '{tag}' table: {e}");
            None
        }
    }
}

fn keep<T>(lookups: &[T], policy: ClosurePolicy) -> bool {
    !lookups.is_empty() || policy == ClosurePolicy::Permissive
}

/// Glyph and lookup index translation shared by every subtable converter.
struct Pruner<'a> {
    remap: &'a IdRemap,
    /// Old lookup index -> new lookup index; `None` while surviving lookups
    /// are still being determined.
    lookups: Option<&'a [Option<u16>]>,
}

impl Pruner<'_> {
    fn glyph(&self, gid: GlyphId16) -> Option<GlyphId16> {
        self.remap.get_u16(gid.to_u16()).map(GlyphId16::new)
    }

    /// All-or-nothing translation of a glyph sequence.
    fn sequence(&self, glyphs: &[BigEndian<GlyphId16>]) -> Option<Vec<GlyphId16>> {
        glyphs.iter().map(|g| self.glyph(g.get())).collect()
    }

    /// Retained glyphs of a coverage table; `None` if none remain.
    fn coverage(&self, coverage: &read_layout::CoverageTable) -> Option<CoverageTable> {
        let glyphs: Vec<GlyphId16> = coverage.iter().filter_map(|g| self.glyph(g)).collect();
        (!glyphs.is_empty()).then(|| CoverageTable::format_1(glyphs))
    }

    /// Prunes a coverage table together with the array indexed by it.
    fn coverage_with<T, U>(
        &self,
        coverage: &read_layout::CoverageTable,
        items: impl IntoIterator<Item = T>,
        mut convert: impl FnMut(T) -> Option<U>,
    ) -> Option<(CoverageTable, Vec<U>)> {
        let mut glyphs = Vec::new();
        let mut kept = Vec::new();
        for (gid, item) in coverage.iter().zip(items) {
            let Some(new) = self.glyph(gid) else { continue };
            if let Some(item) = convert(item) {
                glyphs.push(new);
                kept.push(item);
            }
        }
        (!glyphs.is_empty()).then(|| (CoverageTable::format_1(glyphs), kept))
    }

    fn coverages<'b>(
        &self,
        coverages: impl Iterator<Item = std::result::Result<read_layout::CoverageTable<'b>, ReadError>>,
    ) -> Option<Vec<CoverageTable>> {
        coverages
            .map(|c| c.ok().and_then(|c| self.coverage(&c)))
            .collect()
    }

    fn class_def(&self, class_def: &read_layout::ClassDef) -> ClassDef {
        class_def
            .iter()
            .filter_map(|(gid, class)| self.glyph(gid).map(|new| (new, class)))
            .collect()
    }

    fn lookup_records(
        &self,
        records: &[read_layout::SequenceLookupRecord],
    ) -> Vec<SequenceLookupRecord> {
        records
            .iter()
            .filter_map(|r| {
                let index = match self.lookups {
                    Some(map) => (*map.get(r.lookup_list_index() as usize)?)?,
                    None => r.lookup_list_index(),
                };
                Some(SequenceLookupRecord::new(r.sequence_index(), index))
            })
            .collect()
    }

    /// Converts the subtables of one lookup, extension-wrapped or not.
    ///
    /// Extension subtables come back as the plain lookup type; write-fonts
    /// promotes them again if an offset overflows.
    fn lookup<'a, R, E, W>(
        &self,
        flags: (LookupFlag, Option<u16>),
        subtables: read_layout::Subtables<'a, R, E>,
        mut convert: impl FnMut(&R) -> Option<W>,
    ) -> Option<Lookup<W>>
    where
        R: FontRead<'a> + 'a,
        E: read_layout::ExtensionLookup<'a, R> + 'a,
        W: Default,
    {
        let (lookup_flag, mark_filtering_set) = flags;
        let subtables: Vec<W> = subtables
            .iter()
            .filter_map(|s| s.ok())
            .filter_map(|s| convert(&s))
            .collect();
        if subtables.is_empty() {
            return None;
        }
        let mut out = Lookup::new(lookup_flag, subtables);
        out.mark_filtering_set = mark_filtering_set;
        Some(out)
    }
}

// ---- contextual subtables (shared by GSUB and GPOS) ----

fn sequence_context(p: &Pruner, ctx: &read_layout::SequenceContext) -> Option<SequenceContext> {
    match ctx {
        read_layout::SequenceContext::Format1(f1) => {
            let coverage = f1.coverage().ok()?;
            let (coverage, sets) =
                p.coverage_with(&coverage, f1.seq_rule_sets().iter(), |set| {
                    let set = set?.ok()?;
                    let rules: Vec<SequenceRule> = set
                        .seq_rules()
                        .iter()
                        .filter_map(|r| r.ok())
                        .filter_map(|rule| {
                            Some(SequenceRule::new(
                                p.sequence(rule.input_sequence())?,
                                p.lookup_records(rule.seq_lookup_records()),
                            ))
                        })
                        .collect();
                    (!rules.is_empty()).then(|| Some(SequenceRuleSet::new(rules)))
                })?;
            Some(SequenceContext::Format1(SequenceContextFormat1::new(
                coverage, sets,
            )))
        }
        read_layout::SequenceContext::Format2(f2) => {
            let coverage = p.coverage(&f2.coverage().ok()?)?;
            let class_def = p.class_def(&f2.class_def().ok()?);
            let sets: Vec<Option<ClassSequenceRuleSet>> = f2
                .class_seq_rule_sets()
                .iter()
                .map(|set| {
                    let set = set?.ok()?;
                    let rules = set
                        .class_seq_rules()
                        .iter()
                        .filter_map(|r| r.ok())
                        .map(|rule| {
                            ClassSequenceRule::new(
                                rule.input_sequence().iter().map(|c| c.get()).collect(),
                                p.lookup_records(rule.seq_lookup_records()),
                            )
                        })
                        .collect();
                    Some(ClassSequenceRuleSet::new(rules))
                })
                .collect();
            Some(SequenceContext::Format2(SequenceContextFormat2::new(
                coverage, class_def, sets,
            )))
        }
        read_layout::SequenceContext::Format3(f3) => {
            let coverages = p.coverages(f3.coverages().iter())?;
            Some(SequenceContext::Format3(SequenceContextFormat3::new(
                coverages,
                p.lookup_records(f3.seq_lookup_records()),
            )))
        }
    }
}

fn chained_context(
    p: &Pruner,
    ctx: &read_layout::ChainedSequenceContext,
) -> Option<ChainedSequenceContext> {
    match ctx {
        read_layout::ChainedSequenceContext::Format1(f1) => {
            let coverage = f1.coverage().ok()?;
            let (coverage, sets) =
                p.coverage_with(&coverage, f1.chained_seq_rule_sets().iter(), |set| {
                    let set = set?.ok()?;
                    let rules: Vec<ChainedSequenceRule> = set
                        .chained_seq_rules()
                        .iter()
                        .filter_map(|r| r.ok())
                        .filter_map(|rule| {
                            Some(ChainedSequenceRule::new(
                                p.sequence(rule.backtrack_sequence())?,
                                p.sequence(rule.input_sequence())?,
                                p.sequence(rule.lookahead_sequence())?,
                                p.lookup_records(rule.seq_lookup_records()),
                            ))
                        })
                        .collect();
                    (!rules.is_empty()).then(|| Some(ChainedSequenceRuleSet::new(rules)))
                })?;
            Some(ChainedSequenceContext::Format1(
                ChainedSequenceContextFormat1::new(coverage, sets),
            ))
        }
        read_layout::ChainedSequenceContext::Format2(f2) => {
            let coverage = p.coverage(&f2.coverage().ok()?)?;
            let backtrack = p.class_def(&f2.backtrack_class_def().ok()?);
            let input = p.class_def(&f2.input_class_def().ok()?);
            let lookahead = p.class_def(&f2.lookahead_class_def().ok()?);
            let sets: Vec<Option<ChainedClassSequenceRuleSet>> = f2
                .chained_class_seq_rule_sets()
                .iter()
                .map(|set| {
                    let set = set?.ok()?;
                    let rules = set
                        .chained_class_seq_rules()
                        .iter()
                        .filter_map(|r| r.ok())
                        .map(|rule| {
                            ChainedClassSequenceRule::new(
                                rule.backtrack_sequence().iter().map(|c| c.get()).collect(),
                                rule.input_sequence().iter().map(|c| c.get()).collect(),
                                rule.lookahead_sequence().iter().map(|c| c.get()).collect(),
                                p.lookup_records(rule.seq_lookup_records()),
                            )
                        })
                        .collect();
                    Some(ChainedClassSequenceRuleSet::new(rules))
                })
                .collect();
            Some(ChainedSequenceContext::Format2(
                ChainedSequenceContextFormat2::new(coverage, backtrack, input, lookahead, sets),
            ))
        }
        read_layout::ChainedSequenceContext::Format3(f3) => {
            Some(ChainedSequenceContext::Format3(
                ChainedSequenceContextFormat3::new(
                    p.coverages(f3.backtrack_coverages().iter())?,
                    p.coverages(f3.input_coverages().iter())?,
                    p.coverages(f3.lookahead_coverages().iter())?,
                    p.lookup_records(f3.seq_lookup_records()),
                ),
            ))
        }
    }
}

// ---- GSUB ----

fn gsub_lookup(p: &Pruner, lookup: &read_gsub::SubstitutionLookup) -> Option<SubstitutionLookup> {
    use read_gsub::SubstitutionSubtables as ReadSubtables;

    let flags = (lookup.lookup_flag(), lookup.mark_filtering_set());
    match lookup.subtables().ok()? {
        ReadSubtables::Single(subtables) => p
            .lookup(flags, subtables, |subtable| {
                let pairs: Vec<(GlyphId16, GlyphId16)> = match subtable {
                    read_gsub::SingleSubst::Format1(f1) => {
                        let delta = f1.delta_glyph_id() as i32;
                        f1.coverage()
                            .ok()?
                            .iter()
                            .map(|g| {
                                let out = ((g.to_u16() as i32 + delta) & 0xFFFF) as u16;
                                (g, GlyphId16::new(out))
                            })
                            .collect()
                    }
                    read_gsub::SingleSubst::Format2(f2) => f2
                        .coverage()
                        .ok()?
                        .iter()
                        .zip(f2.substitute_glyph_ids())
                        .map(|(g, out)| (g, out.get()))
                        .collect(),
                };
                let (inputs, outputs): (Vec<_>, Vec<_>) = pairs
                    .into_iter()
                    .filter_map(|(g, out)| Some((p.glyph(g)?, p.glyph(out)?)))
                    .unzip();
                (!inputs.is_empty())
                    .then(|| SingleSubst::format_2(CoverageTable::format_1(inputs), outputs))
            })
            .map(SubstitutionLookup::Single),
        ReadSubtables::Multiple(subtables) => p
            .lookup(flags, subtables, |subtable| {
                let coverage = subtable.coverage().ok()?;
                let (coverage, sequences) =
                    p.coverage_with(&coverage, subtable.sequences().iter(), |seq| {
                        Some(Sequence::new(p.sequence(seq.ok()?.substitute_glyph_ids())?))
                    })?;
                Some(MultipleSubstFormat1::new(coverage, sequences))
            })
            .map(SubstitutionLookup::Multiple),
        ReadSubtables::Alternate(subtables) => p
            .lookup(flags, subtables, |subtable| {
                let coverage = subtable.coverage().ok()?;
                let (coverage, sets) =
                    p.coverage_with(&coverage, subtable.alternate_sets().iter(), |set| {
                        let alternates: Vec<GlyphId16> = set
                            .ok()?
                            .alternate_glyph_ids()
                            .iter()
                            .filter_map(|g| p.glyph(g.get()))
                            .collect();
                        (!alternates.is_empty()).then(|| AlternateSet::new(alternates))
                    })?;
                Some(AlternateSubstFormat1::new(coverage, sets))
            })
            .map(SubstitutionLookup::Alternate),
        ReadSubtables::Ligature(subtables) => p
            .lookup(flags, subtables, |subtable| {
                let coverage = subtable.coverage().ok()?;
                let (coverage, sets) =
                    p.coverage_with(&coverage, subtable.ligature_sets().iter(), |set| {
                        let ligatures: Vec<Ligature> = set
                            .ok()?
                            .ligatures()
                            .iter()
                            .filter_map(|l| l.ok())
                            .filter_map(|lig| {
                                Some(Ligature::new(
                                    p.glyph(lig.ligature_glyph())?,
                                    p.sequence(lig.component_glyph_ids())?,
                                ))
                            })
                            .collect();
                        (!ligatures.is_empty()).then(|| LigatureSet::new(ligatures))
                    })?;
                Some(LigatureSubstFormat1::new(coverage, sets))
            })
            .map(SubstitutionLookup::Ligature),
        ReadSubtables::Contextual(subtables) => p
            .lookup(flags, subtables, |subtable| {
                sequence_context(p, subtable).map(SubstitutionSequenceContext::from)
            })
            .map(SubstitutionLookup::Contextual),
        ReadSubtables::ChainContextual(subtables) => p
            .lookup(flags, subtables, |subtable| {
                chained_context(p, subtable).map(SubstitutionChainContext::from)
            })
            .map(SubstitutionLookup::ChainContextual),
        ReadSubtables::Reverse(subtables) => p
            .lookup(flags, subtables, |subtable| {
                let coverage = subtable.coverage().ok()?;
                let (coverage, substitutes) = p.coverage_with(
                    &coverage,
                    subtable.substitute_glyph_ids().iter(),
                    |g| p.glyph(g.get()),
                )?;
                Some(ReverseChainSingleSubstFormat1::new(
                    coverage,
                    p.coverages(subtable.backtrack_coverages().iter())?,
                    p.coverages(subtable.lookahead_coverages().iter())?,
                    substitutes,
                ))
            })
            .map(SubstitutionLookup::Reverse),
    }
}

fn rebuild_gsub(gsub: &read_gsub::Gsub, remap: &IdRemap) -> Result<Option<Gsub>> {
    let read_lookups: Vec<_> = match gsub.lookup_list() {
        Ok(list) => list.lookups().iter().map(|l| l.ok()).collect(),
        Err(_) => return Ok(None),
    };
    let convert = |p: &Pruner| -> Vec<Option<SubstitutionLookup>> {
        read_lookups
            .iter()
            .enumerate()
            .map(|(idx, l)| {
                let converted = l.as_ref().and_then(|l| gsub_lookup(p, l));
                if converted.is_none() {
                    debug!("GSUB lookup {idx} has no surviving subtables");
                }
                converted
            })
            .collect()
    };

    let lookup_map = surviving_lookups(&convert(&Pruner { remap, lookups: None }));
    let lookups: Vec<SubstitutionLookup> = convert(&Pruner {
        remap,
        lookups: Some(&lookup_map),
    })
    .into_iter()
    .flatten()
    .collect();

    let (script_list, feature_list) =
        rebuild_lists(gsub.script_list().ok(), gsub.feature_list().ok(), &lookup_map);
    Ok(Some(Gsub::new(
        script_list,
        feature_list,
        SubstitutionLookupList::new(lookups),
    )))
}

// ---- GPOS ----

fn mark_array(
    p: &Pruner,
    coverage: &read_layout::CoverageTable,
    marks: &read_gpos::MarkArray,
) -> Option<(CoverageTable, MarkArray)> {
    let (coverage, records) = p.coverage_with(coverage, marks.mark_records().iter(), |mr| {
        let anchor = mr.mark_anchor(marks.offset_data()).ok()?.to_write();
        Some(MarkRecord::new(mr.mark_class(), anchor))
    })?;
    Some((coverage, MarkArray::new(records)))
}

fn anchors<'a>(
    anchors: impl Iterator<Item = Option<std::result::Result<read_gpos::AnchorTable<'a>, ReadError>>>,
) -> Vec<Option<AnchorTable>> {
    anchors
        .map(|a| a.and_then(|r| r.ok()).map(|a| a.to_write()))
        .collect()
}

fn gpos_lookup(p: &Pruner, lookup: &read_gpos::PositionLookup) -> Option<PositionLookup> {
    use read_gpos::PositionSubtables as ReadSubtables;

    let flags = (lookup.lookup_flag(), lookup.mark_filtering_set());
    match lookup.subtables().ok()? {
        ReadSubtables::Single(subtables) => p
            .lookup(flags, subtables, |subtable| match subtable {
                read_gpos::SinglePos::Format1(f1) => Some(SinglePos::Format1(
                    SinglePosFormat1::new(p.coverage(&f1.coverage().ok()?)?, f1.value_record().to_write()),
                )),
                read_gpos::SinglePos::Format2(f2) => {
                    let coverage = f2.coverage().ok()?;
                    let (coverage, records) =
                        p.coverage_with(&coverage, f2.value_records().iter(), |vr| {
                            Some(vr.ok()?.to_write())
                        })?;
                    Some(SinglePos::Format2(SinglePosFormat2::new(coverage, records)))
                }
            })
            .map(PositionLookup::Single),
        ReadSubtables::Pair(subtables) => p
            .lookup(flags, subtables, |subtable| match subtable {
                read_gpos::PairPos::Format1(f1) => {
                    let coverage = f1.coverage().ok()?;
                    let (coverage, sets) =
                        p.coverage_with(&coverage, f1.pair_sets().iter(), |set| {
                            let records: Vec<PairValueRecord> = set
                                .ok()?
                                .pair_value_records()
                                .iter()
                                .filter_map(|r| r.ok())
                                .filter_map(|r| {
                                    Some(PairValueRecord::new(
                                        p.glyph(r.second_glyph())?,
                                        r.value_record1().to_write(),
                                        r.value_record2().to_write(),
                                    ))
                                })
                                .collect();
                            (!records.is_empty()).then(|| PairSet::new(records))
                        })?;
                    Some(PairPos::Format1(PairPosFormat1::new(coverage, sets)))
                }
                read_gpos::PairPos::Format2(f2) => {
                    let coverage = p.coverage(&f2.coverage().ok()?)?;
                    let class_def1 = p.class_def(&f2.class_def1().ok()?);
                    let class_def2 = p.class_def(&f2.class_def2().ok()?);
                    let class1_records: Vec<Class1Record> = f2
                        .class1_records()
                        .iter()
                        .filter_map(|r| r.ok())
                        .map(|c1| {
                            Class1Record::new(
                                c1.class2_records()
                                    .iter()
                                    .filter_map(|r| r.ok())
                                    .map(|c2| {
                                        Class2Record::new(
                                            c2.value_record1().to_write(),
                                            c2.value_record2().to_write(),
                                        )
                                    })
                                    .collect(),
                            )
                        })
                        .collect();
                    Some(PairPos::Format2(PairPosFormat2::new(
                        coverage,
                        class_def1,
                        class_def2,
                        class1_records,
                    )))
                }
            })
            .map(PositionLookup::Pair),
        ReadSubtables::Cursive(subtables) => p
            .lookup(flags, subtables, |subtable| {
                let coverage = subtable.coverage().ok()?;
                let data = subtable.offset_data();
                let (coverage, records) =
                    p.coverage_with(&coverage, subtable.entry_exit_record().iter(), |eer| {
                        let entry = eer.entry_anchor(data).and_then(|a| a.ok()).map(|a| a.to_write());
                        let exit = eer.exit_anchor(data).and_then(|a| a.ok()).map(|a| a.to_write());
                        Some(EntryExitRecord::new(entry, exit))
                    })?;
                Some(CursivePosFormat1::new(coverage, records))
            })
            .map(PositionLookup::Cursive),
        ReadSubtables::MarkToBase(subtables) => p
            .lookup(flags, subtables, |subtable| {
                let (mark_coverage, marks) = mark_array(
                    p,
                    &subtable.mark_coverage().ok()?,
                    &subtable.mark_array().ok()?,
                )?;
                let bases = subtable.base_array().ok()?;
                let (base_coverage, records) = p.coverage_with(
                    &subtable.base_coverage().ok()?,
                    bases.base_records().iter(),
                    |br| Some(BaseRecord::new(anchors(br.ok()?.base_anchors(bases.offset_data()).iter()))),
                )?;
                Some(MarkBasePosFormat1::new(
                    mark_coverage,
                    base_coverage,
                    marks,
                    BaseArray::new(records),
                ))
            })
            .map(PositionLookup::MarkToBase),
        ReadSubtables::MarkToLig(subtables) => p
            .lookup(flags, subtables, |subtable| {
                let (mark_coverage, marks) = mark_array(
                    p,
                    &subtable.mark_coverage().ok()?,
                    &subtable.mark_array().ok()?,
                )?;
                let ligatures = subtable.ligature_array().ok()?;
                let (lig_coverage, attaches) = p.coverage_with(
                    &subtable.ligature_coverage().ok()?,
                    ligatures.ligature_attaches().iter(),
                    |attach| {
                        let attach = attach.ok()?;
                        let components = attach
                            .component_records()
                            .iter()
                            .filter_map(|r| r.ok())
                            .map(|cr| {
                                ComponentRecord::new(anchors(
                                    cr.ligature_anchors(attach.offset_data()).iter(),
                                ))
                            })
                            .collect();
                        Some(LigatureAttach::new(components))
                    },
                )?;
                Some(MarkLigPosFormat1::new(
                    mark_coverage,
                    lig_coverage,
                    marks,
                    LigatureArray::new(attaches),
                ))
            })
            .map(PositionLookup::MarkToLig),
        ReadSubtables::MarkToMark(subtables) => p
            .lookup(flags, subtables, |subtable| {
                let (mark1_coverage, marks) = mark_array(
                    p,
                    &subtable.mark1_coverage().ok()?,
                    &subtable.mark1_array().ok()?,
                )?;
                let mark2 = subtable.mark2_array().ok()?;
                let (mark2_coverage, records) = p.coverage_with(
                    &subtable.mark2_coverage().ok()?,
                    mark2.mark2_records().iter(),
                    |r| Some(Mark2Record::new(anchors(r.ok()?.mark2_anchors(mark2.offset_data()).iter()))),
                )?;
                Some(MarkMarkPosFormat1::new(
                    mark1_coverage,
                    mark2_coverage,
                    marks,
                    Mark2Array::new(records),
                ))
            })
            .map(PositionLookup::MarkToMark),
        ReadSubtables::Contextual(subtables) => p
            .lookup(flags, subtables, |subtable| {
                sequence_context(p, subtable).map(PositionSequenceContext::from)
            })
            .map(PositionLookup::Contextual),
        ReadSubtables::ChainContextual(subtables) => p
            .lookup(flags, subtables, |subtable| {
                chained_context(p, subtable).map(PositionChainContext::from)
            })
            .map(PositionLookup::ChainContextual),
    }
}

fn rebuild_gpos(gpos: &read_gpos::Gpos, remap: &IdRemap) -> Result<Option<Gpos>> {
    let read_lookups: Vec<_> = match gpos.lookup_list() {
        Ok(list) => list.lookups().iter().map(|l| l.ok()).collect(),
        Err(_) => return Ok(None),
    };
    let convert = |p: &Pruner| -> Vec<Option<PositionLookup>> {
        read_lookups
            .iter()
            .map(|l| l.as_ref().and_then(|l| gpos_lookup(p, l)))
            .collect()
    };

    let lookup_map = surviving_lookups(&convert(&Pruner { remap, lookups: None }));
    let lookups: Vec<PositionLookup> = convert(&Pruner {
        remap,
        lookups: Some(&lookup_map),
    })
    .into_iter()
    .flatten()
    .collect();

    let (script_list, feature_list) =
        rebuild_lists(gpos.script_list().ok(), gpos.feature_list().ok(), &lookup_map);
    Ok(Some(Gpos::new(
        script_list,
        feature_list,
        PositionLookupList::new(lookups),
    )))
}

// ---- script / feature lists ----

/// Old lookup index -> new index for each surviving lookup.
fn surviving_lookups<T>(converted: &[Option<T>]) -> Vec<Option<u16>> {
    let mut next = 0u16;
    converted
        .iter()
        .map(|l| {
            l.as_ref().map(|_| {
                next += 1;
                next - 1
            })
        })
        .collect()
}

fn remap_indices(indices: &[BigEndian<u16>], map: &[Option<u16>]) -> Vec<u16> {
    indices
        .iter()
        .filter_map(|i| map.get(i.get() as usize).copied().flatten())
        .collect()
}

/// Rebuilds the feature list against surviving lookups, dropping features
/// that lose every lookup, then rewrites language system feature indices.
fn rebuild_lists(
    scripts: Option<read_layout::ScriptList>,
    features: Option<read_layout::FeatureList>,
    lookup_map: &[Option<u16>],
) -> (ScriptList, FeatureList) {
    let mut feature_records = Vec::new();
    let mut feature_map: Vec<Option<u16>> = Vec::new();
    if let Some(features) = &features {
        for record in features.feature_records() {
            let lookups = record
                .feature(features.offset_data())
                .map(|f| remap_indices(f.lookup_list_indices(), lookup_map))
                .unwrap_or_default();
            if lookups.is_empty() {
                debug!("dropping feature '{}' with no surviving lookups", record.feature_tag());
                feature_map.push(None);
                continue;
            }
            feature_map.push(Some(feature_records.len() as u16));
            feature_records.push(FeatureRecord::new(
                record.feature_tag(),
                Feature::new(None, lookups),
            ));
        }
    }

    let mut script_records = Vec::new();
    if let Some(scripts) = &scripts {
        for record in scripts.script_records() {
            let Ok(script) = record.script(scripts.offset_data()) else {
                continue;
            };
            let default_lang_sys = script
                .default_lang_sys()
                .and_then(|l| l.ok())
                .map(|l| LangSys::new(remap_indices(l.feature_indices(), &feature_map)));
            let lang_sys_records = script
                .lang_sys_records()
                .iter()
                .filter_map(|r| {
                    let lang_sys = r.lang_sys(script.offset_data()).ok()?;
                    Some(LangSysRecord::new(
                        r.lang_sys_tag(),
                        LangSys::new(remap_indices(lang_sys.feature_indices(), &feature_map)),
                    ))
                })
                .collect();
            script_records.push(ScriptRecord::new(
                record.script_tag(),
                Script::new(default_lang_sys, lang_sys_records),
            ));
        }
    }

    (
        ScriptList::new(script_records),
        FeatureList::new(feature_records),
    )
}

// ---- GDEF ----

/// Glyph classes, mark attachment classes and mark glyph sets, remapped.
/// Attachment points and ligature carets are not carried over.
fn rebuild_gdef(gdef: &read_gdef::Gdef, remap: &IdRemap) -> Gdef {
    let p = Pruner {
        remap,
        lookups: None,
    };
    let glyph_class_def = gdef
        .glyph_class_def()
        .and_then(|c| c.ok())
        .map(|c| p.class_def(&c));
    let mark_attach_class_def = gdef
        .mark_attach_class_def()
        .and_then(|c| c.ok())
        .map(|c| p.class_def(&c));
    let mark_glyph_sets = gdef.mark_glyph_sets_def().and_then(|s| s.ok()).map(|sets| {
        let coverages = sets
            .coverages()
            .iter()
            .map(|c| {
                c.ok()
                    .and_then(|c| p.coverage(&c))
                    .unwrap_or_else(|| CoverageTable::format_1(Vec::new()))
            })
            .collect();
        MarkGlyphSets::new(coverages)
    });

    let mut out = Gdef::new(glyph_class_def, None, None, mark_attach_class_def);
    out.mark_glyph_sets_def = mark_glyph_sets.into();
    out
}

#[cfg(test)]
mod tests {
    use read_fonts::FontData;
    use write_fonts::tables::{
        gpos::{
            ExtensionPosFormat1, ExtensionSubtable as PosExtension, Gpos as WriteGpos, ValueRecord,
        },
        gsub::{ExtensionSubstFormat1, ExtensionSubtable, Gsub as WriteGsub},
    };

    use super::*;
    use crate::{closure::RetainedSet, types::GlyphId};

    fn remap(ids: &[u16]) -> IdRemap {
        IdRemap::new(&RetainedSet::from_iter(ids.iter().copied().map(GlyphId::new))).unwrap()
    }

    fn gid(id: u16) -> GlyphId16 {
        GlyphId16::new(id)
    }

    fn ligature_lookup(first: u16, second: u16, lig: u16) -> SubstitutionLookup {
        SubstitutionLookup::Ligature(Lookup::new(
            LookupFlag::empty(),
            vec![LigatureSubstFormat1::new(
                CoverageTable::format_1(vec![gid(first)]),
                vec![LigatureSet::new(vec![Ligature::new(gid(lig), vec![gid(second)])])],
            )],
        ))
    }

    fn single_lookup(from: u16, to: u16) -> SubstitutionLookup {
        SubstitutionLookup::Single(Lookup::new(
            LookupFlag::empty(),
            vec![SingleSubst::format_2(
                CoverageTable::format_1(vec![gid(from)]),
                vec![gid(to)],
            )],
        ))
    }

    fn extension_ligature_lookup(first: u16, second: u16, lig: u16) -> SubstitutionLookup {
        let SubstitutionLookup::Ligature(inner) = ligature_lookup(first, second, lig) else {
            unreachable!()
        };
        let subtables = inner
            .subtables
            .into_iter()
            .map(|s| ExtensionSubtable::Ligature(ExtensionSubstFormat1::new(4, s.into_inner())))
            .collect();
        SubstitutionLookup::Extension(Lookup::new(LookupFlag::empty(), subtables))
    }

    fn gsub_with(lookups: Vec<SubstitutionLookup>, features: Vec<(&[u8; 4], Vec<u16>)>) -> Vec<u8> {
        let feature_count = features.len() as u16;
        let features = features
            .into_iter()
            .map(|(tag, idx)| FeatureRecord::new(font_types::Tag::new(tag), Feature::new(None, idx)))
            .collect();
        let scripts = vec![ScriptRecord::new(
            font_types::Tag::new(b"latn"),
            Script::new(Some(LangSys::new((0..feature_count).collect())), vec![]),
        )];
        dump_table(&WriteGsub::new(
            ScriptList::new(scripts),
            FeatureList::new(features),
            SubstitutionLookupList::new(lookups),
        ))
        .unwrap()
    }

    fn read_back(gsub: &Gsub) -> Vec<u8> {
        dump_table(gsub).unwrap()
    }

    #[test]
    fn test_ligature_pruned_when_component_dropped() {
        let bytes = gsub_with(vec![ligature_lookup(5, 6, 950)], vec![(b"liga", vec![0])]);
        let gsub = read_gsub::Gsub::read(FontData::new(&bytes)).unwrap();

        let rebuilt = rebuild_gsub(&gsub, &remap(&[0, 5])).unwrap().unwrap();
        assert!(rebuilt.lookup_list.lookups.is_empty());
        assert!(rebuilt.feature_list.feature_records.is_empty());
        assert!(!keep(&rebuilt.lookup_list.lookups, ClosurePolicy::Strict));
        assert!(keep(&rebuilt.lookup_list.lookups, ClosurePolicy::Permissive));
    }

    #[test]
    fn test_ligature_kept_and_renumbered() {
        let bytes = gsub_with(vec![ligature_lookup(5, 6, 950)], vec![(b"liga", vec![0])]);
        let gsub = read_gsub::Gsub::read(FontData::new(&bytes)).unwrap();

        let rebuilt = rebuild_gsub(&gsub, &remap(&[0, 5, 6, 950])).unwrap().unwrap();
        let out = read_back(&rebuilt);
        let out = read_gsub::Gsub::read(FontData::new(&out)).unwrap();
        let rules = crate::rules::extract_rules(&out);
        assert_eq!(rules.len(), 1);
        assert_eq!(
            rules[0].input,
            vec![GlyphId::new(1), GlyphId::new(2)]
        );
        assert_eq!(rules[0].output, vec![GlyphId::new(3)]);
    }

    #[test]
    fn test_extension_lookup_unwrapped() {
        let bytes = gsub_with(
            vec![extension_ligature_lookup(5, 6, 950)],
            vec![(b"liga", vec![0])],
        );
        let gsub = read_gsub::Gsub::read(FontData::new(&bytes)).unwrap();

        let rebuilt = rebuild_gsub(&gsub, &remap(&[0, 5, 6, 950])).unwrap().unwrap();
        assert_eq!(rebuilt.lookup_list.lookups.len(), 1);
        assert!(matches!(
            *rebuilt.lookup_list.lookups[0],
            SubstitutionLookup::Ligature(_)
        ));
        assert_eq!(
            rebuilt.feature_list.feature_records[0].feature.lookup_list_indices,
            vec![0]
        );

        let out = read_back(&rebuilt);
        let out = read_gsub::Gsub::read(FontData::new(&out)).unwrap();
        let rules = crate::rules::extract_rules(&out);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].output, vec![GlyphId::new(3)]);
    }

    #[test]
    fn test_extension_pair_pos_pruned() {
        let pair = PairPos::format_1(
            CoverageTable::format_1(vec![gid(5), gid(7)]),
            vec![
                PairSet::new(vec![PairValueRecord::new(
                    gid(6),
                    ValueRecord::new().with_x_advance(-70),
                    ValueRecord::default(),
                )]),
                PairSet::new(vec![PairValueRecord::new(
                    gid(8),
                    ValueRecord::new().with_x_advance(-40),
                    ValueRecord::default(),
                )]),
            ],
        );
        let lookup = PositionLookup::Extension(Lookup::new(
            LookupFlag::empty(),
            vec![PosExtension::Pair(ExtensionPosFormat1::new(2, pair))],
        ));
        let bytes = dump_table(&WriteGpos::new(
            ScriptList::new(vec![]),
            FeatureList::new(vec![]),
            PositionLookupList::new(vec![lookup]),
        ))
        .unwrap();
        let gpos = read_gpos::Gpos::read(FontData::new(&bytes)).unwrap();

        // glyph 7 is gone, so only the 5/6 pair survives as new 1/2
        let rebuilt = rebuild_gpos(&gpos, &remap(&[0, 5, 6, 8])).unwrap().unwrap();
        assert_eq!(rebuilt.lookup_list.lookups.len(), 1);
        let PositionLookup::Pair(lookup) = &*rebuilt.lookup_list.lookups[0] else {
            panic!("expected an unwrapped pair lookup");
        };
        let PairPos::Format1(f1) = &*lookup.subtables[0] else {
            panic!("expected pair format 1");
        };
        assert_eq!(f1.coverage.iter().collect::<Vec<_>>(), vec![gid(1)]);
        assert_eq!(f1.pair_sets.len(), 1);
        let record = &f1.pair_sets[0].pair_value_records[0];
        assert_eq!(record.second_glyph, gid(2));
        assert_eq!(record.value_record1.x_advance, Some(-70));
    }

    #[test]
    fn test_feature_and_lookup_indices_renumbered() {
        // lookup 0 dies (glyph 7 dropped), lookup 1 survives as new lookup 0
        let bytes = gsub_with(
            vec![single_lookup(7, 8), single_lookup(5, 9)],
            vec![(b"ccmp", vec![0]), (b"liga", vec![0, 1])],
        );
        let gsub = read_gsub::Gsub::read(FontData::new(&bytes)).unwrap();

        let rebuilt = rebuild_gsub(&gsub, &remap(&[0, 5, 9])).unwrap().unwrap();
        assert_eq!(rebuilt.lookup_list.lookups.len(), 1);

        let features = &rebuilt.feature_list.feature_records;
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].feature_tag, font_types::Tag::new(b"liga"));
        assert_eq!(features[0].feature.lookup_list_indices, vec![0]);

        let script = &rebuilt.script_list.script_records[0].script;
        let default = script.default_lang_sys.as_ref().unwrap();
        assert_eq!(default.feature_indices, vec![0]);
    }

    #[test]
    fn test_remap_indices_drops_removed() {
        let indices: Vec<BigEndian<u16>> = [0u16, 1, 2, 7].into_iter().map(BigEndian::from).collect();
        let map = vec![None, Some(0), Some(1)];
        assert_eq!(remap_indices(&indices, &map), vec![0, 1]);
    }

    #[test]
    fn test_surviving_lookups() {
        let map = surviving_lookups(&[Some(()), None, Some(()), None]);
        assert_eq!(map, vec![Some(0), None, Some(1), None]);
    }
}
