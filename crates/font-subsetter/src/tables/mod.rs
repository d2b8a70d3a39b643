//! Per-table rebuild through the glyph ID remap.
//!
//! Each glyph-dependent table is an independent job; jobs run on the rayon
//! pool once the remap is final and their output is collected into a
//! [`TableSet`], so the result does not depend on scheduling.

mod cmap;
mod convert;
mod glyf;
mod header;
mod layout;
mod metrics;

use std::collections::BTreeMap;

use log::{debug, warn};
use rayon::prelude::*;
use read_fonts::types::Tag;

pub use self::glyf::{GlyfLoca, LocaFormat};
pub(crate) use self::glyf::{for_each_component, is_composite, read_u16};

use crate::{
    charmap::CmapResolution,
    directory::{
        CMAP, GDEF, GLYF, GPOS, GSUB, HEAD, HHEA, HMTX, LOCA, MAXP, OS2, OutlineFormat, POST,
        SourceFont, VHEA, VMTX,
    },
    error::Result,
    options::{ClosurePolicy, is_dropped_table},
    remap::IdRemap,
};

/// Output tables keyed by tag; iteration order is the canonical tag order.
pub type TableSet = BTreeMap<Tag, Vec<u8>>;

/// Everything a rebuild needs besides the source font.
pub struct RebuildContext<'a> {
    pub resolution: &'a CmapResolution,
    pub remap: &'a IdRemap,
    pub policy: ClosurePolicy,
    pub retain_layout_tables: bool,
    pub retain_glyph_names: bool,
}

/// Tables rebuilt by jobs rather than copied.
const REBUILT_TABLES: &[Tag] = &[
    HEAD, MAXP, CMAP, HHEA, HMTX, VHEA, VMTX, GLYF, LOCA, POST, OS2, GSUB, GPOS, GDEF,
];

#[derive(Debug, Clone, Copy)]
enum Job {
    GlyfLoca,
    HorizontalMetrics,
    VerticalMetrics,
    Cmap,
    Maxp,
    Post,
    Os2,
    Layout,
}

/// `(tag, None)` marks a table the job decided to omit.
type JobOutput = Vec<(Tag, Option<Vec<u8>>)>;

impl Job {
    fn run(self, font: &SourceFont, ctx: &RebuildContext) -> Result<JobOutput> {
        let remap = ctx.remap;
        Ok(match self {
            Job::GlyfLoca => {
                let rebuilt = glyf::rebuild_glyf_loca(font, remap)?;
                vec![
                    (GLYF, Some(rebuilt.glyf)),
                    (LOCA, Some(rebuilt.loca)),
                    (HEAD, Some(header::rebuild_head(font, Some(rebuilt.format))?)),
                ]
            }
            Job::HorizontalMetrics => {
                let rebuilt = metrics::rebuild_hmtx(font, remap)?;
                vec![(HHEA, Some(rebuilt.header)), (HMTX, Some(rebuilt.metrics))]
            }
            Job::VerticalMetrics => match metrics::rebuild_vmtx(font, remap)? {
                Some(rebuilt) => vec![(VHEA, Some(rebuilt.header)), (VMTX, Some(rebuilt.metrics))],
                None => vec![(VHEA, None), (VMTX, None)],
            },
            Job::Cmap => vec![(CMAP, Some(cmap::rebuild_cmap(&ctx.resolution.covered, remap)?))],
            Job::Maxp => vec![(MAXP, Some(header::rebuild_maxp(font, remap)?))],
            Job::Post => vec![(
                POST,
                header::rebuild_post(font, remap, ctx.retain_glyph_names)?,
            )],
            Job::Os2 => vec![(OS2, header::rebuild_os2(font, &ctx.resolution.covered)?)],
            Job::Layout => {
                if !ctx.retain_layout_tables {
                    vec![(GSUB, None), (GPOS, None), (GDEF, None)]
                } else {
                    let rebuilt = layout::rebuild_layout(font, remap, ctx.policy)?;
                    vec![(GSUB, rebuilt.gsub), (GPOS, rebuilt.gpos), (GDEF, rebuilt.gdef)]
                }
            }
        })
    }
}

/// Rebuilds every output table. Returns the table set and the source tags
/// that were omitted, ascending.
pub fn rebuild_tables(font: &SourceFont, ctx: &RebuildContext) -> Result<(TableSet, Vec<Tag>)> {
    let mut jobs = vec![
        Job::HorizontalMetrics,
        Job::VerticalMetrics,
        Job::Cmap,
        Job::Maxp,
        Job::Post,
        Job::Os2,
        Job::Layout,
    ];
    if font.outline_format() == OutlineFormat::TrueType {
        jobs.insert(0, Job::GlyfLoca);
    }

    let outputs = jobs
        .par_iter()
        .map(|job| job.run(font, ctx))
        .collect::<Result<Vec<_>>>()?;

    let mut tables = TableSet::new();
    let mut dropped = Vec::new();

    for (tag, data) in outputs.into_iter().flatten() {
        match data {
            Some(data) => {
                tables.insert(tag, data);
            }
            None if font.has_table(tag) => dropped.push(tag),
            None => {}
        }
    }

    for tag in font.directory().tags() {
        if REBUILT_TABLES.contains(&tag) {
            continue;
        }
        if is_dropped_table(tag) {
            dropped.push(tag);
            continue;
        }
        if let Some(data) = font.table_bytes(tag) {
            debug!("passing '{tag}' through unchanged");
            tables.insert(tag, data.to_vec());
        }
    }

    if !tables.contains_key(&HEAD) {
        tables.insert(HEAD, header::rebuild_head(font, None)?);
    }

    dropped.sort();
    if !dropped.is_empty() {
        let names: Vec<String> = dropped.iter().map(Tag::to_string).collect();
        warn!("dropped tables: {}", names.join(", "));
    }
    Ok((tables, dropped))
}
