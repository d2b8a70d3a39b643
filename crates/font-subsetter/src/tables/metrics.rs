//! hmtx/hhea and vmtx/vhea rebuild.
//!
//! Metrics are relocated into subset order, never recomputed. The trailing
//! run of equal advances is folded back into the side-bearing array and the
//! header's long-metric count is patched to match.

use read_fonts::{TableProvider, tables::hmtx::LongMetric as ReadLongMetric, types::BigEndian};
use write_fonts::{
    dump_table,
    tables::{
        hmtx::{Hmtx, LongMetric},
        vmtx::Vmtx,
    },
};

use crate::{
    directory::{HHEA, SourceFont, VHEA},
    error::{Result, SubsetError},
    remap::IdRemap,
};

/// Byte offset of numberOfHMetrics in hhea (and numOfLongVerMetrics in vhea).
const NUM_LONG_METRICS_OFFSET: usize = 34;

/// A rebuilt metrics table with its patched header.
#[derive(Debug, Clone)]
pub struct MetricsTables {
    pub header: Vec<u8>,
    pub metrics: Vec<u8>,
}

fn relocate(
    long_metrics: &[ReadLongMetric],
    bearings: &[BigEndian<i16>],
    remap: &IdRemap,
    table: &str,
) -> Result<Vec<LongMetric>> {
    let last_advance = long_metrics.last().map(|m| m.advance.get()).unwrap_or(0);
    remap
        .old_ids()
        .iter()
        .map(|old| {
            let idx = old.to_usize();
            if let Some(m) = long_metrics.get(idx) {
                return Ok(LongMetric::new(m.advance.get(), m.side_bearing.get()));
            }
            bearings
                .get(idx - long_metrics.len())
                .map(|b| LongMetric::new(last_advance, b.get()))
                .ok_or_else(|| SubsetError::malformed(format!("{table} has no metrics for {old}")))
        })
        .collect()
}

/// Splits relocated metrics into long metrics and trailing side bearings.
fn compact(mut metrics: Vec<LongMetric>) -> (Vec<LongMetric>, Vec<i16>) {
    let Some(last_advance) = metrics.last().map(|m| m.advance) else {
        return (metrics, Vec::new());
    };
    let mut num_long = metrics.len();
    while num_long > 1 && metrics[num_long - 2].advance == last_advance {
        num_long -= 1;
    }
    let bearings = metrics.split_off(num_long).into_iter().map(|m| m.side_bearing).collect();
    (metrics, bearings)
}

fn patch_header(header: &[u8], num_long: usize) -> Result<Vec<u8>> {
    let mut header = header.to_vec();
    let field = header
        .get_mut(NUM_LONG_METRICS_OFFSET..NUM_LONG_METRICS_OFFSET + 2)
        .ok_or_else(|| SubsetError::malformed("metrics header is truncated"))?;
    field.copy_from_slice(&(num_long as u16).to_be_bytes());
    Ok(header)
}

pub fn rebuild_hmtx(font: &SourceFont, remap: &IdRemap) -> Result<MetricsTables> {
    let hmtx = font.hmtx()?;
    let metrics = relocate(hmtx.h_metrics(), hmtx.left_side_bearings(), remap, "hmtx")?;
    let (h_metrics, left_side_bearings) = compact(metrics);
    let header = font.table_bytes(HHEA).ok_or(SubsetError::MissingTable(HHEA))?;

    Ok(MetricsTables {
        header: patch_header(header, h_metrics.len())?,
        metrics: dump_table(&Hmtx::new(h_metrics, left_side_bearings))?,
    })
}

/// Vertical metrics, when the font has both vhea and vmtx.
pub fn rebuild_vmtx(font: &SourceFont, remap: &IdRemap) -> Result<Option<MetricsTables>> {
    let (Ok(vmtx), Some(header)) = (font.vmtx(), font.table_bytes(VHEA)) else {
        return Ok(None);
    };
    let metrics = relocate(vmtx.v_metrics(), vmtx.top_side_bearings(), remap, "vmtx")?;
    let (v_metrics, top_side_bearings) = compact(metrics);

    Ok(Some(MetricsTables {
        header: patch_header(header, v_metrics.len())?,
        metrics: dump_table(&Vmtx::new(v_metrics, top_side_bearings))?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(advance: u16, side_bearing: i16) -> LongMetric {
        LongMetric::new(advance, side_bearing)
    }

    #[test]
    fn test_compact_trailing_run() {
        let (long, bearings) = compact(vec![
            metric(500, 1),
            metric(1000, 2),
            metric(1000, 3),
            metric(1000, 4),
        ]);
        assert_eq!(long, vec![metric(500, 1), metric(1000, 2)]);
        assert_eq!(bearings, vec![3, 4]);
    }

    #[test]
    fn test_compact_all_distinct() {
        let (long, bearings) = compact(vec![metric(1, 0), metric(2, 0)]);
        assert_eq!(long.len(), 2);
        assert!(bearings.is_empty());
    }

    #[test]
    fn test_compact_single_glyph() {
        let (long, bearings) = compact(vec![metric(600, 5)]);
        assert_eq!(long, vec![metric(600, 5)]);
        assert!(bearings.is_empty());
    }

    #[test]
    fn test_patch_header() {
        let header = vec![0u8; 36];
        let patched = patch_header(&header, 0x0102).unwrap();
        assert_eq!(&patched[34..36], &[1, 2]);
        assert!(patch_header(&[0u8; 10], 1).is_err());
    }
}
