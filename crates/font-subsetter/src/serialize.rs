//! Canonical sfnt assembly.
//!
//! Tables are written in ascending tag order, each padded to four bytes,
//! behind a directory carrying unpadded lengths and per-table checksums.
//! `head.checkSumAdjustment` is set last so the whole file sums to
//! `0xB1B0AFBA`.

use crate::{
    directory::{HEAD, TRUETYPE_SIGNATURE},
    error::{Result, SubsetError},
    tables::TableSet,
};

pub const CHECKSUM_MAGIC: u32 = 0xB1B0_AFBA;
const CHECKSUM_ADJUSTMENT_OFFSET: usize = 8;

/// Big-endian u32 sum of `data`, zero-padded to a multiple of four.
pub fn checksum(data: &[u8]) -> u32 {
    let mut chunks = data.chunks_exact(4);
    let mut sum = chunks
        .by_ref()
        .fold(0u32, |acc, c| acc.wrapping_add(u32::from_be_bytes([c[0], c[1], c[2], c[3]])));
    let rest = chunks.remainder();
    if !rest.is_empty() {
        let mut last = [0u8; 4];
        last[..rest.len()].copy_from_slice(rest);
        sum = sum.wrapping_add(u32::from_be_bytes(last));
    }
    sum
}

/// Checksum of a head table, computed as if checkSumAdjustment were zero.
pub fn head_checksum(head: &[u8]) -> u32 {
    let adjustment = head
        .get(CHECKSUM_ADJUSTMENT_OFFSET..CHECKSUM_ADJUSTMENT_OFFSET + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .unwrap_or(0);
    checksum(head).wrapping_sub(adjustment)
}

/// `(searchRange, entrySelector, rangeShift)` for `num_tables` records.
pub fn binary_search_params(num_tables: u16) -> (u16, u16, u16) {
    if num_tables == 0 {
        return (0, 0, 0);
    }
    let entry_selector = 15 - num_tables.leading_zeros() as u16;
    let search_range = (1u16 << entry_selector) * 16;
    let range_shift = num_tables * 16 - search_range;
    (search_range, entry_selector, range_shift)
}

fn pad4(len: usize) -> usize {
    (len + 3) & !3
}

/// Assembles `tables` into a TrueType font binary.
pub fn serialize(tables: &TableSet) -> Result<Vec<u8>> {
    let num_tables = u16::try_from(tables.len())
        .map_err(|_| SubsetError::malformed("too many tables for an sfnt directory"))?;
    let (search_range, entry_selector, range_shift) = binary_search_params(num_tables);

    let directory_len = 12 + 16 * tables.len();
    let total_len = directory_len + tables.values().map(|t| pad4(t.len())).sum::<usize>();
    let mut out = Vec::with_capacity(total_len);

    out.extend_from_slice(&TRUETYPE_SIGNATURE.to_be_bytes());
    out.extend_from_slice(&num_tables.to_be_bytes());
    out.extend_from_slice(&search_range.to_be_bytes());
    out.extend_from_slice(&entry_selector.to_be_bytes());
    out.extend_from_slice(&range_shift.to_be_bytes());

    let mut offset = directory_len;
    let mut head_offset = None;
    for (tag, data) in tables {
        let sum = if *tag == HEAD {
            head_offset = Some(offset);
            head_checksum(data)
        } else {
            checksum(data)
        };
        let length = u32::try_from(data.len())
            .map_err(|_| SubsetError::malformed(format!("table '{tag}' is too large")))?;
        out.extend_from_slice(&tag.to_be_bytes());
        out.extend_from_slice(&sum.to_be_bytes());
        out.extend_from_slice(&(offset as u32).to_be_bytes());
        out.extend_from_slice(&length.to_be_bytes());
        offset += pad4(data.len());
    }

    for (tag, data) in tables {
        let start = out.len();
        out.extend_from_slice(data);
        if *tag == HEAD {
            // zero the adjustment so the file sum below is computed without it
            if let Some(field) =
                out.get_mut(start + CHECKSUM_ADJUSTMENT_OFFSET..start + CHECKSUM_ADJUSTMENT_OFFSET + 4)
            {
                field.fill(0);
            }
        }
        out.resize(pad4(out.len()), 0);
    }

    if let Some(head) = head_offset {
        let adjustment = CHECKSUM_MAGIC.wrapping_sub(checksum(&out));
        let field = out
            .get_mut(head + CHECKSUM_ADJUSTMENT_OFFSET..head + CHECKSUM_ADJUSTMENT_OFFSET + 4)
            .ok_or_else(|| SubsetError::malformed("head table is truncated"))?;
        field.copy_from_slice(&adjustment.to_be_bytes());
    }

    Ok(out)
}
