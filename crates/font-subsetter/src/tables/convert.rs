//! read-fonts to write-fonts conversions for GPOS value data.
//!
//! Device and variation-index tables are not carried over.

use read_fonts::tables::gpos as read_gpos;
use write_fonts::tables::gpos::{
    AnchorFormat1, AnchorFormat2, AnchorFormat3, AnchorTable, ValueRecord,
};

/// Convert a read-fonts type to its write-fonts equivalent
pub trait ToWrite {
    type Output;
    fn to_write(&self) -> Self::Output;
}

impl ToWrite for read_gpos::ValueRecord {
    type Output = ValueRecord;

    fn to_write(&self) -> ValueRecord {
        let mut result = ValueRecord::new();
        if let Some(v) = self.x_placement {
            result = result.with_x_placement(v.get());
        }
        if let Some(v) = self.y_placement {
            result = result.with_y_placement(v.get());
        }
        if let Some(v) = self.x_advance {
            result = result.with_x_advance(v.get());
        }
        if let Some(v) = self.y_advance {
            result = result.with_y_advance(v.get());
        }
        result
    }
}

impl ToWrite for read_gpos::AnchorTable<'_> {
    type Output = AnchorTable;

    fn to_write(&self) -> AnchorTable {
        match self {
            read_gpos::AnchorTable::Format1(a) => {
                AnchorTable::Format1(AnchorFormat1::new(a.x_coordinate(), a.y_coordinate()))
            }
            read_gpos::AnchorTable::Format2(a) => AnchorTable::Format2(AnchorFormat2::new(
                a.x_coordinate(),
                a.y_coordinate(),
                a.anchor_point(),
            )),
            // device offsets dropped
            read_gpos::AnchorTable::Format3(a) => AnchorTable::Format3(AnchorFormat3::new(
                a.x_coordinate(),
                a.y_coordinate(),
                None,
                None,
            )),
        }
    }
}

impl<T: ToWrite> ToWrite for Option<T> {
    type Output = Option<T::Output>;

    fn to_write(&self) -> Self::Output {
        self.as_ref().map(ToWrite::to_write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_value_record() {
        let read = read_gpos::ValueRecord::default();
        assert_eq!(read.to_write(), ValueRecord::new());
    }
}
