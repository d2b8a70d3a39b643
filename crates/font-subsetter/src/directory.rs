//! sfnt container parsing.
//!
//! [`TableDirectory::parse`] validates the header and every table record
//! against the byte length before anything else touches the data.
//! [`SourceFont`] layers the global header fields on top and implements
//! [`TableProvider`], so typed read-fonts tables come straight from the
//! validated records.

use std::collections::BTreeMap;

use read_fonts::{FontData, TableProvider, types::Tag};

use crate::error::{Result, SubsetError};

pub const TRUETYPE_SIGNATURE: u32 = 0x0001_0000;
pub const APPLE_TRUETYPE_SIGNATURE: u32 = u32::from_be_bytes(*b"true");
pub const CFF_SIGNATURE: u32 = u32::from_be_bytes(*b"OTTO");

const HEADER_LEN: usize = 12;
const RECORD_LEN: usize = 16;

pub const HEAD: Tag = Tag::new(b"head");
pub const MAXP: Tag = Tag::new(b"maxp");
pub const CMAP: Tag = Tag::new(b"cmap");
pub const HHEA: Tag = Tag::new(b"hhea");
pub const HMTX: Tag = Tag::new(b"hmtx");
pub const VHEA: Tag = Tag::new(b"vhea");
pub const VMTX: Tag = Tag::new(b"vmtx");
pub const GLYF: Tag = Tag::new(b"glyf");
pub const LOCA: Tag = Tag::new(b"loca");
pub const POST: Tag = Tag::new(b"post");
pub const GSUB: Tag = Tag::new(b"GSUB");
pub const GPOS: Tag = Tag::new(b"GPOS");
pub const GDEF: Tag = Tag::new(b"GDEF");
pub const CFF: Tag = Tag::new(b"CFF ");
pub const CFF2: Tag = Tag::new(b"CFF2");
pub const OS2: Tag = Tag::new(b"OS/2");

const REQUIRED_TABLES: &[Tag] = &[HEAD, MAXP, CMAP, HHEA, HMTX];
const TRUETYPE_TABLES: &[Tag] = &[GLYF, LOCA];

/// Outline technology of a font.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlineFormat {
    TrueType,
    Cff,
}

/// One entry of the table directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableRecord {
    pub tag: Tag,
    pub checksum: u32,
    pub offset: u32,
    pub length: u32,
}

impl TableRecord {
    fn range(&self) -> std::ops::Range<usize> {
        let start = self.offset as usize;
        start..start + self.length as usize
    }
}

/// The validated table directory of an sfnt container.
#[derive(Debug, Clone)]
pub struct TableDirectory {
    pub sfnt_version: u32,
    records: BTreeMap<Tag, TableRecord>,
}

impl TableDirectory {
    /// Parses and bounds-checks the directory of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(SubsetError::malformed(format!(
                "{} bytes is too short for an sfnt header",
                data.len()
            )));
        }
        let font_data = FontData::new(data);
        let sfnt_version: u32 = read(&font_data, 0)?;
        if ![TRUETYPE_SIGNATURE, APPLE_TRUETYPE_SIGNATURE, CFF_SIGNATURE].contains(&sfnt_version) {
            return Err(SubsetError::malformed(format!(
                "unknown sfnt version 0x{sfnt_version:08X}"
            )));
        }

        let num_tables: u16 = read(&font_data, 4)?;
        let directory_end = HEADER_LEN + RECORD_LEN * num_tables as usize;
        if directory_end > data.len() {
            return Err(SubsetError::malformed(format!(
                "directory of {num_tables} tables does not fit in {} bytes",
                data.len()
            )));
        }

        let mut records = BTreeMap::new();
        for i in 0..num_tables as usize {
            let base = HEADER_LEN + i * RECORD_LEN;
            let record = TableRecord {
                tag: read(&font_data, base)?,
                checksum: read(&font_data, base + 4)?,
                offset: read(&font_data, base + 8)?,
                length: read(&font_data, base + 12)?,
            };
            let end = record.offset as u64 + record.length as u64;
            if end > data.len() as u64 {
                return Err(SubsetError::malformed(format!(
                    "table '{}' at {}+{} exceeds file length {}",
                    record.tag,
                    record.offset,
                    record.length,
                    data.len()
                )));
            }
            if records.insert(record.tag, record).is_some() {
                return Err(SubsetError::malformed(format!(
                    "duplicate table '{}'",
                    record.tag
                )));
            }
        }

        Ok(Self {
            sfnt_version,
            records,
        })
    }

    pub fn get(&self, tag: Tag) -> Option<&TableRecord> {
        self.records.get(&tag)
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.records.contains_key(&tag)
    }

    /// Records in ascending tag order.
    pub fn records(&self) -> impl Iterator<Item = &TableRecord> {
        self.records.values()
    }

    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.records.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn read<T: read_fonts::types::Scalar>(data: &FontData, offset: usize) -> Result<T> {
    data.read_at(offset)
        .map_err(|_| SubsetError::malformed(format!("truncated read at offset {offset}")))
}

/// A parsed, read-only source font.
#[derive(Clone)]
pub struct SourceFont<'a> {
    data: &'a [u8],
    directory: TableDirectory,
    units_per_em: u16,
    num_glyphs: u16,
    outline_format: OutlineFormat,
}

impl<'a> SourceFont<'a> {
    /// Parses the container and the global header fields.
    ///
    /// Fails on malformed containers and on missing required tables. CFF
    /// fonts parse successfully and report [`OutlineFormat::Cff`].
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let directory = TableDirectory::parse(data)?;

        let outline_format = if directory.sfnt_version == CFF_SIGNATURE
            || directory.contains(CFF)
            || directory.contains(CFF2)
        {
            OutlineFormat::Cff
        } else {
            OutlineFormat::TrueType
        };

        let required = REQUIRED_TABLES.iter().chain(match outline_format {
            OutlineFormat::TrueType => TRUETYPE_TABLES.iter(),
            OutlineFormat::Cff => [].iter(),
        });
        for tag in required {
            if !directory.contains(*tag) {
                return Err(SubsetError::MissingTable(*tag));
            }
        }

        let mut font = Self {
            data,
            directory,
            units_per_em: 0,
            num_glyphs: 0,
            outline_format,
        };
        font.units_per_em = font.head()?.units_per_em();
        font.num_glyphs = font.maxp()?.num_glyphs();
        Ok(font)
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn directory(&self) -> &TableDirectory {
        &self.directory
    }

    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    pub fn num_glyphs(&self) -> u16 {
        self.num_glyphs
    }

    pub fn outline_format(&self) -> OutlineFormat {
        self.outline_format
    }

    /// Raw bytes of a table, if present.
    pub fn table_bytes(&self, tag: Tag) -> Option<&'a [u8]> {
        let record = self.directory.get(tag)?;
        self.data.get(record.range())
    }

    pub fn has_table(&self, tag: Tag) -> bool {
        self.directory.contains(tag)
    }
}

impl<'a> TableProvider<'a> for SourceFont<'a> {
    fn data_for_tag(&self, tag: Tag) -> Option<FontData<'a>> {
        self.table_bytes(tag).map(FontData::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(version: u32, num_tables: u16) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&version.to_be_bytes());
        data.extend_from_slice(&num_tables.to_be_bytes());
        data.extend_from_slice(&[0; 6]);
        data
    }

    fn record(data: &mut Vec<u8>, tag: &[u8; 4], offset: u32, length: u32) {
        data.extend_from_slice(tag);
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&offset.to_be_bytes());
        data.extend_from_slice(&length.to_be_bytes());
    }

    fn assert_malformed(data: &[u8]) {
        match TableDirectory::parse(data) {
            Err(SubsetError::MalformedContainer { .. }) => {}
            other => panic!("expected MalformedContainer, got {:?}", other),
        }
    }

    #[test]
    fn test_too_short() {
        assert_malformed(&[0, 1, 0, 0]);
        assert_malformed(&[]);
    }

    #[test]
    fn test_unknown_signature() {
        assert_malformed(&header(0x7474_6366, 0)); // 'ttcf'
    }

    #[test]
    fn test_directory_exceeds_length() {
        assert_malformed(&header(TRUETYPE_SIGNATURE, 3));
    }

    #[test]
    fn test_table_out_of_bounds() {
        let mut data = header(TRUETYPE_SIGNATURE, 1);
        record(&mut data, b"name", 28, 100);
        data.extend_from_slice(&[0; 8]);
        assert_malformed(&data);
    }

    #[test]
    fn test_duplicate_tag() {
        let mut data = header(TRUETYPE_SIGNATURE, 2);
        record(&mut data, b"name", 44, 4);
        record(&mut data, b"name", 44, 4);
        data.extend_from_slice(&[0; 4]);
        assert_malformed(&data);
    }

    #[test]
    fn test_valid_directory() {
        let mut data = header(TRUETYPE_SIGNATURE, 2);
        record(&mut data, b"name", 44, 4);
        record(&mut data, b"gasp", 48, 2);
        data.extend_from_slice(&[1, 2, 3, 4, 5, 6, 0, 0]);

        let directory = TableDirectory::parse(&data).unwrap();
        assert_eq!(directory.len(), 2);
        let tags: Vec<Tag> = directory.tags().collect();
        assert_eq!(tags, vec![Tag::new(b"gasp"), Tag::new(b"name")]);
        assert_eq!(directory.get(Tag::new(b"gasp")).unwrap().length, 2);
    }

    #[test]
    fn test_missing_required_table() {
        let mut data = header(TRUETYPE_SIGNATURE, 1);
        record(&mut data, b"name", 28, 4);
        data.extend_from_slice(&[0; 4]);
        match SourceFont::new(&data) {
            Err(SubsetError::MissingTable(tag)) => assert_eq!(tag, HEAD),
            other => panic!("expected MissingTable, got {:?}", other.err()),
        }
    }
}
