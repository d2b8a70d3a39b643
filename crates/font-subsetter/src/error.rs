//! Error types for font subsetting.

use std::result;

use read_fonts::{ReadError, types::Tag};
use thiserror::Error;
use write_fonts::error;

use crate::types::GlyphId;

/// Errors that abort a subsetting run.
///
/// Characters the font does not cover are not errors; they are listed in
/// [`CoverageReport::uncovered`](crate::CoverageReport::uncovered).
#[derive(Error, Debug)]
pub enum SubsetError {
    #[error("malformed font container: {reason}")]
    MalformedContainer { reason: String },

    #[error("required table '{0}' not found")]
    MissingTable(Tag),

    #[error("CFF outlines are not supported; only glyf-based fonts can be subset")]
    UnsupportedOutlines,

    #[error("composite nesting below {glyph} exceeds the depth limit of {limit}")]
    CompositeDepthExceeded { glyph: GlyphId, limit: u16 },

    #[error("composite glyph {glyph} references itself")]
    CompositeCycle { glyph: GlyphId },

    #[error("table '{table}' references {glyph}, which is not in the retained set")]
    RemapGap { table: Tag, glyph: GlyphId },

    #[error("subset font failed verification: {reason}")]
    VerificationFailed { reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("font declares more glyphs than a glyf table can address")]
    TooManyGlyphs,

    #[error("failed to read font: {0}")]
    Read(#[from] ReadError),

    #[error("failed to write table: {0}")]
    Write(#[from] error::Error),
}

impl SubsetError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedContainer { reason: reason.into() }
    }

    pub(crate) fn verification(reason: impl Into<String>) -> Self {
        Self::VerificationFailed { reason: reason.into() }
    }
}

pub type Result<T> = result::Result<T, SubsetError>;
