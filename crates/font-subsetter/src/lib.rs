//! Table-level TrueType subsetting.
//!
//! This crate reduces a font binary to the glyphs needed to render a target
//! character set. Glyph outlines are never decoded or re-encoded: retained
//! glyphs are copied verbatim, and every glyph-indexed table is rebuilt
//! through a single old-to-new glyph ID remap. Each output is re-parsed and
//! verified before it is returned. It operates purely on byte slices with no
//! file I/O.
//!
//! # Example
//!
//! ```no_run
//! use glyphtrim_font_subsetter::{CharacterSet, Subsetter, subset};
//!
//! let font_data: &[u8] = &[];
//!
//! // Using the builder pattern
//! let targets = CharacterSet::new().with_range(0x20, 0x7E);
//! let output = Subsetter::new()
//!     .retain_layout_tables(false)
//!     .subset(font_data, &targets)?;
//! println!("{}", output.report);
//!
//! // Using the convenience function
//! let output = subset(font_data, &CharacterSet::from_text("，。！？"))?;
//! assert_eq!(output.report.covered_count + output.report.uncovered.len(), 4);
//! # Ok::<(), glyphtrim_font_subsetter::SubsetError>(())
//! ```

pub mod charmap;
pub mod closure;
pub mod directory;
pub mod error;
pub mod options;
pub mod remap;
pub mod report;
pub mod rules;
pub mod serialize;
pub mod tables;
pub mod types;
pub mod verify;

mod subsetter;

pub use charmap::{CharacterMap, CmapResolution};
pub use closure::{ClosureComputer, CompositeSource, GlyfSource, RetainedSet};
pub use directory::{OutlineFormat, SourceFont, TableDirectory, TableRecord};
pub use error::{Result, SubsetError};
pub use options::{ClosurePolicy, DEFAULT_COMPOSITE_DEPTH_LIMIT};
pub use remap::IdRemap;
pub use report::CoverageReport;
pub use rules::SubstitutionRule;
pub use subsetter::{SubsetOutput, Subsetter, subset};
pub use types::{CharacterSet, Codepoint, GlyphId};
