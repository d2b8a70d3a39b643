//! glyphtrim CLI library.

pub mod charset;
pub mod check;
pub mod cli;
pub mod io;
pub mod parallel;
pub mod subset;

pub use glyphtrim_font_subsetter::{CharacterSet, CoverageReport, Subsetter};
