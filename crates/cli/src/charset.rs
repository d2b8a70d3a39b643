//! Building target character sets from text, files, ranges and presets.

use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use glyphtrim_font_subsetter::CharacterSet;

/// Common Chinese punctuation, including the doubled ellipsis and dash.
pub const CHINESE_PUNCTUATION: &str = "，。！？；：“”‘’（）【】《》……——、";

/// Built-in character groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// Printable ASCII (U+0020-007E)
    Ascii,
    /// CJK Symbols and Punctuation (U+3000-303F)
    CjkPunctuation,
    /// Halfwidth and Fullwidth Forms (U+FF00-FFEF)
    Fullwidth,
    /// Common Chinese punctuation marks
    ChinesePunctuation,
}

impl Preset {
    pub fn characters(self) -> CharacterSet {
        match self {
            Preset::Ascii => CharacterSet::new().with_range(0x20, 0x7E),
            Preset::CjkPunctuation => CharacterSet::new().with_range(0x3000, 0x303F),
            Preset::Fullwidth => CharacterSet::new().with_range(0xFF00, 0xFFEF),
            Preset::ChinesePunctuation => CharacterSet::from_text(CHINESE_PUNCTUATION),
        }
    }
}

/// Parses a comma-separated list of codepoints and inclusive ranges, e.g.
/// `U+0020-007E,U+3000-303F,4E00`.
pub fn parse_unicodes(s: &str) -> Result<Vec<(u32, u32)>> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let (start, end) = match item.split_once('-') {
                Some((start, end)) => (parse_codepoint(start)?, parse_codepoint(end)?),
                None => {
                    let cp = parse_codepoint(item)?;
                    (cp, cp)
                }
            };
            if start > end {
                bail!("Invalid range '{item}': start is after end");
            }
            if end > 0x10FFFF {
                bail!("Invalid range '{item}': beyond U+10FFFF");
            }
            Ok((start, end))
        })
        .collect()
}

/// One `--unicodes` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnicodeRanges(pub Vec<(u32, u32)>);

fn parse_unicodes_arg(s: &str) -> std::result::Result<UnicodeRanges, String> {
    parse_unicodes(s).map(UnicodeRanges).map_err(|e| format!("{e:#}"))
}

fn parse_codepoint(s: &str) -> Result<u32> {
    let s = s.trim();
    let hex = s
        .strip_prefix("U+")
        .or_else(|| s.strip_prefix("u+"))
        .or_else(|| s.strip_prefix("0x"))
        .unwrap_or(s);
    u32::from_str_radix(hex, 16).with_context(|| format!("Invalid codepoint '{s}'"))
}

/// Reads a character list file. Line breaks are not part of the set.
pub fn read_text_file(path: &Path) -> Result<CharacterSet> {
    let text = read_to_string(path)
        .with_context(|| format!("Failed to read character file: {}", path.display()))?;
    Ok(text.chars().filter(|c| !matches!(c, '\n' | '\r')).collect())
}

/// Every source of target characters given on the command line.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct TargetArgs {
    /// Characters to keep
    #[arg(long)]
    pub text: Option<String>,
    /// Files whose characters to keep
    #[arg(long = "text-file")]
    pub text_files: Vec<PathBuf>,
    /// Codepoints and ranges to keep, e.g. U+0020-007E,U+3000-303F
    #[arg(long, value_parser = parse_unicodes_arg)]
    pub unicodes: Vec<UnicodeRanges>,
    /// Built-in character groups to keep
    #[arg(long = "preset", value_enum)]
    pub presets: Vec<Preset>,
}

impl TargetArgs {
    /// Unions every source into one character set.
    pub fn build(&self) -> Result<CharacterSet> {
        let mut set = self.text.as_deref().map(CharacterSet::from_text).unwrap_or_default();
        for path in &self.text_files {
            set.extend_from(&read_text_file(path)?);
        }
        for (start, end) in self.unicodes.iter().flat_map(|ranges| &ranges.0) {
            set.insert_range(*start, *end);
        }
        for preset in &self.presets {
            set.extend_from(&preset.characters());
        }
        if set.is_empty() {
            bail!("No target characters given; use --text, --text-file, --unicodes or --preset");
        }
        Ok(set)
    }
}
