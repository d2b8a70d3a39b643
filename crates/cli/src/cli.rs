//! CLI definitions and command dispatch.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use glyphtrim_font_subsetter::{ClosurePolicy, DEFAULT_COMPOSITE_DEPTH_LIMIT, Subsetter};

use crate::{
    charset::TargetArgs,
    check::{DEFAULT_PROBES, check_font},
    io::glob_fonts,
    subset::{plan_jobs, subset_batch},
};

#[derive(Parser)]
#[command(name = "glyphtrim")]
#[command(about = "Subset TrueType fonts down to the characters you need")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// How substitution rules pull glyphs into a subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// Keep a substitution's output only when its whole input is kept
    Strict,
    /// Keep a substitution's output when any of its input is kept
    Permissive,
}

impl From<PolicyArg> for ClosurePolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::Strict => ClosurePolicy::Strict,
            PolicyArg::Permissive => ClosurePolicy::Permissive,
        }
    }
}

#[derive(Debug, Clone, clap::Args)]
pub struct SubsetArgs {
    /// Fonts to subset
    pub inputs: Vec<PathBuf>,
    /// Also subset fonts matching --pattern in this directory
    #[arg(long)]
    pub input_dir: Option<PathBuf>,
    #[arg(long, default_value = "*.ttf")]
    pub pattern: String,
    /// Output file (single input only)
    #[arg(short, long, conflicts_with = "output_dir")]
    pub output: Option<PathBuf>,
    /// Directory for NAME.subset.EXT outputs
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
    #[command(flatten)]
    pub targets: TargetArgs,
    #[arg(long, value_enum, default_value = "strict")]
    pub policy: PolicyArg,
    /// Drop GSUB, GPOS and GDEF instead of rebuilding them
    #[arg(long)]
    pub drop_layout: bool,
    #[arg(long, default_value_t = DEFAULT_COMPOSITE_DEPTH_LIMIT)]
    pub composite_depth_limit: u16,
    /// Keep post glyph names
    #[arg(long)]
    pub retain_glyph_names: bool,
}

impl SubsetArgs {
    pub fn subsetter(&self) -> Subsetter {
        Subsetter::new()
            .closure_policy(self.policy.into())
            .retain_layout_tables(!self.drop_layout)
            .composite_depth_limit(self.composite_depth_limit)
            .retain_glyph_names(self.retain_glyph_names)
    }

    /// Explicit inputs followed by any matched in `--input-dir`.
    pub fn input_paths(&self) -> Result<Vec<PathBuf>> {
        let mut inputs = self.inputs.clone();
        if let Some(dir) = &self.input_dir {
            let found = glob_fonts(dir, &self.pattern)?;
            if found.is_empty() {
                bail!("No fonts matching '{}' in {}", self.pattern, dir.display());
            }
            inputs.extend(found);
        }
        Ok(inputs)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Subset fonts to a target character set
    Subset {
        #[command(flatten)]
        args: SubsetArgs,
    },
    /// Report a font's size, character count and coverage of probe characters
    Check {
        font: PathBuf,
        /// Characters to probe
        #[arg(long, default_value = DEFAULT_PROBES)]
        probe: String,
    },
}

impl Commands {
    pub fn run(self) -> Result<()> {
        match self {
            Commands::Subset { args } => {
                let targets = args.targets.build()?;
                let jobs = plan_jobs(
                    &args.input_paths()?,
                    args.output.as_deref(),
                    args.output_dir.as_deref(),
                )?;
                subset_batch(&args.subsetter(), &targets, &jobs)?;
            }
            Commands::Check { font, probe } => {
                let report = check_font(&font, &probe)?;
                println!("{report}");
            }
        }
        Ok(())
    }
}
