//! Font subsetting driven by target character sets.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use glyphtrim_font_subsetter::{CharacterSet, CoverageReport, Subsetter};
use log::{info, warn};

use crate::{io::FontFile, parallel::process_parallel_iter};

/// One input font and where its subset goes.
#[derive(Debug, Clone)]
pub struct SubsetJob {
    pub input: FontFile,
    pub output: FontFile,
}

/// Pairs every input with its output path.
///
/// An explicit `output` is only accepted for a single input. Otherwise each
/// subset is written as `NAME.subset.EXT`, inside `output_dir` when given.
pub fn plan_jobs(
    inputs: &[PathBuf],
    output: Option<&Path>,
    output_dir: Option<&Path>,
) -> Result<Vec<SubsetJob>> {
    if inputs.is_empty() {
        bail!("No input fonts given");
    }
    if let Some(output) = output {
        if inputs.len() > 1 {
            bail!("--output takes a single input; use --output-dir for {} fonts", inputs.len());
        }
        return Ok(vec![SubsetJob {
            input: FontFile::new(&inputs[0]),
            output: FontFile::new(output),
        }]);
    }
    Ok(inputs
        .iter()
        .map(|path| {
            let input = FontFile::new(path);
            let output = FontFile::new(input.subset_path(output_dir));
            SubsetJob { input, output }
        })
        .collect())
}

/// Subset a font file to an output path using the given subsetter.
pub fn subset_file(
    subsetter: &Subsetter,
    targets: &CharacterSet,
    job: &SubsetJob,
) -> Result<CoverageReport> {
    let data = job.input.read()?;
    let output = subsetter
        .subset(&data, targets)
        .with_context(|| format!("Failed to subset {}", job.input.path().display()))?;
    job.output.write(&output.data)?;

    let report = output.report;
    let input_size = report.original_size_bytes as f64 / 1024.0 / 1024.0;
    let output_size = report.subset_size_bytes as f64 / 1024.0 / 1024.0;
    info!(
        "Subset {} -> {} ({input_size:.2} MB -> {output_size:.2} MB, {:.1}% reduction)",
        job.input.file_name(),
        job.output.file_name(),
        report.reduction_percent()
    );
    if !report.is_complete() {
        warn!(
            "{}: {} of {} characters not covered",
            job.input.file_name(),
            report.uncovered.len(),
            report.requested_count
        );
    }
    println!("{}: {report}", job.output.path().display());
    Ok(report)
}

/// Subsets every job in parallel; fails if any job failed.
pub fn subset_batch(subsetter: &Subsetter, targets: &CharacterSet, jobs: &[SubsetJob]) -> Result<()> {
    info!("Subsetting {} fonts to {} characters", jobs.len(), targets.len());
    process_parallel_iter("Subset", jobs, |job| subset_file(subsetter, targets, job))
        .ok_or_bail("Subset")
}
