//! CLI binary for pairwise shared-variant statistics over a directory of VCFs

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};
use lfv_rs::{
    cli::{CommonArgs, ExtractArgs},
    cohort::{
        compare_histograms, extract_directory, frequency_matrix, pairwise_shared_counts,
        position_sharing, shared_count_histogram, write_frequency_matrix, PairSummary,
        SharedCountComparison,
    },
    utils::{check_output, create_output, ensure_parent_dirs, init_logging, Timer},
    ExtractConfig,
};

#[derive(Parser)]
#[command(name = "lfv_cohort")]
#[command(about = "Count shared low-frequency variants for every pair of samples")]
#[command(long_about = "
Extracts low-frequency variants from every VCF in a directory (in parallel),
then treats each ordered pair of distinct samples as a donor/recipient pair
and counts the alleles they share.

Writes a TSV with columns donor, recipient and shared_count. The histogram of
pairs per shared count and the most frequently shared positions are logged at
info level.

With --mask-file the comparison is repeated on the complete genome, and the
pairs per shared count with and without the mask are logged (and written to
--comparison when given).

--matrix writes the sample-by-position frequency table used for heatmaps.

Files that fail extraction are reported and skipped.
")]
struct Args {
    /// Directory of VCF files
    #[arg(long, value_name = "DIR")]
    vcf_dir: PathBuf,

    /// Path to the output TSV file
    #[arg(long, value_name = "FILE")]
    output: PathBuf,

    /// Number of top shared positions to report
    #[arg(long, default_value_t = 10)]
    top_positions: usize,

    /// Write the sample-by-position frequency matrix to this TSV
    #[arg(long, value_name = "FILE")]
    matrix: Option<PathBuf>,

    /// Write complete-vs-masked shared-count histograms to this TSV (needs --mask-file)
    #[arg(long, value_name = "FILE")]
    comparison: Option<PathBuf>,

    #[command(flatten)]
    extract: ExtractArgs,

    #[command(flatten)]
    common: CommonArgs,
}

fn write_rows<T: serde::Serialize>(rows: &[T], output: &Path) -> Result<()> {
    let writer = create_output(output)?;
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Shared counts over the unmasked genome next to the masked ones
fn complete_vs_masked(
    vcf_dir: &Path,
    config: &ExtractConfig,
    masked_pairs: &[PairSummary],
) -> Result<Vec<SharedCountComparison>> {
    let complete_config = ExtractConfig {
        mask: None,
        ..config.clone()
    };
    let complete = extract_directory(vcf_dir, &complete_config)
        .with_context(|| format!("cannot read VCF directory {:?}", vcf_dir))?;
    let complete_pairs = pairwise_shared_counts(&complete.samples);

    Ok(compare_histograms(
        &shared_count_histogram(&complete_pairs),
        &shared_count_histogram(masked_pairs),
    ))
}

fn run() -> Result<()> {
    let args = Args::parse();
    init_logging(args.common.verbose, args.common.debug);

    let config = args
        .extract
        .to_config()
        .context("invalid extraction options")?;
    if args.comparison.is_some() && config.mask.is_none() {
        bail!("--comparison needs --mask-file");
    }
    for output in [Some(&args.output), args.matrix.as_ref(), args.comparison.as_ref()]
        .into_iter()
        .flatten()
    {
        check_output(output, args.common.force)?;
        ensure_parent_dirs(output)?;
    }

    let _timer = Timer::new("Cohort comparison");
    let cohort = extract_directory(&args.vcf_dir, &config)
        .with_context(|| format!("cannot read VCF directory {:?}", args.vcf_dir))?;

    for (path, error) in &cohort.failures {
        eprintln!("Warning: skipped {}: {}", path.display(), error);
    }
    if cohort.samples.len() < 2 {
        bail!(
            "need at least two readable samples in {:?}, found {}",
            args.vcf_dir,
            cohort.samples.len()
        );
    }

    let mut pairs = pairwise_shared_counts(&cohort.samples);
    pairs.sort_by(|a, b| (&a.donor, &a.recipient).cmp(&(&b.donor, &b.recipient)));
    log::info!("Compared {} sample pairs", pairs.len());

    for (shared, count) in shared_count_histogram(&pairs) {
        log::info!("  {} shared variants: {} pairs", shared, count);
    }

    let mut positions: Vec<(u32, usize)> = position_sharing(&pairs).into_iter().collect();
    positions.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    for (position, count) in positions.iter().take(args.top_positions) {
        log::info!("  position {} shared by {} pairs", position, count);
    }

    write_rows(&pairs, &args.output)
        .with_context(|| format!("cannot write {:?}", args.output))?;
    log::info!("Pair table written to: {:?}", args.output);

    if let Some(path) = &args.matrix {
        write_frequency_matrix(&frequency_matrix(&cohort.samples), path)
            .with_context(|| format!("cannot write {:?}", path))?;
        log::info!("Frequency matrix written to: {:?}", path);
    }

    if config.mask.is_some() {
        let comparison = complete_vs_masked(&args.vcf_dir, &config, &pairs)?;
        for row in &comparison {
            log::info!(
                "  {} shared variants: {} pairs complete, {} pairs masked",
                row.shared_count,
                row.complete_pairs,
                row.masked_pairs
            );
        }
        if let Some(path) = &args.comparison {
            write_rows(&comparison, path).with_context(|| format!("cannot write {:?}", path))?;
            log::info!("Mask comparison written to: {:?}", path);
        }
    }

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lfv_rs::mask::{Mask, MaskPolicy, MaskSet};
    use tempfile::tempdir;

    #[test]
    fn test_cohort_workflow() {
        let dir = tempdir().unwrap();
        for (name, alt) in [("a.vcf", "G"), ("b.vcf", "G"), ("c.vcf", "T")] {
            let mut file = std::fs::File::create(dir.path().join(name)).unwrap();
            writeln!(file, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO").unwrap();
            writeln!(file, "ref\t5\t.\tA\t{}\t.\tPASS\tDP=10;DP4=4,4,1,1", alt).unwrap();
        }

        let config = ExtractConfig {
            max_freq: 0.5,
            keep_reference: false,
            ..Default::default()
        };
        let cohort = extract_directory(dir.path(), &config).unwrap();
        let pairs = pairwise_shared_counts(&cohort.samples);

        let out_dir = tempdir().unwrap();
        let output = out_dir.path().join("pairs.tsv");
        write_rows(&pairs, &output).unwrap();

        let table = std::fs::read_to_string(&output).unwrap();
        assert!(table.starts_with("donor\trecipient\tshared_count\n"));
        assert!(table.contains("a\tb\t1"));
        assert!(table.contains("a\tc\t0"));
        assert_eq!(table.lines().count(), 7);
    }

    #[test]
    fn test_complete_vs_masked() {
        let dir = tempdir().unwrap();
        for name in ["a.vcf", "b.vcf"] {
            let mut file = std::fs::File::create(dir.path().join(name)).unwrap();
            writeln!(file, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO").unwrap();
            writeln!(file, "ref\t5\t.\tA\tG\t.\tPASS\tDP=10;DP4=4,4,1,1").unwrap();
        }

        let config = ExtractConfig {
            max_freq: 0.5,
            keep_reference: false,
            mask: Some(Mask::new(MaskSet::parse("5").unwrap(), MaskPolicy::Hide)),
            ..Default::default()
        };
        let masked = extract_directory(dir.path(), &config).unwrap();
        let pairs = pairwise_shared_counts(&masked.samples);
        let comparison = complete_vs_masked(dir.path(), &config, &pairs).unwrap();

        assert_eq!(
            comparison,
            vec![
                SharedCountComparison { shared_count: 0, complete_pairs: 0, masked_pairs: 2 },
                SharedCountComparison { shared_count: 1, complete_pairs: 2, masked_pairs: 0 },
            ]
        );

        let out_dir = tempdir().unwrap();
        let output = out_dir.path().join("comparison.tsv");
        write_rows(&comparison, &output).unwrap();
        let table = std::fs::read_to_string(&output).unwrap();
        assert!(table.starts_with("shared_count\tcomplete_pairs\tmasked_pairs\n0\t0\t2\n"));
    }
}
