//! CLI binary for extracting low-frequency variants from one VCF file

use clap::Parser;
use std::path::PathBuf;
use lfv_rs::{
    cli::{handle_error, CommonArgs, ExtractArgs},
    extract::{extract_lfv, write_variant_table},
    utils::{check_output, ensure_parent_dirs, init_logging, validate_file_readable, Timer},
    LfvResult,
};

#[derive(Parser)]
#[command(name = "lfv_extract")]
#[command(about = "Extract low-frequency variants from a VCF file")]
#[command(long_about = "
Scans a VCF (plain, gzipped or BCF) and reports every allele whose supporting
read count reaches --min-depth and whose frequency stays below --max-freq.

Depths are taken from INFO/DP4 (alt-forward + alt-reverse reads) and INFO/DP.
Reference alleles are stored from the depth left over once every alt call at
the position has been subtracted, unless --no-reference is given.

In biallelic mode only the most frequent qualifying allele per position is
kept; multiallelic mode keeps them all.

The output is a TSV with columns position, allele, frequency, depth,
total_depth and highlighted.
")]
struct Args {
    /// Path to the input VCF file
    #[arg(long, value_name = "FILE")]
    input_vcf: PathBuf,

    /// Path to the output TSV file (.gz for compressed output)
    #[arg(long, value_name = "FILE")]
    output: PathBuf,

    #[command(flatten)]
    extract: ExtractArgs,

    #[command(flatten)]
    common: CommonArgs,
}

fn run() -> LfvResult<()> {
    let args = Args::parse();
    init_logging(args.common.verbose, args.common.debug);

    log::info!("Starting LFV extraction");
    log::info!("Input VCF: {:?}", args.input_vcf);
    log::info!("Output: {:?}", args.output);

    let config = args.extract.to_config()?;
    log::info!(
        "Configuration: min_depth={}, max_freq={}, mode={}, keep_reference={}",
        config.min_depth,
        config.max_freq,
        config.mode,
        config.keep_reference
    );

    validate_file_readable(&args.input_vcf)?;
    check_output(&args.output, args.common.force)?;
    ensure_parent_dirs(&args.output)?;

    let _timer = Timer::new("Extracting variants");
    let variants = extract_lfv(&args.input_vcf, &config)?;

    if variants.is_empty() {
        log::warn!("No low-frequency variants passed the filters");
    }
    if !variants.highlighted().is_empty() {
        log::info!("{} masked positions highlighted", variants.highlighted().len());
    }

    write_variant_table(&variants, &args.output)?;
    log::info!("Variant table written to: {:?}", args.output);

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        handle_error(e);
    }
}
