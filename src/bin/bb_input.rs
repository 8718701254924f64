//! CLI binary for writing bottleneck-estimator input from a donor/recipient pair

use clap::Parser;
use std::path::PathBuf;
use lfv_rs::{
    cli::{handle_error, CommonArgs, ExtractArgs},
    extract::extract_lfv,
    reconcile::{bottleneck_output_path, reconcile, write_bottleneck_input, DEFAULT_CALLING_THRESHOLD},
    utils::{check_output, init_logging, validate_file_readable, Timer},
    LfvResult,
};

#[derive(Parser)]
#[command(name = "bb_input")]
#[command(about = "Write bottleneck-estimator input for a donor/recipient VCF pair")]
#[command(long_about = "
Extracts low-frequency variants from a donor and a recipient VCF with the same
filters, then pairs every donor allele with the recipient's frequency for the
same allele at the same position (0 when the recipient lacks it).

Each donor allele above --threshold becomes one tab-separated line:
donor frequency, recipient frequency (plus donor and recipient depth with
--weighted).

Unless --output is given the file is named
new_<donor>_<recipient>_thred<shared>_complete_nofilter_bbn.txt, where donor and
recipient are the VCF names up to their first '_' and shared is the number of
alleles found in both samples.
")]
struct Args {
    /// Donor VCF file
    #[arg(long, value_name = "FILE")]
    donor: PathBuf,

    /// Recipient VCF file
    #[arg(long, value_name = "FILE")]
    recipient: PathBuf,

    /// Output file; derived from the sample names when omitted
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Directory for the derived output file name
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Donor frequency a variant must exceed to be written
    #[arg(long, default_value_t = DEFAULT_CALLING_THRESHOLD)]
    threshold: f64,

    /// Append donor and recipient read depths
    #[arg(long)]
    weighted: bool,

    #[command(flatten)]
    extract: ExtractArgs,

    #[command(flatten)]
    common: CommonArgs,
}

fn run() -> LfvResult<()> {
    let args = Args::parse();
    init_logging(args.common.verbose, args.common.debug);

    log::info!("Starting bottleneck input generation");
    log::info!("Donor VCF: {:?}", args.donor);
    log::info!("Recipient VCF: {:?}", args.recipient);

    let config = args.extract.to_config()?;
    validate_file_readable(&args.donor)?;
    validate_file_readable(&args.recipient)?;

    let _timer = Timer::new("Reconciling donor and recipient");
    let (donor, recipient) = rayon::join(
        || extract_lfv(&args.donor, &config),
        || extract_lfv(&args.recipient, &config),
    );
    let pair = reconcile(&donor?, &recipient?);
    log::info!("Shared variants: {}", pair.shared_count);

    let output = match &args.output {
        Some(path) => path.clone(),
        None => bottleneck_output_path(
            &args.donor,
            &args.recipient,
            pair.shared_count,
            args.output_dir.as_deref(),
        ),
    };
    check_output(&output, args.common.force)?;
    if let Some(dir) = &args.output_dir {
        std::fs::create_dir_all(dir)?;
    }

    let written = write_bottleneck_input(&pair, args.threshold, args.weighted, &output)?;
    log::info!("Wrote {} variant lines to {:?}", written, output);

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        handle_error(e);
    }
}
