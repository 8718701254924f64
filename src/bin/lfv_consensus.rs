//! CLI binary for building consensus sequences from VCF files

use clap::Parser;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use lfv_rs::{
    cli::{handle_error, CommonArgs, ExtractArgs},
    cohort::{consensus_groups, extract_directory, map_consensus},
    consensus::{build_consensus, Selection},
    extract::extract_lfv,
    fasta::{read_reference, write_fasta, LINE_WRAP},
    utils::{check_output, create_output, init_logging, sample_name, validate_file_readable, Timer},
    LfvResult,
};

#[derive(Parser)]
#[command(name = "lfv_consensus")]
#[command(about = "Build consensus genomes from VCF files and a reference")]
#[command(long_about = "
Substitutes observed alleles into a reference genome and writes one FASTA file
per sample, named after the VCF file (up to its first '.') with a .fna
extension.

--selection majority keeps the most frequent allele at each position;
--selection minor keeps the second most frequent one and needs multiallelic
extraction, so the parse type is chosen from the selection.

--input may be a single VCF or a directory of VCF files, which are processed
in parallel. For a directory, samples with identical consensus sequences are
grouped; --groups writes one group per line.
")]
struct Args {
    /// VCF file or directory of VCF files
    #[arg(long, value_name = "PATH")]
    input: PathBuf,

    /// Reference FASTA file (first record is used)
    #[arg(long, value_name = "FILE")]
    reference: PathBuf,

    /// Directory for the output FASTA files
    #[arg(long, value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Either "majority" or "minor"
    #[arg(long, default_value = "majority")]
    selection: String,

    /// Write groups of samples sharing a consensus sequence to this file
    #[arg(long, value_name = "FILE")]
    groups: Option<PathBuf>,

    /// FASTA line width
    #[arg(long, default_value_t = LINE_WRAP)]
    line_length: usize,

    #[command(flatten)]
    extract: ExtractArgs,

    #[command(flatten)]
    common: CommonArgs,
}

fn write_sample(name: &str, sequence: &str, args: &Args) -> LfvResult<PathBuf> {
    let path = args.output_dir.join(format!("{}.fna", name));
    check_output(&path, args.common.force)?;
    write_fasta(name, sequence, &path, args.line_length)?;
    Ok(path)
}

/// One line per group, member names separated by tabs
fn write_groups(groups: &[Vec<String>], output: &Path) -> LfvResult<()> {
    let mut writer = create_output(output)?;
    for group in groups {
        writeln!(writer, "{}", group.join("\t"))?;
    }
    writer.flush()?;
    Ok(())
}

fn run_single(vcf: &Path, reference: &str, selection: Selection, args: &Args) -> LfvResult<()> {
    validate_file_readable(vcf)?;
    let config = args.extract.to_config_with_mode(selection.parse_mode())?;

    let variants = extract_lfv(vcf, &config)?;
    let consensus = build_consensus(reference, &variants, selection)?;
    let path = write_sample(&sample_name(vcf), &consensus, args)?;
    log::info!("Consensus written to: {:?}", path);

    Ok(())
}

fn run_directory(dir: &Path, reference: &str, selection: Selection, args: &Args) -> LfvResult<()> {
    let config = args.extract.to_config_with_mode(selection.parse_mode())?;

    let cohort = extract_directory(dir, &config)?;
    let sequences = map_consensus(&cohort.samples, reference, selection);

    let mut built = BTreeMap::new();
    for (name, result) in sequences {
        match result {
            Ok(sequence) => {
                let path = write_sample(&name, &sequence, args)?;
                log::debug!("Consensus for {} written to {:?}", name, path);
                built.insert(name, sequence);
            }
            Err(e) => log::warn!("No consensus for {}: {}", name, e),
        }
    }
    let written = built.len();

    let groups = consensus_groups(&built);
    log::info!("{} distinct consensus sequences among {} samples", groups.len(), written);
    if let Some(path) = &args.groups {
        check_output(path, args.common.force)?;
        write_groups(&groups, path)?;
        log::info!("Consensus groups written to: {:?}", path);
    }

    log::info!(
        "Wrote {} consensus sequences ({} files failed extraction)",
        written,
        cohort.failures.len()
    );
    Ok(())
}

fn run() -> LfvResult<()> {
    let args = Args::parse();
    init_logging(args.common.verbose, args.common.debug);

    let selection: Selection = args.selection.parse()?;
    log::info!("Starting {} consensus build", selection);
    log::info!("Input: {:?}", args.input);
    log::info!("Reference: {:?}", args.reference);

    validate_file_readable(&args.reference)?;
    std::fs::create_dir_all(&args.output_dir)?;

    let _timer = Timer::new("Building consensus");
    let reference = read_reference(&args.reference)?;
    log::info!("Reference length: {}", reference.len());

    if args.input.is_dir() {
        run_directory(&args.input, &reference, selection, &args)
    } else {
        run_single(&args.input, &reference, selection, &args)
    }
}

fn main() {
    if let Err(e) = run() {
        handle_error(e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lfv_rs::ExtractConfig;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_consensus_workflow() {
        let dir = tempdir().unwrap();
        let vcf_path = dir.path().join("sample1.lowfreq.vcf");
        let mut vcf_file = std::fs::File::create(&vcf_path).unwrap();
        writeln!(vcf_file, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO").unwrap();
        writeln!(vcf_file, "ref\t3\t.\tG\tA\t.\tPASS\tDP=10;DP4=1,1,4,4").unwrap();

        let mut reference = NamedTempFile::new().unwrap();
        writeln!(reference, ">ref").unwrap();
        writeln!(reference, "ACGTACGT").unwrap();

        let config = ExtractConfig::default();
        let cohort = extract_directory(dir.path(), &config).unwrap();
        let reference = read_reference(reference.path()).unwrap();
        let sequences = map_consensus(&cohort.samples, &reference, Selection::Majority);

        let out = dir.path().join("sample1.fna");
        write_fasta("sample1", sequences["sample1"].as_ref().unwrap(), &out, LINE_WRAP).unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), ">sample1\nACATACGT\n");
    }

    #[test]
    fn test_identical_consensus_grouped() {
        let dir = tempdir().unwrap();
        for (name, alt) in [("s1.vcf", "A"), ("s2.vcf", "T"), ("s3.vcf", "A")] {
            let mut file = std::fs::File::create(dir.path().join(name)).unwrap();
            writeln!(file, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO").unwrap();
            writeln!(file, "ref\t3\t.\tG\t{}\t.\tPASS\tDP=10;DP4=1,1,4,4", alt).unwrap();
        }

        let cohort = extract_directory(dir.path(), &ExtractConfig::default()).unwrap();
        let built: BTreeMap<String, String> = map_consensus(&cohort.samples, "ACGTACGT", Selection::Majority)
            .into_iter()
            .map(|(name, result)| (name, result.unwrap()))
            .collect();
        let groups = consensus_groups(&built);

        let output = dir.path().join("groups.txt");
        write_groups(&groups, &output).unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "s1\ts3\ns2\n");
    }
}
