//! Command-line options shared by the binaries

use crate::{
    extract::validate_extract_config,
    mask::{Mask, MaskPolicy, MaskSet},
    ExtractConfig, LfvError, LfvResult, ParseMode,
};
use clap::Args;
use std::path::PathBuf;

/// Extraction filters
#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    /// Minimum number of reads supporting an allele
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub min_depth: i64,

    /// Alleles at or above this frequency are dropped
    #[arg(long, default_value_t = 1.0)]
    pub max_freq: f64,

    /// Either "biallelic" or "multiallelic" [default: biallelic]
    #[arg(long)]
    pub parse_type: Option<String>,

    /// Do not store reference alleles
    #[arg(long)]
    pub no_reference: bool,

    /// Text file of masked positions, e.g. "1-55,29804-29904"
    #[arg(long, value_name = "FILE")]
    pub mask_file: Option<PathBuf>,

    /// Either "hide" or "highlight"
    #[arg(long, default_value = "hide")]
    pub mask_policy: String,
}

impl ExtractArgs {
    /// Convert to a validated extraction config, loading the mask file if given
    pub fn to_config(&self) -> LfvResult<ExtractConfig> {
        let mode = self.parse_mode()?.unwrap_or(ParseMode::Biallelic);
        self.build_config(mode)
    }

    /// As `to_config`, but with the parse mode fixed by the caller.
    ///
    /// An explicit `--parse-type` is still validated; a different value is
    /// overridden with a warning.
    pub fn to_config_with_mode(&self, mode: ParseMode) -> LfvResult<ExtractConfig> {
        if let Some(requested) = self.parse_mode()? {
            if requested != mode {
                log::warn!("--parse-type {} ignored, using {}", requested, mode);
            }
        }
        self.build_config(mode)
    }

    fn parse_mode(&self) -> LfvResult<Option<ParseMode>> {
        self.parse_type.as_deref().map(|s| s.parse::<ParseMode>()).transpose()
    }

    fn build_config(&self, mode: ParseMode) -> LfvResult<ExtractConfig> {
        let policy: MaskPolicy = self.mask_policy.parse()?;

        let config = ExtractConfig {
            min_depth: self.min_depth,
            max_freq: self.max_freq,
            mode,
            keep_reference: !self.no_reference,
            mask: None,
        };
        // Validate before touching the mask file
        validate_extract_config(&config)?;

        let mask = match &self.mask_file {
            Some(path) => Some(Mask::new(MaskSet::from_path(path)?, policy)),
            None => None,
        };

        Ok(ExtractConfig { mask, ..config })
    }
}

/// Logging and overwrite flags
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Force overwrite of output file if it exists
    #[arg(short, long)]
    pub force: bool,
}

/// Print a user-friendly message for an error and exit
pub fn handle_error(error: LfvError) -> ! {
    match error {
        LfvError::FileNotFound(path) => {
            eprintln!("Error: File not found: {}", path);
            eprintln!("Please check that the file exists and is readable.");
        }
        LfvError::InvalidConfig(msg) => {
            eprintln!("Error: Invalid configuration: {}", msg);
            eprintln!("Please check --min-depth, --max-freq, --parse-type and --mask-policy.");
        }
        LfvError::MalformedRecord(msg) => {
            eprintln!("Error: Malformed variant data: {}", msg);
            eprintln!("Every record needs an ALT allele, INFO/DP4 and a non-zero depth.");
        }
        LfvError::ReferenceTooShort { position, length } => {
            eprintln!(
                "Error: Variant at position {} lies beyond the reference (length {}).",
                position, length
            );
            eprintln!("Please check that the VCF was called against this reference.");
        }
        LfvError::InvalidMask(msg) => {
            eprintln!("Error: Invalid mask file: {}", msg);
            eprintln!("Expected comma-separated positions or ranges such as 1-55,100.");
        }
        LfvError::Htslib(ref e) => {
            eprintln!("Error: BCF processing error: {}", e);
            eprintln!("Please check that your BCF file is valid.");
        }
        LfvError::Io(ref e) => {
            eprintln!("Error: I/O error: {}", e);
            eprintln!("Please check file permissions and disk space.");
        }
        LfvError::Csv(ref e) => {
            eprintln!("Error: Table writing error: {}", e);
        }
    }
    std::process::exit(1);
}
