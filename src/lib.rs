//! # lfv-rs - Low-Frequency Variant toolkit
//!
//! Extracts low-frequency variants from viral VCF files, reconciles donor and
//! recipient calls for transmission pairs, and derives consensus genomes from
//! a reference sequence.

pub mod cli;
pub mod cohort;
pub mod consensus;
pub mod extract;
pub mod fasta;
pub mod mask;
pub mod reconcile;
pub mod record;
pub mod utils;
pub mod variant_map;
pub mod vcf;

use mask::Mask;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use variant_map::VariantMap;

/// One allele call at one position: the reads supporting it out of the total.
///
/// Frequency is always derived from the two depths, never stored on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub depth: u64,
    pub total_depth: u64,
}

impl Observation {
    pub fn new(depth: u64, total_depth: u64) -> Self {
        Self { depth, total_depth }
    }

    /// Fraction of reads supporting the allele; 0.0 when there is no coverage
    pub fn frequency(&self) -> f64 {
        if self.total_depth == 0 {
            return 0.0;
        }
        self.depth as f64 / self.total_depth as f64
    }
}

/// How repeated alleles at one position are merged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Keep only the highest-frequency allele per position
    Biallelic,
    /// Keep every qualifying allele per position
    Multiallelic,
}

impl FromStr for ParseMode {
    type Err = LfvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "biallelic" => Ok(ParseMode::Biallelic),
            "multiallelic" => Ok(ParseMode::Multiallelic),
            other => Err(LfvError::InvalidConfig(format!(
                "parse type must be 'biallelic' or 'multiallelic', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ParseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseMode::Biallelic => write!(f, "biallelic"),
            ParseMode::Multiallelic => write!(f, "multiallelic"),
        }
    }
}

/// Configuration parameters for LFV extraction
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    pub min_depth: i64,      // Minimum supporting reads (inclusive)
    pub max_freq: f64,       // Frequency ceiling (exclusive)
    pub mode: ParseMode,
    pub keep_reference: bool,
    pub mask: Option<Mask>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            min_depth: 0,
            max_freq: 1.0,
            mode: ParseMode::Biallelic,
            keep_reference: true,
            mask: None,
        }
    }
}

impl ExtractConfig {
    /// An allele qualifies when it has enough reads and stays under the ceiling
    pub fn qualifies(&self, depth: i64, frequency: f64) -> bool {
        depth >= self.min_depth && frequency < self.max_freq
    }
}

/// Error types for the lfv library
#[derive(Debug, thiserror::Error)]
pub enum LfvError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTSlib error: {0}")]
    Htslib(#[from] rust_htslib::errors::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Variant position {position} is outside the reference (length {length})")]
    ReferenceTooShort { position: u32, length: usize },

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid mask: {0}")]
    InvalidMask(String),
}

pub type LfvResult<T> = Result<T, LfvError>;
