//! Consensus sequence construction

use crate::{
    extract::extract_lfv, fasta::read_reference, variant_map::AlleleMap, ExtractConfig, LfvError,
    LfvResult, ParseMode, VariantMap,
};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Which allele to substitute at each variant position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Most frequent allele
    Majority,
    /// Second most frequent allele
    Minor,
}

impl FromStr for Selection {
    type Err = LfvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "majority" => Ok(Selection::Majority),
            "minor" => Ok(Selection::Minor),
            other => Err(LfvError::InvalidConfig(format!(
                "selection must be 'majority' or 'minor', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Majority => write!(f, "majority"),
            Selection::Minor => write!(f, "minor"),
        }
    }
}

impl Selection {
    /// Parse mode whose extraction output this selection expects
    pub fn parse_mode(&self) -> ParseMode {
        match self {
            Selection::Majority => ParseMode::Biallelic,
            Selection::Minor => ParseMode::Multiallelic,
        }
    }
}

/// Highest-frequency allele, first in allele order on ties.
/// Alleles at zero frequency are never picked.
fn majority_allele<'a, I>(alleles: I) -> Option<&'a str>
where
    I: Iterator<Item = (&'a String, f64)>,
{
    let mut best: Option<(&str, f64)> = None;
    for (allele, frequency) in alleles {
        let threshold = best.map(|(_, f)| f).unwrap_or(0.0);
        if frequency > threshold {
            best = Some((allele.as_str(), frequency));
        }
    }
    best.map(|(allele, _)| allele)
}

fn select_allele(alleles: &AlleleMap, selection: Selection) -> Option<&str> {
    let frequencies = alleles.iter().map(|(allele, obs)| (allele, obs.frequency()));

    match selection {
        Selection::Majority => majority_allele(frequencies),
        Selection::Minor => {
            if alleles.len() < 2 {
                return None;
            }
            let max = alleles
                .values()
                .map(|obs| obs.frequency())
                .fold(f64::NEG_INFINITY, f64::max);
            majority_allele(frequencies.filter(|&(_, frequency)| frequency != max))
        }
    }
}

/// Allele chosen at each position under `selection`
pub fn select_alleles(variants: &VariantMap, selection: Selection) -> BTreeMap<u32, String> {
    variants
        .iter()
        .filter_map(|(position, alleles)| {
            select_allele(alleles, selection).map(|allele| (position, allele.to_string()))
        })
        .collect()
}

/// Substitute the selected allele at each variant position of `reference`.
///
/// Positions are 1-based and count characters, not bytes. Multi-base alleles
/// replace the single reference base at their position.
pub fn build_consensus(reference: &str, variants: &VariantMap, selection: Selection) -> LfvResult<String> {
    let bases: Vec<char> = reference.chars().collect();
    let length = bases.len();
    if let Some(position) = variants.positions().find(|&p| p == 0 || p as usize > length) {
        return Err(LfvError::ReferenceTooShort { position, length });
    }

    let selected = select_alleles(variants, selection);
    log::debug!("Substituting {} {} alleles", selected.len(), selection);

    let mut consensus = String::with_capacity(reference.len());
    let mut last = 0usize;
    for (position, allele) in &selected {
        let index = *position as usize - 1;
        consensus.extend(&bases[last..index]);
        consensus.push_str(allele);
        last = index + 1;
    }
    consensus.extend(&bases[last..]);

    Ok(consensus)
}

/// Extract variants from a VCF and build its consensus against a reference file
pub fn consensus_from_files<P: AsRef<Path>, R: AsRef<Path>>(
    vcf_path: P,
    reference_path: R,
    config: &ExtractConfig,
    selection: Selection,
) -> LfvResult<String> {
    let reference = read_reference(reference_path)?;
    let variants = extract_lfv(vcf_path, config)?;
    build_consensus(&reference, &variants, selection)
}
