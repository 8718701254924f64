//! Donor/recipient reconciliation and bottleneck-estimator input files

use crate::{utils::create_output, utils::file_prefix, LfvResult, VariantMap};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default frequency a donor allele must exceed to be written out
pub const DEFAULT_CALLING_THRESHOLD: f64 = 0.03;

/// Frequencies and depths of one allele in both samples of a pair
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SharedAllele {
    pub donor_frequency: f64,
    pub donor_depth: u64,
    pub recipient_frequency: f64,
    pub recipient_depth: u64,
    /// Whether the recipient carries this allele
    pub shared: bool,
}

/// Donor-anchored join of two variant maps
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReconciledPair {
    pub alleles: BTreeMap<u32, BTreeMap<String, SharedAllele>>,
    /// Number of (position, allele) pairs found in both samples
    pub shared_count: usize,
}

impl ReconciledPair {
    pub fn get(&self, position: u32, allele: &str) -> Option<&SharedAllele> {
        self.alleles.get(&position).and_then(|a| a.get(allele))
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str, &SharedAllele)> {
        self.alleles.iter().flat_map(|(pos, alleles)| {
            alleles
                .iter()
                .map(move |(allele, shared)| (*pos, allele.as_str(), shared))
        })
    }

    /// Positions where donor and recipient carry at least one common allele
    pub fn shared_positions(&self) -> impl Iterator<Item = u32> + '_ {
        self.alleles.iter().filter_map(|(pos, alleles)| {
            alleles
                .values()
                .any(|allele| allele.shared)
                .then_some(*pos)
        })
    }
}

/// Join donor and recipient variants.
///
/// Every donor allele is kept; recipient values are filled in when the
/// recipient has the same allele at the same position and left at zero
/// otherwise. Recipient-only alleles are dropped.
pub fn reconcile(donor: &VariantMap, recipient: &VariantMap) -> ReconciledPair {
    let mut pair = ReconciledPair::default();

    for (position, alleles) in donor.iter() {
        let entry = pair.alleles.entry(position).or_default();

        for (allele, donor_obs) in alleles {
            let mut shared = SharedAllele {
                donor_frequency: donor_obs.frequency(),
                donor_depth: donor_obs.depth,
                ..Default::default()
            };

            if let Some(recipient_obs) = recipient.observation(position, allele) {
                shared.recipient_frequency = recipient_obs.frequency();
                shared.recipient_depth = recipient_obs.depth;
                shared.shared = true;
                pair.shared_count += 1;
            }

            entry.insert(allele.clone(), shared);
        }
    }
    log::debug!(
        "Reconciled {} donor positions, {} shared alleles",
        pair.alleles.len(),
        pair.shared_count
    );

    pair
}

/// File name the bottleneck estimator expects for a donor/recipient pair
pub fn bottleneck_file_name<P: AsRef<Path>>(donor: P, recipient: P, shared_count: usize) -> String {
    format!(
        "new_{}_{}_thred{}_complete_nofilter_bbn.txt",
        file_prefix(donor),
        file_prefix(recipient),
        shared_count
    )
}

/// Write bottleneck-estimator input: one line per donor allele above `threshold`.
///
/// Lines hold donor and recipient frequency, followed by donor and recipient
/// depth when `weighted` is set.
pub fn write_bottleneck_input(
    pair: &ReconciledPair,
    threshold: f64,
    weighted: bool,
    output_path: &Path,
) -> LfvResult<usize> {
    let mut writer = create_output(output_path)?;
    let mut written = 0;

    for (_, _, shared) in pair.iter() {
        if shared.donor_frequency <= threshold {
            continue;
        }

        if weighted {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}",
                shared.donor_frequency,
                shared.recipient_frequency,
                shared.donor_depth,
                shared.recipient_depth
            )?;
        } else {
            writeln!(writer, "{}\t{}", shared.donor_frequency, shared.recipient_frequency)?;
        }
        written += 1;
    }
    writer.flush()?;
    log::info!("Wrote {} bottleneck input lines to {:?}", written, output_path);

    Ok(written)
}

/// Resolve the output path for a pair, inside `output_dir` when given
pub fn bottleneck_output_path(
    donor: &Path,
    recipient: &Path,
    shared_count: usize,
    output_dir: Option<&Path>,
) -> PathBuf {
    let name = bottleneck_file_name(donor, recipient, shared_count);
    match output_dir {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Observation, ParseMode};
    use tempfile::tempdir;

    /// Alleles with the given supporting reads out of 100
    fn map(entries: &[(u32, &str, u64)]) -> VariantMap {
        let mut variants = VariantMap::new(ParseMode::Multiallelic);
        for &(pos, allele, depth) in entries {
            variants.store(pos, allele, Observation::new(depth, 100));
        }
        variants
    }

    #[test]
    fn test_shared_allele_carries_both_samples() {
        let donor = map(&[(10, "C", 40)]);
        let recipient = map(&[(10, "C", 20)]);

        let pair = reconcile(&donor, &recipient);
        assert_eq!(pair.shared_count, 1);
        assert_eq!(
            pair.get(10, "C"),
            Some(&SharedAllele {
                donor_frequency: 0.4,
                donor_depth: 40,
                recipient_frequency: 0.2,
                recipient_depth: 20,
                shared: true,
            })
        );
    }

    #[test]
    fn test_donor_anchored() {
        let donor = map(&[(10, "C", 40), (20, "A", 10), (20, "G", 5)]);
        let recipient = map(&[(20, "G", 30), (30, "T", 50), (10, "T", 1)]);

        let pair = reconcile(&donor, &recipient);
        assert_eq!(pair.shared_count, 1);
        assert!(pair.get(30, "T").is_none());
        assert!(pair.get(10, "T").is_none());

        let unshared = pair.get(20, "A").unwrap();
        assert_eq!(unshared.recipient_frequency, 0.0);
        assert_eq!(unshared.recipient_depth, 0);
        assert!(!unshared.shared);
        assert_eq!(pair.iter().count(), 3);
        assert_eq!(pair.shared_positions().collect::<Vec<_>>(), vec![20]);
    }

    #[test]
    fn test_shared_count_matches_intersection() {
        let donor = map(&[(1, "A", 1), (2, "C", 1), (3, "G", 1)]);
        let recipient = map(&[(1, "A", 1), (3, "G", 1), (4, "T", 1)]);

        let expected = donor
            .rows()
            .filter(|row| recipient.contains(row.position, row.allele))
            .count();
        assert_eq!(reconcile(&donor, &recipient).shared_count, expected);
    }

    #[test]
    fn test_write_bottleneck_input() {
        let donor = map(&[(10, "C", 40), (20, "A", 2)]);
        let recipient = map(&[(10, "C", 20)]);
        let pair = reconcile(&donor, &recipient);

        let dir = tempdir().unwrap();
        let path = dir.path().join("pair.txt");
        let written = write_bottleneck_input(&pair, DEFAULT_CALLING_THRESHOLD, false, &path).unwrap();
        assert_eq!(written, 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "0.4\t0.2\n");

        write_bottleneck_input(&pair, DEFAULT_CALLING_THRESHOLD, true, &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "0.4\t0.2\t40\t20\n");
    }

    #[test]
    fn test_bottleneck_file_name() {
        let name = bottleneck_file_name(
            Path::new("data/A01_S1_bwamem.vcf"),
            Path::new("data/B02_S7_bwamem.vcf"),
            3,
        );
        assert_eq!(name, "new_A01_B02_thred3_complete_nofilter_bbn.txt");

        let path = bottleneck_output_path(Path::new("A.vcf"), Path::new("B.vcf"), 0, Some(Path::new("out")));
        assert_eq!(path, Path::new("out").join("new_A_B_thred0_complete_nofilter_bbn.txt"));
    }
}
