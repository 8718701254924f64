//! Low-frequency variant extraction
//!
//! A single pass over position-grouped calls. Alt alleles are stored as soon
//! as they qualify; the reference allele is accumulated per position and only
//! committed once the scan has moved past that position, since its depth is
//! what remains after every alt call at the position is subtracted.

use crate::{
    record::{VariantCall, VariantRecord},
    utils::create_output,
    vcf::open_calls,
    ExtractConfig, LfvError, LfvResult, Observation, VariantMap,
};
use std::path::Path;

/// Validate extraction parameters before any record is read
pub fn validate_extract_config(config: &ExtractConfig) -> LfvResult<()> {
    if config.min_depth < 0 {
        return Err(LfvError::InvalidConfig(
            "min_depth must not be negative".to_string(),
        ));
    }

    // Also rejects NaN
    if !(config.max_freq <= 1.0) {
        return Err(LfvError::InvalidConfig(
            "max_freq must not exceed 1".to_string(),
        ));
    }

    Ok(())
}

/// Reference allele bookkeeping for the position currently being scanned.
///
/// The total depth comes from the first record at the position; every alt
/// record's supporting reads are taken off what is left for the reference.
#[derive(Debug, Clone)]
struct PendingReference {
    position: u32,
    allele: String,
    depth: i64,
    total_depth: u64,
}

impl PendingReference {
    fn start(record: &VariantRecord) -> Self {
        Self {
            position: record.position,
            allele: record.ref_allele.clone(),
            depth: record.total_depth as i64,
            total_depth: record.total_depth,
        }
    }

    fn subtract(&mut self, record: &VariantRecord) {
        self.depth -= record.supporting_depth as i64;
    }

    fn frequency(&self) -> f64 {
        self.depth as f64 / self.total_depth as f64
    }

    fn commit(self, config: &ExtractConfig, variants: &mut VariantMap) {
        // Alt reads exceeding the total leave nothing to store
        let depth = match u64::try_from(self.depth) {
            Ok(depth) => depth,
            Err(_) => return,
        };

        if config.qualifies(self.depth, self.frequency()) {
            log::debug!(
                "Storing reference {} at {} (depth={}/{})",
                self.allele,
                self.position,
                depth,
                self.total_depth
            );
            variants.store(self.position, &self.allele, Observation::new(depth, self.total_depth));
        }
    }
}

/// Extract low-frequency variants from an ordered stream of calls.
///
/// All calls for one position must be contiguous. Any malformed call aborts
/// the extraction.
pub fn extract_calls<I>(calls: I, config: &ExtractConfig) -> LfvResult<VariantMap>
where
    I: IntoIterator<Item = LfvResult<VariantCall>>,
{
    validate_extract_config(config)?;

    let mut variants = VariantMap::new(config.mode);
    let mut pending: Option<PendingReference> = None;
    let mut scanned = 0usize;

    for call in calls {
        let record = VariantRecord::try_from(&call?)?;
        scanned += 1;

        if let Some(mask) = &config.mask {
            if mask.hides(record.position) {
                continue;
            }
            if mask.highlights(record.position) {
                variants.highlight(record.position);
            }
        }

        if config.keep_reference {
            let mut reference = match pending.take() {
                Some(reference) if reference.position == record.position => reference,
                Some(previous) => {
                    previous.commit(config, &mut variants);
                    PendingReference::start(&record)
                }
                None => PendingReference::start(&record),
            };
            reference.subtract(&record);
            pending = Some(reference);
        }

        let observation = record.observation();
        if config.qualifies(observation.depth as i64, observation.frequency()) {
            variants.store(record.position, &record.alt_allele, observation);
        }
    }

    if let Some(reference) = pending {
        reference.commit(config, &mut variants);
    }

    log::debug!(
        "Scanned {} records, kept {} alleles at {} positions",
        scanned,
        variants.allele_count(),
        variants.len()
    );

    Ok(variants)
}

/// Extract low-frequency variants from a VCF or BCF file
pub fn extract_lfv<P: AsRef<Path>>(path: P, config: &ExtractConfig) -> LfvResult<VariantMap> {
    validate_extract_config(config)?;
    let calls = open_calls(&path)?;
    let variants = extract_calls(calls, config)?;
    log::info!(
        "Extracted {} alleles at {} positions from {:?}",
        variants.allele_count(),
        variants.len(),
        path.as_ref()
    );
    Ok(variants)
}

/// Write a variant map as a TSV table
pub fn write_variant_table(variants: &VariantMap, output_path: &Path) -> LfvResult<()> {
    let writer = create_output(output_path)?;
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);

    for row in variants.rows() {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::{Mask, MaskPolicy, MaskSet};
    use crate::ParseMode;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Call with DP4 = [ref_fwd, ref_rev, alt_fwd, alt_rev] and DP = total
    fn call(position: u32, reference: &str, alt: &str, ref_reads: u32, alt_reads: u32, total: u32) -> LfvResult<VariantCall> {
        Ok(VariantCall {
            position,
            ref_allele: reference.to_string(),
            alt_alleles: vec![alt.to_string()],
            dp4: Some([ref_reads, 0, alt_reads, 0]),
            depth: Some(total),
        })
    }

    fn config(mode: ParseMode, keep_reference: bool) -> ExtractConfig {
        ExtractConfig {
            mode,
            keep_reference,
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_extract_config() {
        assert!(validate_extract_config(&ExtractConfig::default()).is_ok());

        let negative = ExtractConfig {
            min_depth: -1,
            ..Default::default()
        };
        assert!(matches!(
            validate_extract_config(&negative),
            Err(LfvError::InvalidConfig(_))
        ));

        let ceiling = ExtractConfig {
            max_freq: 1.5,
            ..Default::default()
        };
        assert!(validate_extract_config(&ceiling).is_err());
    }

    #[test]
    fn test_invalid_config_fails_before_reading() {
        let calls = vec![Err(LfvError::MalformedRecord("unread".to_string()))];
        let bad = ExtractConfig {
            min_depth: -3,
            ..Default::default()
        };
        assert!(matches!(extract_calls(calls, &bad), Err(LfvError::InvalidConfig(_))));
    }

    #[test]
    fn test_depth_floor_is_inclusive_and_ceiling_exclusive() {
        let config = ExtractConfig {
            min_depth: 5,
            max_freq: 0.5,
            keep_reference: false,
            ..Default::default()
        };
        let calls = vec![
            call(1, "A", "G", 97, 3, 100),  // too few reads
            call(2, "A", "G", 95, 5, 100),  // exactly min_depth
            call(3, "A", "G", 50, 50, 100), // exactly max_freq
            call(4, "A", "G", 51, 49, 100),
        ];
        let variants = extract_calls(calls, &config).unwrap();

        assert!(variants.get(1).is_none());
        assert!(variants.contains(2, "G"));
        assert!(variants.get(3).is_none());
        assert!(variants.contains(4, "G"));

        for (_, alleles) in variants.iter() {
            for obs in alleles.values() {
                assert!(obs.depth >= 5);
                assert!(obs.frequency() >= 0.0 && obs.frequency() < 0.5);
            }
        }
    }

    #[test]
    fn test_reference_committed_after_position_changes() {
        let calls = vec![
            call(10, "A", "G", 70, 30, 100),
            call(20, "C", "T", 90, 10, 100),
        ];
        let variants = extract_calls(calls, &config(ParseMode::Multiallelic, true)).unwrap();

        let at_10 = variants.get(10).unwrap();
        assert_eq!(at_10.len(), 2);
        assert!((at_10["A"].frequency() - 0.7).abs() < 1e-9);
        assert_eq!(at_10["A"].depth, 70);
        assert_eq!(variants.observation(20, "C").unwrap().depth, 90);
    }

    #[test]
    fn test_reference_accumulates_across_alt_records() {
        let calls = vec![
            call(7, "A", "G", 50, 30, 100),
            call(7, "A", "T", 50, 15, 100),
        ];
        let variants = extract_calls(calls, &config(ParseMode::Multiallelic, true)).unwrap();

        let reference = variants.observation(7, "A").unwrap();
        assert!((reference.frequency() - 0.55).abs() < 1e-9);
        assert_eq!(reference.depth, 55);
        assert_eq!(reference.total_depth, 100);
        assert_eq!(variants.get(7).unwrap().len(), 3);

        let supporting: u64 = variants.get(7).unwrap().values().map(|o| o.depth).sum();
        assert!(supporting <= 100);
    }

    #[test]
    fn test_stored_observations_keep_their_total_depth() {
        let calls = vec![
            call(5, "C", "T", 60, 40, 100),
            call(8, "G", "A", 45, 5, 50),
        ];
        let variants = extract_calls(calls, &config(ParseMode::Multiallelic, true)).unwrap();

        let alt = variants.observation(8, "A").unwrap();
        assert_eq!((alt.depth, alt.total_depth), (5, 50));
        let reference = variants.observation(5, "C").unwrap();
        assert_eq!((reference.depth, reference.total_depth), (60, 100));

        for row in variants.rows() {
            assert_eq!(row.frequency, row.depth as f64 / row.total_depth as f64);
        }
    }

    #[test]
    fn test_biallelic_keeps_strongest_allele() {
        let calls = vec![
            call(7, "A", "G", 50, 30, 100),
            call(7, "A", "T", 50, 15, 100),
        ];
        let variants = extract_calls(calls, &config(ParseMode::Biallelic, true)).unwrap();

        let alleles = variants.get(7).unwrap();
        assert_eq!(alleles.len(), 1);
        assert!(alleles.contains_key("A"));
    }

    #[test]
    fn test_biallelic_reference_does_not_replace_stronger_alt() {
        let calls = vec![call(3, "A", "G", 20, 80, 100)];
        let variants = extract_calls(calls, &config(ParseMode::Biallelic, true)).unwrap();
        assert!(variants.contains(3, "G"));
        assert!(!variants.contains(3, "A"));

        for (_, alleles) in variants.iter() {
            assert!(alleles.len() <= 1);
        }
    }

    #[test]
    fn test_reference_only_position_needs_keep_reference() {
        let config_no_ref = ExtractConfig {
            min_depth: 5,
            keep_reference: false,
            ..Default::default()
        };
        let variants = extract_calls(vec![call(9, "A", "G", 98, 2, 100)], &config_no_ref).unwrap();
        assert!(variants.is_empty());

        let config_ref = ExtractConfig {
            min_depth: 5,
            ..Default::default()
        };
        let variants = extract_calls(vec![call(9, "A", "G", 98, 2, 100)], &config_ref).unwrap();
        assert!(variants.contains(9, "A"));
        assert!(!variants.contains(9, "G"));
    }

    #[test]
    fn test_inconsistent_depths_filtered_only_by_qualification() {
        // Alt reads exceed total: reference goes negative and fails the depth floor
        let calls = vec![
            call(4, "A", "G", 0, 8, 10),
            call(4, "A", "T", 0, 6, 10),
        ];
        let variants = extract_calls(calls, &config(ParseMode::Multiallelic, true)).unwrap();
        assert!(!variants.contains(4, "A"));
        assert!(variants.contains(4, "G"));
        assert!(variants.contains(4, "T"));
    }

    #[test]
    fn test_hidden_positions_are_skipped() {
        let mask = Mask::new(MaskSet::parse("10").unwrap(), MaskPolicy::Hide);
        let config = ExtractConfig {
            mask: Some(mask),
            ..Default::default()
        };
        let calls = vec![
            call(10, "A", "G", 70, 30, 100),
            call(11, "A", "G", 70, 30, 100),
        ];
        let variants = extract_calls(calls, &config).unwrap();
        assert!(variants.get(10).is_none());
        assert!(variants.get(11).is_some());
    }

    #[test]
    fn test_highlighted_positions_are_kept_and_tagged() {
        let mask = Mask::new(MaskSet::parse("10").unwrap(), MaskPolicy::Highlight);
        let config = ExtractConfig {
            mask: Some(mask),
            keep_reference: false,
            ..Default::default()
        };
        let calls = vec![call(10, "A", "G", 70, 30, 100)];
        let variants = extract_calls(calls, &config).unwrap();
        assert!(variants.contains(10, "G"));
        assert!(variants.is_highlighted(10));
    }

    #[test]
    fn test_malformed_record_aborts() {
        let calls = vec![
            call(1, "A", "G", 70, 30, 100),
            call(2, "A", "G", 0, 0, 0),
            call(3, "A", "G", 70, 30, 100),
        ];
        assert!(matches!(
            extract_calls(calls, &ExtractConfig::default()),
            Err(LfvError::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_extract_lfv_from_file() {
        let mut vcf_file = NamedTempFile::new().unwrap();
        writeln!(vcf_file, "##fileformat=VCFv4.2").unwrap();
        writeln!(vcf_file, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO").unwrap();
        writeln!(vcf_file, "chr\t100\t.\tA\tT\t.\tPASS\tDP=100;DP4=40,40,10,10").unwrap();
        writeln!(vcf_file, "chr\t200\t.\tG\tC\t.\tPASS\tDP=50;DP4=10,10,15,15").unwrap();

        let config = ExtractConfig {
            min_depth: 1,
            max_freq: 0.5,
            ..Default::default()
        };
        let variants = extract_lfv(vcf_file.path(), &config).unwrap();
        assert!(variants.contains(100, "T"));
        assert!(variants.contains(200, "G"));

        let output = NamedTempFile::new().unwrap();
        write_variant_table(&variants, output.path()).unwrap();
        let table = std::fs::read_to_string(output.path()).unwrap();
        assert!(table.starts_with("position\tallele\tfrequency\tdepth\ttotal_depth\thighlighted"));
        assert!(table.contains("100\tT\t0.2\t20\t100\tfalse"));
    }
}
