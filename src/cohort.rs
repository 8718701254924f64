//! Batch processing over a directory of samples

use crate::{
    consensus::{build_consensus, Selection},
    extract::extract_lfv,
    reconcile::reconcile,
    utils::{create_output, has_extension, log_progress, sample_name},
    ExtractConfig, LfvError, LfvResult, VariantMap,
};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// Extraction results for a cohort: successful samples and per-file failures
#[derive(Debug, Default)]
pub struct Cohort {
    pub samples: BTreeMap<String, VariantMap>,
    pub failures: Vec<(PathBuf, LfvError)>,
}

/// Shared-variant count for one ordered donor/recipient pair
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PairSummary {
    pub donor: String,
    pub recipient: String,
    pub shared_count: usize,
    #[serde(skip)]
    pub shared_positions: Vec<u32>,
}

/// Pairs per shared count, over the complete genome and with masked positions hidden
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SharedCountComparison {
    pub shared_count: usize,
    pub complete_pairs: usize,
    pub masked_pairs: usize,
}

/// Heatmap input: sample rows against variant-position columns
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyMatrix {
    pub rows: Vec<String>,
    pub positions: Vec<u32>,
    pub values: Vec<Vec<f64>>,
}

/// Variant files (`.vcf`, `.vcf.gz`, `.bcf`) in a directory, sorted by path
pub fn variant_files<P: AsRef<Path>>(dir: P) -> LfvResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(LfvError::FileNotFound(dir.to_string_lossy().to_string()));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let name = path.file_name().map(|n| n.to_string_lossy().to_lowercase()).unwrap_or_default();
        if path.is_file() && (has_extension(&path, "vcf") || has_extension(&path, "bcf") || name.ends_with(".vcf.gz")) {
            files.push(path);
        }
    }
    files.sort();

    Ok(files)
}

/// Extract every variant file in `dir` in parallel.
///
/// A failing file is logged and reported in `failures`; the rest of the
/// cohort is still returned.
pub fn extract_directory<P: AsRef<Path>>(dir: P, config: &ExtractConfig) -> LfvResult<Cohort> {
    let files = variant_files(&dir)?;
    log::info!("Extracting {} variant files from {:?}", files.len(), dir.as_ref());

    let results: Vec<(PathBuf, LfvResult<VariantMap>)> = files
        .into_par_iter()
        .map(|path| {
            let result = extract_lfv(&path, config);
            (path, result)
        })
        .collect();

    let mut cohort = Cohort::default();
    let total = results.len();
    for (i, (path, result)) in results.into_iter().enumerate() {
        match result {
            Ok(variants) => {
                cohort.samples.insert(sample_name(&path), variants);
            }
            Err(e) => {
                log::warn!("Skipping {:?}: {}", path, e);
                cohort.failures.push((path, e));
            }
        }
        log_progress(i + 1, total, "Collected samples");
    }

    Ok(cohort)
}

/// Consensus sequence per sample
pub fn map_consensus(
    samples: &BTreeMap<String, VariantMap>,
    reference: &str,
    selection: Selection,
) -> BTreeMap<String, LfvResult<String>> {
    samples
        .par_iter()
        .map(|(name, variants)| (name.clone(), build_consensus(reference, variants, selection)))
        .collect()
}

/// Shared counts for every ordered pair of distinct samples
pub fn pairwise_shared_counts(samples: &BTreeMap<String, VariantMap>) -> Vec<PairSummary> {
    let names: Vec<&String> = samples.keys().collect();
    let pairs: Vec<(&String, &String)> = names
        .iter()
        .flat_map(|donor| {
            names
                .iter()
                .filter(move |recipient| *recipient != donor)
                .map(move |recipient| (*donor, *recipient))
        })
        .collect();

    pairs
        .into_par_iter()
        .map(|(donor, recipient)| {
            let pair = reconcile(&samples[donor], &samples[recipient]);
            PairSummary {
                donor: donor.clone(),
                recipient: recipient.clone(),
                shared_count: pair.shared_count,
                shared_positions: pair.shared_positions().collect(),
            }
        })
        .collect()
}

/// Number of pairs observed for each shared count
pub fn shared_count_histogram(pairs: &[PairSummary]) -> BTreeMap<usize, usize> {
    let mut histogram = BTreeMap::new();
    for pair in pairs {
        *histogram.entry(pair.shared_count).or_insert(0) += 1;
    }
    histogram
}

/// Line up two shared-count histograms; counts missing from one side are 0
pub fn compare_histograms(
    complete: &BTreeMap<usize, usize>,
    masked: &BTreeMap<usize, usize>,
) -> Vec<SharedCountComparison> {
    complete
        .keys()
        .chain(masked.keys())
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|shared_count| SharedCountComparison {
            shared_count,
            complete_pairs: complete.get(&shared_count).copied().unwrap_or(0),
            masked_pairs: masked.get(&shared_count).copied().unwrap_or(0),
        })
        .collect()
}

/// Group samples whose consensus sequences are identical.
///
/// Groups come out in the order of their first member; members stay in
/// sample order.
pub fn consensus_groups(sequences: &BTreeMap<String, String>) -> Vec<Vec<String>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Vec<String>> = Vec::new();

    for (name, sequence) in sequences {
        match index.get(sequence.as_str()) {
            Some(&i) => groups[i].push(name.clone()),
            None => {
                index.insert(sequence.as_str(), groups.len());
                groups.push(vec![name.clone()]);
            }
        }
    }

    groups
}

/// Number of pairs sharing at least one allele at each position
pub fn position_sharing(pairs: &[PairSummary]) -> BTreeMap<u32, usize> {
    let mut counts = BTreeMap::new();
    for pair in pairs {
        for &position in &pair.shared_positions {
            *counts.entry(position).or_insert(0) += 1;
        }
    }
    counts
}

/// Build the sample-by-position frequency matrix.
///
/// Each cell holds the highest frequency stored at that position for the
/// sample, or 0.0 when the sample has nothing there.
pub fn frequency_matrix(samples: &BTreeMap<String, VariantMap>) -> FrequencyMatrix {
    let positions: Vec<u32> = samples
        .values()
        .flat_map(|variants| variants.positions())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let values: Vec<Vec<f64>> = samples
        .values()
        .map(|variants| {
            positions
                .iter()
                .map(|&pos| {
                    variants
                        .get(pos)
                        .map(|alleles| alleles.values().map(|obs| obs.frequency()).fold(0.0, f64::max))
                        .unwrap_or(0.0)
                })
                .collect()
        })
        .collect();

    FrequencyMatrix {
        rows: samples.keys().cloned().collect(),
        positions,
        values,
    }
}

/// Write the frequency matrix as a TSV: a `sample` column, then one column per position
pub fn write_frequency_matrix(matrix: &FrequencyMatrix, output_path: &Path) -> LfvResult<()> {
    let writer = create_output(output_path)?;
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);

    let mut header = vec!["sample".to_string()];
    header.extend(matrix.positions.iter().map(|pos| pos.to_string()));
    csv_writer.write_record(&header)?;

    for (sample, values) in matrix.rows.iter().zip(&matrix.values) {
        let mut record = vec![sample.clone()];
        record.extend(values.iter().map(|value| value.to_string()));
        csv_writer.write_record(&record)?;
    }
    csv_writer.flush()?;

    Ok(())
}
