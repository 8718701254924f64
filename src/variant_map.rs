//! Position -> allele -> observation storage with mode-specific merging

use crate::{Observation, ParseMode};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Alleles observed at a single position, iterated in allele order
pub type AlleleMap = BTreeMap<String, Observation>;

/// Low-frequency variants extracted from one sample
///
/// Positions and alleles are kept in sorted maps so every downstream
/// consumer sees the same iteration order.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantMap {
    mode: ParseMode,
    positions: BTreeMap<u32, AlleleMap>,
    highlighted: BTreeSet<u32>,
}

/// Flat row view of a stored allele, used by the table writer
#[derive(Debug, Clone, Serialize)]
pub struct VariantRow<'a> {
    pub position: u32,
    pub allele: &'a str,
    pub frequency: f64,
    pub depth: u64,
    pub total_depth: u64,
    pub highlighted: bool,
}

impl VariantMap {
    pub fn new(mode: ParseMode) -> Self {
        Self {
            mode,
            positions: BTreeMap::new(),
            highlighted: BTreeSet::new(),
        }
    }

    pub fn mode(&self) -> ParseMode {
        self.mode
    }

    /// Store an allele using the map's merge policy.
    ///
    /// Biallelic maps keep a single allele per position and only replace it
    /// with a strictly more frequent one; multiallelic maps insert or update
    /// the allele alongside the others.
    pub fn store(&mut self, position: u32, allele: &str, observation: Observation) {
        match self.mode {
            ParseMode::Biallelic => {
                let alleles = self.positions.entry(position).or_default();
                let current = alleles.values().next().map(|obs| obs.frequency());
                match current {
                    Some(freq) if freq >= observation.frequency() => {}
                    _ => {
                        alleles.clear();
                        alleles.insert(allele.to_string(), observation);
                    }
                }
            }
            ParseMode::Multiallelic => {
                self.positions
                    .entry(position)
                    .or_default()
                    .insert(allele.to_string(), observation);
            }
        }
    }

    /// Tag a position for downstream rendering without filtering it
    pub fn highlight(&mut self, position: u32) {
        self.highlighted.insert(position);
    }

    pub fn is_highlighted(&self, position: u32) -> bool {
        self.highlighted.contains(&position)
    }

    pub fn highlighted(&self) -> &BTreeSet<u32> {
        &self.highlighted
    }

    pub fn get(&self, position: u32) -> Option<&AlleleMap> {
        self.positions.get(&position)
    }

    pub fn observation(&self, position: u32, allele: &str) -> Option<&Observation> {
        self.positions.get(&position).and_then(|alleles| alleles.get(allele))
    }

    pub fn contains(&self, position: u32, allele: &str) -> bool {
        self.observation(position, allele).is_some()
    }

    pub fn positions(&self) -> impl Iterator<Item = u32> + '_ {
        self.positions.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &AlleleMap)> {
        self.positions.iter().map(|(pos, alleles)| (*pos, alleles))
    }

    /// Number of positions holding at least one allele
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Total number of stored (position, allele) pairs
    pub fn allele_count(&self) -> usize {
        self.positions.values().map(|alleles| alleles.len()).sum()
    }

    pub fn rows(&self) -> impl Iterator<Item = VariantRow<'_>> {
        self.positions.iter().flat_map(move |(pos, alleles)| {
            alleles.iter().map(move |(allele, obs)| VariantRow {
                position: *pos,
                allele: allele.as_str(),
                frequency: obs.frequency(),
                depth: obs.depth,
                total_depth: obs.total_depth,
                highlighted: self.highlighted.contains(pos),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_biallelic_replaces_only_when_higher() {
        let mut map = VariantMap::new(ParseMode::Biallelic);
        map.store(10, "A", Observation::new(20, 100));
        map.store(10, "G", Observation::new(10, 100));
        assert!(map.contains(10, "A"));
        assert!(!map.contains(10, "G"));

        map.store(10, "T", Observation::new(20, 100));
        assert!(map.contains(10, "A"), "equal frequency must not replace");

        map.store(10, "T", Observation::new(30, 100));
        assert_eq!(map.get(10).unwrap().len(), 1);
        assert!(map.contains(10, "T"));
    }

    #[test]
    fn test_multiallelic_keeps_every_allele() {
        let mut map = VariantMap::new(ParseMode::Multiallelic);
        map.store(10, "A", Observation::new(20, 100));
        map.store(10, "G", Observation::new(10, 100));
        map.store(10, "A", Observation::new(25, 100));

        let alleles = map.get(10).unwrap();
        assert_eq!(alleles.len(), 2);
        assert_eq!(alleles["A"].depth, 25);
        assert_eq!(map.allele_count(), 2);
    }

    #[test]
    fn test_rows_follow_sorted_order() {
        let mut map = VariantMap::new(ParseMode::Multiallelic);
        map.store(30, "T", Observation::new(1, 10));
        map.store(5, "G", Observation::new(1, 10));
        map.store(5, "C", Observation::new(1, 10));
        map.highlight(30);

        let rows: Vec<_> = map.rows().map(|r| (r.position, r.allele, r.highlighted)).collect();
        assert_eq!(rows, vec![(5, "C", false), (5, "G", false), (30, "T", true)]);
    }
}
