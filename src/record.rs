//! Normalization of raw variant calls into depth-annotated records

use crate::{LfvError, LfvResult, Observation};

/// A variant call as read from a VCF/BCF file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantCall {
    pub position: u32,
    pub ref_allele: String,
    pub alt_alleles: Vec<String>,
    /// INFO/DP4: ref-forward, ref-reverse, alt-forward, alt-reverse
    pub dp4: Option<[u32; 4]>,
    /// INFO/DP
    pub depth: Option<u32>,
}

/// One call reduced to the fields the extractor needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantRecord {
    pub position: u32,
    pub ref_allele: String,
    pub alt_allele: String,
    pub supporting_depth: u64,
    pub ref_depth: u64,
    pub total_depth: u64,
}

impl VariantRecord {
    /// Alt allele support out of the total depth
    pub fn observation(&self) -> Observation {
        Observation::new(self.supporting_depth, self.total_depth)
    }

    /// Alt allele frequency. Total depth is non-zero by construction.
    pub fn frequency(&self) -> f64 {
        self.observation().frequency()
    }
}

impl TryFrom<&VariantCall> for VariantRecord {
    type Error = LfvError;

    fn try_from(call: &VariantCall) -> LfvResult<Self> {
        let alt_allele = call
            .alt_alleles
            .first()
            .filter(|alt| !alt.is_empty() && alt.as_str() != ".")
            .ok_or_else(|| {
                LfvError::MalformedRecord(format!(
                    "no alternate allele at position {}",
                    call.position
                ))
            })?;

        let [ref_fwd, ref_rev, alt_fwd, alt_rev] = call.dp4.ok_or_else(|| {
            LfvError::MalformedRecord(format!("missing DP4 at position {}", call.position))
        })?;

        let supporting_depth = u64::from(alt_fwd) + u64::from(alt_rev);
        let ref_depth = u64::from(ref_fwd) + u64::from(ref_rev);
        let total_depth = match call.depth {
            Some(dp) => u64::from(dp),
            None => supporting_depth + ref_depth,
        };

        if total_depth == 0 {
            return Err(LfvError::MalformedRecord(format!(
                "zero total depth at position {}",
                call.position
            )));
        }

        // Single-base reference, as the consensus slots are per base
        let ref_allele = call
            .ref_allele
            .chars()
            .next()
            .map(String::from)
            .unwrap_or_default();

        Ok(VariantRecord {
            position: call.position,
            ref_allele,
            alt_allele: alt_allele.clone(),
            supporting_depth,
            ref_depth,
            total_depth,
        })
    }
}
