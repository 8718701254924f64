//! VCF/BCF file reading into variant calls

use crate::{
    record::VariantCall,
    utils::{has_extension, is_gzipped},
    LfvError, LfvResult,
};
use flate2::read::MultiGzDecoder;
use rust_htslib::bcf::{self, Read as BcfRead};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Column indices for VCF parsing
#[derive(Debug, Clone)]
pub struct VcfColumnIndices {
    pub pos: usize,
    pub ref_allele: usize,
    pub alt: usize,
    pub info: usize,
}

impl Default for VcfColumnIndices {
    fn default() -> Self {
        Self {
            pos: 1,
            ref_allele: 3,
            alt: 4,
            info: 7,
        }
    }
}

impl VcfColumnIndices {
    pub fn from_header(header_line: &str) -> LfvResult<Self> {
        let fields: Vec<&str> = header_line.trim().split('\t').collect();
        let find = |name: &str| {
            fields
                .iter()
                .position(|&col| col == name)
                .ok_or_else(|| LfvError::MalformedRecord(format!("{} column not found in VCF header", name)))
        };

        Ok(VcfColumnIndices {
            pos: find("POS")?,
            ref_allele: find("REF")?,
            alt: find("ALT")?,
            info: find("INFO")?,
        })
    }
}

/// Parse one tab-separated data line into a variant call
pub fn parse_line(line: &str, indices: &VcfColumnIndices) -> LfvResult<VariantCall> {
    let fields: Vec<&str> = line.split('\t').collect();

    let last = indices.pos.max(indices.ref_allele).max(indices.alt).max(indices.info);
    if fields.len() <= last {
        return Err(LfvError::MalformedRecord(format!(
            "Invalid VCF line format - not enough columns: {}",
            line
        )));
    }

    let position = fields[indices.pos]
        .parse::<u32>()
        .map_err(|_| LfvError::MalformedRecord(format!("Invalid position: {}", fields[indices.pos])))?;

    let alt_alleles = match fields[indices.alt] {
        "." | "" => Vec::new(),
        alts => alts.split(',').map(|a| a.to_string()).collect(),
    };

    let (dp4, depth) = parse_depths(fields[indices.info], position)?;

    Ok(VariantCall {
        position,
        ref_allele: fields[indices.ref_allele].to_string(),
        alt_alleles,
        dp4,
        depth,
    })
}

/// Pull DP4 and DP out of an INFO column
fn parse_depths(info: &str, position: u32) -> LfvResult<(Option<[u32; 4]>, Option<u32>)> {
    let bad = |field: &str| LfvError::MalformedRecord(format!("Invalid {} at position {}", field, position));

    let mut dp4 = None;
    let mut depth = None;

    for entry in info.split(';') {
        match entry.split_once('=') {
            Some(("DP", value)) => {
                depth = Some(value.parse::<u32>().map_err(|_| bad("DP"))?);
            }
            Some(("DP4", value)) => {
                let counts = value
                    .split(',')
                    .map(|v| v.parse::<u32>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| bad("DP4"))?;
                let counts: [u32; 4] = counts.try_into().map_err(|_| bad("DP4"))?;
                dp4 = Some(counts);
            }
            _ => {}
        }
    }

    Ok((dp4, depth))
}

/// VCF file reader that handles both compressed and uncompressed files
pub struct VcfReader {
    reader: Box<dyn BufRead>,
    indices: VcfColumnIndices,
}

impl VcfReader {
    pub fn new<P: AsRef<Path>>(path: P) -> LfvResult<Self> {
        let file = File::open(&path)
            .map_err(|_| LfvError::FileNotFound(path.as_ref().to_string_lossy().to_string()))?;

        let reader: Box<dyn BufRead> = if is_gzipped(&path)? {
            Box::new(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };

        Ok(VcfReader {
            reader,
            indices: VcfColumnIndices::default(),
        })
    }
}

impl Iterator for VcfReader {
    type Item = LfvResult<VariantCall>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = String::new();

        loop {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => {
                    let line = line.trim_end();
                    if line.starts_with("##") || line.is_empty() {
                        continue;
                    }
                    if line.starts_with('#') {
                        match VcfColumnIndices::from_header(line) {
                            Ok(indices) => self.indices = indices,
                            Err(e) => return Some(Err(e)),
                        }
                        continue;
                    }

                    return Some(parse_line(line, &self.indices));
                }
                Err(e) => return Some(Err(LfvError::Io(e))),
            }
        }
    }
}

/// Read every call from a BCF (or htslib-readable VCF) file
pub fn read_bcf_calls<P: AsRef<Path>>(path: P) -> LfvResult<Vec<VariantCall>> {
    let mut reader = bcf::Reader::from_path(path.as_ref())?;
    let mut calls = Vec::new();

    for result in reader.records() {
        let record = result?;
        let position = u32::try_from(record.pos() + 1)
            .map_err(|_| LfvError::MalformedRecord(format!("Invalid position: {}", record.pos())))?;

        let alleles: Vec<String> = record
            .alleles()
            .iter()
            .map(|a| String::from_utf8_lossy(a).into_owned())
            .collect();
        let (ref_allele, alt_alleles) = match alleles.split_first() {
            Some((first, rest)) => (first.clone(), rest.to_vec()),
            None => (String::new(), Vec::new()),
        };

        // Tags missing from the header come back as errors; treat them as absent
        let dp4 = match record.info(b"DP4").integer().ok().flatten() {
            Some(values) => {
                let counts: Vec<u32> = values
                    .iter()
                    .map(|&v| u32::try_from(v))
                    .collect::<Result<_, _>>()
                    .map_err(|_| LfvError::MalformedRecord(format!("Invalid DP4 at position {}", position)))?;
                Some(<[u32; 4]>::try_from(counts).map_err(|_| {
                    LfvError::MalformedRecord(format!("Invalid DP4 at position {}", position))
                })?)
            }
            None => None,
        };
        let depth = record
            .info(b"DP")
            .integer()
            .ok()
            .flatten()
            .and_then(|values| values.first().and_then(|&v| u32::try_from(v).ok()));

        calls.push(VariantCall {
            position,
            ref_allele,
            alt_alleles,
            dp4,
            depth,
        });
    }

    Ok(calls)
}

/// Open a variant file and return its calls in file order.
///
/// `.bcf` files go through htslib; everything else is read as (gzipped) text.
pub fn open_calls<P: AsRef<Path>>(
    path: P,
) -> LfvResult<Box<dyn Iterator<Item = LfvResult<VariantCall>>>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(LfvError::FileNotFound(path.to_string_lossy().to_string()));
    }

    if has_extension(path, "bcf") {
        let calls = read_bcf_calls(path)?;
        log::debug!("Read {} BCF records from {:?}", calls.len(), path);
        Ok(Box::new(calls.into_iter().map(Ok)))
    } else {
        Ok(Box::new(VcfReader::new(path)?))
    }
}
