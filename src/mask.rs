//! Masked position sets and how they are applied during extraction

use crate::{LfvError, LfvResult};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// What to do with a record whose position is masked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskPolicy {
    /// Skip the record entirely
    Hide,
    /// Keep the record and tag its position
    Highlight,
}

impl FromStr for MaskPolicy {
    type Err = LfvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hide" => Ok(MaskPolicy::Hide),
            "highlight" => Ok(MaskPolicy::Highlight),
            other => Err(LfvError::InvalidConfig(format!(
                "mask policy must be 'hide' or 'highlight', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for MaskPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaskPolicy::Hide => write!(f, "hide"),
            MaskPolicy::Highlight => write!(f, "highlight"),
        }
    }
}

/// Explicit set of masked genomic positions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaskSet {
    positions: BTreeSet<u32>,
}

impl MaskSet {
    /// Parse a range list such as `1-55,100\n29804-29904`.
    ///
    /// Ranges include their start and exclude their end.
    pub fn parse(text: &str) -> LfvResult<Self> {
        let mut positions = BTreeSet::new();

        for token in text.split(|c: char| c == ',' || c == '\n') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }

            match token.split_once('-') {
                Some((start, end)) => {
                    let start = parse_position(start)?;
                    let end = parse_position(end)?;
                    positions.extend(start..end);
                }
                None => {
                    positions.insert(parse_position(token)?);
                }
            }
        }

        Ok(MaskSet { positions })
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> LfvResult<Self> {
        let text = fs::read_to_string(&path)
            .map_err(|_| LfvError::FileNotFound(path.as_ref().to_string_lossy().to_string()))?;
        let mask = Self::parse(&text)?;
        log::debug!(
            "Loaded {} masked positions from {:?}",
            mask.len(),
            path.as_ref()
        );
        Ok(mask)
    }

    pub fn contains(&self, position: u32) -> bool {
        self.positions.contains(&position)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl FromIterator<u32> for MaskSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        MaskSet {
            positions: iter.into_iter().collect(),
        }
    }
}

fn parse_position(token: &str) -> LfvResult<u32> {
    token
        .trim()
        .parse::<u32>()
        .map_err(|_| LfvError::InvalidMask(format!("not a position: '{}'", token.trim())))
}

/// A mask set paired with its policy
#[derive(Debug, Clone)]
pub struct Mask {
    pub positions: MaskSet,
    pub policy: MaskPolicy,
}

impl Mask {
    pub fn new(positions: MaskSet, policy: MaskPolicy) -> Self {
        Self { positions, policy }
    }

    pub fn hides(&self, position: u32) -> bool {
        self.policy == MaskPolicy::Hide && self.positions.contains(position)
    }

    pub fn highlights(&self, position: u32) -> bool {
        self.policy == MaskPolicy::Highlight && self.positions.contains(position)
    }
}
