//! Named seed sets.
//!
//! A seed set is an ordered list of integer seeds. Order matters: the first
//! seed is driven by the lowest frequency bin and the last by the highest.
//! Sets come either from one inline spec (`--seeds-list`) or from a YAML file
//! mapping names to specs (`--seeds-file`).

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Seed value, selects one pseudo-random noise vector
pub type Seed = u32;

/// Name given to the only set built from `--seeds-list`
pub const INLINE_SET_NAME: &str = "default";

/// An ordered, immutable list of seeds under a unique name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedSet {
    pub name: String,
    pub seeds: Vec<Seed>,
}

impl SeedSet {
    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }
}

/// Largest number of seeds a single `a-b` range may expand to
pub const MAX_RANGE_LEN: u32 = 65_536;

/// Parse a comma-separated mix of integers and inclusive `a-b` ranges.
///
/// `"1,3,5-7"` yields `[1, 3, 5, 6, 7]`. Empty tokens are skipped.
pub fn parse_seed_spec(spec: &str) -> Result<Vec<Seed>> {
    let mut seeds = Vec::new();
    for token in spec.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.split_once('-') {
            Some((start, end)) => {
                let start = parse_seed(start, token)?;
                let end = parse_seed(end, token)?;
                if start > end || end - start >= MAX_RANGE_LEN {
                    return Err(Error::InvalidSeedToken(token.to_string()));
                }
                seeds.extend(start..=end);
            }
            None => seeds.push(parse_seed(token, token)?),
        }
    }
    Ok(seeds)
}

fn parse_seed(digits: &str, token: &str) -> Result<Seed> {
    let digits = digits.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidSeedToken(token.to_string()));
    }
    digits
        .parse()
        .map_err(|_| Error::InvalidSeedToken(token.to_string()))
}

/// One entry in a seeds file: a spec string, a single seed or a list
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SeedSpec {
    Text(String),
    Single(Seed),
    List(Vec<Seed>),
}

impl SeedSpec {
    fn into_seeds(self) -> Result<Vec<Seed>> {
        match self {
            SeedSpec::Text(spec) => parse_seed_spec(&spec),
            SeedSpec::Single(seed) => Ok(vec![seed]),
            SeedSpec::List(seeds) => Ok(seeds),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SeedsFile {
    #[serde(default)]
    start: Option<String>,
    seeds: serde_yaml::Mapping,
}

/// All seed sets known to this run, in definition order
#[derive(Debug, Clone)]
pub struct SeedRegistry {
    sets: Vec<SeedSet>,
    start: String,
}

impl SeedRegistry {
    /// Build from exactly one of an inline spec or a seeds file path
    pub fn from_sources(list: Option<&str>, file: Option<&Path>) -> Result<Self> {
        match (list, file) {
            (Some(list), None) => Self::from_list(list),
            (None, Some(path)) => Self::from_file(path),
            _ => Err(Error::SeedSourceConflict),
        }
    }

    /// Single set named [`INLINE_SET_NAME`]
    pub fn from_list(spec: &str) -> Result<Self> {
        let set = SeedSet {
            name: INLINE_SET_NAME.to_string(),
            seeds: parse_seed_spec(spec)?,
        };
        Self::new(vec![set], None)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let file: SeedsFile = serde_yaml::from_str(text)?;

        let mut sets = Vec::with_capacity(file.seeds.len());
        for (key, value) in file.seeds {
            let name = match key {
                serde_yaml::Value::String(name) => name,
                serde_yaml::Value::Number(n) => n.to_string(),
                other => {
                    return Err(Error::InvalidConfig(format!(
                        "seed set names must be strings, got {:?}",
                        other
                    )))
                }
            };
            let spec: SeedSpec = serde_yaml::from_value(value)?;
            let seeds = spec.into_seeds()?;
            sets.push(SeedSet { name, seeds });
        }

        Self::new(sets, file.start)
    }

    fn new(sets: Vec<SeedSet>, start: Option<String>) -> Result<Self> {
        for (i, set) in sets.iter().enumerate() {
            if set.is_empty() {
                return Err(Error::EmptySeedSet(set.name.clone()));
            }
            if sets[..i].iter().any(|other| other.name == set.name) {
                return Err(Error::DuplicateSeedSet(set.name.clone()));
            }
        }

        let start = match start {
            Some(name) if sets.iter().any(|s| s.name == name) => name,
            Some(name) => return Err(Error::UnknownSeedSet(name)),
            None => sets
                .first()
                .map(|s| s.name.clone())
                .ok_or_else(|| Error::InvalidConfig("no seed sets defined".to_string()))?,
        };

        debug!(sets = sets.len(), start = %start, "seed registry loaded");
        Ok(Self { sets, start })
    }

    pub fn get(&self, name: &str) -> Option<&SeedSet> {
        self.sets.iter().find(|s| s.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Name of the set shown first
    pub fn start_name(&self) -> &str {
        &self.start
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sets.iter().map(|s| s.name.as_str())
    }

    pub fn sets(&self) -> impl Iterator<Item = &SeedSet> {
        self.sets.iter()
    }
}
