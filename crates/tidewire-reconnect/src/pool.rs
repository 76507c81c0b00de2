//! Weighted selection of cluster members.

use rand::Rng;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tidewire_core::ConfigError;

/// Weight assigned to addresses given without an explicit weight.
pub const DEFAULT_WEIGHT: u8 = 100;

/// Largest accepted weight.
pub const MAX_WEIGHT: u8 = 100;

/// A candidate server and its load-balancing weight.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerEntry {
    address: String,
    weight: u8,
}

impl ServerEntry {
    /// Creates an entry, validating the weight.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidWeight`] if `weight` exceeds [`MAX_WEIGHT`],
    /// or [`ConfigError::MalformedServer`] for an empty address.
    pub fn new(address: impl Into<String>, weight: u8) -> Result<Self, ConfigError> {
        let address = address.into();
        if address.trim().is_empty() {
            return Err(ConfigError::MalformedServer(address));
        }
        if weight > MAX_WEIGHT {
            return Err(ConfigError::InvalidWeight {
                address,
                weight: weight.to_string(),
            });
        }
        Ok(Self { address, weight })
    }

    /// Returns the network address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the weight.
    pub fn weight(&self) -> u8 {
        self.weight
    }
}

impl FromStr for ServerEntry {
    type Err = ConfigError;

    /// Parses `"[weight ]address"`, e.g. `"50 p2.example.com:80"` or
    /// `"p1.example.com:80"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let (first, second, rest) = (parts.next(), parts.next(), parts.next());

        match (first, second, rest) {
            (Some(address), None, None) => Self::new(address, DEFAULT_WEIGHT),
            (Some(weight), Some(address), None) => {
                let parsed = weight
                    .parse::<u8>()
                    .ok()
                    .filter(|w| *w <= MAX_WEIGHT)
                    .ok_or_else(|| ConfigError::InvalidWeight {
                        address: address.to_string(),
                        weight: weight.to_string(),
                    })?;
                Self::new(address, parsed)
            }
            _ => Err(ConfigError::MalformedServer(s.to_string())),
        }
    }
}

impl fmt::Display for ServerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.weight, self.address)
    }
}

/// The weighted set of candidate servers.
///
/// The set is immutable once configured; [`ServerPool::configure`] swaps in a
/// whole new list. Cloning is cheap.
#[derive(Debug, Clone, Default)]
pub struct ServerPool {
    entries: Arc<[ServerEntry]>,
}

impl ServerPool {
    /// Builds a pool from already validated entries.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyServerList`] if `entries` is empty.
    pub fn new(entries: Vec<ServerEntry>) -> Result<Self, ConfigError> {
        if entries.is_empty() {
            return Err(ConfigError::EmptyServerList);
        }
        Ok(Self {
            entries: entries.into(),
        })
    }

    /// Parses a list of `"[weight ]address"` strings into a pool.
    ///
    /// # Errors
    ///
    /// Returns the first parse error, or [`ConfigError::EmptyServerList`].
    pub fn parse<I, S>(servers: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = servers
            .into_iter()
            .map(|s| s.as_ref().parse::<ServerEntry>())
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(entries)
    }

    /// Replaces the candidate set wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyServerList`] and leaves the pool unchanged
    /// if `entries` is empty.
    pub fn configure(&mut self, entries: Vec<ServerEntry>) -> Result<(), ConfigError> {
        *self = Self::new(entries)?;
        Ok(())
    }

    /// Returns the configured entries.
    pub fn entries(&self) -> &[ServerEntry] {
        &self.entries
    }

    /// Returns true if no servers are configured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Picks a server with probability proportional to its weight.
    ///
    /// Entries equal to `excluding` are skipped, unless that would leave no
    /// selectable entry, in which case the whole set is sampled. Zero-weight
    /// entries are only chosen (uniformly) when every entry weighs zero.
    pub fn select_next<R: Rng>(
        &self,
        excluding: Option<&str>,
        rng: &mut R,
    ) -> Option<&ServerEntry> {
        let others = || {
            self.entries
                .iter()
                .filter(move |e| Some(e.address()) != excluding)
        };

        if let Some(entry) = weighted_pick(others(), rng) {
            return Some(entry);
        }
        if let Some(entry) = weighted_pick(self.entries.iter(), rng) {
            return Some(entry);
        }

        match self.entries.len() {
            0 => None,
            n => self.entries.get(rng.random_range(0..n)),
        }
    }
}

fn weighted_pick<'a, I, R>(candidates: I, rng: &mut R) -> Option<&'a ServerEntry>
where
    I: Iterator<Item = &'a ServerEntry> + Clone,
    R: Rng,
{
    let total: u32 = candidates.clone().map(|e| u32::from(e.weight)).sum();
    if total == 0 {
        return None;
    }

    let mut roll = rng.random_range(0..total);
    for entry in candidates {
        let weight = u32::from(entry.weight);
        if roll < weight {
            return Some(entry);
        }
        roll -= weight;
    }
    None
}
