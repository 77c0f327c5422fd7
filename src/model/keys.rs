//! Natural keys
//!
//! Every entity is identified by a natural key derived from its source
//! attributes. Keys are case-normalized so two pages that spell the same
//! disc or company differently still land on one entity. The derived `Ord`
//! is the order the finalized table is streamed in.

use crate::model::normalize::fold_key;
use std::fmt;

/// Normalized company name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompanyKey(String);

impl CompanyKey {
    /// Builds a key from a (canonical) company display name
    ///
    /// Returns None when the name is blank.
    pub fn new(name: &str) -> Option<Self> {
        let folded = fold_key(name);
        if folded.is_empty() {
            None
        } else {
            Some(Self(folded))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompanyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// (manufacturer, model) pair identifying one disc mold
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DiscKey {
    pub manufacturer: CompanyKey,
    pub model: String,
}

impl DiscKey {
    pub fn new(manufacturer: CompanyKey, model: &str) -> Option<Self> {
        let model = fold_key(model);
        if model.is_empty() {
            None
        } else {
            Some(Self {
                manufacturer,
                model,
            })
        }
    }
}

impl fmt::Display for DiscKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.manufacturer, self.model)
    }
}

/// PDGA member number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerKey(pub u32);

impl fmt::Display for PlayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tournament ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKey(pub u32);

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key of any entity kind
///
/// Variant order matters: the sink receives companies first, then discs,
/// players and events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKey {
    Company(CompanyKey),
    Disc(DiscKey),
    Player(PlayerKey),
    Event(EventKey),
}

impl EntityKey {
    /// Entity kind name as stored by sinks
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Company(_) => "company",
            Self::Disc(_) => "disc",
            Self::Player(_) => "player",
            Self::Event(_) => "event",
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Company(key) => write!(f, "company:{}", key),
            Self::Disc(key) => write!(f, "disc:{}", key),
            Self::Player(key) => write!(f, "player:{}", key),
            Self::Event(key) => write!(f, "event:{}", key),
        }
    }
}
