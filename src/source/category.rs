use crate::config::SourceConfig;
use crate::source::PageDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A crawl category that can be switched on in the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Companies,
    Discs,
    Players,
    Events,
}

impl Category {
    /// Builds the seed descriptors this category contributes to a fresh frontier
    ///
    /// Index categories start from page 0 of their listing; players and
    /// events have no listing, so each configured ID becomes its own seed.
    pub fn seeds(&self, source: &SourceConfig) -> Vec<PageDescriptor> {
        match self {
            Self::Companies => vec![PageDescriptor::index(PageKind::CompanyIndex, 0)],
            Self::Discs => vec![PageDescriptor::index(PageKind::DiscIndex, 0)],
            Self::Players => source
                .player_ids
                .iter()
                .map(|id| PageDescriptor::detail(PageKind::PlayerProfile, id.to_string()))
                .collect(),
            Self::Events => source
                .event_ids
                .iter()
                .map(|id| PageDescriptor::detail(PageKind::EventResults, id.to_string()))
                .collect(),
        }
    }
}

/// The structural shape of a source page
///
/// Each kind maps to exactly one parser; this is the dispatch key for the
/// parser registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PageKind {
    /// Paginated manufacturer listing
    CompanyIndex,
    /// Paginated approved-disc listing
    DiscIndex,
    /// One disc's detail page
    DiscDetail,
    /// One player's profile page
    PlayerProfile,
    /// One event's live-results document (JSON)
    EventResults,
}

impl PageKind {
    /// Returns true for listing pages that yield many shallow records
    pub fn is_index(&self) -> bool {
        matches!(self, Self::CompanyIndex | Self::DiscIndex)
    }

    /// Frontier priority (lower is fetched first)
    ///
    /// Listings go first so detail descriptors are discovered early.
    pub fn priority(&self) -> u32 {
        if self.is_index() {
            0
        } else {
            10
        }
    }

    /// Converts the kind to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::CompanyIndex => "company_index",
            Self::DiscIndex => "disc_index",
            Self::DiscDetail => "disc_detail",
            Self::PlayerProfile => "player_profile",
            Self::EventResults => "event_results",
        }
    }

    /// Parses a kind from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "company_index" => Some(Self::CompanyIndex),
            "disc_index" => Some(Self::DiscIndex),
            "disc_detail" => Some(Self::DiscDetail),
            "player_profile" => Some(Self::PlayerProfile),
            "event_results" => Some(Self::EventResults),
            _ => None,
        }
    }

    /// Returns all page kinds
    pub fn all_kinds() -> Vec<Self> {
        vec![
            Self::CompanyIndex,
            Self::DiscIndex,
            Self::DiscDetail,
            Self::PlayerProfile,
            Self::EventResults,
        ]
    }
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
