//! Page parsers
//!
//! Turns one fetched page into candidate records plus the page descriptors
//! it links to. Dispatch is keyed on the descriptor's page kind, never on
//! the payload: every kind has exactly one parser registered in the
//! [`ParserRegistry`].
//!
//! Parsers are tolerant of missing or malformed fields (the attribute is
//! simply absent), but a page whose structure is unusable is reported as a
//! [`ParseError`] and recorded against its descriptor.

mod company;
mod disc;
mod event;
mod html;
mod player;

pub use company::CompanyIndexParser;
pub use disc::{DiscDetailParser, DiscIndexParser};
pub use event::EventResultsParser;
pub use player::PlayerProfileParser;

use crate::crawler::RawPage;
use crate::model::{Candidate, CompanyAliases};
use crate::source::{PageDescriptor, PageKind};
use std::collections::HashMap;
use thiserror::Error;
use url::Url;

/// A page that could not be turned into records
#[derive(Debug, Clone, Error)]
#[error("failed to parse {descriptor}: {reason}")]
pub struct ParseError {
    pub descriptor: PageDescriptor,
    pub reason: String,
}

impl ParseError {
    pub fn new(descriptor: &PageDescriptor, reason: impl Into<String>) -> Self {
        Self {
            descriptor: descriptor.clone(),
            reason: reason.into(),
        }
    }
}

/// Everything a parser needs besides the page itself
#[derive(Debug, Clone)]
pub struct ParseContext {
    /// Site root, used to resolve relative links
    pub base_url: Url,
    pub aliases: CompanyAliases,
}

impl ParseContext {
    pub fn new(base_url: Url, aliases: CompanyAliases) -> Self {
        Self { base_url, aliases }
    }
}

/// Output of parsing one page
///
/// Consumed once: iterating yields the candidate records, while the
/// discovered descriptors are read off the struct before that.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPage {
    pub candidates: Vec<Candidate>,
    pub discovered: Vec<PageDescriptor>,
}

impl ParsedPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty() && self.discovered.is_empty()
    }
}

impl IntoIterator for ParsedPage {
    type Item = Candidate;
    type IntoIter = std::vec::IntoIter<Candidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.into_iter()
    }
}

/// Parser for one structural page kind
pub trait PageParser: Send + Sync {
    /// The page kind this parser handles
    fn kind(&self) -> PageKind;

    /// Parses a fetched page
    fn parse(&self, page: &RawPage, ctx: &ParseContext) -> Result<ParsedPage, ParseError>;
}

/// Fixed mapping from page kind to parser
pub struct ParserRegistry {
    parsers: HashMap<PageKind, Box<dyn PageParser>>,
}

impl ParserRegistry {
    /// Creates a registry with a parser for every page kind
    pub fn new() -> Self {
        let mut registry = Self {
            parsers: HashMap::new(),
        };
        registry.register(Box::new(CompanyIndexParser));
        registry.register(Box::new(DiscIndexParser));
        registry.register(Box::new(DiscDetailParser));
        registry.register(Box::new(PlayerProfileParser));
        registry.register(Box::new(EventResultsParser));
        registry
    }

    /// Registers a parser, replacing any previous one for the same kind
    pub fn register(&mut self, parser: Box<dyn PageParser>) {
        self.parsers.insert(parser.kind(), parser);
    }

    pub fn get(&self, kind: PageKind) -> Option<&dyn PageParser> {
        self.parsers.get(&kind).map(|p| p.as_ref())
    }

    /// Parses a page with the parser registered for its kind
    pub fn parse(&self, page: &RawPage, ctx: &ParseContext) -> Result<ParsedPage, ParseError> {
        let parser = self.get(page.descriptor.kind).ok_or_else(|| {
            ParseError::new(
                &page.descriptor,
                format!("no parser registered for {}", page.descriptor.kind),
            )
        })?;

        let parsed = parser.parse(page, ctx)?;
        tracing::debug!(
            "Parsed {}: {} candidates, {} discovered",
            page.descriptor,
            parsed.candidates.len(),
            parsed.discovered.len()
        );
        Ok(parsed)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{context, page};
    use super::*;

    #[test]
    fn test_registry_covers_every_kind() {
        let registry = ParserRegistry::new();
        for kind in PageKind::all_kinds() {
            let parser = registry.get(kind).unwrap();
            assert_eq!(parser.kind(), kind);
        }
    }

    #[test]
    fn test_dispatch_is_by_kind_not_payload() {
        // A JSON body on an HTML page kind is parsed as HTML, and fails
        let registry = ParserRegistry::new();
        let raw = page(
            PageDescriptor::index(PageKind::CompanyIndex, 0),
            r#"{"data": {"TournID": 1}}"#,
        );
        let err = registry.parse(&raw, &context()).unwrap_err();
        assert_eq!(err.descriptor.kind, PageKind::CompanyIndex);
    }

    #[test]
    fn test_parsed_page_iterates_candidates() {
        let parsed = ParsedPage {
            candidates: vec![Candidate::Player(Default::default())],
            discovered: vec![PageDescriptor::index(PageKind::DiscIndex, 1)],
        };
        assert!(!parsed.is_empty());
        assert_eq!(parsed.into_iter().count(), 1);
    }
}
