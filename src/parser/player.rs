use crate::crawler::RawPage;
use crate::model::{non_empty, Candidate, PlayerCandidate};
use crate::parser::html::{first_text, first_year, leading_u32, strip_label};
use crate::parser::{PageParser, ParseContext, ParseError, ParsedPage};
use crate::source::PageKind;
use scraper::Html;

/// Parses a player profile page
///
/// Only the heading and the summary list are read. The member number is
/// taken from the descriptor, not the page.
pub struct PlayerProfileParser;

impl PageParser for PlayerProfileParser {
    fn kind(&self) -> PageKind {
        PageKind::PlayerProfile
    }

    fn parse(&self, page: &RawPage, _ctx: &ParseContext) -> Result<ParsedPage, ParseError> {
        let number: u32 = page.descriptor.cursor.parse().map_err(|_| {
            ParseError::new(
                &page.descriptor,
                format!("'{}' is not a PDGA number", page.descriptor.cursor),
            )
        })?;

        let document = Html::parse_document(&page.body);
        let root = document.root_element();

        let heading = first_text(root, "h1")
            .ok_or_else(|| ParseError::new(&page.descriptor, "no player heading"))?;

        // "Paul McBeth #27523"
        let name = match heading.rsplit_once(" #") {
            Some((name, _)) => non_empty(name),
            None => non_empty(&heading),
        };

        let line = |class: &str| {
            first_text(root, &format!("ul.player-info li.{}", class))
                .map(|text| strip_label(&text))
                .filter(|text| !text.is_empty())
        };

        let mut parsed = ParsedPage::new();
        parsed.candidates.push(Candidate::Player(PlayerCandidate {
            number,
            name,
            location: line("location"),
            classification: line("classification"),
            membership_status: line("membership-status"),
            member_since: line("join-date").and_then(|text| first_year(&text)),
            rating: line("current-rating").and_then(|text| leading_u32(&text)),
        }));
        Ok(parsed)
    }
}
