use crate::crawler::RawPage;
use crate::model::{non_empty, Candidate, EventCandidate};
use crate::parser::html::parse_date;
use crate::parser::{PageParser, ParseContext, ParseError, ParsedPage};
use crate::source::PageKind;
use serde_json::Value;

/// Parses the live-results JSON document of one event
///
/// Only the `data` object is read. Every attribute is optional and read
/// with per-field tolerance: a field of the wrong JSON type is dropped.
pub struct EventResultsParser;

impl PageParser for EventResultsParser {
    fn kind(&self) -> PageKind {
        PageKind::EventResults
    }

    fn parse(&self, page: &RawPage, _ctx: &ParseContext) -> Result<ParsedPage, ParseError> {
        let document: Value = serde_json::from_str(&page.body)
            .map_err(|e| ParseError::new(&page.descriptor, format!("invalid JSON: {}", e)))?;

        let data = document
            .get("data")
            .filter(|data| data.is_object())
            .ok_or_else(|| ParseError::new(&page.descriptor, "no data object"))?;

        let id = json_u32(data, "TournID")
            .or_else(|| page.descriptor.cursor.parse().ok())
            .ok_or_else(|| ParseError::new(&page.descriptor, "no tournament id"))?;

        let mut parsed = ParsedPage::new();
        parsed.candidates.push(Candidate::Event(EventCandidate {
            id,
            name: json_string(data, "Name"),
            start_date: json_string(data, "StartDate").and_then(|raw| parse_date(&raw)),
            end_date: json_string(data, "EndDate").and_then(|raw| parse_date(&raw)),
            location: json_string(data, "Location"),
            tier: json_string(data, "Tier"),
            director: json_string(data, "TD"),
            website: json_string(data, "Website"),
        }));
        Ok(parsed)
    }
}

fn json_string(data: &Value, key: &str) -> Option<String> {
    match data.get(key)? {
        Value::String(s) => non_empty(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_u32(data: &Value, key: &str) -> Option<u32> {
    match data.get(key)? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
