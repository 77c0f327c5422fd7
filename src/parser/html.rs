//! Small scraping helpers shared by the HTML parsers

use crate::model::normalize_text;
use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};

/// Normalized text content of an element
pub fn text_of(element: ElementRef<'_>) -> String {
    normalize_text(&element.text().collect::<String>())
}

/// Text of the first element matching `css` under `scope`, if non-empty
pub fn first_text(scope: ElementRef<'_>, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    scope
        .select(&selector)
        .next()
        .map(text_of)
        .filter(|text| !text.is_empty())
}

/// Non-empty texts of every element matching `css` under `scope`
pub fn all_texts(scope: ElementRef<'_>, css: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(css) else {
        return Vec::new();
    };
    scope
        .select(&selector)
        .map(text_of)
        .filter(|text| !text.is_empty())
        .collect()
}

/// Attribute of the first element matching `css` under `scope`
pub fn first_attr(scope: ElementRef<'_>, css: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    scope
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr(attr))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Every element matching `css` in the document
pub fn select_all<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

/// Every element matching `css` under `scope`
pub fn select_in<'a>(scope: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => scope.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

/// Returns true if the listing has a "next page" pager link
pub fn has_next_page(document: &Html) -> bool {
    !select_all(document, "li.pager-next a[href], li.pager__item--next a[href]").is_empty()
}

/// Drops a leading "Label:" from a profile line
pub fn strip_label(text: &str) -> String {
    match text.split_once(':') {
        Some((_, value)) => normalize_text(value),
        None => normalize_text(text),
    }
}

/// Parses a date in any of the formats the source site uses
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    const FORMATS: [&str; 5] = ["%Y-%m-%d", "%m/%d/%Y", "%d-%b-%Y", "%B %d, %Y", "%b %d, %Y"];

    let raw = raw.trim();
    // Datetime values carry a time component after the date
    let date_part = raw.split(|c: char| c == 'T' || c == ' ').next().unwrap_or(raw);

    FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .or_else(|| NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok())
}

/// Parses the leading unsigned integer of a field ("1050 (as of ...)")
pub fn leading_u32(raw: &str) -> Option<u32> {
    let digits: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Finds the first four-digit year in a field ("Member Since: 2007")
pub fn first_year(raw: &str) -> Option<i32> {
    raw.split(|c: char| !c.is_ascii_digit())
        .find(|token| token.len() == 4)
        .and_then(|token| token.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_text_and_attr() {
        let document = Html::parse_fragment(
            r#"<div><span class="a"> Hello
                 world </span><a class="b" href=" /x ">link</a><span class="c"> </span></div>"#,
        );
        let root = document.root_element();
        assert_eq!(first_text(root, "span.a"), Some("Hello world".to_string()));
        assert_eq!(first_text(root, "span.c"), None);
        assert_eq!(first_text(root, "span.missing"), None);
        assert_eq!(first_attr(root, "a.b", "href"), Some("/x".to_string()));
    }

    #[test]
    fn test_has_next_page() {
        let with_pager = Html::parse_document(
            r#"<ul class="pager"><li class="pager-next"><a href="?page=1">next</a></li></ul>"#,
        );
        let without_pager = Html::parse_document(r#"<ul class="pager"></ul>"#);
        assert!(has_next_page(&with_pager));
        assert!(!has_next_page(&without_pager));
    }

    #[test]
    fn test_strip_label() {
        assert_eq!(strip_label("Classification:  Professional"), "Professional");
        assert_eq!(strip_label("Professional"), "Professional");
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2007, 1, 19);
        assert_eq!(parse_date("2007-01-19"), expected);
        assert_eq!(parse_date("01/19/2007"), expected);
        assert_eq!(parse_date("19-Jan-2007"), expected);
        assert_eq!(parse_date("January 19, 2007"), expected);
        assert_eq!(parse_date("2007-01-19T00:00:00"), expected);
        assert_eq!(parse_date("soon"), None);
    }

    #[test]
    fn test_numeric_helpers() {
        assert_eq!(leading_u32("1050 (as of 09-Jan-2024)"), Some(1050));
        assert_eq!(leading_u32("n/a"), None);
        assert_eq!(first_year("Member Since: 2007"), Some(2007));
        assert_eq!(first_year("none"), None);
    }
}
