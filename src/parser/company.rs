use crate::crawler::RawPage;
use crate::model::{Candidate, CompanyCandidate, CompanyDetails};
use crate::parser::html::{first_attr, first_text, has_next_page, select_all, select_in};
use crate::parser::{PageParser, ParseContext, ParseError, ParsedPage};
use crate::source::PageKind;
use scraper::{ElementRef, Html};
use url::Url;

/// Parses the paginated manufacturer listing
///
/// Each table row yields a shallow company record. The page also yields the
/// next listing page when the pager shows one.
pub struct CompanyIndexParser;

impl PageParser for CompanyIndexParser {
    fn kind(&self) -> PageKind {
        PageKind::CompanyIndex
    }

    fn parse(&self, page: &RawPage, ctx: &ParseContext) -> Result<ParsedPage, ParseError> {
        let document = Html::parse_document(&page.body);
        let tables = select_all(&document, "table.views-table");
        let table = tables
            .first()
            .ok_or_else(|| ParseError::new(&page.descriptor, "no manufacturer listing table"))?;

        let mut parsed = ParsedPage::new();

        for row in select_in(*table, "tbody tr") {
            let Some(raw_name) = first_text(row, "td.views-field-title") else {
                tracing::debug!("Skipping manufacturer row without a name on {}", page.descriptor);
                continue;
            };

            let city = first_text(row, "td.views-field-field-city");
            let state = first_text(row, "td.views-field-field-state");
            let country = first_text(row, "td.views-field-field-country");
            let location = join_location(&[&city, &state, &country]);

            let mut details = CompanyDetails {
                address: first_text(row, "td.views-field-field-address"),
                city,
                state,
                postal_code: first_text(row, "td.views-field-field-postal-code"),
                country,
                phone: first_text(row, "td.views-field-field-phone"),
                contact_name: first_text(row, "td.views-field-field-contact-name"),
                contact_email: contact_email(row),
                contact_phone: first_text(row, "td.views-field-field-contact-phone"),
                ..Default::default()
            };
            for href in select_in(row, "a[href]")
                .into_iter()
                .filter_map(|link| link.value().attr("href"))
            {
                assign_social(&mut details, href);
            }

            parsed.candidates.push(Candidate::Company(CompanyCandidate {
                name: ctx.aliases.canonical(&raw_name),
                location,
                website: first_attr(row, "td.views-field-field-website a[href]", "href"),
                active: first_text(row, "td.views-field-field-status")
                    .and_then(|status| parse_active(&status)),
                details,
            }));
        }

        if has_next_page(&document) {
            parsed.discovered.push(page.descriptor.next_page());
        }

        Ok(parsed)
    }
}

fn join_location(parts: &[&Option<String>]) -> Option<String> {
    let parts: Vec<&str> = parts.iter().filter_map(|part| part.as_deref()).collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}

/// Contact email from a mailto link, falling back to the cell text
fn contact_email(row: ElementRef<'_>) -> Option<String> {
    let cell = "td.views-field-field-contact-email";
    first_attr(row, &format!("{} a[href^=\"mailto:\"]", cell), "href")
        .map(|href| href.trim_start_matches("mailto:").to_string())
        .or_else(|| first_text(row, cell))
        .filter(|email| email.contains('@'))
}

/// Files a profile link under the social network it points at
fn assign_social(details: &mut CompanyDetails, href: &str) {
    let Some(host) = Url::parse(href)
        .ok()
        .and_then(|url| url.host_str().map(|host| host.trim_start_matches("www.").to_string()))
    else {
        return;
    };

    let slot = match host.as_str() {
        "twitter.com" | "x.com" => &mut details.twitter,
        "facebook.com" | "fb.com" => &mut details.facebook,
        "instagram.com" => &mut details.instagram,
        "youtube.com" | "youtu.be" => &mut details.youtube,
        _ => return,
    };
    slot.get_or_insert_with(|| href.to_string());
}

fn parse_active(status: &str) -> Option<bool> {
    match status.trim().to_lowercase().as_str() {
        "active" => Some(true),
        "inactive" => Some(false),
        _ => None,
    }
}
