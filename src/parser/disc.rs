use crate::crawler::RawPage;
use crate::model::{Candidate, DiscCandidate, ReleaseStatus, Tenths, Thousandths};
use crate::parser::html::{
    all_texts, first_attr, first_text, has_next_page, parse_date, select_all, select_in,
};
use crate::parser::{PageParser, ParseContext, ParseError, ParsedPage};
use crate::source::{PageDescriptor, PageKind};
use scraper::{ElementRef, Html};

/// Parses the paginated approved-disc listing
///
/// Rows carry only manufacturer, model and approval date. Each row that
/// links to a detail page also yields a disc detail descriptor.
pub struct DiscIndexParser;

impl PageParser for DiscIndexParser {
    fn kind(&self) -> PageKind {
        PageKind::DiscIndex
    }

    fn parse(&self, page: &RawPage, ctx: &ParseContext) -> Result<ParsedPage, ParseError> {
        let document = Html::parse_document(&page.body);
        let tables = select_all(&document, "table.views-table");
        let table = tables
            .first()
            .ok_or_else(|| ParseError::new(&page.descriptor, "no disc listing table"))?;

        let mut parsed = ParsedPage::new();

        for row in select_in(*table, "tbody tr") {
            let manufacturer = first_text(row, "td.views-field-field-equipment-manuf-ref");
            let model = first_text(row, "td.views-field-title");

            if let Some(href) = first_attr(row, "td.views-field-title a[href]", "href") {
                match PageDescriptor::disc_detail_from_href(&href, &ctx.base_url) {
                    Some(detail) => parsed.discovered.push(detail),
                    None => tracing::debug!("Ignoring non-disc link {} on {}", href, page.descriptor),
                }
            }

            let (Some(manufacturer), Some(model)) = (manufacturer, model) else {
                tracing::debug!("Skipping disc row without manufacturer or model on {}", page.descriptor);
                continue;
            };

            parsed.candidates.push(Candidate::Disc(DiscCandidate {
                manufacturer: ctx.aliases.canonical(&manufacturer),
                model,
                approved: first_text(row, "td.views-field-field-equipment-approval-date")
                    .and_then(|raw| parse_date(&raw)),
                ..Default::default()
            }));
        }

        if has_next_page(&document) {
            parsed.discovered.push(page.descriptor.next_page());
        }

        Ok(parsed)
    }
}

/// Parses one disc's detail page into a deep record
pub struct DiscDetailParser;

impl PageParser for DiscDetailParser {
    fn kind(&self) -> PageKind {
        PageKind::DiscDetail
    }

    fn parse(&self, page: &RawPage, ctx: &ParseContext) -> Result<ParsedPage, ParseError> {
        let document = Html::parse_document(&page.body);
        let root = document.root_element();

        let model = first_text(root, "h1.page-title")
            .or_else(|| first_text(root, "h1"))
            .ok_or_else(|| ParseError::new(&page.descriptor, "no disc title"))?;
        let manufacturer = field_text(root, "manufacturer")
            .ok_or_else(|| ParseError::new(&page.descriptor, "no manufacturer field"))?;

        let candidate = DiscCandidate {
            manufacturer: ctx.aliases.canonical(&manufacturer),
            model,
            speed: field_number(root, "speed"),
            glide: field_number(root, "glide"),
            turn: field_number(root, "turn"),
            fade: field_number(root, "fade"),
            plastics: all_texts(root, "div.field--plastics .field__item")
                .into_iter()
                .collect(),
            status: field_text(root, "status").and_then(|raw| ReleaseStatus::parse(&raw)),
            approved: field_text(root, "approved").and_then(|raw| parse_date(&raw)),
            max_weight: field_number(root, "max-weight"),
            diameter: field_number(root, "diameter"),
            rim_depth: field_number(root, "rim-depth"),
            height: field_number(root, "height"),
            rim_diameter_inside: field_number(root, "rim-diameter-inside"),
            rim_thickness: field_number(root, "rim-thickness"),
            rim_ratio: field_fine(root, "rim-ratio"),
            rim_config: field_number(root, "rim-config"),
            flex: field_fine(root, "flex"),
            cert: field_text(root, "cert"),
        };

        if candidate.key().is_none() {
            return Err(ParseError::new(&page.descriptor, "disc has no usable key"));
        }

        let mut parsed = ParsedPage::new();
        parsed.candidates.push(Candidate::Disc(candidate));
        Ok(parsed)
    }
}

/// Value text of a `div.field--{name}` block
fn field_text(root: ElementRef<'_>, name: &str) -> Option<String> {
    first_text(root, &format!("div.field--{} .field__item", name))
}

fn field_number(root: ElementRef<'_>, name: &str) -> Option<Tenths> {
    field_parsed(root, name, Tenths::parse)
}

/// Like [`field_number`] for values with three fractional digits
fn field_fine(root: ElementRef<'_>, name: &str) -> Option<Thousandths> {
    field_parsed(root, name, Thousandths::parse)
}

fn field_parsed<T>(root: ElementRef<'_>, name: &str, parse: fn(&str) -> Option<T>) -> Option<T> {
    let raw = field_text(root, name)?;
    let value = parse(&raw);
    if value.is_none() {
        tracing::debug!("Unreadable {} value '{}'", name, raw);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::test_support::{context, page};
    use chrono::NaiveDate;

    const LISTING: &str = r#"
        <table class="views-table"><tbody>
          <tr>
            <td class="views-field-field-equipment-manuf-ref">Innova Champion Discs</td>
            <td class="views-field-title"><a href="/technical-standards/equipment-certification/discs/destroyer">Destroyer</a></td>
            <td class="views-field-field-equipment-approval-date">2007-01-19</td>
          </tr>
          <tr>
            <td class="views-field-field-equipment-manuf-ref">Discraft</td>
            <td class="views-field-title"><a href="/technical-standards/equipment-certification/discs/buzzz">Buzzz</a></td>
            <td class="views-field-field-equipment-approval-date">not a date</td>
          </tr>
          <tr>
            <td class="views-field-field-equipment-manuf-ref"></td>
            <td class="views-field-title">Orphan</td>
          </tr>
        </tbody></table>
        <ul class="pager"><li class="pager__item--next"><a href="?page=3">Next</a></li></ul>
    "#;

    const DETAIL: &str = r#"
        <html><body>
        <h1 class="page-title">Destroyer</h1>
        <div class="field--manufacturer"><div class="field__label">Manufacturer</div><div class="field__item">Innova</div></div>
        <div class="field--speed"><div class="field__item">12</div></div>
        <div class="field--glide"><div class="field__item">5</div></div>
        <div class="field--turn"><div class="field__item">-1</div></div>
        <div class="field--fade"><div class="field__item">3</div></div>
        <div class="field--plastics">
          <div class="field__item">Star</div>
          <div class="field__item">Champion</div>
          <div class="field__item">DX</div>
        </div>
        <div class="field--status"><div class="field__item">In Production</div></div>
        <div class="field--max-weight"><div class="field__item">175.1 gr</div></div>
        <div class="field--diameter"><div class="field__item">21.1 cm</div></div>
        <div class="field--rim-depth"><div class="field__item">1.2 cm</div></div>
        <div class="field--approved"><div class="field__item">2007-01-19</div></div>
        <div class="field--height"><div class="field__item">1.4 cm</div></div>
        <div class="field--rim-diameter-inside"><div class="field__item">16.7 cm</div></div>
        <div class="field--rim-thickness"><div class="field__item">2.2 cm</div></div>
        <div class="field--rim-ratio"><div class="field__item">0.057</div></div>
        <div class="field--rim-config"><div class="field__item">34.5</div></div>
        <div class="field--flex"><div class="field__item">9.07 kg</div></div>
        <div class="field--cert"><div class="field__item">Certified 2007</div></div>
        </body></html>
    "#;

    #[test]
    fn test_index_rows_details_and_pager() {
        let raw = page(PageDescriptor::index(PageKind::DiscIndex, 2), LISTING);
        let parsed = DiscIndexParser.parse(&raw, &context()).unwrap();

        assert_eq!(parsed.candidates.len(), 2);
        assert_eq!(
            parsed.discovered,
            vec![
                PageDescriptor::detail(PageKind::DiscDetail, "destroyer"),
                PageDescriptor::detail(PageKind::DiscDetail, "buzzz"),
                PageDescriptor::index(PageKind::DiscIndex, 3),
            ]
        );

        let Candidate::Disc(destroyer) = &parsed.candidates[0] else {
            panic!("expected a disc candidate");
        };
        assert_eq!(destroyer.manufacturer, "Innova Champion Discs");
        assert_eq!(destroyer.model, "Destroyer");
        assert_eq!(destroyer.approved, NaiveDate::from_ymd_opt(2007, 1, 19));
        assert_eq!(destroyer.speed, None);

        // A malformed date drops the attribute, not the row
        let Candidate::Disc(buzzz) = &parsed.candidates[1] else {
            panic!("expected a disc candidate");
        };
        assert_eq!(buzzz.approved, None);
    }

    #[test]
    fn test_detail_page() {
        let raw = page(PageDescriptor::detail(PageKind::DiscDetail, "destroyer"), DETAIL);
        let parsed = DiscDetailParser.parse(&raw, &context()).unwrap();

        assert!(parsed.discovered.is_empty());
        assert_eq!(parsed.candidates.len(), 1);
        let Candidate::Disc(disc) = &parsed.candidates[0] else {
            panic!("expected a disc candidate");
        };

        assert_eq!(disc.manufacturer, "Innova");
        assert_eq!(disc.model, "Destroyer");
        assert_eq!(disc.speed, Some(Tenths(120)));
        assert_eq!(disc.glide, Some(Tenths(50)));
        assert_eq!(disc.turn, Some(Tenths(-10)));
        assert_eq!(disc.fade, Some(Tenths(30)));
        assert_eq!(disc.plastics.len(), 3);
        assert!(disc.plastics.contains("Champion"));
        assert_eq!(disc.status, Some(ReleaseStatus::InProduction));
        assert_eq!(disc.max_weight, Some(Tenths(1751)));
        assert_eq!(disc.diameter, Some(Tenths(211)));
        assert_eq!(disc.rim_depth, Some(Tenths(12)));
        assert_eq!(disc.approved, NaiveDate::from_ymd_opt(2007, 1, 19));
    }

    #[test]
    fn test_detail_rim_measurements() {
        let raw = page(PageDescriptor::detail(PageKind::DiscDetail, "destroyer"), DETAIL);
        let parsed = DiscDetailParser.parse(&raw, &context()).unwrap();
        let Candidate::Disc(disc) = &parsed.candidates[0] else {
            panic!("expected a disc candidate");
        };

        assert_eq!(disc.height, Some(Tenths(14)));
        assert_eq!(disc.rim_diameter_inside, Some(Tenths(167)));
        assert_eq!(disc.rim_thickness, Some(Tenths(22)));
        assert_eq!(disc.rim_ratio, Some(Thousandths(57)));
        assert_eq!(disc.rim_config, Some(Tenths(345)));
        assert_eq!(disc.flex, Some(Thousandths(9070)));
        assert_eq!(disc.cert.as_deref(), Some("Certified 2007"));

        // Pages without the rim block still parse
        let sparse = DETAIL.replace(
            r#"<div class="field--rim-ratio"><div class="field__item">0.057</div></div>"#,
            "",
        );
        let raw = page(PageDescriptor::detail(PageKind::DiscDetail, "destroyer"), &sparse);
        let parsed = DiscDetailParser.parse(&raw, &context()).unwrap();
        let Candidate::Disc(disc) = &parsed.candidates[0] else {
            panic!("expected a disc candidate");
        };
        assert_eq!(disc.rim_ratio, None);
        assert_eq!(disc.rim_thickness, Some(Tenths(22)));
    }

    #[test]
    fn test_detail_tolerates_corrupt_flight_number() {
        let body = DETAIL.replace(
            r#"<div class="field--glide"><div class="field__item">5</div></div>"#,
            r#"<div class="field--glide"><div class="field__item">five</div></div>"#,
        );
        let raw = page(PageDescriptor::detail(PageKind::DiscDetail, "destroyer"), &body);
        let parsed = DiscDetailParser.parse(&raw, &context()).unwrap();

        let Candidate::Disc(disc) = &parsed.candidates[0] else {
            panic!("expected a disc candidate");
        };
        assert_eq!(disc.glide, None);
        assert_eq!(disc.speed, Some(Tenths(120)));
    }

    #[test]
    fn test_detail_without_manufacturer_fails() {
        let raw = page(
            PageDescriptor::detail(PageKind::DiscDetail, "mystery"),
            r#"<h1 class="page-title">Mystery</h1>"#,
        );
        let err = DiscDetailParser.parse(&raw, &context()).unwrap_err();
        assert_eq!(err.descriptor.cursor, "mystery");
    }

    #[test]
    fn test_detail_without_title_fails() {
        let raw = page(
            PageDescriptor::detail(PageKind::DiscDetail, "blank"),
            "<html><body></body></html>",
        );
        assert!(DiscDetailParser.parse(&raw, &context()).is_err());
    }
}
