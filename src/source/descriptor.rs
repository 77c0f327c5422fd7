use crate::source::PageKind;
use crate::{UrlError, UrlResult};
use std::fmt;
use url::Url;

/// Path of the manufacturer listing
pub const COMPANY_INDEX_PATH: &str = "/technical-standards/manufacturers";

/// Path of the approved-disc listing; disc detail pages live beneath it
pub const DISC_INDEX_PATH: &str = "/technical-standards/equipment-certification/discs";

/// Path prefix of player profile pages
pub const PLAYER_PATH: &str = "/player";

/// Path of the live-results event document
pub const EVENT_RESULTS_PATH: &str = "/apps/tournament/live-api/live_results_fetch_event";

/// A single unit of crawl work
///
/// Descriptors are immutable once enqueued. `page` is the listing page
/// number for index kinds; `cursor` is the slug or ID for detail kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageDescriptor {
    pub kind: PageKind,
    pub page: u32,
    pub cursor: String,
}

impl PageDescriptor {
    /// Creates a descriptor for page `page` of a listing
    pub fn index(kind: PageKind, page: u32) -> Self {
        Self {
            kind,
            page,
            cursor: String::new(),
        }
    }

    /// Creates a descriptor for a detail page identified by `cursor`
    pub fn detail(kind: PageKind, cursor: impl Into<String>) -> Self {
        Self {
            kind,
            page: 0,
            cursor: cursor.into(),
        }
    }

    /// Returns the descriptor for the following listing page
    pub fn next_page(&self) -> Self {
        Self {
            kind: self.kind,
            page: self.page + 1,
            cursor: self.cursor.clone(),
        }
    }

    /// Stable identity of this descriptor within a run
    ///
    /// This is the primary key of the resumption cursor, so it must not
    /// change between releases.
    pub fn key(&self) -> String {
        if self.kind.is_index() {
            format!("{}?page={}", self.kind, self.page)
        } else {
            format!("{}/{}", self.kind, self.cursor)
        }
    }

    /// Resolves this descriptor to an absolute URL on the source site
    ///
    /// # Arguments
    ///
    /// * `base_url` - The configured site root
    ///
    /// # Returns
    ///
    /// * `Ok(Url)` - The page URL
    /// * `Err(UrlError)` - The base URL cannot be joined with the page path
    pub fn url(&self, base_url: &Url) -> UrlResult<Url> {
        let path = match self.kind {
            PageKind::CompanyIndex => COMPANY_INDEX_PATH.to_string(),
            PageKind::DiscIndex => DISC_INDEX_PATH.to_string(),
            PageKind::DiscDetail => format!("{}/{}", DISC_INDEX_PATH, self.cursor),
            PageKind::PlayerProfile => format!("{}/{}", PLAYER_PATH, self.cursor),
            PageKind::EventResults => EVENT_RESULTS_PATH.to_string(),
        };

        let mut url = base_url
            .join(&path)
            .map_err(|e| UrlError::Parse(format!("{}: {}", path, e)))?;

        match self.kind {
            PageKind::CompanyIndex | PageKind::DiscIndex => {
                url.query_pairs_mut()
                    .append_pair("page", &self.page.to_string());
            }
            PageKind::EventResults => {
                url.query_pairs_mut().append_pair("TournID", &self.cursor);
            }
            PageKind::DiscDetail | PageKind::PlayerProfile => {}
        }

        Ok(url)
    }

    /// Builds a disc detail descriptor from a link found on a listing page
    ///
    /// Returns None when the link does not point at a disc detail page.
    pub fn disc_detail_from_href(href: &str, base_url: &Url) -> Option<Self> {
        let url = base_url.join(href.trim()).ok()?;
        let rest = url.path().strip_prefix(DISC_INDEX_PATH)?.strip_prefix('/')?;
        let slug = rest.trim_end_matches('/');

        if slug.is_empty() || slug.contains('/') {
            return None;
        }

        Some(Self::detail(PageKind::DiscDetail, slug))
    }
}

impl fmt::Display for PageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Extracts the rate-limiting host key from a URL
///
/// The host is lowercased and an explicit port is kept, so two local mock
/// servers on different ports are limited independently.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use disc_harvest::source::extract_host;
///
/// let url = Url::parse("https://WWW.PDGA.COM/player/27523").unwrap();
/// assert_eq!(extract_host(&url), Some("www.pdga.com".to_string()));
///
/// let url = Url::parse("http://127.0.0.1:8080/").unwrap();
/// assert_eq!(extract_host(&url), Some("127.0.0.1:8080".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://www.pdga.com").unwrap()
    }

    #[test]
    fn test_index_key_and_url() {
        let descriptor = PageDescriptor::index(PageKind::DiscIndex, 2);
        assert_eq!(descriptor.key(), "disc_index?page=2");
        assert_eq!(
            descriptor.url(&base()).unwrap().as_str(),
            "https://www.pdga.com/technical-standards/equipment-certification/discs?page=2"
        );
    }

    #[test]
    fn test_detail_key_and_url() {
        let descriptor = PageDescriptor::detail(PageKind::DiscDetail, "destroyer");
        assert_eq!(descriptor.key(), "disc_detail/destroyer");
        assert_eq!(
            descriptor.url(&base()).unwrap().as_str(),
            "https://www.pdga.com/technical-standards/equipment-certification/discs/destroyer"
        );

        let player = PageDescriptor::detail(PageKind::PlayerProfile, "27523");
        assert_eq!(
            player.url(&base()).unwrap().as_str(),
            "https://www.pdga.com/player/27523"
        );
    }

    #[test]
    fn test_event_url_carries_id_in_query() {
        let descriptor = PageDescriptor::detail(PageKind::EventResults, "78184");
        let url = descriptor.url(&base()).unwrap();
        assert_eq!(url.path(), EVENT_RESULTS_PATH);
        assert_eq!(url.query(), Some("TournID=78184"));
    }

    #[test]
    fn test_next_page() {
        let first = PageDescriptor::index(PageKind::CompanyIndex, 0);
        let second = first.next_page();
        assert_eq!(second.page, 1);
        assert_eq!(second.kind, PageKind::CompanyIndex);
        assert_ne!(first.key(), second.key());
    }

    #[test]
    fn test_disc_detail_from_relative_href() {
        let descriptor = PageDescriptor::disc_detail_from_href(
            "/technical-standards/equipment-certification/discs/destroyer",
            &base(),
        )
        .unwrap();
        assert_eq!(descriptor.cursor, "destroyer");
        assert_eq!(descriptor.kind, PageKind::DiscDetail);
    }

    #[test]
    fn test_disc_detail_from_absolute_href_with_trailing_slash() {
        let descriptor = PageDescriptor::disc_detail_from_href(
            "https://www.pdga.com/technical-standards/equipment-certification/discs/buzzz/",
            &base(),
        )
        .unwrap();
        assert_eq!(descriptor.cursor, "buzzz");
    }

    #[test]
    fn test_disc_detail_rejects_other_links() {
        assert!(PageDescriptor::disc_detail_from_href("/player/27523", &base()).is_none());
        assert!(PageDescriptor::disc_detail_from_href(
            "/technical-standards/equipment-certification/discs",
            &base()
        )
        .is_none());
        assert!(PageDescriptor::disc_detail_from_href(
            "/technical-standards/equipment-certification/discs/a/b",
            &base()
        )
        .is_none());
    }

    #[test]
    fn test_extract_host() {
        let url = Url::parse("https://www.pdga.com/").unwrap();
        assert_eq!(extract_host(&url), Some("www.pdga.com".to_string()));

        let url = Url::parse("http://localhost:3000/x").unwrap();
        assert_eq!(extract_host(&url), Some("localhost:3000".to_string()));
    }
}
