//! Source site layout
//!
//! This module knows how the source site is organized:
//! - Which crawl categories exist and what seeds them
//! - Which structural page kinds exist (the parser dispatch key)
//! - How a page descriptor maps to a URL, and back from a listing link

mod category;
mod descriptor;

pub use category::{Category, PageKind};
pub use descriptor::{
    extract_host, PageDescriptor, COMPANY_INDEX_PATH, DISC_INDEX_PATH, EVENT_RESULTS_PATH,
    PLAYER_PATH,
};
