//! State module for tracking run progress
//!
//! # Components
//!
//! - `PageState`: The per-descriptor state machine (pending, fetching, retrying, ...)
//! - `HostState`: Per-host request slots for rate limiting

mod host_state;
mod page_state;

// Re-export main types
pub use host_state::HostState;
pub use page_state::PageState;
