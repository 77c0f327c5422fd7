use crate::config::AliasEntry;
use std::collections::HashMap;

/// Trims a string and collapses internal whitespace runs to a single space
///
/// # Examples
///
/// ```
/// use disc_harvest::model::normalize_text;
///
/// assert_eq!(normalize_text("  Innova \n Champion  Discs "), "Innova Champion Discs");
/// assert_eq!(normalize_text("\t"), "");
/// ```
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalizes a string for use as a natural key
pub fn fold_key(raw: &str) -> String {
    normalize_text(raw).to_lowercase()
}

/// Returns the normalized text, or None if nothing is left after trimming
pub fn non_empty(raw: &str) -> Option<String> {
    let text = normalize_text(raw);
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Company name rewrites applied before a manufacturer name is keyed
///
/// The listing and detail pages do not always spell a manufacturer the same
/// way ("Westside Golf Discs" vs "Westside Discs"). Lookups are keyed by the
/// folded form of the alias source, so matching is case- and
/// whitespace-insensitive.
#[derive(Debug, Clone, Default)]
pub struct CompanyAliases {
    rewrites: HashMap<String, String>,
}

impl CompanyAliases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the alias table from configuration entries
    pub fn from_entries(entries: &[AliasEntry]) -> Self {
        let mut aliases = Self::new();
        for entry in entries {
            aliases.insert(&entry.from, &entry.to);
        }
        aliases
    }

    pub fn insert(&mut self, from: &str, to: &str) {
        self.rewrites.insert(fold_key(from), normalize_text(to));
    }

    /// Returns the canonical display spelling for a company name
    pub fn canonical(&self, name: &str) -> String {
        match self.rewrites.get(&fold_key(name)) {
            Some(canonical) => canonical.clone(),
            None => normalize_text(name),
        }
    }

    pub fn len(&self) -> usize {
        self.rewrites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewrites.is_empty()
    }
}
