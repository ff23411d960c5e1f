use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One source row: a keyword driving traffic to a slug in a region.
///
/// Rows sharing (keyword, slug, region) are additive; nothing downstream
/// overwrites one with another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Keyword text as it appeared (trimmed, not yet case-folded)
    pub keyword: String,

    /// Landing-page slug (trimmed)
    pub slug: String,

    pub region: Option<String>,

    /// Net revenue, always >= 0
    pub revenue: f64,

    /// Sell-side clicks, always >= 0
    pub clicks: f64,

    pub searches: u64,
}

impl Observation {
    /// Create an observation without a region
    pub fn new(
        keyword: impl Into<String>,
        slug: impl Into<String>,
        revenue: f64,
        clicks: f64,
        searches: u64,
    ) -> Self {
        Self {
            keyword: keyword.into(),
            slug: slug.into(),
            region: None,
            revenue,
            clicks,
            searches,
        }
    }

    /// Builder: set region
    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

/// Per-run counters for rows that were repaired or discarded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadDiagnostics {
    /// Data rows read (header excluded)
    pub rows_seen: usize,

    /// Rows discarded for any reason
    pub rows_dropped: usize,

    /// Rows kept with at least one numeric cell coerced to a usable value
    pub rows_coerced: usize,

    pub dropped_missing_slug: usize,
    pub dropped_missing_keyword: usize,

    /// Records the CSV reader could not decode
    pub dropped_unreadable: usize,
}

impl LoadDiagnostics {
    pub(crate) fn drop_missing_slug(&mut self) {
        self.rows_dropped += 1;
        self.dropped_missing_slug += 1;
    }

    pub(crate) fn drop_missing_keyword(&mut self) {
        self.rows_dropped += 1;
        self.dropped_missing_keyword += 1;
    }

    pub(crate) fn drop_unreadable(&mut self) {
        self.rows_dropped += 1;
        self.dropped_unreadable += 1;
    }

    /// Rows that made it into the observation list
    pub fn rows_kept(&self) -> usize {
        self.rows_seen.saturating_sub(self.rows_dropped)
    }
}

/// Result of loading an observation table
#[derive(Debug, Clone, Default)]
pub struct LoadOutput {
    pub observations: Vec<Observation>,
    pub diagnostics: LoadDiagnostics,
}

/// Angle and category assigned to one keyword
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyEntry {
    pub angle: Option<String>,
    pub category: Option<String>,
}

/// Keyword → angle/category side table, keyed by normalized keyword.
#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    entries: HashMap<String, TaxonomyEntry>,
}

impl Taxonomy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for a keyword. Returns true when an
    /// earlier entry was replaced.
    pub fn insert(&mut self, keyword: &str, angle: Option<&str>, category: Option<&str>) -> bool {
        let entry = TaxonomyEntry {
            angle: non_empty(angle),
            category: non_empty(category),
        };
        self.entries
            .insert(normalize_keyword(keyword), entry)
            .is_some()
    }

    /// Builder: assign an angle to a keyword
    #[must_use]
    pub fn with_angle(mut self, keyword: &str, angle: &str) -> Self {
        self.insert(keyword, Some(angle), None);
        self
    }

    /// Look up by keyword text in any casing
    pub fn get(&self, keyword: &str) -> Option<&TaxonomyEntry> {
        self.entries.get(&normalize_keyword(keyword))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Diagnostics for the taxonomy side table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyDiagnostics {
    pub rows_seen: usize,
    pub rows_skipped: usize,
    pub overrides: usize,
}

/// Canonical keyword key: trimmed and case-folded.
pub fn normalize_keyword(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
