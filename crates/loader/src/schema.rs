use crate::error::{LoaderError, Result};
use serde::{Deserialize, Serialize};

/// Explicit mapping from observation fields to source column names.
///
/// Columns are matched exactly (after trimming, ASCII case-insensitive).
/// There is no fuzzy detection: a mapped column that is not in the header is
/// a fatal error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaMapping {
    /// Landing-page slug column
    pub slug: String,

    /// Search keyword column
    pub keyword: String,

    /// Net revenue column
    pub revenue: String,

    /// Sell-side clicks column
    pub clicks: String,

    /// Sell-side searches column
    pub searches: String,

    /// Region column. Optional: when absent from the input every region is null.
    pub region: Option<String>,
}

impl Default for SchemaMapping {
    fn default() -> Self {
        Self {
            slug: "CONTENT_SLUG".to_string(),
            keyword: "SERP_KEYWORD".to_string(),
            revenue: "EST_NET_REVENUE".to_string(),
            clicks: "SELLSIDE_CLICKS_NETWORK".to_string(),
            searches: "SELLSIDE_SEARCHES".to_string(),
            region: Some("REGION_CODE".to_string()),
        }
    }
}

impl SchemaMapping {
    fn required(&self) -> [(&'static str, &str); 5] {
        [
            ("slug", &self.slug),
            ("keyword", &self.keyword),
            ("revenue", &self.revenue),
            ("clicks", &self.clicks),
            ("searches", &self.searches),
        ]
    }

    /// Validate the mapping itself (not the input)
    pub fn validate(&self) -> Result<()> {
        let mut seen: Vec<String> = Vec::new();
        let region = self.region.iter().map(|r| ("region", r.as_str()));
        for (field, column) in self.required().into_iter().chain(region) {
            let key = column.trim().to_ascii_lowercase();
            if key.is_empty() {
                return Err(LoaderError::invalid_schema(format!(
                    "column for `{field}` is empty"
                )));
            }
            if seen.contains(&key) {
                return Err(LoaderError::invalid_schema(format!(
                    "column `{column}` is mapped to more than one field"
                )));
            }
            seen.push(key);
        }
        Ok(())
    }

    /// Resolve column positions against a header row.
    pub(crate) fn resolve(&self, headers: &[String]) -> Result<ColumnPositions> {
        let mut missing = Vec::new();
        let mut lookup = |column: &str| {
            let pos = find_column(headers, column);
            if pos.is_none() {
                missing.push(column.trim().to_string());
            }
            pos.unwrap_or_default()
        };

        let slug = lookup(&self.slug);
        let keyword = lookup(&self.keyword);
        let revenue = lookup(&self.revenue);
        let clicks = lookup(&self.clicks);
        let searches = lookup(&self.searches);

        if !missing.is_empty() {
            return Err(LoaderError::MissingColumns(missing));
        }

        let region = match &self.region {
            Some(column) => {
                let pos = find_column(headers, column);
                if pos.is_none() {
                    log::warn!(
                        "Region column `{}` not found; all regions will be null",
                        column.trim()
                    );
                }
                pos
            }
            None => None,
        };

        Ok(ColumnPositions {
            slug,
            keyword,
            revenue,
            clicks,
            searches,
            region,
        })
    }
}

/// Column names of the keyword taxonomy side table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxonomySchema {
    pub keyword: String,
    pub angle: String,
    pub category: Option<String>,
}

impl Default for TaxonomySchema {
    fn default() -> Self {
        Self {
            keyword: "keyword".to_string(),
            angle: "angle".to_string(),
            category: Some("category".to_string()),
        }
    }
}

impl TaxonomySchema {
    pub(crate) fn resolve(&self, headers: &[String]) -> Result<TaxonomyPositions> {
        let keyword = find_column(headers, &self.keyword);
        let angle = find_column(headers, &self.angle);
        match (keyword, angle) {
            (Some(keyword), Some(angle)) => {
                let category = self.category.as_deref().and_then(|column| {
                    let pos = find_column(headers, column);
                    if pos.is_none() {
                        log::warn!("Taxonomy category column `{}` not found", column.trim());
                    }
                    pos
                });
                Ok(TaxonomyPositions {
                    keyword,
                    angle,
                    category,
                })
            }
            (keyword, angle) => {
                let mut missing = Vec::new();
                if keyword.is_none() {
                    missing.push(self.keyword.trim().to_string());
                }
                if angle.is_none() {
                    missing.push(self.angle.trim().to_string());
                }
                Err(LoaderError::MissingColumns(missing))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ColumnPositions {
    pub slug: usize,
    pub keyword: usize,
    pub revenue: usize,
    pub clicks: usize,
    pub searches: usize,
    pub region: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TaxonomyPositions {
    pub keyword: usize,
    pub angle: usize,
    pub category: Option<usize>,
}

fn find_column(headers: &[String], column: &str) -> Option<usize> {
    let wanted = column.trim();
    headers
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}').trim().eq_ignore_ascii_case(wanted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn default_mapping_is_valid() {
        assert!(SchemaMapping::default().validate().is_ok());
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let schema = SchemaMapping {
            clicks: "est_net_revenue".to_string(),
            ..SchemaMapping::default()
        };
        assert!(schema.validate().is_err());
    }

    #[test]
    fn resolve_matches_case_insensitively_and_ignores_extra_columns() {
        let h = headers(&[
            "\u{feff}date",
            "content_slug",
            " SERP_KEYWORD ",
            "est_net_revenue",
            "SELLSIDE_CLICKS_NETWORK",
            "sellside_searches",
            "region_code",
        ]);
        let pos = SchemaMapping::default().resolve(&h).unwrap();
        assert_eq!(
            pos,
            ColumnPositions {
                slug: 1,
                keyword: 2,
                revenue: 3,
                clicks: 4,
                searches: 5,
                region: Some(6),
            }
        );
    }

    #[test]
    fn resolve_names_every_missing_column() {
        let h = headers(&["CONTENT_SLUG", "SERP_KEYWORD", "SELLSIDE_SEARCHES"]);
        match SchemaMapping::default().resolve(&h) {
            Err(LoaderError::MissingColumns(missing)) => assert_eq!(
                missing,
                vec![
                    "EST_NET_REVENUE".to_string(),
                    "SELLSIDE_CLICKS_NETWORK".to_string()
                ]
            ),
            other => panic!("expected missing columns, got {other:?}"),
        }
    }

    #[test]
    fn substring_headers_do_not_count_as_matches() {
        let h = headers(&[
            "CONTENT_SLUG_V2",
            "SERP_KEYWORD",
            "EST_NET_REVENUE",
            "SELLSIDE_CLICKS_NETWORK",
            "SELLSIDE_SEARCHES",
        ]);
        let err = SchemaMapping::default().resolve(&h).unwrap_err();
        assert!(err.to_string().contains("CONTENT_SLUG"));
    }

    #[test]
    fn missing_region_column_is_not_fatal() {
        let h = headers(&[
            "CONTENT_SLUG",
            "SERP_KEYWORD",
            "EST_NET_REVENUE",
            "SELLSIDE_CLICKS_NETWORK",
            "SELLSIDE_SEARCHES",
        ]);
        let pos = SchemaMapping::default().resolve(&h).unwrap();
        assert_eq!(pos.region, None);
    }
}
