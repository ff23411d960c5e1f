use crate::error::{GraphError, Result};
use serde::{Deserialize, Serialize};

/// How candidate slug pairs become edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeRule {
    /// Accept a pair only when its Jaccard similarity and raw overlap both
    /// clear their thresholds
    #[default]
    Jaccard,

    /// Accept every pair that co-occurs under any eligible keyword.
    /// Produces giant components on real data; kept for diagnosis only.
    CoOccurrence,
}

/// Thresholds for the index, similarity and clustering stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Minimum distinct slugs a keyword must appear in to produce edges
    pub min_keyword_fanout: usize,

    /// Angle treated as "no topic"; compared case-insensitively
    pub catch_all_angle: String,

    /// Minimum Jaccard similarity of two slugs' eligible-keyword sets
    pub min_jaccard: f64,

    /// Minimum count of eligible keywords two slugs must share
    pub min_shared_keywords: usize,

    /// Largest allowed cluster as a share of all slugs before the run is
    /// flagged degraded
    pub max_cluster_share: f64,

    pub edge_rule: EdgeRule,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            min_keyword_fanout: 3,
            catch_all_angle: "Other".to_string(),
            min_jaccard: 0.3,
            min_shared_keywords: 10,
            max_cluster_share: 0.15,
            edge_rule: EdgeRule::Jaccard,
        }
    }
}

impl GraphConfig {
    /// The historical rule: fan-out >= 3 and no similarity threshold
    pub fn co_occurrence() -> Self {
        Self {
            edge_rule: EdgeRule::CoOccurrence,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_keyword_fanout == 0 {
            return Err(GraphError::InvalidConfig(
                "min_keyword_fanout must be >= 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_jaccard) {
            return Err(GraphError::InvalidConfig(format!(
                "min_jaccard must be within [0, 1], got {}",
                self.min_jaccard
            )));
        }
        if self.min_shared_keywords == 0 {
            return Err(GraphError::InvalidConfig(
                "min_shared_keywords must be >= 1".to_string(),
            ));
        }
        if !(self.max_cluster_share > 0.0 && self.max_cluster_share <= 1.0) {
            return Err(GraphError::InvalidConfig(format!(
                "max_cluster_share must be within (0, 1], got {}",
                self.max_cluster_share
            )));
        }
        Ok(())
    }

    /// Largest cluster size allowed for a universe of `slug_count` slugs
    pub fn cluster_ceiling(&self, slug_count: usize) -> usize {
        ((self.max_cluster_share * slug_count as f64).floor() as usize).max(1)
    }

    pub(crate) fn is_catch_all(&self, angle: &str) -> bool {
        angle.trim().eq_ignore_ascii_case(self.catch_all_angle.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(GraphConfig::default().validate().is_ok());
        assert!(GraphConfig::co_occurrence().validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = GraphConfig {
            min_jaccard: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.min_jaccard = f64::NAN;
        assert!(config.validate().is_err());

        config.min_jaccard = 0.0;
        config.max_cluster_share = 0.0;
        assert!(config.validate().is_err());

        config.max_cluster_share = 1.0;
        config.min_shared_keywords = 0;
        assert!(config.validate().is_err());

        config.min_shared_keywords = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn ceiling_never_drops_below_one_slug() {
        let config = GraphConfig::default();
        assert_eq!(config.cluster_ceiling(500), 75);
        assert_eq!(config.cluster_ceiling(3), 1);
        assert_eq!(config.cluster_ceiling(0), 1);
    }

    #[test]
    fn catch_all_is_case_insensitive() {
        let config = GraphConfig::default();
        assert!(config.is_catch_all(" other "));
        assert!(!config.is_catch_all("Others"));
    }
}
