use crate::aggregate::ClusterAggregate;
use crate::config::FilterConfig;
use attribution_protocol::{ExclusionRow, MatchField};

/// Denylist gate applied to aggregated clusters before scoring
#[derive(Debug, Clone)]
pub struct LeadgenFilter {
    /// (configured phrase, normalized form)
    phrases: Vec<(String, String)>,
}

impl LeadgenFilter {
    pub fn new(config: &FilterConfig) -> Self {
        let phrases = config
            .denylist
            .iter()
            .filter_map(|phrase| {
                let normalized = normalize(phrase);
                if normalized.is_empty() {
                    log::warn!("Ignoring empty denylist phrase {phrase:?}");
                    None
                } else {
                    Some((phrase.clone(), normalized))
                }
            })
            .collect();
        Self { phrases }
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    /// First match for a cluster, in field order label keyword, label angle,
    /// then member slugs.
    pub fn check(&self, cluster: &ClusterAggregate) -> Option<ExclusionRow> {
        let fields = cluster
            .label_keyword
            .iter()
            .map(|v| (MatchField::LabelKeyword, v))
            .chain(cluster.label_angle.iter().map(|v| (MatchField::LabelAngle, v)))
            .chain(cluster.slugs.iter().map(|v| (MatchField::Slug, v)));

        for (field, value) in fields {
            let haystack = normalize(value);
            if let Some((phrase, _)) = self
                .phrases
                .iter()
                .find(|(_, needle)| haystack.contains(needle.as_str()))
            {
                return Some(ExclusionRow {
                    cluster_id: cluster.id,
                    phrase: phrase.clone(),
                    field,
                    value: value.clone(),
                });
            }
        }
        None
    }

    /// Mark matching clusters excluded and return the audit trail.
    pub fn apply(&self, clusters: &mut [ClusterAggregate]) -> Vec<ExclusionRow> {
        let mut exclusions = Vec::new();
        for cluster in clusters.iter_mut() {
            if let Some(row) = self.check(cluster) {
                log::debug!(
                    "Excluding cluster {} on {:?} `{}` (phrase `{}`)",
                    row.cluster_id,
                    row.field,
                    row.value,
                    row.phrase
                );
                cluster.excluded = true;
                exclusions.push(row);
            }
        }
        if !exclusions.is_empty() {
            log::info!(
                "Denylist excluded {} of {} clusters",
                exclusions.len(),
                clusters.len()
            );
        }
        exclusions
    }
}

/// Case-fold and read `-`, `_`, `/` as word breaks
fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| c.is_whitespace() || matches!(c, '-' | '_' | '/'))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use attribution_graph::Metrics;
    use pretty_assertions::assert_eq;

    fn cluster(id: u32, keyword: &str, angle: Option<&str>, slugs: &[&str]) -> ClusterAggregate {
        let metrics = Metrics::new(100.0, 10.0, 50);
        ClusterAggregate {
            id,
            label_keyword: Some(keyword.to_string()),
            label_angle: angle.map(str::to_string),
            slugs: slugs.iter().map(|s| s.to_string()).collect(),
            metrics,
            keyword_count: 1,
            rpc: metrics.rpc(),
            rps: metrics.rps(),
            excluded: false,
        }
    }

    #[test]
    fn normalizes_separators() {
        assert_eq!(normalize("/Payday-Loans_now"), "payday loans now");
        assert_eq!(normalize("  cash   advance "), "cash advance");
    }

    #[test]
    fn slug_separators_match_phrases() {
        let filter = LeadgenFilter::new(&FilterConfig {
            denylist: vec!["payday loan".to_string()],
        });
        let row = filter
            .check(&cluster(3, "fast money", None, &["/guides", "/payday-loans-now"]))
            .unwrap();
        assert_eq!(
            row,
            ExclusionRow {
                cluster_id: 3,
                phrase: "payday loan".to_string(),
                field: MatchField::Slug,
                value: "/payday-loans-now".to_string(),
            }
        );
    }

    #[test]
    fn first_match_follows_field_then_phrase_order() {
        let filter = LeadgenFilter::new(&FilterConfig::default());
        let row = filter
            .check(&cluster(
                0,
                "title loans near me",
                Some("Payday Lending"),
                &["/cash-advance"],
            ))
            .unwrap();
        assert_eq!(row.field, MatchField::LabelKeyword);
        assert_eq!(row.phrase, "title loan");

        let row = filter
            .check(&cluster(1, "quick money", Some("Payday Lending"), &["/cash-advance"]))
            .unwrap();
        assert_eq!(row.field, MatchField::LabelAngle);
        assert_eq!(row.phrase, "payday");
    }

    #[test]
    fn apply_marks_and_audits() {
        let filter = LeadgenFilter::new(&FilterConfig::default());
        let mut clusters = vec![
            cluster(0, "best savings account", Some("Banking"), &["/savings"]),
            cluster(1, "Cash Advance App", Some("Apps"), &["/apps"]),
            cluster(2, "car insurance", Some("Insurance"), &["/auto"]),
        ];
        let exclusions = filter.apply(&mut clusters);

        let flags: Vec<bool> = clusters.iter().map(|c| c.excluded).collect();
        assert_eq!(flags, vec![false, true, false]);
        assert_eq!(exclusions.len(), 1);
        assert_eq!(exclusions[0].cluster_id, 1);
        assert_eq!(exclusions[0].value, "Cash Advance App");
    }

    #[test]
    fn empty_denylist_excludes_nothing() {
        let filter = LeadgenFilter::new(&FilterConfig {
            denylist: vec!["   ".to_string()],
        });
        assert!(filter.is_empty());
        let mut clusters = vec![cluster(0, "payday", None, &["/payday"])];
        assert!(filter.apply(&mut clusters).is_empty());
        assert!(!clusters[0].excluded);
    }
}
