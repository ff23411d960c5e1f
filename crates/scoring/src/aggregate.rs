use crate::config::AggregateConfig;
use crate::error::{Result, ScoringError};
use attribution_graph::{ClusterId, KeywordId, KeywordIndex, Metrics, Partition};
use attribution_loader::Observation;
use attribution_protocol::{ClusterMembershipRow, ClusterSummaryRow, RegionRollupRow};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Rolled-up cluster, the unit the filter and scorer work on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAggregate {
    pub id: ClusterId,
    /// Highest-revenue keyword within the member slugs
    pub label_keyword: Option<String>,
    pub label_angle: Option<String>,
    /// Member slug names, sorted
    pub slugs: Vec<String>,
    pub metrics: Metrics,
    /// Distinct keywords across member slugs
    pub keyword_count: usize,
    pub rpc: Option<f64>,
    pub rps: Option<f64>,
    /// Set by the leadgen filter
    pub excluded: bool,
}

impl ClusterAggregate {
    pub fn summary_row(&self) -> ClusterSummaryRow {
        ClusterSummaryRow {
            cluster_id: self.id,
            label_keyword: self.label_keyword.clone(),
            label_angle: self.label_angle.clone(),
            slug_count: self.slugs.len(),
            keyword_count: self.keyword_count,
            clicks: self.metrics.clicks,
            searches: self.metrics.searches,
            revenue: self.metrics.revenue,
            rpc: self.rpc,
            rps: self.rps,
            excluded: self.excluded,
        }
    }

    pub fn membership_rows(&self) -> impl Iterator<Item = ClusterMembershipRow> + '_ {
        self.slugs.iter().map(move |slug| ClusterMembershipRow {
            cluster_id: self.id,
            slug: slug.clone(),
        })
    }
}

/// Per-slug totals recomputed straight from the observations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlugAggregate {
    pub slug: String,
    pub cluster_id: ClusterId,
    pub metrics: Metrics,
    pub rpc: Option<f64>,
    pub rps: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionAggregate {
    pub cluster_id: ClusterId,
    pub region: Option<String>,
    pub metrics: Metrics,
}

impl RegionAggregate {
    pub fn row(&self) -> RegionRollupRow {
        RegionRollupRow {
            cluster_id: self.cluster_id,
            region: self.region.clone(),
            revenue: self.metrics.revenue,
            clicks: self.metrics.clicks,
            searches: self.metrics.searches,
        }
    }
}

/// Totals on both sides of the conservation check
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConservationReport {
    /// Sum of per-slug totals recomputed from observations
    pub slugs: Metrics,
    /// Sum of cluster totals
    pub clusters: Metrics,
    pub tolerance: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub clusters: Vec<ClusterAggregate>,
    pub slugs: Vec<SlugAggregate>,
    pub regions: Vec<RegionAggregate>,
    pub conservation: Option<ConservationReport>,
}

pub struct Aggregator<'a> {
    config: &'a AggregateConfig,
}

impl<'a> Aggregator<'a> {
    pub fn new(config: &'a AggregateConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Roll up clusters and verify they conserve the observation totals.
    ///
    /// A conservation failure is an error: downstream budgets would
    /// otherwise be built on silently wrong numbers.
    pub fn aggregate(
        &self,
        index: &KeywordIndex,
        partition: &Partition,
        observations: &[Observation],
    ) -> Result<Aggregation> {
        let slug_totals = recompute_slug_totals(observations);
        let mut slugs = Vec::with_capacity(index.slug_count());
        for entry in index.slugs() {
            let cluster_id = partition.cluster_of(entry.id).ok_or_else(|| {
                ScoringError::PartitionMismatch(format!("slug `{}` has no cluster", entry.slug))
            })?;
            let metrics = slug_totals
                .get(entry.slug.as_str())
                .copied()
                .unwrap_or_default();
            slugs.push(SlugAggregate {
                slug: entry.slug.clone(),
                cluster_id,
                metrics,
                rpc: metrics.rpc(),
                rps: metrics.rps(),
            });
        }
        if slug_totals.len() != slugs.len() {
            return Err(ScoringError::PartitionMismatch(format!(
                "observations cover {} slugs, index has {}",
                slug_totals.len(),
                slugs.len()
            )));
        }

        let mut clusters = Vec::with_capacity(partition.len());
        let mut regions = Vec::new();
        for cluster in partition.clusters() {
            let mut metrics = Metrics::default();
            let mut keywords: BTreeSet<KeywordId> = BTreeSet::new();
            let mut keyword_revenue: BTreeMap<KeywordId, f64> = BTreeMap::new();
            let mut region_totals: BTreeMap<Option<String>, Metrics> = BTreeMap::new();
            let mut names = Vec::with_capacity(cluster.len());

            for &slug_id in &cluster.members {
                let entry = index.slug(slug_id).ok_or_else(|| {
                    ScoringError::PartitionMismatch(format!("unknown slug id {slug_id}"))
                })?;
                metrics += entry.metrics;
                keywords.extend(entry.keywords());
                for (&kw, &revenue) in &entry.keyword_revenue {
                    *keyword_revenue.entry(kw).or_insert(0.0) += revenue;
                }
                if self.config.region_rollups {
                    for (region, m) in &entry.regions {
                        *region_totals.entry(region.clone()).or_default() += *m;
                    }
                }
                names.push(entry.slug.clone());
            }

            // Lowest keyword id (= alphabetical) wins revenue ties.
            let label = keyword_revenue
                .iter()
                .max_by(|x, y| x.1.total_cmp(y.1).then_with(|| y.0.cmp(x.0)))
                .and_then(|(&kw, _)| index.keyword(kw));

            regions.extend(region_totals.into_iter().map(|(region, m)| RegionAggregate {
                cluster_id: cluster.id,
                region,
                metrics: m,
            }));

            clusters.push(ClusterAggregate {
                id: cluster.id,
                label_keyword: label.map(|kw| kw.text.clone()),
                label_angle: label.and_then(|kw| kw.angle.clone()),
                slugs: names,
                metrics,
                keyword_count: keywords.len(),
                rpc: metrics.rpc(),
                rps: metrics.rps(),
                excluded: false,
            });
        }

        let report = ConservationReport {
            slugs: slugs.iter().map(|s| &s.metrics).sum(),
            clusters: clusters.iter().map(|c| &c.metrics).sum(),
            tolerance: self.config.conservation_tolerance,
        };
        check_conservation(&report)?;

        log::info!(
            "Aggregated {} clusters: revenue={:.2}, clicks={:.0}, searches={}",
            clusters.len(),
            report.clusters.revenue,
            report.clusters.clicks,
            report.clusters.searches
        );

        Ok(Aggregation {
            clusters,
            slugs,
            regions,
            conservation: Some(report),
        })
    }
}

fn recompute_slug_totals(observations: &[Observation]) -> HashMap<&str, Metrics> {
    let mut totals: HashMap<&str, Metrics> = HashMap::new();
    for obs in observations {
        *totals.entry(obs.slug.as_str()).or_default() += Metrics::from_observation(obs);
    }
    totals
}

/// Fails when cluster totals drift from slug totals beyond the tolerance
pub fn check_conservation(report: &ConservationReport) -> Result<()> {
    let tol = report.tolerance;
    within("revenue", report.clusters.revenue, report.slugs.revenue, tol)?;
    within("clicks", report.clusters.clicks, report.slugs.clicks, tol)?;
    if report.clusters.searches != report.slugs.searches {
        return Err(ScoringError::ConservationViolation {
            metric: "searches",
            clusters: report.clusters.searches as f64,
            expected: report.slugs.searches as f64,
        });
    }
    Ok(())
}

fn within(metric: &'static str, clusters: f64, expected: f64, tolerance: f64) -> Result<()> {
    let scale = 1f64.max(clusters.abs()).max(expected.abs());
    if (clusters - expected).abs() <= tolerance * scale {
        Ok(())
    } else {
        Err(ScoringError::ConservationViolation {
            metric,
            clusters,
            expected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attribution_graph::{cluster_observations, GraphConfig};
    use attribution_loader::Taxonomy;
    use pretty_assertions::assert_eq;

    fn fixture() -> Vec<Observation> {
        vec![
            Observation::new("kw1", "A", 10.0, 1.0, 1).region("US"),
            Observation::new("kw1", "B", 10.0, 1.0, 1).region("US"),
            Observation::new("kw2", "B", 5.0, 1.0, 1).region("CA"),
            Observation::new("kw2", "C", 5.0, 1.0, 1),
            Observation::new("untagged", "D", 7.0, 0.0, 0),
        ]
    }

    fn aggregate(obs: &[Observation], min_jaccard: f64) -> Aggregation {
        let taxonomy = Taxonomy::new()
            .with_angle("kw1", "Topic One")
            .with_angle("kw2", "Topic Two");
        let config = GraphConfig {
            min_keyword_fanout: 1,
            min_shared_keywords: 1,
            min_jaccard,
            ..Default::default()
        };
        let clustering = cluster_observations(obs, &taxonomy, &config).unwrap();
        let agg_config = AggregateConfig::default();
        Aggregator::new(&agg_config)
            .unwrap()
            .aggregate(&clustering.index, &clustering.partition, obs)
            .unwrap()
    }

    #[test]
    fn cluster_totals_and_labels() {
        let agg = aggregate(&fixture(), 0.0);
        assert_eq!(agg.clusters.len(), 2);

        let abc = &agg.clusters[0];
        assert_eq!(abc.slugs, vec!["A", "B", "C"]);
        assert_eq!(abc.metrics, Metrics::new(30.0, 4.0, 4));
        assert_eq!(abc.keyword_count, 2);
        assert_eq!(abc.label_keyword.as_deref(), Some("kw1"));
        assert_eq!(abc.label_angle.as_deref(), Some("Topic One"));
        assert_eq!(abc.rpc, Some(7.5));
        assert_eq!(abc.rps, Some(7.5));

        let d = &agg.clusters[1];
        assert_eq!(d.slugs, vec!["D"]);
        assert_eq!(d.label_keyword.as_deref(), Some("untagged"));
        assert_eq!(d.label_angle, None);
        assert_eq!(d.rpc, None);
        assert_eq!(d.rps, None);
    }

    #[test]
    fn conservation_holds_and_is_reported() {
        let agg = aggregate(&fixture(), 0.6);
        let report = agg.conservation.unwrap();
        assert_eq!(report.clusters, report.slugs);
        assert_eq!(report.clusters.revenue, 37.0);
        assert_eq!(agg.clusters.len(), 4);
    }

    #[test]
    fn region_rollups_keep_null_region() {
        let agg = aggregate(&fixture(), 0.0);
        let first: Vec<(Option<&str>, f64)> = agg
            .regions
            .iter()
            .filter(|r| r.cluster_id == 0)
            .map(|r| (r.region.as_deref(), r.metrics.revenue))
            .collect();
        assert_eq!(first, vec![(None, 5.0), (Some("CA"), 5.0), (Some("US"), 20.0)]);
    }

    #[test]
    fn slug_rollup_bypasses_clustering() {
        let agg = aggregate(&fixture(), 0.0);
        let b = agg.slugs.iter().find(|s| s.slug == "B").unwrap();
        assert_eq!(b.metrics, Metrics::new(15.0, 2.0, 2));
        assert_eq!(b.cluster_id, 0);
    }

    #[test]
    fn drift_beyond_tolerance_is_an_error() {
        let report = ConservationReport {
            slugs: Metrics::new(100.0, 10.0, 5),
            clusters: Metrics::new(100.001, 10.0, 5),
            tolerance: 1e-6,
        };
        assert!(matches!(
            check_conservation(&report),
            Err(ScoringError::ConservationViolation { metric: "revenue", .. })
        ));

        let rounding = ConservationReport {
            clusters: Metrics::new(100.0 + 1e-9, 10.0, 5),
            ..report
        };
        assert!(check_conservation(&rounding).is_ok());
    }

    #[test]
    fn observations_outside_the_index_are_a_mismatch() {
        let obs = fixture();
        let taxonomy = Taxonomy::new();
        let clustering = cluster_observations(&obs[..2], &taxonomy, &GraphConfig::default()).unwrap();
        let config = AggregateConfig::default();
        let err = Aggregator::new(&config)
            .unwrap()
            .aggregate(&clustering.index, &clustering.partition, &obs)
            .unwrap_err();
        assert!(matches!(err, ScoringError::PartitionMismatch(_)));
    }
}
