use crate::config::{EdgeRule, GraphConfig};
use crate::error::Result;
use crate::index::KeywordIndex;
use crate::types::{KeywordId, SlugId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Accepted slug–slug link
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Lower slug id
    pub a: SlugId,
    /// Higher slug id
    pub b: SlugId,
    /// Jaccard similarity of the two eligible-keyword sets
    pub weight: f64,
    /// Eligible keywords the two slugs share
    pub shared: usize,
    /// Widest-fan-out keyword among the shared ones
    pub source_keyword: KeywordId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    /// Distinct pairs sharing at least one eligible keyword
    pub candidate_pairs: usize,
    pub accepted_edges: usize,
    /// Pairs below the shared-keyword minimum (checked first)
    pub rejected_by_overlap: usize,
    /// Pairs with enough overlap but too little similarity
    pub rejected_by_jaccard: usize,
}

/// Edges that cleared the configured rule, sorted by (a, b)
#[derive(Debug, Clone, Default)]
pub struct SimilarityGraph {
    pub edges: Vec<Edge>,
    pub stats: GraphStats,
}

struct PairTally {
    shared: usize,
    source: KeywordId,
    source_fanout: usize,
}

/// Derives weighted edges from the keyword index.
///
/// Pairs are only materialized inside each eligible keyword's slug set, so
/// work and memory are bounded by the sum of squared fan-outs rather than
/// the square of the slug count.
pub struct SimilarityGraphBuilder<'a> {
    config: &'a GraphConfig,
}

impl<'a> SimilarityGraphBuilder<'a> {
    pub fn new(config: &'a GraphConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn build(&self, index: &KeywordIndex) -> SimilarityGraph {
        let mut tallies: HashMap<(SlugId, SlugId), PairTally> = HashMap::new();

        // Keywords arrive in id order, so a strict `>` keeps the lowest id on
        // fan-out ties.
        for keyword in index.eligible_keywords() {
            let fanout = keyword.fan_out();
            let slugs: Vec<SlugId> = keyword.slugs.iter().copied().collect();
            for (i, &a) in slugs.iter().enumerate() {
                for &b in &slugs[i + 1..] {
                    let tally = tallies.entry((a, b)).or_insert(PairTally {
                        shared: 0,
                        source: keyword.id,
                        source_fanout: fanout,
                    });
                    tally.shared += 1;
                    if fanout > tally.source_fanout {
                        tally.source = keyword.id;
                        tally.source_fanout = fanout;
                    }
                }
            }
        }

        let mut stats = GraphStats {
            candidate_pairs: tallies.len(),
            ..Default::default()
        };

        let mut edges = Vec::new();
        for ((a, b), tally) in tallies {
            let weight = jaccard(index, a, b, tally.shared);
            let accepted = match self.config.edge_rule {
                EdgeRule::CoOccurrence => true,
                EdgeRule::Jaccard => {
                    if tally.shared < self.config.min_shared_keywords {
                        stats.rejected_by_overlap += 1;
                        false
                    } else if weight < self.config.min_jaccard {
                        stats.rejected_by_jaccard += 1;
                        false
                    } else {
                        true
                    }
                }
            };
            if accepted {
                edges.push(Edge {
                    a,
                    b,
                    weight,
                    shared: tally.shared,
                    source_keyword: tally.source,
                });
            }
        }
        edges.sort_by_key(|e| (e.a, e.b));
        stats.accepted_edges = edges.len();

        log::info!(
            "Similarity graph ({:?}): {} candidate pairs, {} accepted edges",
            self.config.edge_rule,
            stats.candidate_pairs,
            stats.accepted_edges
        );
        log::debug!(
            "Rejected pairs: overlap={}, jaccard={}",
            stats.rejected_by_overlap,
            stats.rejected_by_jaccard
        );

        SimilarityGraph { edges, stats }
    }
}

/// |K(a) ∩ K(b)| / |K(a) ∪ K(b)| given the intersection size
fn jaccard(index: &KeywordIndex, a: SlugId, b: SlugId, shared: usize) -> f64 {
    let size = |id: SlugId| index.slug(id).map_or(0, |s| s.eligible_keywords.len());
    let union = (size(a) + size(b)).saturating_sub(shared);
    if union == 0 {
        0.0
    } else {
        shared as f64 / union as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attribution_loader::{Observation, Taxonomy};
    use pretty_assertions::assert_eq;

    fn index_for(obs: &[Observation], config: &GraphConfig) -> KeywordIndex {
        let mut taxonomy = Taxonomy::new();
        for o in obs {
            taxonomy.insert(&o.keyword, Some("Topic"), None);
        }
        KeywordIndex::build(obs, &taxonomy, config).unwrap()
    }

    fn loose() -> GraphConfig {
        GraphConfig {
            min_keyword_fanout: 1,
            min_shared_keywords: 1,
            min_jaccard: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn weights_are_jaccard_of_eligible_sets() {
        let obs = vec![
            Observation::new("kw1", "A", 10.0, 1.0, 1),
            Observation::new("kw1", "B", 10.0, 1.0, 1),
            Observation::new("kw2", "B", 5.0, 1.0, 1),
            Observation::new("kw2", "C", 5.0, 1.0, 1),
        ];
        let config = loose();
        let index = index_for(&obs, &config);
        let graph = SimilarityGraphBuilder::new(&config).unwrap().build(&index);

        assert_eq!(graph.edges.len(), 2);
        assert_eq!((graph.edges[0].a, graph.edges[0].b), (0, 1));
        assert_eq!(graph.edges[0].weight, 0.5);
        assert_eq!((graph.edges[1].a, graph.edges[1].b), (1, 2));
        assert_eq!(graph.edges[1].weight, 0.5);
        assert_eq!(graph.stats.candidate_pairs, 2);
    }

    #[test]
    fn overlap_and_similarity_thresholds_reject_pairs() {
        let obs = vec![
            Observation::new("kw1", "A", 1.0, 1.0, 1),
            Observation::new("kw1", "B", 1.0, 1.0, 1),
            Observation::new("kw2", "A", 1.0, 1.0, 1),
            Observation::new("kw2", "B", 1.0, 1.0, 1),
            Observation::new("kw2", "C", 1.0, 1.0, 1),
            Observation::new("kw3", "C", 1.0, 1.0, 1),
            Observation::new("kw4", "C", 1.0, 1.0, 1),
        ];
        let config = GraphConfig {
            min_shared_keywords: 2,
            min_jaccard: 0.5,
            ..loose()
        };
        let index = index_for(&obs, &config);
        let graph = SimilarityGraphBuilder::new(&config).unwrap().build(&index);

        // A–B share {kw1, kw2}: J = 1.0. A–C and B–C share only kw2.
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].shared, 2);
        assert_eq!(graph.edges[0].weight, 1.0);
        assert_eq!(graph.stats.rejected_by_overlap, 2);
        assert_eq!(graph.stats.rejected_by_jaccard, 0);
    }

    #[test]
    fn source_keyword_is_widest_shared_keyword() {
        let mut obs = Vec::new();
        for slug in ["A", "B", "C", "D"] {
            obs.push(Observation::new("generic", slug, 1.0, 1.0, 1));
        }
        obs.push(Observation::new("niche", "A", 1.0, 1.0, 1));
        obs.push(Observation::new("niche", "B", 1.0, 1.0, 1));

        let config = loose();
        let index = index_for(&obs, &config);
        let graph = SimilarityGraphBuilder::new(&config).unwrap().build(&index);
        let ab = graph.edges.iter().find(|e| (e.a, e.b) == (0, 1)).unwrap();
        assert_eq!(index.keyword(ab.source_keyword).unwrap().text, "generic");
        assert_eq!(ab.shared, 2);
    }

    #[test]
    fn co_occurrence_rule_accepts_everything() {
        let obs: Vec<Observation> = (0..5)
            .map(|i| Observation::new("loans", format!("/s{i}"), 1.0, 1.0, 1))
            .collect();
        let config = GraphConfig::co_occurrence();
        let index = index_for(&obs, &config);
        let graph = SimilarityGraphBuilder::new(&config).unwrap().build(&index);
        assert_eq!(graph.edges.len(), 10);
        assert_eq!(graph.stats.accepted_edges, 10);
    }
}
