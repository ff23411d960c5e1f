use crate::config::GraphConfig;
use crate::error::Result;
use crate::index::KeywordIndex;
use crate::similarity::{Edge, SimilarityGraph};
use crate::types::{ClusterId, KeywordId, SlugId};
use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Members of one connected component, sorted by slug id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMembers {
    pub id: ClusterId,
    pub members: Vec<SlugId>,
}

impl ClusterMembers {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// The strongest edge inside an oversized cluster, by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSummary {
    pub a: String,
    pub b: String,
    pub weight: f64,
    pub source_keyword: String,
}

/// A cluster larger than the configured ceiling, with the keyword that did
/// most of the merging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GiantComponentWarning {
    pub cluster_id: ClusterId,
    pub size: usize,
    pub share: f64,
    pub ceiling: usize,
    pub top_keyword: Option<String>,
    /// Merging unions attributed to `top_keyword`
    pub top_keyword_merges: usize,
    pub total_merges: usize,
    pub heaviest_edge: Option<EdgeSummary>,
}

/// Clusters covering every slug exactly once
#[derive(Debug, Clone, Default)]
pub struct Partition {
    clusters: Vec<ClusterMembers>,
    assignment: Vec<ClusterId>,
    ceiling: usize,
    warnings: Vec<GiantComponentWarning>,
}

impl Partition {
    /// Clusters ordered by their smallest member
    pub fn clusters(&self) -> &[ClusterMembers] {
        &self.clusters
    }

    pub fn cluster_of(&self, slug: SlugId) -> Option<ClusterId> {
        self.assignment.get(slug as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn largest(&self) -> Option<&ClusterMembers> {
        self.clusters
            .iter()
            .max_by(|x, y| x.len().cmp(&y.len()).then_with(|| y.id.cmp(&x.id)))
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    pub fn warnings(&self) -> &[GiantComponentWarning] {
        &self.warnings
    }

    /// True when some cluster exceeded the size ceiling
    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Member slug names per cluster, in cluster order
    pub fn member_names<'a>(&self, index: &'a KeywordIndex) -> Vec<Vec<&'a str>> {
        self.clusters
            .iter()
            .map(|c| c.members.iter().map(|&id| index.slug_text(id)).collect())
            .collect()
    }
}

/// Disjoint-set clustering over accepted edges.
///
/// Union order does not matter: applying the same edges in any order, or
/// applying an edge twice, yields the same partition.
pub struct ClusterBuilder<'a> {
    config: &'a GraphConfig,
}

impl<'a> ClusterBuilder<'a> {
    pub fn new(config: &'a GraphConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn build(&self, index: &KeywordIndex, graph: &SimilarityGraph) -> Partition {
        self.build_from_edges(index, &graph.edges)
    }

    pub fn build_from_edges(&self, index: &KeywordIndex, edges: &[Edge]) -> Partition {
        let n = index.slug_count();
        let mut sets: UnionFind<SlugId> = UnionFind::new(n);
        let mut merges: Vec<&Edge> = Vec::new();

        for edge in edges {
            if (edge.a as usize) >= n || (edge.b as usize) >= n {
                log::debug!("Skipping edge outside the slug universe: {edge:?}");
                continue;
            }
            if sets.union(edge.a, edge.b) {
                merges.push(edge);
            }
        }

        let labels = sets.into_labeling();

        // Slugs are visited in id order, so clusters are created in order of
        // their smallest member and member lists come out sorted.
        let mut cluster_by_root: HashMap<SlugId, ClusterId> = HashMap::new();
        let mut clusters: Vec<ClusterMembers> = Vec::new();
        let mut assignment = Vec::with_capacity(n);
        for (slug, root) in labels.into_iter().enumerate() {
            let next_id = clusters.len() as ClusterId;
            let id = *cluster_by_root.entry(root).or_insert(next_id);
            if id == next_id {
                clusters.push(ClusterMembers {
                    id,
                    members: Vec::new(),
                });
            }
            clusters[id as usize].members.push(slug as SlugId);
            assignment.push(id);
        }

        let ceiling = self.config.cluster_ceiling(n);
        let warnings = giant_components(index, &clusters, &assignment, &merges, ceiling);

        log::info!(
            "Clustered {} slugs into {} clusters ({} merging edges)",
            n,
            clusters.len(),
            merges.len()
        );
        for w in &warnings {
            log::warn!(
                "Cluster {} has {} slugs ({:.1}% of all, ceiling {}); top merging keyword `{}` ({} of {} merges)",
                w.cluster_id,
                w.size,
                w.share * 100.0,
                w.ceiling,
                w.top_keyword.as_deref().unwrap_or("-"),
                w.top_keyword_merges,
                w.total_merges
            );
        }

        Partition {
            clusters,
            assignment,
            ceiling,
            warnings,
        }
    }
}

fn giant_components(
    index: &KeywordIndex,
    clusters: &[ClusterMembers],
    assignment: &[ClusterId],
    merges: &[&Edge],
    ceiling: usize,
) -> Vec<GiantComponentWarning> {
    let total = assignment.len();
    let mut warnings = Vec::new();

    for cluster in clusters.iter().filter(|c| c.len() > ceiling) {
        let inside: Vec<&Edge> = merges
            .iter()
            .copied()
            .filter(|e| assignment[e.a as usize] == cluster.id)
            .collect();

        let mut by_keyword: BTreeMap<KeywordId, usize> = BTreeMap::new();
        for edge in &inside {
            *by_keyword.entry(edge.source_keyword).or_insert(0) += 1;
        }
        // Ties go to the lowest keyword id.
        let top = by_keyword
            .iter()
            .max_by(|x, y| x.1.cmp(y.1).then_with(|| y.0.cmp(x.0)));

        let heaviest = inside.iter().max_by(|x, y| {
            x.weight
                .total_cmp(&y.weight)
                .then_with(|| (y.a, y.b).cmp(&(x.a, x.b)))
        });

        warnings.push(GiantComponentWarning {
            cluster_id: cluster.id,
            size: cluster.len(),
            share: cluster.len() as f64 / total.max(1) as f64,
            ceiling,
            top_keyword: top.map(|(&kw, _)| index.keyword_text(kw).to_string()),
            top_keyword_merges: top.map_or(0, |(_, &count)| count),
            total_merges: inside.len(),
            heaviest_edge: heaviest.map(|e| EdgeSummary {
                a: index.slug_text(e.a).to_string(),
                b: index.slug_text(e.b).to_string(),
                weight: e.weight,
                source_keyword: index.keyword_text(e.source_keyword).to_string(),
            }),
        });
    }

    warnings
}
