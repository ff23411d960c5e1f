//! # Attribution Graph
//!
//! Groups landing-page slugs that are driven by overlapping keywords.
//!
//! ## Architecture
//!
//! ```text
//! Observation[] + Taxonomy
//!     │
//!     ├──> Keyword Index
//!     │      ├─ keyword → slugs, per-keyword and per-slug totals
//!     │      └─ eligibility: angle set, not catch-all, fan-out >= M
//!     │
//!     ├──> Similarity Graph Builder
//!     │      ├─ pairs materialized per eligible keyword only
//!     │      └─ edge iff Jaccard >= θ and shared >= K
//!     │
//!     └──> Cluster Builder
//!            ├─ disjoint-set union over dense slug ids
//!            ├─ connected components, singletons included
//!            └─ giant-component guard with keyword attribution
//! ```
//!
//! Every stage takes its thresholds from [`GraphConfig`]; nothing is global.

mod cluster;
mod config;
mod error;
mod index;
mod similarity;
mod types;

pub use cluster::{ClusterBuilder, ClusterMembers, EdgeSummary, GiantComponentWarning, Partition};
pub use config::{EdgeRule, GraphConfig};
pub use error::{GraphError, Result};
pub use index::{IndexStats, KeywordIndex};
pub use similarity::{Edge, GraphStats, SimilarityGraph, SimilarityGraphBuilder};
pub use types::{ratio, ClusterId, KeywordEntry, KeywordId, Metrics, SlugEntry, SlugId};

use attribution_loader::{Observation, Taxonomy};

/// Output of the index → similarity → clustering stages
#[derive(Debug, Clone)]
pub struct Clustering {
    pub index: KeywordIndex,
    pub graph_stats: GraphStats,
    pub partition: Partition,
}

/// Run stages 2–4 with one configuration
pub fn cluster_observations(
    observations: &[Observation],
    taxonomy: &Taxonomy,
    config: &GraphConfig,
) -> Result<Clustering> {
    let index = KeywordIndex::build(observations, taxonomy, config)?;
    let graph = SimilarityGraphBuilder::new(config)?.build(&index);
    let partition = ClusterBuilder::new(config)?.build(&index, &graph);
    Ok(Clustering {
        index,
        graph_stats: graph.stats,
        partition,
    })
}
