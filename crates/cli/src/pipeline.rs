use crate::config::RunConfig;
use crate::fingerprint::{sha256_bytes, sha256_file};
use anyhow::{Context, Result};
use attribution_graph::{
    cluster_observations, EdgeRule, GiantComponentWarning, GraphConfig, GraphStats, IndexStats,
};
use attribution_loader::{
    LoadDiagnostics, LoadOutput, Observation, ObservationLoader, Taxonomy, TaxonomyDiagnostics,
    TaxonomyLoader,
};
use attribution_protocol::{Blueprint, BlueprintDocument, ExclusionRow};
use attribution_scoring::{
    Aggregation, Aggregator, ConservationReport, LeadgenFilter, OpportunityScorer,
};
use serde::Serialize;
use std::path::Path;

/// Parsed inputs plus the digests that identify them
#[derive(Debug)]
pub struct Inputs {
    pub observations: LoadOutput,
    pub taxonomy: Taxonomy,
    pub taxonomy_diagnostics: TaxonomyDiagnostics,
    pub input_sha256: String,
    pub taxonomy_sha256: String,
}

pub fn load_inputs(input: &Path, taxonomy: &Path, config: &RunConfig) -> Result<Inputs> {
    let observations = ObservationLoader::new(config.schema.clone())?
        .load_path(input)
        .with_context(|| format!("Failed to load observations from {}", input.display()))?;
    let (taxonomy_table, taxonomy_diagnostics) = TaxonomyLoader::new(config.taxonomy.clone())
        .load_path(taxonomy)
        .with_context(|| format!("Failed to load taxonomy from {}", taxonomy.display()))?;

    log::info!(
        "Loaded {} taxonomy keywords ({} rows skipped, {} overrides)",
        taxonomy_table.len(),
        taxonomy_diagnostics.rows_skipped,
        taxonomy_diagnostics.overrides
    );

    Ok(Inputs {
        input_sha256: sha256_file(input)
            .with_context(|| format!("Failed to hash {}", input.display()))?,
        taxonomy_sha256: sha256_file(taxonomy)
            .with_context(|| format!("Failed to hash {}", taxonomy.display()))?,
        observations,
        taxonomy: taxonomy_table,
        taxonomy_diagnostics,
    })
}

/// In-memory result of one run. Every artifact is rendered from this.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub index_stats: IndexStats,
    pub graph_stats: GraphStats,
    pub slug_count: usize,
    pub cluster_ceiling: usize,
    pub warnings: Vec<GiantComponentWarning>,
    pub degraded: bool,
    pub aggregation: Aggregation,
    pub exclusions: Vec<ExclusionRow>,
    pub blueprints: Vec<Blueprint>,
}

impl PipelineOutput {
    pub fn blueprint_document(&self) -> BlueprintDocument {
        BlueprintDocument::new(self.degraded, self.blueprints.clone())
    }

    pub fn largest_cluster(&self) -> usize {
        self.aggregation
            .clusters
            .iter()
            .map(|c| c.slugs.len())
            .max()
            .unwrap_or(0)
    }
}

/// Index, graph, clusters, rollups, denylist and scoring in one pass.
///
/// Fails before anything is written when the configuration is invalid or
/// the rollups do not conserve the observation totals.
pub fn run_pipeline(
    observations: &[Observation],
    taxonomy: &Taxonomy,
    config: &RunConfig,
) -> Result<PipelineOutput> {
    config.validate()?;

    let clustering = cluster_observations(observations, taxonomy, &config.graph)?;
    let mut aggregation = Aggregator::new(&config.aggregate)?.aggregate(
        &clustering.index,
        &clustering.partition,
        observations,
    )?;
    let exclusions = LeadgenFilter::new(&config.filter).apply(&mut aggregation.clusters);
    let blueprints = OpportunityScorer::new(&config.opportunity)?.score(&aggregation.clusters);

    let partition = clustering.partition;
    Ok(PipelineOutput {
        index_stats: clustering.index.stats().clone(),
        graph_stats: clustering.graph_stats,
        slug_count: clustering.index.slug_count(),
        cluster_ceiling: partition.ceiling(),
        warnings: partition.warnings().to_vec(),
        degraded: partition.is_degraded(),
        aggregation,
        exclusions,
        blueprints,
    })
}

/// Machine-readable run summary (`run_report.json`)
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub tool_version: &'static str,
    pub input_sha256: String,
    pub taxonomy_sha256: String,
    pub config_sha256: String,
    pub degraded: bool,
    pub load: LoadDiagnostics,
    pub taxonomy: TaxonomyDiagnostics,
    pub index: IndexStats,
    pub graph: GraphStats,
    pub slugs: usize,
    pub clusters: usize,
    pub largest_cluster: usize,
    pub cluster_ceiling: usize,
    pub excluded_clusters: usize,
    pub opportunities: usize,
    pub conservation: Option<ConservationReport>,
    pub warnings: Vec<GiantComponentWarning>,
    pub config: RunConfig,
}

impl RunReport {
    pub fn new(inputs: &Inputs, output: &PipelineOutput, config: &RunConfig) -> Result<Self> {
        let config_json = serde_json::to_vec(config)?;
        Ok(Self {
            tool_version: env!("CARGO_PKG_VERSION"),
            input_sha256: inputs.input_sha256.clone(),
            taxonomy_sha256: inputs.taxonomy_sha256.clone(),
            config_sha256: sha256_bytes(&config_json),
            degraded: output.degraded,
            load: inputs.observations.diagnostics.clone(),
            taxonomy: inputs.taxonomy_diagnostics.clone(),
            index: output.index_stats.clone(),
            graph: output.graph_stats.clone(),
            slugs: output.slug_count,
            clusters: output.aggregation.clusters.len(),
            largest_cluster: output.largest_cluster(),
            cluster_ceiling: output.cluster_ceiling,
            excluded_clusters: output.exclusions.len(),
            opportunities: output.blueprints.len(),
            conservation: output.aggregation.conservation,
            warnings: output.warnings.clone(),
            config: config.clone(),
        })
    }
}

/// Outcome of clustering under one edge rule
#[derive(Debug, Clone, Serialize)]
pub struct RuleDiagnosis {
    pub rule: EdgeRule,
    pub clusters: usize,
    pub largest_cluster: usize,
    pub largest_share: f64,
    pub cluster_ceiling: usize,
    pub degraded: bool,
    pub candidate_pairs: usize,
    pub accepted_edges: usize,
    /// Keyword behind most merges in the largest cluster, when it is oversized
    pub top_keyword: Option<String>,
    pub top_keyword_merges: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnosis {
    pub slugs: usize,
    pub eligible_keywords: usize,
    pub rules: Vec<RuleDiagnosis>,
}

/// Cluster the same inputs under both edge rules for side-by-side comparison
pub fn diagnose(
    observations: &[Observation],
    taxonomy: &Taxonomy,
    graph: &GraphConfig,
) -> Result<Diagnosis> {
    let mut rules = Vec::new();
    let mut slugs = 0;
    let mut eligible_keywords = 0;

    for rule in [EdgeRule::Jaccard, EdgeRule::CoOccurrence] {
        let config = GraphConfig {
            edge_rule: rule,
            ..graph.clone()
        };
        let clustering = cluster_observations(observations, taxonomy, &config)?;
        let partition = &clustering.partition;
        slugs = clustering.index.slug_count();
        eligible_keywords = clustering.index.stats().eligible_keywords;

        let largest = partition.largest();
        let warning = largest.and_then(|cluster| {
            partition
                .warnings()
                .iter()
                .find(|w| w.cluster_id == cluster.id)
        });
        let largest_cluster = largest.map_or(0, |c| c.len());

        rules.push(RuleDiagnosis {
            rule,
            clusters: partition.len(),
            largest_cluster,
            largest_share: largest_cluster as f64 / slugs.max(1) as f64,
            cluster_ceiling: partition.ceiling(),
            degraded: partition.is_degraded(),
            candidate_pairs: clustering.graph_stats.candidate_pairs,
            accepted_edges: clustering.graph_stats.accepted_edges,
            top_keyword: warning.and_then(|w| w.top_keyword.clone()),
            top_keyword_merges: warning.map_or(0, |w| w.top_keyword_merges),
        });
    }

    Ok(Diagnosis {
        slugs,
        eligible_keywords,
        rules,
    })
}
