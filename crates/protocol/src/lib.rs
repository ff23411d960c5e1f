//! Output contract of the attribution engine.
//!
//! Every artifact the run driver writes is one of these types. Tabular rows
//! are flat so they serialize to CSV as-is; the blueprint document is the
//! nested, machine-readable form consumed by campaign tooling.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const BLUEPRINT_SCHEMA_VERSION: u32 = 1;

/// One row per cluster.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct ClusterSummaryRow {
    pub cluster_id: u32,
    pub label_keyword: Option<String>,
    pub label_angle: Option<String>,
    pub slug_count: usize,
    pub keyword_count: usize,
    pub clicks: f64,
    pub searches: u64,
    pub revenue: f64,
    pub rpc: Option<f64>,
    pub rps: Option<f64>,
    pub excluded: bool,
}

/// One row per (cluster, slug).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct ClusterMembershipRow {
    pub cluster_id: u32,
    pub slug: String,
}

/// Secondary rollup keyed by (cluster, region). `region` is null when the
/// source rows carried no region.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct RegionRollupRow {
    pub cluster_id: u32,
    pub region: Option<String>,
    pub revenue: f64,
    pub clicks: f64,
    pub searches: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    LabelKeyword,
    LabelAngle,
    Slug,
}

/// Audit record for a cluster removed by the denylist gate.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct ExclusionRow {
    pub cluster_id: u32,
    pub phrase: String,
    pub field: MatchField,
    pub value: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct BlueprintMetrics {
    pub revenue: f64,
    pub clicks: f64,
    pub searches: u64,
    pub rpc: Option<f64>,
    pub rps: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct BudgetPlan {
    /// Full daily budget once the ladder reaches its last step.
    pub recommended: f64,
    /// Budget spent on canary lanes before full rollout.
    pub canary: f64,
    /// Projected contribution-margin delta at the recommended budget.
    pub predicted_delta_cm: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct LaneAllocation {
    pub lane: String,
    pub share: f64,
    pub budget: f64,
    pub canary: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct LadderStep {
    pub step: usize,
    pub fraction: f64,
    pub budget: f64,
}

/// Advisory scale-up ladder with its kill switch. Nothing in the engine acts
/// on it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct Ladder {
    pub steps: Vec<LadderStep>,
    pub target_cpa: Option<f64>,
    pub kill_threshold_cpa: Option<f64>,
    pub freeze_window_days: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct Blueprint {
    pub rank: usize,
    pub cluster_id: u32,
    pub label_keyword: Option<String>,
    pub label_angle: Option<String>,
    pub slugs: Vec<String>,
    pub metrics: BlueprintMetrics,
    pub budget: BudgetPlan,
    pub lanes: Vec<LaneAllocation>,
    pub ladder: Ladder,
}

impl Blueprint {
    #[must_use]
    pub fn canary_lanes(&self) -> Vec<&str> {
        self.lanes
            .iter()
            .filter(|lane| lane.canary)
            .map(|lane| lane.lane.as_str())
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct BlueprintDocument {
    pub schema_version: u32,
    /// True when the clustering tripped the giant-component guard.
    pub degraded: bool,
    pub opportunities: Vec<Blueprint>,
}

impl BlueprintDocument {
    #[must_use]
    pub fn new(degraded: bool, opportunities: Vec<Blueprint>) -> Self {
        Self {
            schema_version: BLUEPRINT_SCHEMA_VERSION,
            degraded,
            opportunities,
        }
    }
}

/// Flat projection of a [`Blueprint`] for the opportunity table.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct OpportunityRow {
    pub rank: usize,
    pub cluster_id: u32,
    pub label_keyword: Option<String>,
    pub label_angle: Option<String>,
    pub slug_count: usize,
    pub revenue: f64,
    pub clicks: f64,
    pub searches: u64,
    pub rpc: Option<f64>,
    pub rps: Option<f64>,
    pub predicted_delta_cm: f64,
    pub recommended_budget: f64,
    pub canary_budget: f64,
    pub target_cpa: Option<f64>,
    pub kill_threshold_cpa: Option<f64>,
    pub freeze_window_days: u32,
    /// `lane:share` pairs joined by `;`.
    pub lane_mix: String,
    /// Lane names joined by `;`.
    pub canary_lanes: String,
}

impl From<&Blueprint> for OpportunityRow {
    fn from(bp: &Blueprint) -> Self {
        let lane_mix = bp
            .lanes
            .iter()
            .map(|lane| format!("{}:{:.4}", lane.lane, lane.share))
            .collect::<Vec<_>>()
            .join(";");
        Self {
            rank: bp.rank,
            cluster_id: bp.cluster_id,
            label_keyword: bp.label_keyword.clone(),
            label_angle: bp.label_angle.clone(),
            slug_count: bp.slugs.len(),
            revenue: bp.metrics.revenue,
            clicks: bp.metrics.clicks,
            searches: bp.metrics.searches,
            rpc: bp.metrics.rpc,
            rps: bp.metrics.rps,
            predicted_delta_cm: bp.budget.predicted_delta_cm,
            recommended_budget: bp.budget.recommended,
            canary_budget: bp.budget.canary,
            target_cpa: bp.ladder.target_cpa,
            kill_threshold_cpa: bp.ladder.kill_threshold_cpa,
            freeze_window_days: bp.ladder.freeze_window_days,
            lane_mix,
            canary_lanes: bp.canary_lanes().join(";"),
        }
    }
}

pub fn serialize_json_pretty<T: Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}

/// JSON schema of the blueprint document, for downstream validation.
pub fn blueprint_schema() -> serde_json::Result<String> {
    let schema = schemars::schema_for!(BlueprintDocument);
    serde_json::to_string_pretty(&schema)
}
