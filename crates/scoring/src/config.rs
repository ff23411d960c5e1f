use crate::error::{Result, ScoringError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Rollup options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateConfig {
    /// Also roll up per (cluster, region)
    pub region_rollups: bool,

    /// Relative tolerance for the conservation check
    pub conservation_tolerance: f64,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            region_rollups: true,
            conservation_tolerance: 1e-6,
        }
    }
}

impl AggregateConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.conservation_tolerance.is_finite() && self.conservation_tolerance >= 0.0) {
            return Err(ScoringError::invalid_config(format!(
                "conservation_tolerance must be a finite value >= 0, got {}",
                self.conservation_tolerance
            )));
        }
        Ok(())
    }
}

/// Phrases that take a cluster out of the opportunity list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub denylist: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            denylist: [
                "payday",
                "cash advance",
                "title loan",
                "short term loan",
                "installment loan",
                "bad credit loan",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaneMixMode {
    /// Configured base shares, normalized
    Fixed,

    /// Base shares with the intent lane tilted by the cluster's relative RPS
    #[default]
    RevenueInformed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneConfig {
    pub name: String,
    pub base_share: f64,
}

impl LaneConfig {
    pub fn new(name: impl Into<String>, base_share: f64) -> Self {
        Self {
            name: name.into(),
            base_share,
        }
    }
}

/// Budget, CPA and rollout policy for ranked opportunities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpportunityPolicy {
    /// Opportunities kept after ranking
    pub top_n: usize,

    /// Clusters earning less are not candidates
    pub min_cluster_revenue: f64,

    /// Projected extra clicks as a fraction of observed clicks
    pub scale_uplift: f64,

    /// Target CPA as a multiple of RPC
    pub target_cpa_ratio: f64,

    /// Absolute cap on the target CPA
    pub max_target_cpa: Option<f64>,

    /// Kill-switch CPA as a multiple of RPC
    pub kill_cpa_ratio: f64,

    pub min_budget: f64,
    pub max_budget: f64,
    pub freeze_window_days: u32,

    pub lanes: Vec<LaneConfig>,
    pub lane_mix: LaneMixMode,

    /// Lane whose share follows relative RPS in revenue-informed mode
    pub intent_lane: String,

    pub canary_lane_count: usize,

    /// Fraction of the budget spent on canary lanes
    pub canary_fraction: f64,

    /// Budget fractions of the scale-up ladder, ascending
    pub ladder_steps: Vec<f64>,
}

impl Default for OpportunityPolicy {
    fn default() -> Self {
        Self {
            top_n: 20,
            min_cluster_revenue: 0.0,
            scale_uplift: 0.5,
            target_cpa_ratio: 0.7,
            max_target_cpa: None,
            kill_cpa_ratio: 1.0,
            min_budget: 50.0,
            max_budget: 5_000.0,
            freeze_window_days: 3,
            lanes: vec![
                LaneConfig::new("search", 0.5),
                LaneConfig::new("social", 0.3),
                LaneConfig::new("native", 0.2),
            ],
            lane_mix: LaneMixMode::RevenueInformed,
            intent_lane: "search".to_string(),
            canary_lane_count: 1,
            canary_fraction: 0.1,
            ladder_steps: vec![0.1, 0.25, 0.5, 1.0],
        }
    }
}

impl OpportunityPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            return Err(ScoringError::invalid_config("top_n must be >= 1"));
        }
        for (name, value) in [
            ("min_cluster_revenue", self.min_cluster_revenue),
            ("scale_uplift", self.scale_uplift),
            ("target_cpa_ratio", self.target_cpa_ratio),
            ("kill_cpa_ratio", self.kill_cpa_ratio),
            ("min_budget", self.min_budget),
            ("max_budget", self.max_budget),
        ] {
            non_negative(name, value)?;
        }
        if let Some(cap) = self.max_target_cpa {
            non_negative("max_target_cpa", cap)?;
        }
        if self.min_budget > self.max_budget {
            return Err(ScoringError::invalid_config(format!(
                "min_budget ({}) cannot exceed max_budget ({})",
                self.min_budget, self.max_budget
            )));
        }
        if !(0.0..=1.0).contains(&self.canary_fraction) {
            return Err(ScoringError::invalid_config(
                "canary_fraction must be within [0, 1]",
            ));
        }

        if self.lanes.is_empty() {
            return Err(ScoringError::invalid_config("at least one lane is required"));
        }
        let mut names = HashSet::new();
        for lane in &self.lanes {
            non_negative("lane base_share", lane.base_share)?;
            if !names.insert(lane.name.as_str()) {
                return Err(ScoringError::invalid_config(format!(
                    "lane `{}` is listed twice",
                    lane.name
                )));
            }
        }
        if self.lanes.iter().map(|l| l.base_share).sum::<f64>() <= 0.0 {
            return Err(ScoringError::invalid_config(
                "lane base shares must not all be zero",
            ));
        }
        if self.lane_mix == LaneMixMode::RevenueInformed && !names.contains(self.intent_lane.as_str())
        {
            return Err(ScoringError::invalid_config(format!(
                "intent_lane `{}` is not a configured lane",
                self.intent_lane
            )));
        }
        if self.canary_lane_count > self.lanes.len() {
            return Err(ScoringError::invalid_config(format!(
                "canary_lane_count ({}) exceeds lane count ({})",
                self.canary_lane_count,
                self.lanes.len()
            )));
        }

        if self.ladder_steps.is_empty() {
            return Err(ScoringError::invalid_config("ladder_steps must not be empty"));
        }
        let mut prev = 0.0;
        for &step in &self.ladder_steps {
            if !(step > prev && step <= 1.0) {
                return Err(ScoringError::invalid_config(
                    "ladder_steps must be strictly ascending within (0, 1]",
                ));
            }
            prev = step;
        }
        Ok(())
    }
}

fn non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ScoringError::invalid_config(format!(
            "{name} must be a finite value >= 0, got {value}"
        )))
    }
}
