use crate::aggregate::ClusterAggregate;
use crate::config::{LaneMixMode, OpportunityPolicy};
use crate::error::Result;
use attribution_protocol::{
    Blueprint, BlueprintMetrics, BudgetPlan, Ladder, LadderStep, LaneAllocation,
};
use std::cmp::Ordering;

/// Turns aggregated clusters into ranked, budgeted blueprints.
///
/// Everything here is pure policy arithmetic over the cluster totals. The
/// output is advisory; nothing downstream in this workspace acts on it.
pub struct OpportunityScorer<'a> {
    policy: &'a OpportunityPolicy,
}

/// Intermediate per-candidate numbers, kept until ranking is done
#[derive(Debug, Clone)]
struct Scored<'c> {
    cluster: &'c ClusterAggregate,
    target_cpa: Option<f64>,
    kill_threshold_cpa: Option<f64>,
    predicted_delta_cm: f64,
    budget: f64,
}

impl<'a> OpportunityScorer<'a> {
    pub fn new(policy: &'a OpportunityPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self { policy })
    }

    /// Rank non-excluded clusters and keep the top `top_n`
    pub fn score(&self, clusters: &[ClusterAggregate]) -> Vec<Blueprint> {
        let candidates: Vec<&ClusterAggregate> = clusters
            .iter()
            .filter(|c| !c.excluded && c.metrics.revenue >= self.policy.min_cluster_revenue)
            .collect();
        let median = median_rps(&candidates);

        let mut scored: Vec<Scored<'_>> = candidates.iter().map(|c| self.economics(c)).collect();
        scored.sort_by(rank_order);
        scored.truncate(self.policy.top_n);

        log::info!(
            "Scored {} candidate clusters ({} excluded or below min revenue), kept {}",
            candidates.len(),
            clusters.len() - candidates.len(),
            scored.len()
        );

        scored
            .into_iter()
            .enumerate()
            .map(|(i, s)| self.blueprint(i + 1, &s, median))
            .collect()
    }

    fn economics<'c>(&self, cluster: &'c ClusterAggregate) -> Scored<'c> {
        let p = self.policy;
        let incremental_clicks = cluster.metrics.clicks * p.scale_uplift;

        let target_cpa = cluster.rpc.map(|rpc| {
            let target = rpc * p.target_cpa_ratio;
            p.max_target_cpa.map_or(target, |cap| target.min(cap))
        });
        let kill_threshold_cpa = cluster.rpc.map(|rpc| rpc * p.kill_cpa_ratio);

        let (predicted_delta_cm, budget) = match (cluster.rpc, target_cpa) {
            // A zero target CPA funds nothing.
            (Some(rpc), Some(target)) if target > 0.0 => (
                incremental_clicks * (rpc - target),
                round_cents((incremental_clicks * target).clamp(p.min_budget, p.max_budget)),
            ),
            _ => (0.0, 0.0),
        };

        Scored {
            cluster,
            target_cpa,
            kill_threshold_cpa,
            predicted_delta_cm,
            budget,
        }
    }

    fn blueprint(&self, rank: usize, scored: &Scored<'_>, median: Option<f64>) -> Blueprint {
        let p = self.policy;
        let cluster = scored.cluster;
        let budget = scored.budget;

        let shares = self.lane_shares(cluster.rps, median);
        let canary = canary_lanes(&shares, p.canary_lane_count);
        let lanes = shares
            .iter()
            .enumerate()
            .map(|(i, (name, share))| LaneAllocation {
                lane: name.to_string(),
                share: *share,
                budget: round_cents(budget * share),
                canary: canary.contains(&i),
            })
            .collect();

        let steps = p
            .ladder_steps
            .iter()
            .enumerate()
            .map(|(i, &fraction)| LadderStep {
                step: i + 1,
                fraction,
                budget: round_cents(budget * fraction),
            })
            .collect();

        Blueprint {
            rank,
            cluster_id: cluster.id,
            label_keyword: cluster.label_keyword.clone(),
            label_angle: cluster.label_angle.clone(),
            slugs: cluster.slugs.clone(),
            metrics: BlueprintMetrics {
                revenue: cluster.metrics.revenue,
                clicks: cluster.metrics.clicks,
                searches: cluster.metrics.searches,
                rpc: cluster.rpc,
                rps: cluster.rps,
            },
            budget: BudgetPlan {
                recommended: budget,
                canary: round_cents(budget * p.canary_fraction),
                predicted_delta_cm: scored.predicted_delta_cm,
            },
            lanes,
            ladder: Ladder {
                steps,
                target_cpa: scored.target_cpa,
                kill_threshold_cpa: scored.kill_threshold_cpa,
                freeze_window_days: p.freeze_window_days,
            },
        }
    }

    /// Lane shares in configured order. Shares are rounded to four decimals
    /// and sum to one; the last weighted lane absorbs the rounding.
    fn lane_shares(&self, rps: Option<f64>, median: Option<f64>) -> Vec<(&str, f64)> {
        let p = self.policy;
        let tilt = match (p.lane_mix, rps, median) {
            (LaneMixMode::RevenueInformed, Some(rps), Some(median)) if median > 0.0 => {
                (rps / median).clamp(0.5, 2.0)
            }
            _ => 1.0,
        };

        let weights: Vec<f64> = p
            .lanes
            .iter()
            .map(|lane| {
                if lane.name == p.intent_lane {
                    lane.base_share * tilt
                } else {
                    lane.base_share
                }
            })
            .collect();
        let total: f64 = weights.iter().sum();

        let mut shares: Vec<f64> = weights.iter().map(|w| round_share(w / total)).collect();
        if let Some(last) = weights.iter().rposition(|&w| w > 0.0) {
            let others: f64 = shares
                .iter()
                .enumerate()
                .filter(|&(i, _)| i != last)
                .map(|(_, s)| s)
                .sum();
            shares[last] = round_share(1.0 - others);
        }

        p.lanes
            .iter()
            .map(|lane| lane.name.as_str())
            .zip(shares)
            .collect()
    }
}

/// Indices of the `count` largest non-zero shares, ties by lane name
fn canary_lanes(shares: &[(&str, f64)], count: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..shares.len()).filter(|&i| shares[i].1 > 0.0).collect();
    order.sort_by(|&x, &y| {
        shares[y]
            .1
            .total_cmp(&shares[x].1)
            .then_with(|| shares[x].0.cmp(shares[y].0))
    });
    order.truncate(count);
    order
}

/// Delta desc, revenue desc, rps desc with nulls last, cluster id asc
fn rank_order(a: &Scored<'_>, b: &Scored<'_>) -> Ordering {
    b.predicted_delta_cm
        .total_cmp(&a.predicted_delta_cm)
        .then_with(|| b.cluster.metrics.revenue.total_cmp(&a.cluster.metrics.revenue))
        .then_with(|| match (a.cluster.rps, b.cluster.rps) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.cluster.id.cmp(&b.cluster.id))
}

fn median_rps(candidates: &[&ClusterAggregate]) -> Option<f64> {
    let mut values: Vec<f64> = candidates.iter().filter_map(|c| c.rps).collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round_share(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
