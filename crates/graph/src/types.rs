use attribution_loader::Observation;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::iter::Sum;
use std::ops::AddAssign;

/// Dense slug index, assigned in lexicographic slug order
pub type SlugId = u32;

/// Dense keyword index, assigned in lexicographic normalized-keyword order
pub type KeywordId = u32;

/// Position of a cluster in a [`crate::Partition`]
pub type ClusterId = u32;

/// Additive revenue/traffic totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub revenue: f64,
    pub clicks: f64,
    pub searches: u64,
}

impl Metrics {
    pub fn new(revenue: f64, clicks: f64, searches: u64) -> Self {
        Self {
            revenue,
            clicks,
            searches,
        }
    }

    pub fn from_observation(obs: &Observation) -> Self {
        Self::new(obs.revenue, obs.clicks, obs.searches)
    }

    /// Revenue per click, `None` without clicks
    pub fn rpc(&self) -> Option<f64> {
        ratio(self.revenue, self.clicks)
    }

    /// Revenue per search, `None` without searches
    pub fn rps(&self) -> Option<f64> {
        ratio(self.revenue, self.searches as f64)
    }
}

impl AddAssign for Metrics {
    fn add_assign(&mut self, rhs: Self) {
        self.revenue += rhs.revenue;
        self.clicks += rhs.clicks;
        self.searches = self.searches.saturating_add(rhs.searches);
    }
}

impl<'a> Sum<&'a Metrics> for Metrics {
    fn sum<I: Iterator<Item = &'a Metrics>>(iter: I) -> Self {
        iter.fold(Metrics::default(), |mut acc, m| {
            acc += *m;
            acc
        })
    }
}

/// Null-guarded division. Never yields NaN or infinity.
pub fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator > 0.0 {
        let value = numerator / denominator;
        value.is_finite().then_some(value)
    } else {
        None
    }
}

/// Keyword entity, built once by the index and then read-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordEntry {
    pub id: KeywordId,

    /// Normalized text (trimmed, case-folded)
    pub text: String,

    pub angle: Option<String>,
    pub category: Option<String>,
    pub metrics: Metrics,

    /// Distinct slugs this keyword was observed on
    pub slugs: BTreeSet<SlugId>,

    /// Whether the keyword may produce edges
    pub eligible: bool,
}

impl KeywordEntry {
    pub fn fan_out(&self) -> usize {
        self.slugs.len()
    }
}

/// Slug entity with totals computed from every observation, eligible or not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlugEntry {
    pub id: SlugId,
    pub slug: String,
    pub metrics: Metrics,

    /// Revenue earned by each keyword on this slug
    pub keyword_revenue: BTreeMap<KeywordId, f64>,

    /// Totals per region (`None` = region not reported)
    pub regions: BTreeMap<Option<String>, Metrics>,

    /// Sorted ids of eligible keywords only
    pub eligible_keywords: Vec<KeywordId>,
}

impl SlugEntry {
    pub fn keywords(&self) -> impl Iterator<Item = KeywordId> + '_ {
        self.keyword_revenue.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_is_null_on_zero_denominator() {
        assert_eq!(ratio(10.0, 0.0), None);
        assert_eq!(ratio(0.0, 0.0), None);
        assert_eq!(ratio(10.0, 4.0), Some(2.5));
    }

    #[test]
    fn metrics_sum_and_ratios() {
        let parts = [Metrics::new(10.0, 5.0, 20), Metrics::new(2.0, 0.0, 0)];
        let total: Metrics = parts.iter().sum();
        assert_eq!(total, Metrics::new(12.0, 5.0, 20));
        assert_eq!(total.rpc(), Some(2.4));
        assert_eq!(total.rps(), Some(0.6));
        assert_eq!(Metrics::new(3.0, 0.0, 0).rpc(), None);
    }
}
