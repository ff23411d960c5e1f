use crate::config::GraphConfig;
use crate::error::{GraphError, Result};
use crate::types::{KeywordEntry, KeywordId, Metrics, SlugEntry, SlugId};
use attribution_loader::{normalize_keyword, Observation, Taxonomy};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Counters describing the built index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub observations: usize,
    pub keywords: usize,
    pub slugs: usize,
    pub eligible_keywords: usize,
    /// Keywords with no angle in the taxonomy
    pub without_angle: usize,
    /// Keywords whose angle is the catch-all
    pub catch_all: usize,
    /// Keywords with an angle but too few slugs
    pub below_fanout: usize,
}

/// Inverted index keyword → slugs, plus per-slug totals.
///
/// Ids are assigned from sorted text so two builds over the same
/// observations produce identical ids regardless of row order.
#[derive(Debug, Clone)]
pub struct KeywordIndex {
    keywords: Vec<KeywordEntry>,
    slugs: Vec<SlugEntry>,
    slug_lookup: HashMap<String, SlugId>,
    stats: IndexStats,
}

#[derive(Default)]
struct SlugAcc {
    metrics: Metrics,
    keyword_revenue: BTreeMap<String, f64>,
    regions: BTreeMap<Option<String>, Metrics>,
}

#[derive(Default)]
struct KeywordAcc {
    metrics: Metrics,
    slugs: BTreeSet<String>,
}

impl KeywordIndex {
    pub fn build(
        observations: &[Observation],
        taxonomy: &Taxonomy,
        config: &GraphConfig,
    ) -> Result<Self> {
        config.validate()?;

        let mut keyword_acc: BTreeMap<String, KeywordAcc> = BTreeMap::new();
        let mut slug_acc: BTreeMap<String, SlugAcc> = BTreeMap::new();

        for obs in observations {
            let text = normalize_keyword(&obs.keyword);
            let metrics = Metrics::from_observation(obs);

            let kw = keyword_acc.entry(text.clone()).or_default();
            kw.metrics += metrics;
            kw.slugs.insert(obs.slug.clone());

            let slug = slug_acc.entry(obs.slug.clone()).or_default();
            slug.metrics += metrics;
            *slug.keyword_revenue.entry(text).or_insert(0.0) += obs.revenue;
            *slug.regions.entry(obs.region.clone()).or_default() += metrics;
        }

        if slug_acc.len() > SlugId::MAX as usize {
            return Err(GraphError::TooManySlugs(slug_acc.len()));
        }
        if keyword_acc.len() > KeywordId::MAX as usize {
            return Err(GraphError::TooManyKeywords(keyword_acc.len()));
        }

        let slug_lookup: HashMap<String, SlugId> = slug_acc
            .keys()
            .enumerate()
            .map(|(id, slug)| (slug.clone(), id as SlugId))
            .collect();
        let keyword_lookup: HashMap<&str, KeywordId> = keyword_acc
            .keys()
            .enumerate()
            .map(|(id, text)| (text.as_str(), id as KeywordId))
            .collect();

        let mut stats = IndexStats {
            observations: observations.len(),
            keywords: keyword_acc.len(),
            slugs: slug_acc.len(),
            ..Default::default()
        };

        let mut keywords = Vec::with_capacity(keyword_acc.len());
        for (id, (text, acc)) in keyword_acc.iter().enumerate() {
            let entry = taxonomy.get(text).cloned().unwrap_or_default();
            let slugs: BTreeSet<SlugId> = acc.slugs.iter().map(|s| slug_lookup[s]).collect();

            let eligible = match entry.angle.as_deref() {
                None => {
                    stats.without_angle += 1;
                    false
                }
                Some(angle) if config.is_catch_all(angle) => {
                    stats.catch_all += 1;
                    false
                }
                Some(_) if slugs.len() < config.min_keyword_fanout => {
                    stats.below_fanout += 1;
                    false
                }
                Some(_) => true,
            };
            if eligible {
                stats.eligible_keywords += 1;
            }

            keywords.push(KeywordEntry {
                id: id as KeywordId,
                text: text.clone(),
                angle: entry.angle,
                category: entry.category,
                metrics: acc.metrics,
                slugs,
                eligible,
            });
        }

        let slugs = slug_acc
            .into_iter()
            .enumerate()
            .map(|(id, (slug, acc))| {
                let keyword_revenue: BTreeMap<KeywordId, f64> = acc
                    .keyword_revenue
                    .into_iter()
                    .map(|(text, revenue)| (keyword_lookup[text.as_str()], revenue))
                    .collect();
                let eligible_keywords = keyword_revenue
                    .keys()
                    .copied()
                    .filter(|kw| keywords[*kw as usize].eligible)
                    .collect();
                SlugEntry {
                    id: id as SlugId,
                    slug,
                    metrics: acc.metrics,
                    keyword_revenue,
                    regions: acc.regions,
                    eligible_keywords,
                }
            })
            .collect();

        log::info!(
            "Built keyword index: {} keywords ({} eligible), {} slugs",
            stats.keywords,
            stats.eligible_keywords,
            stats.slugs
        );
        log::debug!(
            "Ineligible keywords: without_angle={}, catch_all={}, below_fanout={}",
            stats.without_angle,
            stats.catch_all,
            stats.below_fanout
        );

        Ok(Self {
            keywords,
            slugs,
            slug_lookup,
            stats,
        })
    }

    pub fn keywords(&self) -> &[KeywordEntry] {
        &self.keywords
    }

    pub fn eligible_keywords(&self) -> impl Iterator<Item = &KeywordEntry> {
        self.keywords.iter().filter(|kw| kw.eligible)
    }

    pub fn keyword(&self, id: KeywordId) -> Option<&KeywordEntry> {
        self.keywords.get(id as usize)
    }

    pub fn slugs(&self) -> &[SlugEntry] {
        &self.slugs
    }

    pub fn slug(&self, id: SlugId) -> Option<&SlugEntry> {
        self.slugs.get(id as usize)
    }

    pub fn slug_id(&self, slug: &str) -> Option<SlugId> {
        self.slug_lookup.get(slug).copied()
    }

    pub fn slug_count(&self) -> usize {
        self.slugs.len()
    }

    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }

    /// Keyword text for an id; empty for ids outside the index
    pub(crate) fn keyword_text(&self, id: KeywordId) -> &str {
        self.keyword(id).map_or("", |kw| kw.text.as_str())
    }

    /// Slug text for an id; empty for ids outside the index
    pub(crate) fn slug_text(&self, id: SlugId) -> &str {
        self.slug(id).map_or("", |s| s.slug.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn taxonomy() -> Taxonomy {
        let mut t = Taxonomy::new();
        t.insert("loans", Some("Personal Loans"), Some("Finance"));
        t.insert("misc", Some("Other"), None);
        t.insert("trials", Some("Clinical Trials"), None);
        t
    }

    fn config(min_fanout: usize) -> GraphConfig {
        GraphConfig {
            min_keyword_fanout: min_fanout,
            ..Default::default()
        }
    }

    #[test]
    fn repeated_rows_are_summed_per_region() {
        let obs = vec![
            Observation::new("Loans", "/b", 2.0, 1.0, 3).region("US"),
            Observation::new(" loans ", "/b", 3.0, 1.0, 4).region("US"),
            Observation::new("loans", "/b", 5.0, 2.0, 0),
        ];
        let index = KeywordIndex::build(&obs, &taxonomy(), &config(1)).unwrap();

        assert_eq!(index.keywords().len(), 1);
        let slug = &index.slugs()[0];
        assert_eq!(slug.metrics, Metrics::new(10.0, 4.0, 7));
        assert_eq!(
            slug.regions.get(&Some("US".to_string())),
            Some(&Metrics::new(5.0, 2.0, 7))
        );
        assert_eq!(slug.regions.get(&None), Some(&Metrics::new(5.0, 2.0, 0)));
        assert_eq!(slug.keyword_revenue.get(&0), Some(&10.0));
    }

    #[test]
    fn ids_follow_sorted_text_not_row_order() {
        let obs = vec![
            Observation::new("trials", "/z", 1.0, 1.0, 1),
            Observation::new("loans", "/a", 1.0, 1.0, 1),
        ];
        let index = KeywordIndex::build(&obs, &taxonomy(), &config(1)).unwrap();
        assert_eq!(index.slug_id("/a"), Some(0));
        assert_eq!(index.slug_id("/z"), Some(1));
        assert_eq!(index.keyword(0).unwrap().text, "loans");
    }

    #[test]
    fn eligibility_requires_angle_non_catch_all_and_fanout() {
        let mut obs = Vec::new();
        for slug in ["/a", "/b", "/c"] {
            obs.push(Observation::new("loans", slug, 1.0, 1.0, 1));
            obs.push(Observation::new("misc", slug, 1.0, 1.0, 1));
            obs.push(Observation::new("untagged", slug, 1.0, 1.0, 1));
        }
        obs.push(Observation::new("trials", "/a", 1.0, 1.0, 1));

        let index = KeywordIndex::build(&obs, &taxonomy(), &config(3)).unwrap();
        let eligible: Vec<&str> = index.eligible_keywords().map(|k| k.text.as_str()).collect();
        assert_eq!(eligible, vec!["loans"]);
        assert_eq!(
            index.stats(),
            &IndexStats {
                observations: 10,
                keywords: 4,
                slugs: 3,
                eligible_keywords: 1,
                without_angle: 1,
                catch_all: 1,
                below_fanout: 1,
            }
        );

        // Ineligible keywords still count toward slug totals.
        let a = index.slug(index.slug_id("/a").unwrap()).unwrap();
        assert_eq!(a.metrics.revenue, 4.0);
        assert_eq!(a.keywords().count(), 4);
        assert_eq!(a.eligible_keywords.len(), 1);
    }
}
