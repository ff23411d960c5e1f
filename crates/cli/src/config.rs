use anyhow::{Context, Result};
use attribution_graph::GraphConfig;
use attribution_loader::{SchemaMapping, TaxonomySchema};
use attribution_scoring::{AggregateConfig, FilterConfig, OpportunityPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything one run needs, loadable from a TOML file.
///
/// Every table is optional; missing keys fall back to the defaults.
///
/// ```toml
/// [graph]
/// min_jaccard = 0.4
///
/// [filter]
/// denylist = ["payday", "cash advance"]
///
/// [opportunity]
/// top_n = 10
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub schema: SchemaMapping,
    pub taxonomy: TaxonomySchema,
    pub graph: GraphConfig,
    pub aggregate: AggregateConfig,
    pub filter: FilterConfig,
    pub opportunity: OpportunityPolicy,
}

/// Command-line flags that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub min_fanout: Option<usize>,
    pub min_jaccard: Option<f64>,
    pub min_shared: Option<usize>,
    pub max_cluster_share: Option<f64>,
    pub top_n: Option<usize>,
    pub deny: Vec<String>,
    pub no_default_denylist: bool,
}

impl RunConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid run configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Failed to parse config {}", path.display()))
    }

    /// Config file if given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(v) = overrides.min_fanout {
            self.graph.min_keyword_fanout = v;
        }
        if let Some(v) = overrides.min_jaccard {
            self.graph.min_jaccard = v;
        }
        if let Some(v) = overrides.min_shared {
            self.graph.min_shared_keywords = v;
        }
        if let Some(v) = overrides.max_cluster_share {
            self.graph.max_cluster_share = v;
        }
        if let Some(v) = overrides.top_n {
            self.opportunity.top_n = v;
        }
        if overrides.no_default_denylist {
            self.filter.denylist.clear();
        }
        for phrase in &overrides.deny {
            if !self.filter.denylist.contains(phrase) {
                self.filter.denylist.push(phrase.clone());
            }
        }
    }

    /// Check every section before any stage runs
    pub fn validate(&self) -> Result<()> {
        self.schema.validate().context("[schema]")?;
        self.graph.validate().context("[graph]")?;
        self.aggregate.validate().context("[aggregate]")?;
        self.opportunity.validate().context("[opportunity]")?;
        Ok(())
    }
}
