//! # Attribution Scoring
//!
//! Everything downstream of the partition: rolling clusters up, gating them
//! through the leadgen denylist, and turning the survivors into ranked
//! campaign blueprints.
//!
//! ```text
//! Partition + KeywordIndex + Observation[]
//!     │
//!     ├──> Aggregator         cluster / slug / region totals, conservation check
//!     ├──> LeadgenFilter      excluded flag + audit rows
//!     └──> OpportunityScorer  top-N blueprints (budget, lanes, ladder)
//! ```

mod aggregate;
mod config;
mod error;
mod filter;
mod opportunity;

pub use aggregate::{
    check_conservation, Aggregation, Aggregator, ClusterAggregate, ConservationReport,
    RegionAggregate, SlugAggregate,
};
pub use config::{AggregateConfig, FilterConfig, LaneConfig, LaneMixMode, OpportunityPolicy};
pub use error::{Result, ScoringError};
pub use filter::LeadgenFilter;
pub use opportunity::OpportunityScorer;
