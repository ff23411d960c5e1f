//! # Attribution Loader
//!
//! Turns the exported keyword/slug revenue table into typed observations.
//!
//! ```text
//! CSV export
//!     │
//!     ├──> SchemaMapping (explicit column names, fail fast)
//!     │
//!     ├──> Numeric cleanup (separators, currency symbols, coercion)
//!     │
//!     └──> Vec<Observation> + LoadDiagnostics
//! ```
//!
//! The keyword taxonomy (keyword → angle/category) is loaded by
//! [`TaxonomyLoader`] from its own side table.
//!
//! ## Example
//!
//! ```rust
//! use attribution_loader::{ObservationLoader, SchemaMapping};
//!
//! let csv = "CONTENT_SLUG,SERP_KEYWORD,EST_NET_REVENUE,SELLSIDE_CLICKS_NETWORK,SELLSIDE_SEARCHES\n\
//!            /loans,personal loans,\"$1,200\",40,900\n";
//! let loader = ObservationLoader::new(SchemaMapping::default()).unwrap();
//! let out = loader.load_reader(csv.as_bytes()).unwrap();
//! assert_eq!(out.observations[0].revenue, 1200.0);
//! ```

mod error;
mod loader;
mod numeric;
mod schema;
mod types;

pub use error::{LoaderError, Result};
pub use loader::{ObservationLoader, TaxonomyLoader};
pub use numeric::{parse_amount, parse_count, NumericField};
pub use schema::{SchemaMapping, TaxonomySchema};
pub use types::{
    normalize_keyword, LoadDiagnostics, LoadOutput, Observation, Taxonomy, TaxonomyDiagnostics,
    TaxonomyEntry,
};
