//! An embeddable hexastore graph database with hybrid vector search.
//!
//! Triples are stored under six key orderings (see [`codec::key`]) over an
//! ordered key-value engine, giving single-range-scan lookups for any
//! pattern with at least one bound component. A pluggable vector index adds
//! nearest-neighbor search over embeddings attached to subjects, predicates,
//! objects, or whole triples, and a [`search::Search`] join engine lets
//! graph patterns and vector filters compose in one query.

pub mod codec;
pub mod context;
pub mod db;
pub mod error;
pub mod facets;
pub mod hexastore;
pub mod journal;
pub mod kv;
pub mod navigator;
pub mod options;
pub mod search;
pub mod triple;
pub mod vector;

pub use context::Context;
pub use db::Database;
pub use error::{Error, Result};
pub use navigator::Navigator;
pub use options::Options;
pub use search::{Search, SearchOptions};
pub use triple::{Pattern, PatternValue, Solution, Triple, Variable};
