//! Schema compatibility, diffing, and evolution.
//!
//! - [`compat`]: one-directional, name-only compatibility predicate
//! - [`diff`]: column-level [`TableChange`]s between two schemas
//! - [`evolution`]: policy-gated transactional application through the catalog

pub mod compat;
pub mod diff;
pub mod evolution;

pub use compat::is_compatible;
pub use diff::{diff_schemas, TableChange};
pub use evolution::{EvolutionOutcome, SchemaEvolver};
