//! Name-based schema compatibility.

use tidewater_catalog::TableSchema;

/// Returns `true` if every field name in `candidate` exists in `current`.
///
/// One-directional and name-only: types and nullability are not compared,
/// and `current` may have any number of extra columns. A single record's
/// inferred schema is normally narrower than the table's accumulated
/// schema, so this only fails when the record introduces a column the
/// table lacks.
#[must_use]
pub fn is_compatible(current: &TableSchema, candidate: &TableSchema) -> bool {
    candidate
        .field_names()
        .all(|name| current.find_field(name).is_some())
}
