//! Column-level diff between two table schemas.

use std::collections::HashSet;
use std::fmt;

use arrow_schema::DataType;
use tidewater_catalog::TableSchema;

/// A column-level change between two schemas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableChange {
    /// A column present in the new schema only.
    AddColumn {
        /// Column name.
        name: String,
        /// Column type.
        data_type: DataType,
        /// Nullability in the new schema. Added columns are always created
        /// nullable regardless.
        nullable: bool,
    },
    /// A column present in the old schema only.
    DeleteColumn {
        /// Column name.
        name: String,
    },
    /// Any other structural difference; never executed.
    Unsupported {
        /// Human-readable description.
        description: String,
    },
}

impl TableChange {
    /// Returns a short kind label for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AddColumn { .. } => "add-column",
            Self::DeleteColumn { .. } => "delete-column",
            Self::Unsupported { .. } => "unsupported",
        }
    }
}

impl fmt::Display for TableChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddColumn {
                name, data_type, ..
            } => write!(f, "ADD COLUMN {name} {data_type:?}"),
            Self::DeleteColumn { name } => write!(f, "DROP COLUMN {name}"),
            Self::Unsupported { description } => write!(f, "UNSUPPORTED {description}"),
        }
    }
}

/// Computes the changes that turn `old` into `new`, by column name.
///
/// Emits one [`TableChange::AddColumn`] per name only in `new` (in `new`'s
/// order), then one [`TableChange::DeleteColumn`] per name only in `old`
/// (in `old`'s order). Names present in both produce nothing, even if
/// their type or nullability differs.
#[must_use]
pub fn diff_schemas(old: &TableSchema, new: &TableSchema) -> Vec<TableChange> {
    let old_names: HashSet<&str> = old.field_names().collect();
    let new_names: HashSet<&str> = new.field_names().collect();

    let added = new
        .fields()
        .iter()
        .filter(|f| !old_names.contains(f.name.as_str()))
        .map(|f| TableChange::AddColumn {
            name: f.name.clone(),
            data_type: f.data_type.clone(),
            nullable: f.nullable,
        });

    let removed = old
        .fields()
        .iter()
        .filter(|f| !new_names.contains(f.name.as_str()))
        .map(|f| TableChange::DeleteColumn {
            name: f.name.clone(),
        });

    added.chain(removed).collect()
}
