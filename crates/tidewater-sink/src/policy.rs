//! Per-change-kind schema update policies.

use tidewater_catalog::TableIdentifier;

use crate::schema::TableChange;

/// What to do when a table change of a given kind is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaUpdatePolicy {
    /// Execute the change against the catalog.
    Apply,
    /// Log the change and accept it without touching the catalog.
    LogAndIgnore,
    /// Log the change as an error and refuse it; the table is blacklisted.
    LogAndError,
}

str_enum!(SchemaUpdatePolicy, lowercase_udash, "unknown schema update policy",
    Apply => "apply", "try-it-best";
    LogAndIgnore => "log-and-ignore", "log-with-ignore", "ignore";
    LogAndError => "log-and-error", "throw-with-stop", "deny", "error");

/// The outcome of evaluating one change against its policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    /// The change should be executed.
    Apply,
    /// The change is accepted but not executed.
    Ignore,
    /// The change is refused.
    Reject,
}

impl PolicyDecision {
    /// Returns `true` unless the change was refused.
    #[must_use]
    pub fn is_allowed(self) -> bool {
        !matches!(self, Self::Reject)
    }
}

impl SchemaUpdatePolicy {
    /// Evaluates `change` for `table` under this policy, logging the decision.
    #[must_use]
    pub fn evaluate(self, table: &TableIdentifier, change: &TableChange) -> PolicyDecision {
        match self {
            Self::Apply => PolicyDecision::Apply,
            Self::LogAndIgnore => {
                tracing::warn!(
                    table = %table,
                    change = %change,
                    "Ignoring schema change by policy"
                );
                PolicyDecision::Ignore
            }
            Self::LogAndError => {
                tracing::error!(
                    table = %table,
                    change = %change,
                    "Schema change refused by policy"
                );
                PolicyDecision::Reject
            }
        }
    }
}
