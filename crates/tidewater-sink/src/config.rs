//! Sink configuration.
//!
//! [`ConnectorConfig`] carries the raw `WITH (...)` key/value options;
//! [`MultipleSinkOptions`] is the typed view the reconciliation operator
//! consumes.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::SinkError;
use crate::format::FormatKind;
use crate::policy::SchemaUpdatePolicy;

/// Raw connector options, as written in a `WITH (...)` clause.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectorConfig {
    connector_type: String,
    properties: HashMap<String, String>,
}

impl ConnectorConfig {
    /// Creates an empty config for the given connector type.
    pub fn new(connector_type: impl Into<String>) -> Self {
        Self {
            connector_type: connector_type.into(),
            properties: HashMap::new(),
        }
    }

    /// Creates a config with the given properties.
    pub fn with_properties(
        connector_type: impl Into<String>,
        properties: HashMap<String, String>,
    ) -> Self {
        Self {
            connector_type: connector_type.into(),
            properties,
        }
    }

    /// Sets a property.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Returns the connector type.
    #[must_use]
    pub fn connector_type(&self) -> &str {
        &self.connector_type
    }

    /// Gets a property value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Gets a required property value.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::MissingConfig` if the key is absent or blank.
    pub fn require(&self, key: &str) -> Result<&str, SinkError> {
        self.get(key)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| SinkError::MissingConfig(key.to_string()))
    }
}

/// Payload format selector.
pub const FORMAT: &str = "sink.multiple.format";
/// Pattern producing the namespace from a record.
pub const DATABASE_PATTERN: &str = "sink.multiple.database-pattern";
/// Pattern producing the table name from a record.
pub const TABLE_PATTERN: &str = "sink.multiple.table-pattern";
/// Policy for column additions.
pub const ADD_COLUMN_POLICY: &str = "sink.multiple.add-column.policy";
/// Policy for column deletions.
pub const DEL_COLUMN_POLICY: &str = "sink.multiple.del-column.policy";
/// Period of the blacklist diagnostic log, in milliseconds.
pub const DIAGNOSTIC_INTERVAL_MS: &str = "sink.multiple.diagnostic-interval-ms";

/// Default diagnostic interval (10 minutes).
pub const DEFAULT_DIAGNOSTIC_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Options of a multi-table sink with dynamic schema handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipleSinkOptions {
    /// Payload format.
    pub format: FormatKind,
    /// Namespace pattern, e.g. `${database}`.
    pub database_pattern: String,
    /// Table name pattern, e.g. `${table}`.
    pub table_pattern: String,
    /// Policy applied to `AddColumn` changes.
    pub add_column_policy: SchemaUpdatePolicy,
    /// Policy applied to `DeleteColumn` changes.
    pub delete_column_policy: SchemaUpdatePolicy,
    /// How often the blacklist is logged. Never zero.
    diagnostic_interval: Duration,
}

impl MultipleSinkOptions {
    /// Creates options with default policies and diagnostic interval.
    pub fn new(
        format: FormatKind,
        database_pattern: impl Into<String>,
        table_pattern: impl Into<String>,
    ) -> Self {
        Self {
            format,
            database_pattern: database_pattern.into(),
            table_pattern: table_pattern.into(),
            add_column_policy: SchemaUpdatePolicy::Apply,
            delete_column_policy: SchemaUpdatePolicy::LogAndIgnore,
            diagnostic_interval: DEFAULT_DIAGNOSTIC_INTERVAL,
        }
    }

    /// Sets the add-column policy.
    #[must_use]
    pub fn with_add_column_policy(mut self, policy: SchemaUpdatePolicy) -> Self {
        self.add_column_policy = policy;
        self
    }

    /// Sets the delete-column policy.
    #[must_use]
    pub fn with_delete_column_policy(mut self, policy: SchemaUpdatePolicy) -> Self {
        self.delete_column_policy = policy;
        self
    }

    /// Sets the diagnostic interval.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::ConfigurationError` if `interval` is zero.
    pub fn with_diagnostic_interval(mut self, interval: Duration) -> Result<Self, SinkError> {
        if interval.is_zero() {
            return Err(SinkError::ConfigurationError(format!(
                "{DIAGNOSTIC_INTERVAL_MS} must be greater than zero"
            )));
        }
        self.diagnostic_interval = interval;
        Ok(self)
    }

    /// Returns how often the blacklist is logged.
    #[must_use]
    pub fn diagnostic_interval(&self) -> Duration {
        self.diagnostic_interval
    }

    /// Parses options from a [`ConnectorConfig`].
    ///
    /// # Errors
    ///
    /// Returns `SinkError::MissingConfig` if a required key is absent, or
    /// `SinkError::ConfigurationError` on invalid values.
    pub fn from_config(config: &ConnectorConfig) -> Result<Self, SinkError> {
        let format: FormatKind = config.require(FORMAT)?.parse()?;
        let mut opts = Self::new(
            format,
            config.require(DATABASE_PATTERN)?,
            config.require(TABLE_PATTERN)?,
        );

        if let Some(s) = config.get(ADD_COLUMN_POLICY) {
            opts.add_column_policy = s.parse()?;
        }
        if let Some(s) = config.get(DEL_COLUMN_POLICY) {
            opts.delete_column_policy = s.parse()?;
        }
        if let Some(s) = config.get(DIAGNOSTIC_INTERVAL_MS) {
            let ms: u64 = s.trim().parse().map_err(|_| {
                SinkError::ConfigurationError(format!(
                    "{DIAGNOSTIC_INTERVAL_MS}: expected milliseconds, got '{s}'"
                ))
            })?;
            opts = opts.with_diagnostic_interval(Duration::from_millis(ms))?;
        }

        Ok(opts)
    }
}
