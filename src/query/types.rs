use crate::error::{ClientError, ClientResult};
use crate::network::protocol::QueryResponse;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// One result row or one insert/update payload, keyed by column name.
pub type Row = Map<String, Value>;

/// Consistency level requested from a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Consistency {
    /// Synchronous, consensus-backed read or write
    #[default]
    Strong,
    /// Faster, possibly stale read
    Eventual,
}

impl Consistency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Consistency::Strong => "strong",
            Consistency::Eventual => "eventual",
        }
    }
}

impl fmt::Display for Consistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Consistency {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strong" => Ok(Consistency::Strong),
            "eventual" => Ok(Consistency::Eventual),
            other => Err(ClientError::Configuration(format!(
                "Unknown consistency level '{}'",
                other
            ))),
        }
    }
}

/// Per-call options for a statement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Consistency level; the client default applies when unset
    pub consistency: Option<Consistency>,
    /// Bound on a single attempt; the client default applies when unset
    pub timeout_ms: Option<u64>,
    /// Remote transaction this statement belongs to
    pub transaction_id: Option<String>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strong() -> Self {
        Self::default().with_consistency(Consistency::Strong)
    }

    pub fn eventual() -> Self {
        Self::default().with_consistency(Consistency::Eventual)
    }

    pub fn with_consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = Some(consistency);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }
}

/// Outcome of one successfully executed statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub rows: Vec<Row>,
    pub row_count: u64,
    pub affected_rows: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_insert_id: Option<String>,
    /// Wall-clock time of the successful attempt
    pub duration_ms: u64,
    /// Node that served the statement
    pub node: String,
}

impl QueryResult {
    pub(crate) fn from_response(response: QueryResponse, duration_ms: u64, node: String) -> Self {
        Self {
            rows: response.rows,
            row_count: response.row_count,
            affected_rows: response.affected_rows,
            last_insert_id: response.last_insert_id,
            duration_ms,
            node,
        }
    }

    pub fn first_row(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// Deserialize every row into `T`
    pub fn rows_as<T: DeserializeOwned>(&self) -> ClientResult<Vec<T>> {
        self.rows
            .iter()
            .map(|row| serde_json::from_value(Value::Object(row.clone())).map_err(ClientError::from))
            .collect()
    }
}
