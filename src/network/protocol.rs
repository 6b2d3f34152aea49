//! Wire format of the node HTTP protocol

use crate::constants::{
    HEADER_AUTH_SIGNATURE, HEADER_AUTH_TIMESTAMP, HEADER_CONSISTENCY, HEADER_DATABASE_ID,
    HEADER_TRANSACTION_ID,
};
use crate::crypto::RequestSignature;
use crate::network::{TransportError, TransportResult};
use crate::query::types::{Consistency, Row};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// JSON body of `POST /v1/query`
#[derive(Debug, Serialize)]
pub struct QueryBody<'a> {
    pub sql: &'a str,
    pub params: &'a [Value],
}

/// Validated JSON answer of `POST /v1/query`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub rows: Vec<Row>,
    pub row_count: u64,
    pub affected_rows: u64,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_insert_id: Option<String>,
}

impl QueryResponse {
    /// Reject anything that is not a well-formed response before it is used
    pub fn parse(text: &str) -> TransportResult<Self> {
        serde_json::from_str(text).map_err(|e| TransportError::InvalidResponse(e.to_string()))
    }

    /// Empty response for statements that return nothing
    pub fn empty() -> Self {
        Self {
            rows: Vec::new(),
            row_count: 0,
            affected_rows: 0,
            last_insert_id: None,
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "lastInsertId must be a string or number, got {}",
            other
        ))),
    }
}

/// A fully signed statement, ready to be sent to any node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedQueryRequest {
    pub database_id: String,
    pub consistency: Consistency,
    pub transaction_id: Option<String>,
    pub signature: RequestSignature,
    /// Serialized [`QueryBody`]; this exact text was signed
    pub body: String,
}

impl SignedQueryRequest {
    /// Header pairs to attach to the HTTP request
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            (HEADER_DATABASE_ID, self.database_id.clone()),
            (HEADER_CONSISTENCY, self.consistency.as_str().to_string()),
            (HEADER_AUTH_TIMESTAMP, self.signature.timestamp.clone()),
            (HEADER_AUTH_SIGNATURE, self.signature.signature.clone()),
        ];
        if let Some(transaction_id) = &self.transaction_id {
            headers.push((HEADER_TRANSACTION_ID, transaction_id.clone()));
        }
        headers
    }
}

/// Join a node base URL and an endpoint path
pub fn endpoint(node: &str, path: &str) -> String {
    format!("{}{}", node.trim_end_matches('/'), path)
}
