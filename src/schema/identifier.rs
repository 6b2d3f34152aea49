//! Allow-list validation for SQL identifiers.
//!
//! Table, column and index names cannot be sent as bound parameters, so they end up in the
//! SQL text. This check is the only thing standing between caller-supplied names and that
//! text: a name must start with a letter or underscore, continue with letters, digits or
//! underscores, and be at most 128 characters long.

use crate::constants::MAX_IDENTIFIER_LENGTH;
use crate::error::{ClientError, ClientResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static IDENTIFIER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern compiles"));

/// What an identifier names; used in error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Table,
    Column,
    Index,
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierKind::Table => write!(f, "table name"),
            IdentifierKind::Column => write!(f, "column name"),
            IdentifierKind::Index => write!(f, "index name"),
        }
    }
}

/// Return `name` unchanged if it is a safe identifier, otherwise a validation error
pub fn validate_sql_identifier(name: &str, kind: IdentifierKind) -> ClientResult<&str> {
    if name.is_empty() {
        return Err(ClientError::Validation(format!("Empty {}", kind)));
    }
    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ClientError::Validation(format!(
            "Invalid {}: longer than {} characters",
            kind, MAX_IDENTIFIER_LENGTH
        )));
    }
    if !IDENTIFIER_PATTERN.is_match(name) {
        return Err(ClientError::Validation(format!(
            "Invalid {} '{}': only letters, digits and underscores are allowed, and it must not start with a digit",
            kind,
            name.escape_default()
        )));
    }
    Ok(name)
}
