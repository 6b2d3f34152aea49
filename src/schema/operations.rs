use super::builder;
use super::identifier::{validate_sql_identifier, IdentifierKind};
use super::types::{SelectOptions, SqlStatement, TableSchema};
use crate::error::{ClientError, ClientResult};
use crate::events::ClientEvent;
use crate::query::executor::QueryExecutor;
use crate::query::types::{Consistency, QueryOptions, QueryResult, Row};
use log::{debug, info};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Table-level helpers over a [`QueryExecutor`].
///
/// Identifiers are checked against the allow-list before any SQL is composed; values are
/// always bound. Writes run with strong consistency. Tables created through this instance
/// are remembered so they can be described without a round trip.
#[derive(Debug)]
pub struct SchemaOperations {
    executor: Arc<QueryExecutor>,
    tables: RwLock<HashMap<String, TableSchema>>,
}

impl SchemaOperations {
    pub fn new(executor: Arc<QueryExecutor>) -> Self {
        Self {
            executor,
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Execute `statement`, falling back to `fallback` when `options` names no consistency
    async fn run(
        &self,
        statement: SqlStatement,
        mut options: QueryOptions,
        fallback: Consistency,
    ) -> ClientResult<QueryResult> {
        options.consistency.get_or_insert(fallback);
        self.executor
            .query(&statement.sql, &statement.params, options)
            .await
    }

    /// Create a table and its indexes, then cache its schema
    pub async fn create_table(&self, schema: &TableSchema) -> ClientResult<()> {
        let statements = builder::create_table(schema)?;
        let consistency = schema.consistency.unwrap_or(Consistency::Strong);
        for statement in statements {
            self.run(statement, QueryOptions::new(), consistency).await?;
        }

        self.tables
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(schema.name.clone(), schema.clone());
        info!("Created table {}", schema.name);
        self.executor.observers().emit(ClientEvent::TableCreated {
            table: schema.name.clone(),
        });
        Ok(())
    }

    pub async fn drop_table(&self, table: &str) -> ClientResult<()> {
        let statement = builder::drop_table(table)?;
        self.run(statement, QueryOptions::new(), Consistency::Strong)
            .await?;

        self.tables
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .remove(table);
        info!("Dropped table {}", table);
        self.executor.observers().emit(ClientEvent::TableDropped {
            table: table.to_string(),
        });
        Ok(())
    }

    /// Insert one or more rows in a single statement.
    ///
    /// Runs strong unless `options` says otherwise; pass a transaction's
    /// [`options`](crate::query::TransactionHandle::options) to write inside it.
    pub async fn insert(
        &self,
        table: &str,
        rows: &[Row],
        options: QueryOptions,
    ) -> ClientResult<QueryResult> {
        let statement = builder::insert(table, rows)?;
        debug!("Inserting {} row(s) into {}", rows.len(), table);
        self.run(statement, options, Consistency::Strong).await
    }

    pub async fn insert_one(
        &self,
        table: &str,
        row: Row,
        options: QueryOptions,
    ) -> ClientResult<QueryResult> {
        self.insert(table, std::slice::from_ref(&row), options)
            .await
    }

    pub async fn update(
        &self,
        table: &str,
        values: &Row,
        where_clause: &str,
        where_params: &[Value],
        options: QueryOptions,
    ) -> ClientResult<QueryResult> {
        let statement = builder::update(table, values, where_clause, where_params)?;
        self.run(statement, options, Consistency::Strong).await
    }

    pub async fn delete(
        &self,
        table: &str,
        where_clause: &str,
        where_params: &[Value],
        options: QueryOptions,
    ) -> ClientResult<QueryResult> {
        let statement = builder::delete(table, where_clause, where_params)?;
        self.run(statement, options, Consistency::Strong).await
    }

    pub async fn select(&self, table: &str, options: &SelectOptions) -> ClientResult<QueryResult> {
        let statement = builder::select(table, options)?;
        let mut query_options = QueryOptions::new();
        query_options.consistency = options.consistency;
        query_options.transaction_id = options.transaction_id.clone();
        self.run(statement, query_options, self.executor.default_consistency())
            .await
    }

    pub async fn count(
        &self,
        table: &str,
        where_clause: Option<&str>,
        params: &[Value],
        options: QueryOptions,
    ) -> ClientResult<u64> {
        let statement = builder::count(table, where_clause, params)?;
        let result = self
            .run(statement, options, self.executor.default_consistency())
            .await?;
        let value = result
            .first_row()
            .and_then(|row| row.get("count"))
            .ok_or_else(|| {
                ClientError::UnexpectedResponse(format!("count of {} returned no row", table))
            })?;
        match value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| {
            ClientError::UnexpectedResponse(format!("count of {} is not an integer: {}", table, value))
        })
    }

    pub async fn exists(
        &self,
        table: &str,
        where_clause: Option<&str>,
        params: &[Value],
        options: QueryOptions,
    ) -> ClientResult<bool> {
        let statement = builder::exists(table, where_clause, params)?;
        let result = self
            .run(statement, options, self.executor.default_consistency())
            .await?;
        Ok(!result.rows.is_empty() || result.row_count > 0)
    }

    /// Schema of a table created through this instance
    pub fn describe_table(&self, table: &str) -> ClientResult<Option<TableSchema>> {
        validate_sql_identifier(table, IdentifierKind::Table)?;
        Ok(self
            .tables
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(table)
            .cloned())
    }

    /// Names of the cached tables, sorted
    pub fn list_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tables
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}
