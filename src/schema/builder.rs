//! SQL composition for schema and row operations.
//!
//! Everything here is pure: identifiers are validated and interpolated, values are always
//! bound as `$n` parameters. Execution lives in [`super::operations`].

use super::identifier::{validate_sql_identifier, IdentifierKind};
use super::types::{SelectOptions, SqlStatement, TableSchema};
use crate::error::{ClientError, ClientResult};
use crate::query::types::Row;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

static PLACEHOLDER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$(\d+)").expect("placeholder pattern compiles"));

fn table_name(name: &str) -> ClientResult<&str> {
    validate_sql_identifier(name, IdentifierKind::Table)
}

fn column_name(name: &str) -> ClientResult<&str> {
    validate_sql_identifier(name, IdentifierKind::Column)
}

fn require_where(where_clause: &str, operation: &str) -> ClientResult<()> {
    if where_clause.trim().is_empty() {
        return Err(ClientError::Validation(format!(
            "{} requires a where clause",
            operation
        )));
    }
    Ok(())
}

/// `CREATE TABLE IF NOT EXISTS` followed by one `CREATE INDEX` per index
pub fn create_table(schema: &TableSchema) -> ClientResult<Vec<SqlStatement>> {
    let table = table_name(&schema.name)?;
    if schema.columns.is_empty() {
        return Err(ClientError::Validation(format!(
            "Table '{}' must define at least one column",
            table
        )));
    }

    let mut definitions = Vec::with_capacity(schema.columns.len() + 1);
    for column in &schema.columns {
        let mut definition = format!("{} {}", column_name(&column.name)?, column.column_type);
        if !column.nullable {
            definition.push_str(" NOT NULL");
        }
        if column.unique {
            definition.push_str(" UNIQUE");
        }
        if let Some(default) = &column.default {
            definition.push_str(" DEFAULT ");
            definition.push_str(&default.to_sql());
        }
        definitions.push(definition);
    }

    if !schema.primary_key.is_empty() {
        let key = schema
            .primary_key
            .iter()
            .map(|c| column_name(c))
            .collect::<ClientResult<Vec<_>>>()?;
        definitions.push(format!("PRIMARY KEY ({})", key.join(", ")));
    }

    let mut statements = vec![SqlStatement::new(
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            table,
            definitions.join(", ")
        ),
        Vec::new(),
    )];

    for index in &schema.indexes {
        let name = validate_sql_identifier(&index.name, IdentifierKind::Index)?;
        if index.columns.is_empty() {
            return Err(ClientError::Validation(format!(
                "Index '{}' must cover at least one column",
                name
            )));
        }
        let columns = index
            .columns
            .iter()
            .map(|c| column_name(c))
            .collect::<ClientResult<Vec<_>>>()?;
        statements.push(SqlStatement::new(
            format!(
                "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
                if index.unique { "UNIQUE " } else { "" },
                name,
                table,
                columns.join(", ")
            ),
            Vec::new(),
        ));
    }

    Ok(statements)
}

pub fn drop_table(table: &str) -> ClientResult<SqlStatement> {
    Ok(SqlStatement::new(
        format!("DROP TABLE IF EXISTS {}", table_name(table)?),
        Vec::new(),
    ))
}

/// One INSERT for all rows; row `i` uses placeholders `$(i*k+1)..$(i*k+k)`.
///
/// Column order follows the first row. Later rows must carry the same column set, in any order.
pub fn insert(table: &str, rows: &[Row]) -> ClientResult<SqlStatement> {
    let table = table_name(table)?;
    let first = rows
        .first()
        .ok_or_else(|| ClientError::Validation("Insert requires at least one row".to_string()))?;
    if first.is_empty() {
        return Err(ClientError::Validation(
            "Insert requires at least one column".to_string(),
        ));
    }

    let columns = first
        .keys()
        .map(|c| column_name(c))
        .collect::<ClientResult<Vec<_>>>()?;
    let width = columns.len();

    let mut params = Vec::with_capacity(width * rows.len());
    let mut groups = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        if row.len() != width || !columns.iter().all(|c| row.contains_key(*c)) {
            return Err(ClientError::Validation(format!(
                "Row {} does not have the same columns as the first row",
                i
            )));
        }
        let placeholders = (1..=width)
            .map(|n| format!("${}", i * width + n))
            .collect::<Vec<_>>();
        groups.push(format!("({})", placeholders.join(", ")));
        for column in &columns {
            params.push(row[*column].clone());
        }
    }

    Ok(SqlStatement::new(
        format!(
            "INSERT INTO {} ({}) VALUES {}",
            table,
            columns.join(", "),
            groups.join(", ")
        ),
        params,
    ))
}

/// Renumber `$n` to `$(n + offset)`
fn shift_placeholders(fragment: &str, offset: usize) -> String {
    PLACEHOLDER_PATTERN
        .replace_all(fragment, |caps: &Captures| match caps[1].parse::<usize>() {
            Ok(n) => format!("${}", n + offset),
            Err(_) => caps[0].to_string(),
        })
        .into_owned()
}

/// `UPDATE t SET a = $1, b = $2 WHERE ...`; `$1` in the where fragment is the first where param
pub fn update(
    table: &str,
    values: &Row,
    where_clause: &str,
    where_params: &[Value],
) -> ClientResult<SqlStatement> {
    let table = table_name(table)?;
    if values.is_empty() {
        return Err(ClientError::Validation(
            "Update requires at least one column".to_string(),
        ));
    }
    require_where(where_clause, "Update")?;

    let mut assignments = Vec::with_capacity(values.len());
    let mut params = Vec::with_capacity(values.len() + where_params.len());
    for (i, (column, value)) in values.iter().enumerate() {
        assignments.push(format!("{} = ${}", column_name(column)?, i + 1));
        params.push(value.clone());
    }
    params.extend_from_slice(where_params);

    Ok(SqlStatement::new(
        format!(
            "UPDATE {} SET {} WHERE {}",
            table,
            assignments.join(", "),
            shift_placeholders(where_clause, values.len())
        ),
        params,
    ))
}

pub fn delete(table: &str, where_clause: &str, where_params: &[Value]) -> ClientResult<SqlStatement> {
    let table = table_name(table)?;
    require_where(where_clause, "Delete")?;
    Ok(SqlStatement::new(
        format!("DELETE FROM {} WHERE {}", table, where_clause),
        where_params.to_vec(),
    ))
}

pub fn select(table: &str, options: &SelectOptions) -> ClientResult<SqlStatement> {
    let table = table_name(table)?;
    let columns = if options.columns.is_empty() {
        "*".to_string()
    } else {
        options
            .columns
            .iter()
            .map(|c| column_name(c))
            .collect::<ClientResult<Vec<_>>>()?
            .join(", ")
    };

    let mut sql = format!("SELECT {} FROM {}", columns, table);
    push_where(&mut sql, options.where_clause.as_deref());

    if !options.order_by.is_empty() {
        let order = options
            .order_by
            .iter()
            .map(|(c, dir)| -> ClientResult<String> {
                Ok(format!("{} {}", column_name(c)?, dir.as_sql()))
            })
            .collect::<ClientResult<Vec<_>>>()?;
        sql.push_str(" ORDER BY ");
        sql.push_str(&order.join(", "));
    }
    if let Some(limit) = options.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    if let Some(offset) = options.offset {
        sql.push_str(&format!(" OFFSET {}", offset));
    }

    Ok(SqlStatement::new(sql, options.params.clone()))
}

pub fn count(table: &str, where_clause: Option<&str>, params: &[Value]) -> ClientResult<SqlStatement> {
    let mut sql = format!("SELECT COUNT(*) AS count FROM {}", table_name(table)?);
    push_where(&mut sql, where_clause);
    Ok(SqlStatement::new(sql, params.to_vec()))
}

pub fn exists(table: &str, where_clause: Option<&str>, params: &[Value]) -> ClientResult<SqlStatement> {
    let mut sql = format!("SELECT 1 FROM {}", table_name(table)?);
    push_where(&mut sql, where_clause);
    sql.push_str(" LIMIT 1");
    Ok(SqlStatement::new(sql, params.to_vec()))
}

fn push_where(sql: &mut String, where_clause: Option<&str>) {
    if let Some(clause) = where_clause.map(str::trim).filter(|c| !c.is_empty()) {
        sql.push_str(" WHERE ");
        sql.push_str(clause);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{
        ColumnDefinition, ColumnType, IndexDefinition, OrderDirection,
    };
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {}", other),
        }
    }

    #[test]
    fn test_insert_single_row() {
        let stmt = insert("t", &[row(json!({"a": 1, "b": 2}))]).unwrap();
        assert_eq!(stmt.sql, "INSERT INTO t (a, b) VALUES ($1, $2)");
        assert_eq!(stmt.params, vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_insert_multi_row_offsets_placeholders() {
        // Value groups are separated by ", " like every other list the builder emits
        let stmt = insert("t", &[row(json!({"a": 1})), row(json!({"a": 2}))]).unwrap();
        assert_eq!(stmt.sql, "INSERT INTO t (a) VALUES ($1), ($2)");
        assert_eq!(stmt.params, vec![json!(1), json!(2)]);

        let stmt = insert(
            "t",
            &[
                row(json!({"a": 1, "b": "x"})),
                row(json!({"b": "y", "a": 2})),
            ],
        )
        .unwrap();
        assert_eq!(stmt.sql, "INSERT INTO t (a, b) VALUES ($1, $2), ($3, $4)");
        assert_eq!(stmt.params, vec![json!(1), json!("x"), json!(2), json!("y")]);
    }

    #[test]
    fn test_insert_rejects_mismatched_rows() {
        let err = insert("t", &[row(json!({"a": 1})), row(json!({"b": 2}))]).unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        let err = insert("t", &[row(json!({"a": 1})), row(json!({"a": 2, "b": 3}))]).unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        assert!(insert("t", &[]).is_err());
    }

    #[test]
    fn test_insert_validates_identifiers() {
        assert!(insert("t; DROP TABLE t", &[row(json!({"a": 1}))]).is_err());
        assert!(insert("t", &[row(json!({"a) VALUES (1); --": 1}))]).is_err());
    }

    #[test]
    fn test_update_shifts_where_placeholders() {
        let stmt = update(
            "users",
            &row(json!({"name": "bob", "age": 40})),
            "id = $1 AND org = $2",
            &[json!(7), json!("acme")],
        )
        .unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE users SET name = $1, age = $2 WHERE id = $3 AND org = $4"
        );
        assert_eq!(
            stmt.params,
            vec![json!("bob"), json!(40), json!(7), json!("acme")]
        );
    }

    #[test]
    fn test_update_and_delete_require_where() {
        assert!(update("t", &row(json!({"a": 1})), "  ", &[]).is_err());
        assert!(delete("t", "", &[]).is_err());
        let stmt = delete("t", "id = $1", &[json!(3)]).unwrap();
        assert_eq!(stmt.sql, "DELETE FROM t WHERE id = $1");
        assert_eq!(stmt.params, vec![json!(3)]);
    }

    #[test]
    fn test_create_table_statements() {
        let schema = TableSchema::new("users")
            .column(ColumnDefinition::new("id", ColumnType::Integer).not_null())
            .column(ColumnDefinition::new("email", ColumnType::Text).unique())
            .column(ColumnDefinition::new("nick", ColumnType::Text).with_default("o'brien"))
            .column(ColumnDefinition::new("active", ColumnType::Boolean).with_default(true))
            .primary_key(&["id"])
            .index(IndexDefinition::new("idx_users_nick", vec!["nick".to_string()]).unique());
        let statements = create_table(&schema).unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[0].sql,
            "CREATE TABLE IF NOT EXISTS users (id INTEGER NOT NULL, email TEXT UNIQUE, \
             nick TEXT DEFAULT 'o''brien', active BOOLEAN DEFAULT TRUE, PRIMARY KEY (id))"
        );
        assert_eq!(
            statements[1].sql,
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_nick ON users (nick)"
        );
    }

    #[test]
    fn test_create_table_validates_every_name() {
        let base = || TableSchema::new("t").column(ColumnDefinition::new("a", ColumnType::Text));
        assert!(create_table(&base().primary_key(&["a b"])).is_err());
        assert!(create_table(
            &base().index(IndexDefinition::new("idx;", vec!["a".to_string()]))
        )
        .is_err());
        assert!(create_table(
            &base().index(IndexDefinition::new("idx", vec!["a'".to_string()]))
        )
        .is_err());
        assert!(create_table(&TableSchema::new("t")).is_err());
        assert_eq!(drop_table("t").unwrap().sql, "DROP TABLE IF EXISTS t");
        assert!(drop_table("t--").is_err());
    }

    #[test]
    fn test_select_count_exists() {
        let options = SelectOptions::new()
            .columns(&["id", "name"])
            .filter("age > $1", vec![json!(18)])
            .order_by("name", OrderDirection::Desc)
            .limit(10)
            .offset(20);
        let stmt = select("users", &options).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT id, name FROM users WHERE age > $1 ORDER BY name DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(stmt.params, vec![json!(18)]);

        assert_eq!(
            select("users", &SelectOptions::new()).unwrap().sql,
            "SELECT * FROM users"
        );
        assert!(select(
            "users",
            &SelectOptions::new().order_by("name; --", OrderDirection::Asc)
        )
        .is_err());

        assert_eq!(
            count("users", Some("age > $1"), &[json!(1)]).unwrap().sql,
            "SELECT COUNT(*) AS count FROM users WHERE age > $1"
        );
        assert_eq!(
            exists("users", None, &[]).unwrap().sql,
            "SELECT 1 FROM users LIMIT 1"
        );
    }
}
