//! Table schemas, identifier validation and the SQL helpers built on them

pub mod builder;
pub mod identifier;
pub mod operations;
pub mod types;

pub use identifier::{validate_sql_identifier, IdentifierKind};
pub use operations::SchemaOperations;
pub use types::{
    ColumnDefault, ColumnDefinition, ColumnType, IndexDefinition, OrderDirection, SelectOptions,
    SqlStatement, TableSchema,
};
