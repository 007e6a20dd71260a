//! Schema introspection and DDL.
//!
//! Table existence and column order come from `information_schema` on every
//! call; nothing here caches. All functions are generic over
//! [`GenericClient`] so the same queries run on a plain client or inside a
//! transaction.
//!
//! Identifiers cannot be bound as parameters, so DDL and any query naming a
//! caller-supplied table goes through `ident::quote`. Catalog parameters are
//! cast to `text` on both sides to sidestep the `sql_identifier` domain
//! type in binary protocol.

use tokio_postgres::GenericClient;

use super::StoreError;
use super::ident;

/// A data column as `(name, SQL type)`, e.g. `("age", "INTEGER")`.
///
/// The type is spliced into the DDL verbatim; it is an engine type
/// expression, not an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub ty: String,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

/// Whether a table exists in the public schema.
pub async fn table_exists<C>(client: &C, table: &str) -> Result<bool, StoreError>
where
    C: GenericClient + Sync,
{
    let row = client
        .query_one(
            "SELECT EXISTS (
                SELECT FROM information_schema.tables
                WHERE table_schema = 'public'
                AND table_name = $1::text
            )",
            &[&table],
        )
        .await?;
    Ok(row.get::<_, bool>(0))
}

/// Ordered data column names of a table, excluding `id`.
pub async fn column_names<C>(client: &C, table: &str) -> Result<Vec<String>, StoreError>
where
    C: GenericClient + Sync,
{
    let rows = client
        .query(
            "SELECT column_name::text
             FROM information_schema.columns
             WHERE table_schema = 'public'
             AND table_name = $1::text
             AND column_name <> 'id'
             ORDER BY ordinal_position",
            &[&table],
        )
        .await?;
    Ok(rows.iter().map(|row| row.get::<_, String>(0)).collect())
}

/// All user tables in the public schema, sorted by name.
pub async fn list_tables<C>(client: &C) -> Result<Vec<String>, StoreError>
where
    C: GenericClient + Sync,
{
    let rows = client
        .query(
            "SELECT table_name::text
             FROM information_schema.tables
             WHERE table_schema = 'public'
             AND table_type = 'BASE TABLE'
             ORDER BY table_name",
            &[],
        )
        .await?;
    Ok(rows.iter().map(|row| row.get::<_, String>(0)).collect())
}

fn create_table_sql(table: &str, columns: &[ColumnSpec], if_not_exists: bool) -> String {
    let clause = if if_not_exists { "IF NOT EXISTS " } else { "" };
    let mut defs = vec!["id BIGSERIAL PRIMARY KEY".to_string()];
    defs.extend(
        columns
            .iter()
            .map(|col| format!("{} {}", ident::quote(&col.name), col.ty)),
    );
    format!(
        "CREATE TABLE {}{} ({})",
        clause,
        ident::quote(table),
        defs.join(", ")
    )
}

/// Create a table with an identity primary key plus the given columns.
pub async fn create_table<C>(
    client: &C,
    table: &str,
    columns: &[ColumnSpec],
    if_not_exists: bool,
) -> Result<(), StoreError>
where
    C: GenericClient + Sync,
{
    if columns.is_empty() {
        return Err(StoreError::NoColumns);
    }
    client
        .execute(create_table_sql(table, columns, if_not_exists).as_str(), &[])
        .await?;
    tracing::info!(table, columns = columns.len(), "table created");
    Ok(())
}

/// Drop a table (`DROP TABLE IF EXISTS`).
pub async fn drop_table<C>(client: &C, table: &str) -> Result<(), StoreError>
where
    C: GenericClient + Sync,
{
    client
        .execute(
            format!("DROP TABLE IF EXISTS {}", ident::quote(table)).as_str(),
            &[],
        )
        .await?;
    tracing::info!(table, "table dropped");
    Ok(())
}

/// Materialize a table referenced by an operation.
///
/// With auto-provisioning on (the default), an unknown table is created on
/// first reference with only its `id` column; the warn event exists because
/// a miss here usually means a misspelled table name. With it off the
/// operation fails with [`StoreError::TableNotFound`].
pub async fn ensure_table<C>(client: &C, table: &str, auto_provision: bool) -> Result<(), StoreError>
where
    C: GenericClient + Sync,
{
    if table_exists(client, table).await? {
        return Ok(());
    }
    if !auto_provision {
        return Err(StoreError::TableNotFound {
            table: table.to_string(),
        });
    }
    client
        .execute(create_table_sql(table, &[], true).as_str(), &[])
        .await?;
    tracing::warn!(table, "table did not exist and was auto-provisioned");
    Ok(())
}

/// Next available row id: `max(id) + 1`, or 1 for an empty table.
///
/// A plain read, not a sequence allocation; see `RowStart::Next` for the
/// concurrency caveat.
pub async fn next_row_id<C>(client: &C, table: &str) -> Result<i64, StoreError>
where
    C: GenericClient + Sync,
{
    let row = client
        .query_one(
            format!(
                "SELECT COALESCE(MAX(id), 0) + 1 FROM {}",
                ident::quote(table)
            )
            .as_str(),
            &[],
        )
        .await?;
    Ok(row.get::<_, i64>(0))
}

/// Materialize a placeholder row if `row_id` does not exist yet.
///
/// The insert carries `ON CONFLICT (id) DO NOTHING`, so a concurrent
/// insert of the same id no-ops instead of failing, and existing data
/// columns are never overwritten.
pub async fn ensure_row<C>(client: &C, table: &str, row_id: i64) -> Result<(), StoreError>
where
    C: GenericClient + Sync,
{
    let row = client
        .query_one(
            format!(
                "SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1)",
                ident::quote(table)
            )
            .as_str(),
            &[&row_id],
        )
        .await?;
    if row.get::<_, bool>(0) {
        return Ok(());
    }
    client
        .execute(
            format!(
                "INSERT INTO {} (id) VALUES ($1) ON CONFLICT (id) DO NOTHING",
                ident::quote(table)
            )
            .as_str(),
            &[&row_id],
        )
        .await?;
    Ok(())
}

/// Reset the identity generator of a table to start at 1.
///
/// The only consumer of the `{table}_id_seq` naming convention; engines
/// without it swap this function and `ident::sequence_name`.
pub async fn reset_identity<C>(client: &C, table: &str) -> Result<(), StoreError>
where
    C: GenericClient + Sync,
{
    client
        .execute(
            format!(
                "ALTER SEQUENCE {} RESTART WITH 1",
                ident::quote(&ident::sequence_name(table))
            )
            .as_str(),
            &[],
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_table_sql_single_column() {
        let sql = create_table_sql("users", &[ColumnSpec::new("name", "TEXT")], true);
        assert_eq!(
            sql,
            r#"CREATE TABLE IF NOT EXISTS "users" (id BIGSERIAL PRIMARY KEY, "name" TEXT)"#
        );
    }

    #[test]
    fn test_create_table_sql_multiple_columns() {
        let sql = create_table_sql(
            "users",
            &[
                ColumnSpec::new("name", "TEXT"),
                ColumnSpec::new("age", "INTEGER"),
            ],
            false,
        );
        assert_eq!(
            sql,
            r#"CREATE TABLE "users" (id BIGSERIAL PRIMARY KEY, "name" TEXT, "age" INTEGER)"#
        );
    }

    #[test]
    fn test_create_table_sql_id_only() {
        // The auto-provisioning shape: identity column and nothing else.
        let sql = create_table_sql("t", &[], true);
        assert_eq!(sql, r#"CREATE TABLE IF NOT EXISTS "t" (id BIGSERIAL PRIMARY KEY)"#);
    }

    #[test]
    fn test_create_table_sql_quotes_odd_names() {
        let sql = create_table_sql("my table", &[ColumnSpec::new("a b", "TEXT")], true);
        assert!(sql.contains(r#""my table""#));
        assert!(sql.contains(r#""a b" TEXT"#));
    }
}
