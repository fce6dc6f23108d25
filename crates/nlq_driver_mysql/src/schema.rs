use mysql_async::Conn;
use mysql_async::prelude::Queryable;
use nlq_core::{AgentError, RelationalColumnInfo, RelationalForeignKeyInfo, SchemaPayload, TableSchema};

/// Enumerates base tables, columns, primary keys, and foreign keys for the
/// connection's current database via the standard information-schema
/// interface.
pub async fn introspect(conn: &mut Conn, database: &str) -> Result<SchemaPayload, AgentError> {
    let table_names: Vec<String> = conn
        .exec(
            "SELECT table_name FROM information_schema.tables \
            WHERE table_schema = ? AND table_type = 'BASE TABLE' ORDER BY table_name",
            (database,),
        )
        .await
        .map_err(|e| AgentError::SchemaBuildFailed(e.to_string()))?;

    let mut tables = Vec::with_capacity(table_names.len());
    for name in table_names {
        let columns = columns_for(conn, database, &name).await?;
        let primary_key = columns
            .iter()
            .zip(primary_key_flags(conn, database, &name).await?)
            .filter_map(|(c, is_pk)| is_pk.then(|| c.name.clone()))
            .collect();
        let foreign_keys = foreign_keys_for(conn, database, &name).await?;
        tables.push(TableSchema { qualified_table: name, columns, primary_key, foreign_keys });
    }

    Ok(SchemaPayload::Relational { tables })
}

async fn columns_for(conn: &mut Conn, database: &str, table: &str) -> Result<Vec<RelationalColumnInfo>, AgentError> {
    let rows: Vec<(String, String, String)> = conn
        .exec(
            "SELECT column_name, column_type, is_nullable \
            FROM information_schema.columns \
            WHERE table_schema = ? AND table_name = ? \
            ORDER BY ordinal_position",
            (database, table),
        )
        .await
        .map_err(|e| AgentError::SchemaBuildFailed(e.to_string()))?;

    Ok(rows
        .into_iter()
        .map(|(name, r#type, nullable)| RelationalColumnInfo { name, r#type, nullable: nullable == "YES" })
        .collect())
}

async fn primary_key_flags(conn: &mut Conn, database: &str, table: &str) -> Result<Vec<bool>, AgentError> {
    let keys: Vec<String> = conn
        .exec(
            "SELECT column_key FROM information_schema.columns \
            WHERE table_schema = ? AND table_name = ? ORDER BY ordinal_position",
            (database, table),
        )
        .await
        .map_err(|e| AgentError::SchemaBuildFailed(e.to_string()))?;

    Ok(keys.into_iter().map(|k| k == "PRI").collect())
}

async fn foreign_keys_for(conn: &mut Conn, database: &str, table: &str) -> Result<Vec<RelationalForeignKeyInfo>, AgentError> {
    let rows: Vec<(String, String, String, String)> = conn
        .exec(
            "SELECT kcu.column_name, kcu.referenced_table_name, kcu.referenced_column_name, kcu.constraint_name \
            FROM information_schema.key_column_usage kcu \
            WHERE kcu.table_schema = ? AND kcu.table_name = ? AND kcu.referenced_table_name IS NOT NULL",
            (database, table),
        )
        .await
        .map_err(|e| AgentError::SchemaBuildFailed(e.to_string()))?;

    Ok(rows
        .into_iter()
        .map(|(column, ref_table, ref_column, constraint_name)| RelationalForeignKeyInfo { column, ref_table, ref_column, constraint_name })
        .collect())
}
