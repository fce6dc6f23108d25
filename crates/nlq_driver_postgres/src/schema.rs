use nlq_core::{AgentError, RelationalColumnInfo, RelationalForeignKeyInfo, SchemaPayload, TableSchema};
use tokio_postgres::Client;

/// Enumerates non-system base tables, columns, primary keys, and foreign
/// keys via the standard information-schema interface. Scoped to the `public` schema, the conventional default.
pub async fn introspect(client: &Client) -> Result<SchemaPayload, AgentError> {
    let table_rows = client
        .query(
            "SELECT table_name FROM information_schema.tables \
            WHERE table_schema = 'public' AND table_type = 'BASE TABLE' ORDER BY table_name",
            &[],
        )
        .await
        .map_err(|e| AgentError::SchemaBuildFailed(e.to_string()))?;

    let mut tables = Vec::with_capacity(table_rows.len());
    for row in table_rows {
        let name: String = row.get(0);
        let columns = columns_for(client, &name).await?;
        let primary_key = primary_key_for(client, &name).await?;
        let foreign_keys = foreign_keys_for(client, &name).await?;
        tables.push(TableSchema { qualified_table: name, columns, primary_key, foreign_keys });
    }

    Ok(SchemaPayload::Relational { tables })
}

async fn columns_for(client: &Client, table: &str) -> Result<Vec<RelationalColumnInfo>, AgentError> {
    let rows = client
        .query(
            "SELECT column_name, data_type, is_nullable = 'YES' \
            FROM information_schema.columns \
            WHERE table_schema = 'public' AND table_name = $1 \
            ORDER BY ordinal_position",
            &[&table],
        )
        .await
        .map_err(|e| AgentError::SchemaBuildFailed(e.to_string()))?;

    Ok(rows
        .iter()
        .map(|r| RelationalColumnInfo { name: r.get(0), r#type: r.get(1), nullable: r.get(2) })
        .collect())
}

async fn primary_key_for(client: &Client, table: &str) -> Result<Vec<String>, AgentError> {
    let rows = client
        .query(
            "SELECT kcu.column_name \
            FROM information_schema.table_constraints tc \
            JOIN information_schema.key_column_usage kcu \
            ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
            WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_schema = 'public' AND tc.table_name = $1 \
            ORDER BY kcu.ordinal_position",
            &[&table],
        )
        .await
        .map_err(|e| AgentError::SchemaBuildFailed(e.to_string()))?;

    Ok(rows.iter().map(|r| r.get(0)).collect())
}

async fn foreign_keys_for(client: &Client, table: &str) -> Result<Vec<RelationalForeignKeyInfo>, AgentError> {
    let rows = client
        .query(
            "SELECT kcu.column_name, ccu.table_name, ccu.column_name, tc.constraint_name \
            FROM information_schema.table_constraints tc \
            JOIN information_schema.key_column_usage kcu \
            ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
            JOIN information_schema.constraint_column_usage ccu \
            ON tc.constraint_name = ccu.constraint_name AND tc.table_schema = ccu.table_schema \
            WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_schema = 'public' AND tc.table_name = $1",
            &[&table],
        )
        .await
        .map_err(|e| AgentError::SchemaBuildFailed(e.to_string()))?;

    Ok(rows
        .iter()
        .map(|r| RelationalForeignKeyInfo { column: r.get(0), ref_table: r.get(1), ref_column: r.get(2), constraint_name: r.get(3) })
        .collect())
}
