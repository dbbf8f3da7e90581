//! Database module
//!
//! Connection checks and schema setup for the postgres document store.

use sqlx::PgPool;

/// Document tables the store expects
const REQUIRED_TABLES: &[&str] = &["rooms", "students", "applications", "identities"];

const SCHEMA_SQL: &str = include_str!("../migrations/001_documents.sql");

/// Verify database connectivity
pub async fn verify_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Check if required tables exist
pub async fn check_schema(pool: &PgPool) -> Result<bool, sqlx::Error> {
    for table in REQUIRED_TABLES {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
            )
            "#,
        )
        .bind(table)
        .fetch_one(pool)
        .await?;

        if !exists {
            tracing::error!("Required table '{}' does not exist", table);
            return Ok(false);
        }
    }

    Ok(true)
}

/// Create the document tables and their unique indexes if missing
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in schema_statements() {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::info!(tables = REQUIRED_TABLES.len(), "Document schema ensured");
    Ok(())
}

/// Individual statements of the schema file, comments stripped
fn schema_statements() -> Vec<&'static str> {
    SCHEMA_SQL
        .split(';')
        .map(|chunk| {
            let start = chunk
                .lines()
                .take_while(|line| {
                    let line = line.trim();
                    line.is_empty() || line.starts_with("--")
                })
                .map(|line| line.len() + 1)
                .sum::<usize>();
            chunk.get(start..).unwrap_or("").trim()
        })
        .filter(|statement| !statement.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements() {
        let statements = schema_statements();
        assert!(statements.iter().all(|s| !s.starts_with("--")));

        for table in REQUIRED_TABLES {
            let create = format!("CREATE TABLE IF NOT EXISTS {table}");
            assert!(statements.iter().any(|s| s.starts_with(&create)), "{table}");
        }
        assert!(statements
            .iter()
            .any(|s| s.contains("applications__pending_student_id") && s.contains("WHERE")));
    }
}
