//! Postgres collections
//!
//! One table per collection holding the serialized document as JSONB next
//! to its id and version. Unique keys are enforced by unique indexes named
//! `<table>__<key>` (see `migrations/001_documents.sql`); the key name is
//! recovered from the violated constraint. No multi-statement transactions
//! are used: every write touches exactly one row.

use std::marker::PhantomData;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Collection, Document, Filter, StoreError};

/// Collection backed by a JSONB document table
#[derive(Debug)]
pub struct PgCollection<T> {
    pool: PgPool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for PgCollection<T> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Document> PgCollection<T> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _marker: PhantomData,
        }
    }

    fn decode(data: serde_json::Value, version: i64) -> Result<T, StoreError> {
        let mut doc: T = serde_json::from_value(data)?;
        doc.set_version(version);
        Ok(doc)
    }

    /// Translate unique index violations into `UniqueViolation`
    fn map_write_error(err: sqlx::Error) -> StoreError {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                let key = db_err
                    .constraint()
                    .and_then(|name| name.split("__").nth(1))
                    .map(str::to_string)
                    .unwrap_or_else(|| "id".to_string());
                return StoreError::UniqueViolation {
                    collection: T::COLLECTION,
                    key,
                };
            }
        }
        StoreError::Database(err)
    }

    async fn select(&self, filter: &Filter, limit: Option<i64>) -> Result<Vec<T>, StoreError> {
        let mut sql = format!("SELECT data, version FROM {} WHERE TRUE", T::COLLECTION);
        for (idx, condition) in filter.conditions().iter().enumerate() {
            let path = idx * 2 + 1;
            let value = path + 1;
            if condition.ignore_case {
                sql.push_str(&format!(
                    " AND lower(data #>> ${path}::text[]) = lower(${value})"
                ));
            } else {
                sql.push_str(&format!(" AND data #>> ${path}::text[] = ${value}"));
            }
        }
        sql.push_str(" ORDER BY created_at ASC");
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut query = sqlx::query_as::<_, (serde_json::Value, i64)>(&sql);
        for condition in filter.conditions() {
            query = query.bind(condition.segments()).bind(condition.value.clone());
        }

        query
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|(data, version)| Self::decode(data, version))
            .collect()
    }
}

#[async_trait]
impl<T: Document> Collection<T> for PgCollection<T> {
    async fn get(&self, id: Uuid) -> Result<Option<T>, StoreError> {
        let row: Option<(serde_json::Value, i64)> = sqlx::query_as(&format!(
            "SELECT data, version FROM {} WHERE id = $1",
            T::COLLECTION
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(data, version)| Self::decode(data, version))
            .transpose()
    }

    async fn find_one(&self, filter: &Filter) -> Result<Option<T>, StoreError> {
        Ok(self.select(filter, Some(1)).await?.into_iter().next())
    }

    async fn find(&self, filter: &Filter) -> Result<Vec<T>, StoreError> {
        self.select(filter, None).await
    }

    async fn insert(&self, mut doc: T) -> Result<T, StoreError> {
        doc.set_version(1);
        let data = serde_json::to_value(&doc)?;

        sqlx::query(&format!(
            r#"
            INSERT INTO {} (id, version, data, created_at, updated_at)
            VALUES ($1, 1, $2, NOW(), NOW())
            "#,
            T::COLLECTION
        ))
        .bind(doc.id())
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(Self::map_write_error)?;

        Ok(doc)
    }

    async fn save(&self, mut doc: T) -> Result<T, StoreError> {
        let expected = doc.version();
        doc.set_version(expected + 1);
        let data = serde_json::to_value(&doc)?;

        let rows = sqlx::query(&format!(
            r#"
            UPDATE {}
            SET data = $1, version = version + 1, updated_at = NOW()
            WHERE id = $2 AND version = $3
            "#,
            T::COLLECTION
        ))
        .bind(data)
        .bind(doc.id())
        .bind(expected)
        .execute(&self.pool)
        .await
        .map_err(Self::map_write_error)?
        .rows_affected();

        if rows == 1 {
            return Ok(doc);
        }

        let actual: Option<i64> = sqlx::query_scalar(&format!(
            "SELECT version FROM {} WHERE id = $1",
            T::COLLECTION
        ))
        .bind(doc.id())
        .fetch_optional(&self.pool)
        .await?;

        Err(match actual {
            Some(actual) => StoreError::VersionConflict {
                collection: T::COLLECTION,
                id: doc.id(),
                expected,
                actual,
            },
            None => StoreError::NotFound {
                collection: T::COLLECTION,
                id: doc.id(),
            },
        })
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let rows = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", T::COLLECTION))
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }
}
