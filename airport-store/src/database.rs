use airport_core::{StoreError, StoreResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Pool, Postgres};
use std::time::Duration;
use tracing::info;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    pub fn store(&self) -> PgStore {
        PgStore::new(self.pool.clone())
    }
}

/// Postgres-backed implementation of every repository trait
#[derive(Clone)]
pub struct PgStore {
    pub(crate) pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs a cascading catalog delete, then drops orders the cascade left
    /// without tickets, in one transaction.
    pub(crate) async fn delete_cascading(&self, sql: &str, id: i64) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let deleted = sqlx::query(sql)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?
            .rows_affected();
        if deleted > 0 {
            sqlx::query(
                "DELETE FROM orders o WHERE NOT EXISTS (SELECT 1 FROM tickets t WHERE t.order_id = o.id)",
            )
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }
        tx.commit().await.map_err(db_error)?;
        Ok(deleted > 0)
    }
}

pub(crate) fn db_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::UniqueViolation { index: None };
        }
        if db_err.is_foreign_key_violation() {
            return StoreError::MissingReference(db_err.message().to_string());
        }
    }
    StoreError::Database(err.to_string())
}

/// `ILIKE` pattern for a case-insensitive substring match, with the
/// wildcard characters of the needle escaped.
pub(crate) fn like_pattern(needle: &Option<String>) -> Option<String> {
    needle.as_deref().map(|n| {
        let mut escaped = String::with_capacity(n.len() + 2);
        escaped.push('%');
        for c in n.chars() {
            if matches!(c, '\\' | '%' | '_') {
                escaped.push('\\');
            }
            escaped.push(c);
        }
        escaped.push('%');
        escaped
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(&None), None);
        assert_eq!(like_pattern(&Some("kyiv".to_string())).as_deref(), Some("%kyiv%"));
        assert_eq!(
            like_pattern(&Some("50%_off".to_string())).as_deref(),
            Some("%50\\%\\_off%")
        );
    }
}
