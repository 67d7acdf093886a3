//! Database handle for the service: a SQLite connection pool plus the
//! runner that applies module migrations exactly once.

use std::{str::FromStr, time::Duration};

use anyhow::Context;
use bookstore_kernel::settings::DatabaseSettings;
use bookstore_kernel::Migration;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

const LEDGER_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        module     TEXT NOT NULL,
        id         TEXT NOT NULL,
        applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (module, id)
    )
"#;

/// Shared pool handle. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open a pool for `settings.url`.
    ///
    /// In-memory databases live only as long as their connection, so they get
    /// exactly one connection that is never recycled.
    pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(&settings.url)
            .with_context(|| format!("invalid database url '{}'", settings.url))?
            .create_if_missing(settings.create_if_missing);

        let pool_options = if settings.is_in_memory() {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(settings.max_connections)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("failed to connect to '{}'", settings.url))?;

        tracing::info!(
            target: "bookstore-db",
            url = %settings.url,
            in_memory = settings.is_in_memory(),
            "database pool ready"
        );

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply every migration not yet recorded in the `_migrations` ledger.
    ///
    /// Each migration runs in its own transaction together with its ledger
    /// row. Returns how many were applied.
    pub async fn migrate(&self, migrations: &[(String, Migration)]) -> anyhow::Result<usize> {
        sqlx::raw_sql(LEDGER_DDL)
            .execute(&self.pool)
            .await
            .context("failed to create migration ledger")?;

        let mut applied = 0;
        for (module, migration) in migrations {
            let already: Option<i64> =
                sqlx::query_scalar("SELECT 1 FROM _migrations WHERE module = ? AND id = ?")
                    .bind(module)
                    .bind(migration.id)
                    .fetch_optional(&self.pool)
                    .await
                    .context("failed to read migration ledger")?;
            if already.is_some() {
                tracing::debug!(
                    target: "bookstore-db",
                    module = %module,
                    id = migration.id,
                    "migration already applied"
                );
                continue;
            }

            let mut tx = self.pool.begin().await?;
            sqlx::raw_sql(migration.up)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("migration {module}/{} failed", migration.id))?;
            sqlx::query("INSERT INTO _migrations (module, id) VALUES (?, ?)")
                .bind(module)
                .bind(migration.id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            tracing::info!(
                target: "bookstore-db",
                module = %module,
                id = migration.id,
                "migration applied"
            );
            applied += 1;
        }

        Ok(applied)
    }

    /// Round-trip a trivial query.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map(|_| ())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!(target: "bookstore-db", "database pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrations() -> Vec<(String, Migration)> {
        vec![
            (
                "books".to_string(),
                Migration {
                    id: "001_init",
                    up: "CREATE TABLE t (id INTEGER PRIMARY KEY); CREATE INDEX t_id ON t(id);",
                },
            ),
            (
                "books".to_string(),
                Migration {
                    id: "002_seed",
                    up: "INSERT INTO t (id) VALUES (1);",
                },
            ),
        ]
    }

    #[tokio::test]
    async fn in_memory_database_answers_ping() {
        let db = Database::connect(&DatabaseSettings::in_memory())
            .await
            .unwrap();
        db.ping().await.unwrap();
    }

    #[tokio::test]
    async fn migrations_apply_once() {
        let db = Database::connect(&DatabaseSettings::in_memory())
            .await
            .unwrap();

        assert_eq!(db.migrate(&migrations()).await.unwrap(), 2);
        assert_eq!(db.migrate(&migrations()).await.unwrap(), 0);

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM t")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn failed_migration_is_not_recorded() {
        let db = Database::connect(&DatabaseSettings::in_memory())
            .await
            .unwrap();
        let broken = vec![(
            "books".to_string(),
            Migration {
                id: "001_broken",
                up: "CREATE TABLE broken (id INTEGER); NOT VALID SQL;",
            },
        )];

        assert!(db.migrate(&broken).await.is_err());

        let recorded: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _migrations")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(recorded, 0);
    }

    #[tokio::test]
    async fn missing_file_without_create_is_reported() {
        let settings = DatabaseSettings {
            url: "sqlite://does-not-exist/books.db".to_string(),
            create_if_missing: false,
            ..DatabaseSettings::default()
        };
        assert!(Database::connect(&settings).await.is_err());
    }
}
