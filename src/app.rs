//! Process bootstrap shared by the `bookstore-app` binary and the CLI.

use std::{future::Future, sync::Arc};

use anyhow::Context;
use axum::Router;
use bookstore_db::Database;
use bookstore_kernel::{settings::Settings, InitCtx, ModuleRegistry};

use crate::modules;

/// A connected database and an initialized, migrated set of modules.
pub struct App {
    pub settings: Settings,
    pub database: Database,
    pub registry: Arc<ModuleRegistry>,
}

impl App {
    /// Connect, register modules, run `init` and apply pending migrations.
    pub async fn bootstrap(settings: Settings) -> anyhow::Result<Self> {
        let database = Database::connect(&settings.database)
            .await
            .context("failed to open database")?;

        let mut registry = ModuleRegistry::new();
        modules::register_all(&mut registry, database.pool())?;

        let ctx = InitCtx {
            settings: &settings,
        };
        registry.init_all(&ctx).await?;

        let applied = database
            .migrate(&registry.collect_migrations())
            .await
            .context("failed to apply migrations")?;
        tracing::info!(applied, "migrations up to date");

        Ok(Self {
            settings,
            database,
            registry: Arc::new(registry),
        })
    }

    pub fn router(&self) -> Router {
        bookstore_http::build_router(Arc::clone(&self.registry), &self.settings.server)
    }

    /// Start modules, serve until `shutdown` resolves, then stop modules and
    /// close the pool. The cleanup also runs when a module fails to start.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let ctx = InitCtx {
            settings: &self.settings,
        };
        let served = match self.registry.start_all(&ctx).await {
            Ok(()) => bookstore_http::serve(self.router(), &self.settings.server, shutdown).await,
            Err(err) => Err(err),
        };

        let stopped = self.registry.stop_all().await;
        self.database.close().await;

        served.and(stopped)
    }
}

/// Run the HTTP service until ctrl-c or SIGTERM.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    tracing::info!(
        env = ?settings.environment,
        db = %settings.database.url,
        "bookstore bootstrap starting"
    );

    let app = App::bootstrap(settings).await?;
    tracing::info!("bookstore bootstrap complete");

    app.serve(bookstore_http::shutdown_signal()).await
}

/// Apply pending migrations and exit. Returns how many were applied.
pub async fn migrate(settings: Settings) -> anyhow::Result<usize> {
    let database = Database::connect(&settings.database)
        .await
        .context("failed to open database")?;

    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, database.pool())?;

    let applied = database.migrate(&registry.collect_migrations()).await;
    database.close().await;
    applied
}
