use async_trait::async_trait;
use axum::Router;

use crate::settings::Settings;

/// Read-only view of the application handed to modules during `init` and `start`.
pub struct InitCtx<'a> {
    pub settings: &'a Settings,
}

/// A schema change contributed by a module.
///
/// `id` must be unique within its module and sort in application order
/// (`001_...`, `002_...`). `up` may hold several `;`-separated statements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub id: &'static str,
    pub up: &'static str,
}

/// A feature slice of the service: routes, schema and lifecycle hooks.
#[async_trait]
pub trait Module: Sync + Send {
    /// Unique name, also the last segment of the mount path.
    fn name(&self) -> &'static str;

    /// Path prefix the module's router is nested under.
    fn mount_path(&self) -> String {
        format!("/api/{}", self.name())
    }

    /// Called once at startup, before migrations run.
    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Routes relative to [`Module::mount_path`].
    fn routes(&self) -> Router {
        Router::new()
    }

    /// OpenAPI fragment (`paths` and `components.schemas`) relative to the mount path.
    fn openapi(&self) -> Option<serde_json::Value> {
        None
    }

    /// Migrations in the order they must be applied.
    fn migrations(&self) -> Vec<Migration> {
        vec![]
    }

    /// Called after migrations have been applied.
    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Liveness probe used by `/healthz`.
    async fn health(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called during shutdown, in reverse registration order.
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
