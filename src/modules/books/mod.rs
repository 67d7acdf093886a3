pub mod models;
pub mod routes;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use bookstore_kernel::{InitCtx, Migration, Module};
use serde_json::json;
use sqlx::SqlitePool;

use routes::SharedStore;
use store::{BookStore, SqliteBookStore};

/// Book catalog: schema, CRUD routes and the `books` table.
pub struct BooksModule {
    store: SharedStore,
}

impl BooksModule {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(Arc::clone(&self.store))
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi_fragment())
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_create_books",
            up: r#"
                CREATE TABLE books (
                    id     INTEGER PRIMARY KEY AUTOINCREMENT,
                    title  TEXT NOT NULL,
                    author TEXT NOT NULL,
                    isbn   TEXT NOT NULL,
                    price  TEXT NOT NULL,
                    genre  TEXT NOT NULL
                );
                "#,
        }]
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn health(&self) -> anyhow::Result<()> {
        self.store.ping().await?;
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Create the books module over a SQLite pool
pub fn create_module(pool: SqlitePool) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(Arc::new(SqliteBookStore::new(pool))))
}

fn error_response(description: &str) -> serde_json::Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/ErrorResponse" }
            }
        }
    })
}

fn book_body() -> serde_json::Value {
    json!({
        "required": true,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/BookInput" }
            }
        }
    })
}

fn id_param() -> serde_json::Value {
    json!({
        "name": "id",
        "in": "path",
        "required": true,
        "schema": { "type": "integer", "format": "int64" }
    })
}

fn openapi_fragment() -> serde_json::Value {
    let book_ref = json!({ "$ref": "#/components/schemas/Book" });

    json!({
        "paths": {
            "/": {
                "get": {
                    "summary": "List books",
                    "tags": ["Books"],
                    "responses": {
                        "200": {
                            "description": "All books, possibly empty",
                            "content": {
                                "application/json": {
                                    "schema": { "type": "array", "items": book_ref }
                                }
                            }
                        },
                        "500": error_response("Internal server error")
                    }
                },
                "post": {
                    "summary": "Create a book",
                    "tags": ["Books"],
                    "requestBody": book_body(),
                    "responses": {
                        "201": {
                            "description": "Created; `Location` points at the new book",
                            "headers": {
                                "Location": { "schema": { "type": "string" } }
                            },
                            "content": { "application/json": { "schema": book_ref } }
                        },
                        "400": error_response("Validation failed or body malformed"),
                        "500": error_response("Internal server error")
                    }
                }
            },
            "/{id}": {
                "get": {
                    "summary": "Get a book",
                    "tags": ["Books"],
                    "parameters": [id_param()],
                    "responses": {
                        "200": {
                            "description": "The book",
                            "content": { "application/json": { "schema": book_ref } }
                        },
                        "404": { "description": "No book with this id" }
                    }
                },
                "put": {
                    "summary": "Replace a book",
                    "tags": ["Books"],
                    "parameters": [id_param()],
                    "requestBody": book_body(),
                    "responses": {
                        "204": { "description": "Updated" },
                        "400": error_response("Body id differs from path id, or validation failed"),
                        "404": { "description": "No book with this id" }
                    }
                },
                "delete": {
                    "summary": "Delete a book",
                    "tags": ["Books"],
                    "parameters": [id_param()],
                    "responses": {
                        "204": { "description": "Deleted" },
                        "404": { "description": "No book with this id" }
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Book": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer", "format": "int64" },
                        "title": { "type": "string", "maxLength": 200 },
                        "author": { "type": "string", "maxLength": 150 },
                        "isbn": { "type": "string", "pattern": "^[0-9]{13}$" },
                        "price": { "type": "number", "exclusiveMinimum": 0 },
                        "genre": { "type": "string", "maxLength": 50 }
                    },
                    "required": ["id", "title", "author", "isbn", "price", "genre"]
                },
                "BookInput": {
                    "type": "object",
                    "properties": {
                        "id": {
                            "type": "integer",
                            "format": "int64",
                            "description": "Ignored on create; if nonzero on update it must equal the path id"
                        },
                        "title": { "type": "string", "maxLength": 200 },
                        "author": { "type": "string", "maxLength": 150 },
                        "isbn": { "type": "string", "pattern": "^[0-9]{13}$" },
                        "price": { "type": "number", "exclusiveMinimum": 0 },
                        "genre": { "type": "string", "maxLength": 50 }
                    },
                    "required": ["title", "author", "isbn", "price", "genre"]
                }
            }
        }
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_reflects_store_reachability() {
        let store = testing::store().await;
        let module = BooksModule::new(Arc::new(store));
        module.health().await.unwrap();
    }

    #[tokio::test]
    async fn health_fails_once_pool_is_closed() {
        let db = bookstore_db::Database::connect(
            &bookstore_kernel::settings::DatabaseSettings::in_memory(),
        )
        .await
        .unwrap();
        let module = create_module(db.pool().clone());
        db.close().await;
        assert!(module.health().await.is_err());
    }

    #[test]
    fn openapi_covers_every_operation() {
        let spec = openapi_fragment();
        for method in ["get", "post"] {
            assert!(spec["paths"]["/"][method].is_object(), "missing / {method}");
        }
        for method in ["get", "put", "delete"] {
            assert!(spec["paths"]["/{id}"][method].is_object(), "missing /{{id}} {method}");
        }
        assert!(spec["components"]["schemas"]["Book"].is_object());
    }
}
