//! HTTP handlers for `/api/books`.

use std::sync::Arc;

use axum::{
    extract::{OriginalUri, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use bookstore_http::{error::AppError, extract::Json};

use super::models::{Book, BookPayload, ValidationError};
use super::store::{BookStore, StoreError};

pub type SharedStore = Arc<dyn BookStore>;

/// Routes relative to the module mount path.
pub fn router(store: SharedStore) -> Router {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route(
            "/{id}",
            get(get_book).put(update_book).delete(delete_book),
        )
        .with_state(store)
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => AppError::not_found(format!("book {id} not found")),
            other => AppError::Internal(other.into()),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        let details = err
            .violations
            .iter()
            .map(|v| serde_json::json!({ "field": v.field, "error": v.error }))
            .collect();
        AppError::validation(details, "One or more validation errors occurred.")
    }
}

async fn list_books(State(store): State<SharedStore>) -> Result<Json<Vec<Book>>, AppError> {
    Ok(Json(store.list().await?))
}

async fn get_book(
    State(store): State<SharedStore>,
    Path(id): Path<i64>,
) -> Result<Json<Book>, AppError> {
    Ok(Json(store.get(id).await?))
}

/// 201 with the stored book and a `Location` pointing at it.
async fn create_book(
    State(store): State<SharedStore>,
    OriginalUri(uri): OriginalUri,
    Json(payload): Json<BookPayload>,
) -> Result<impl IntoResponse, AppError> {
    let record = payload.into_record()?;
    let book = store.create(&record).await?;

    let location = format!("{}/{}", uri.path().trim_end_matches('/'), book.id);
    tracing::info!(book_id = book.id, %location, "book created");

    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(book)))
}

/// The id check runs before validation: a mismatched body is rejected even
/// if it is otherwise invalid.
async fn update_book(
    State(store): State<SharedStore>,
    Path(id): Path<i64>,
    Json(payload): Json<BookPayload>,
) -> Result<StatusCode, AppError> {
    if payload.id != 0 && payload.id != id {
        return Err(AppError::bad_request(format!(
            "body id {} does not match path id {id}",
            payload.id
        )));
    }

    let record = payload.into_record()?;
    store.update(id, &record).await?;

    tracing::info!(book_id = id, "book updated");
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_book(
    State(store): State<SharedStore>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    store.delete(id).await?;

    tracing::info!(book_id = id, "book deleted");
    Ok(StatusCode::NO_CONTENT)
}
