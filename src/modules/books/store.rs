//! Persistence gateway for books: one table, one row per book.

use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::SqlitePool;

use super::models::{Book, NewBook};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("book {0} not found")]
    NotFound(i64),

    #[error("book {id} has a corrupt price '{price}'")]
    CorruptPrice { id: i64, price: String },

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// CRUD access to stored books.
///
/// Each call is a single statement; concurrent writers to the same id are
/// last-write-wins.
#[async_trait]
pub trait BookStore: Send + Sync {
    /// All books, ordered by id.
    async fn list(&self) -> Result<Vec<Book>, StoreError>;

    async fn get(&self, id: i64) -> Result<Book, StoreError>;

    /// Insert and return the stored row with its fresh id.
    async fn create(&self, book: &NewBook) -> Result<Book, StoreError>;

    /// Replace all mutable fields of `id`.
    async fn update(&self, id: i64, book: &NewBook) -> Result<(), StoreError>;

    async fn delete(&self, id: i64) -> Result<(), StoreError>;

    /// Cheap round trip to the backing store.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Row shape of the `books` table. Prices are kept as decimal text.
#[derive(Debug, sqlx::FromRow)]
struct BookRow {
    id: i64,
    title: String,
    author: String,
    isbn: String,
    price: String,
    genre: String,
}

impl BookRow {
    fn into_book(self) -> Result<Book, StoreError> {
        let price = Decimal::from_str(&self.price).map_err(|_| StoreError::CorruptPrice {
            id: self.id,
            price: self.price.clone(),
        })?;
        Ok(Book {
            id: self.id,
            title: self.title,
            author: self.author,
            isbn: self.isbn,
            price,
            genre: self.genre,
        })
    }
}

const LIST_BOOKS: &str = "SELECT id, title, author, isbn, price, genre FROM books ORDER BY id";
const GET_BOOK: &str = "SELECT id, title, author, isbn, price, genre FROM books WHERE id = ?";

/// [`BookStore`] over a SQLite pool.
#[derive(Debug, Clone)]
pub struct SqliteBookStore {
    pool: SqlitePool,
}

impl SqliteBookStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookStore for SqliteBookStore {
    async fn list(&self) -> Result<Vec<Book>, StoreError> {
        let rows: Vec<BookRow> = sqlx::query_as(LIST_BOOKS)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(BookRow::into_book).collect()
    }

    async fn get(&self, id: i64) -> Result<Book, StoreError> {
        let row: Option<BookRow> = sqlx::query_as(GET_BOOK)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.ok_or(StoreError::NotFound(id))?.into_book()
    }

    async fn create(&self, book: &NewBook) -> Result<Book, StoreError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO books (title, author, isbn, price, genre) VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(book.title())
        .bind(book.author())
        .bind(book.isbn())
        .bind(book.price().to_string())
        .bind(book.genre())
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(book_id = id, "book inserted");
        Ok(book.clone().with_id(id))
    }

    async fn update(&self, id: i64, book: &NewBook) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE books SET title = ?, author = ?, isbn = ?, price = ?, genre = ? WHERE id = ?",
        )
        .bind(book.title())
        .bind(book.author())
        .bind(book.isbn())
        .bind(book.price().to_string())
        .bind(book.genre())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        tracing::debug!(book_id = id, "book updated");
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        tracing::debug!(book_id = id, "book deleted");
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
