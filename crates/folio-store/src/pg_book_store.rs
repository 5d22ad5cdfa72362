//! `PostgreSQL` implementation of `BookStore`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use folio_core::book::{Book, BookFilter, NewBook, Page, PageRequest, SortDirection};
use folio_core::error::DomainError;
use folio_core::repository::{BookStore, BookTransaction};
use folio_core::transaction::Transaction;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use crate::db_error;

/// Column list for `books` queries.
const COLUMNS: &str = "id, title, author, publication_year, description, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct BookRow {
    id: Uuid,
    title: String,
    author: Option<String>,
    publication_year: Option<i32>,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BookRow> for Book {
    fn from(row: BookRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            author: row.author,
            publication_year: row.publication_year,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Escapes `LIKE` metacharacters so user input matches literally.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &BookFilter) {
    query.push(" WHERE TRUE");
    if let Some(title) = &filter.title {
        query.push(" AND title ILIKE ").push_bind(like_pattern(title));
    }
    if let Some(author) = &filter.author {
        query.push(" AND author ILIKE ").push_bind(like_pattern(author));
    }
    if let Some(year) = filter.publication_year {
        query.push(" AND publication_year = ").push_bind(year);
    }
}

/// PostgreSQL-backed book store.
#[derive(Debug, Clone)]
pub struct PgBookStore {
    pool: PgPool,
}

impl PgBookStore {
    /// Creates a new `PgBookStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookStore for PgBookStore {
    async fn begin(&self) -> Result<Box<dyn BookTransaction>, DomainError> {
        let tx = self.pool.begin().await.map_err(db_error)?;
        Ok(Box::new(PgBookTransaction { tx }))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Book>, DomainError> {
        let query = format!("SELECT {COLUMNS} FROM books WHERE id = $1");
        let row = sqlx::query_as::<_, BookRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(row.map(Book::from))
    }

    async fn find_page(
        &self,
        filter: &BookFilter,
        request: &PageRequest,
    ) -> Result<Page<Book>, DomainError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM books");
        push_filters(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM books"));
        push_filters(&mut select, filter);
        select.push(" ORDER BY ");
        for order in &request.sort {
            select.push(order.field.column());
            select.push(match order.direction {
                SortDirection::Asc => " ASC, ",
                SortDirection::Desc => " DESC, ",
            });
        }
        select
            .push("id LIMIT ")
            .push_bind(i64::from(request.size))
            .push(" OFFSET ")
            .push_bind(i64::try_from(request.offset()).unwrap_or(i64::MAX));

        let rows: Vec<BookRow> = select
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        let total = u64::try_from(total).unwrap_or_default();
        Ok(Page::new(
            rows.into_iter().map(Book::from).collect(),
            total,
            request,
        ))
    }
}

/// One `PostgreSQL` transaction over the `books` table.
///
/// Dropping it without committing rolls it back.
pub struct PgBookTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Transaction for PgBookTransaction {
    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let Self { tx } = *self;
        tx.commit().await.map_err(db_error)
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        let Self { tx } = *self;
        tx.rollback().await.map_err(db_error)
    }
}

#[async_trait]
impl BookTransaction for PgBookTransaction {
    async fn insert(&mut self, book: &NewBook, now: DateTime<Utc>) -> Result<Book, DomainError> {
        let query = format!(
            "INSERT INTO books \
                (id, title, author, publication_year, description, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $6) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, BookRow>(&query)
            .bind(Uuid::now_v7())
            .bind(&book.title)
            .bind(&book.author)
            .bind(book.publication_year)
            .bind(&book.description)
            .bind(now)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_error)?;
        debug!(book_id = %row.id, "inserted book");
        Ok(row.into())
    }

    async fn find_many_for_update(&mut self, ids: &[Uuid]) -> Result<Vec<Book>, DomainError> {
        let query = format!("SELECT {COLUMNS} FROM books WHERE id = ANY($1) ORDER BY id FOR UPDATE");
        let rows = sqlx::query_as::<_, BookRow>(&query)
            .bind(ids)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(Book::from).collect())
    }

    async fn find_for_update(&mut self, id: Uuid) -> Result<Option<Book>, DomainError> {
        let query = format!("SELECT {COLUMNS} FROM books WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, BookRow>(&query)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error)?;
        Ok(row.map(Book::from))
    }

    async fn save(&mut self, book: &Book) -> Result<(), DomainError> {
        sqlx::query(
            "UPDATE books \
             SET title = $2, author = $3, publication_year = $4, description = $5, updated_at = $6 \
             WHERE id = $1",
        )
        .bind(book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.publication_year)
        .bind(&book.description)
        .bind(book.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn delete(&mut self, id: Uuid) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("100%_off\\"), "%100\\%\\_off\\\\%");
    }

    #[test]
    fn test_like_pattern_wraps_plain_text() {
        assert_eq!(like_pattern("dune"), "%dune%");
    }
}
