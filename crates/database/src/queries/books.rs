//! Book database operations
//!
//! Single-statement functions accept any executor so they can run against the
//! pool or inside a caller's transaction. Association updates issue several
//! statements and take a connection directly.

use audioshelf_core::{AppError, AuthorId, Book, BookId, GenreId, SeriesId, Timestamp};
use sqlx::{SqliteConnection, SqliteExecutor};

const BOOK_COLUMNS: &str = "b.id, b.title, b.slug, b.series_id, b.is_read, b.image, b.created_at, b.updated_at";

/// Inserts a new book
pub async fn create_book<'e, E>(executor: E, book: &Book) -> Result<(), AppError>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO books (id, title, slug, series_id, is_read, image, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(book.id.as_string())
    .bind(&book.title)
    .bind(&book.slug)
    .bind(book.series_id.map(|id| id.as_string()))
    .bind(book.is_read as i64)
    .bind(&book.image)
    .bind(book.created_at.as_millis())
    .bind(book.updated_at.as_millis())
    .execute(executor)
    .await
    .map_err(|e| AppError::database("Failed to create book", e))?;

    Ok(())
}

/// Gets a book by ID
pub async fn get_book<'e, E>(executor: E, id: BookId) -> Result<Book, AppError>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(&format!("SELECT {} FROM books b WHERE b.id = ?", BOOK_COLUMNS))
        .bind(id.as_string())
        .fetch_optional(executor)
        .await
        .map_err(|e| AppError::database("Failed to fetch book", e))?
        .ok_or_else(|| AppError::not_found("Book", id))?;

    row_to_book(row)
}

/// Finds a book by slug
pub async fn find_book_by_slug<'e, E>(executor: E, slug: &str) -> Result<Option<Book>, AppError>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(&format!("SELECT {} FROM books b WHERE b.slug = ?", BOOK_COLUMNS))
        .bind(slug)
        .fetch_optional(executor)
        .await
        .map_err(|e| AppError::database("Failed to fetch book by slug", e))?
        .map(row_to_book)
        .transpose()
}

/// Updates every stored column of a book
pub async fn update_book<'e, E>(executor: E, book: &Book) -> Result<(), AppError>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE books
        SET title = ?, slug = ?, series_id = ?, is_read = ?, image = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&book.title)
    .bind(&book.slug)
    .bind(book.series_id.map(|id| id.as_string()))
    .bind(book.is_read as i64)
    .bind(&book.image)
    .bind(book.updated_at.as_millis())
    .bind(book.id.as_string())
    .execute(executor)
    .await
    .map_err(|e| AppError::database("Failed to update book", e))?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Book", book.id));
    }
    Ok(())
}

/// Deletes a book; its associations and audio file rows go with it
pub async fn delete_book<'e, E>(executor: E, id: BookId) -> Result<(), AppError>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("DELETE FROM books WHERE id = ?")
        .bind(id.as_string())
        .execute(executor)
        .await
        .map_err(|e| AppError::database("Failed to delete book", e))?;

    Ok(())
}

/// Lists all books by title
pub async fn list_books<'e, E>(executor: E) -> Result<Vec<Book>, AppError>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query(&format!(
        "SELECT {} FROM books b ORDER BY b.title, b.slug",
        BOOK_COLUMNS
    ))
    .fetch_all(executor)
    .await
    .map_err(|e| AppError::database("Failed to list books", e))?;

    rows.into_iter().map(row_to_book).collect()
}

/// Gets the books written by an author
pub async fn get_books_by_author<'e, E>(
    executor: E,
    author_id: AuthorId,
) -> Result<Vec<Book>, AppError>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query(&format!(
        r#"
        SELECT {} FROM books b
        JOIN book_authors ba ON ba.book_id = b.id
        WHERE ba.author_id = ?
        ORDER BY b.title, b.slug
        "#,
        BOOK_COLUMNS
    ))
    .bind(author_id.as_string())
    .fetch_all(executor)
    .await
    .map_err(|e| AppError::database("Failed to get books by author", e))?;

    rows.into_iter().map(row_to_book).collect()
}

/// Gets the books in a series
pub async fn get_books_by_series<'e, E>(
    executor: E,
    series_id: SeriesId,
) -> Result<Vec<Book>, AppError>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query(&format!(
        "SELECT {} FROM books b WHERE b.series_id = ? ORDER BY b.title, b.slug",
        BOOK_COLUMNS
    ))
    .bind(series_id.as_string())
    .fetch_all(executor)
    .await
    .map_err(|e| AppError::database("Failed to get books by series", e))?;

    rows.into_iter().map(row_to_book).collect()
}

/// Gets the books tagged with a genre
pub async fn get_books_by_genre<'e, E>(executor: E, genre_id: GenreId) -> Result<Vec<Book>, AppError>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query(&format!(
        r#"
        SELECT {} FROM books b
        JOIN book_genres bg ON bg.book_id = b.id
        WHERE bg.genre_id = ?
        ORDER BY b.title, b.slug
        "#,
        BOOK_COLUMNS
    ))
    .bind(genre_id.as_string())
    .fetch_all(executor)
    .await
    .map_err(|e| AppError::database("Failed to get books by genre", e))?;

    rows.into_iter().map(row_to_book).collect()
}

/// Case-insensitive substring search over titles
pub async fn search_books<'e, E>(executor: E, query: &str, limit: i64) -> Result<Vec<Book>, AppError>
where
    E: SqliteExecutor<'e>,
{
    let pattern = format!("%{}%", escape_like(query.trim()));

    let rows = sqlx::query(&format!(
        r#"
        SELECT {} FROM books b
        WHERE b.title LIKE ? ESCAPE '\'
        ORDER BY b.title, b.slug
        LIMIT ?
        "#,
        BOOK_COLUMNS
    ))
    .bind(pattern)
    .bind(limit)
    .fetch_all(executor)
    .await
    .map_err(|e| AppError::database("Failed to search books", e))?;

    rows.into_iter().map(row_to_book).collect()
}

/// Sets only the read flag
pub async fn set_book_read<'e, E>(executor: E, id: BookId, is_read: bool) -> Result<(), AppError>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("UPDATE books SET is_read = ?, updated_at = ? WHERE id = ?")
        .bind(is_read as i64)
        .bind(Timestamp::now().as_millis())
        .bind(id.as_string())
        .execute(executor)
        .await
        .map_err(|e| AppError::database("Failed to update read status", e))?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Book", id));
    }
    Ok(())
}

/// Replaces the author set of a book
pub async fn set_book_authors(
    conn: &mut SqliteConnection,
    book_id: BookId,
    author_ids: &[AuthorId],
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM book_authors WHERE book_id = ?")
        .bind(book_id.as_string())
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::database("Failed to clear book authors", e))?;

    for author_id in author_ids {
        sqlx::query("INSERT OR IGNORE INTO book_authors (book_id, author_id) VALUES (?, ?)")
            .bind(book_id.as_string())
            .bind(author_id.as_string())
            .execute(&mut *conn)
            .await
            .map_err(|e| AppError::database("Failed to add book author", e))?;
    }

    Ok(())
}

/// Replaces the genre set of a book
pub async fn set_book_genres(
    conn: &mut SqliteConnection,
    book_id: BookId,
    genre_ids: &[GenreId],
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM book_genres WHERE book_id = ?")
        .bind(book_id.as_string())
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::database("Failed to clear book genres", e))?;

    for genre_id in genre_ids {
        sqlx::query("INSERT OR IGNORE INTO book_genres (book_id, genre_id) VALUES (?, ?)")
            .bind(book_id.as_string())
            .bind(genre_id.as_string())
            .execute(&mut *conn)
            .await
            .map_err(|e| AppError::database("Failed to add book genre", e))?;
    }

    Ok(())
}

fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub(crate) fn row_to_book(row: sqlx::sqlite::SqliteRow) -> Result<Book, AppError> {
    use sqlx::Row;

    let id_str: String = row
        .try_get("id")
        .map_err(|e| AppError::database("Missing book ID", e))?;
    let id = BookId::from_string(&id_str).map_err(|e| AppError::database("Invalid book ID", e))?;

    let series_id: Option<String> = row
        .try_get("series_id")
        .map_err(|e| AppError::database("Invalid series ID column", e))?;
    let series_id = series_id
        .map(|s| SeriesId::from_string(&s))
        .transpose()
        .map_err(|e| AppError::database("Invalid series ID", e))?;

    let is_read: i64 = row
        .try_get("is_read")
        .map_err(|e| AppError::database("Missing is_read", e))?;
    let created_at: i64 = row
        .try_get("created_at")
        .map_err(|e| AppError::database("Missing created_at", e))?;
    let updated_at: i64 = row
        .try_get("updated_at")
        .map_err(|e| AppError::database("Missing updated_at", e))?;

    Ok(Book {
        id,
        title: row
            .try_get("title")
            .map_err(|e| AppError::database("Missing title", e))?,
        slug: row
            .try_get("slug")
            .map_err(|e| AppError::database("Missing book slug", e))?,
        series_id,
        is_read: is_read != 0,
        image: row
            .try_get("image")
            .map_err(|e| AppError::database("Invalid book image", e))?,
        created_at: Timestamp::from_millis(created_at),
        updated_at: Timestamp::from_millis(updated_at),
    })
}
