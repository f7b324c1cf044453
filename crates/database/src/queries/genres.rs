//! Genre database operations

use audioshelf_core::{AppError, BookId, Genre, GenreId, Timestamp};
use sqlx::SqliteExecutor;

const GENRE_COLUMNS: &str = "id, name, slug, image, created_at";

/// Inserts a new genre
pub async fn create_genre<'e, E>(executor: E, genre: &Genre) -> Result<(), AppError>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("INSERT INTO genres (id, name, slug, image, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(genre.id.as_string())
        .bind(&genre.name)
        .bind(&genre.slug)
        .bind(&genre.image)
        .bind(genre.created_at.as_millis())
        .execute(executor)
        .await
        .map_err(|e| AppError::database("Failed to create genre", e))?;

    Ok(())
}

/// Gets a genre by ID
pub async fn get_genre<'e, E>(executor: E, id: GenreId) -> Result<Genre, AppError>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(&format!("SELECT {} FROM genres WHERE id = ?", GENRE_COLUMNS))
        .bind(id.as_string())
        .fetch_optional(executor)
        .await
        .map_err(|e| AppError::database("Failed to fetch genre", e))?
        .ok_or_else(|| AppError::not_found("Genre", id))?;

    row_to_genre(row)
}

/// Finds a genre by slug
pub async fn find_genre_by_slug<'e, E>(executor: E, slug: &str) -> Result<Option<Genre>, AppError>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(&format!("SELECT {} FROM genres WHERE slug = ?", GENRE_COLUMNS))
        .bind(slug)
        .fetch_optional(executor)
        .await
        .map_err(|e| AppError::database("Failed to fetch genre by slug", e))?
        .map(row_to_genre)
        .transpose()
}

/// Updates a genre's name, slug and image
pub async fn update_genre<'e, E>(executor: E, genre: &Genre) -> Result<(), AppError>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("UPDATE genres SET name = ?, slug = ?, image = ? WHERE id = ?")
        .bind(&genre.name)
        .bind(&genre.slug)
        .bind(&genre.image)
        .bind(genre.id.as_string())
        .execute(executor)
        .await
        .map_err(|e| AppError::database("Failed to update genre", e))?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Genre", genre.id));
    }
    Ok(())
}

/// Deletes a genre; its book associations go with it
pub async fn delete_genre<'e, E>(executor: E, id: GenreId) -> Result<(), AppError>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("DELETE FROM genres WHERE id = ?")
        .bind(id.as_string())
        .execute(executor)
        .await
        .map_err(|e| AppError::database("Failed to delete genre", e))?;

    Ok(())
}

/// Lists all genres by name
pub async fn list_genres<'e, E>(executor: E) -> Result<Vec<Genre>, AppError>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query(&format!("SELECT {} FROM genres ORDER BY name", GENRE_COLUMNS))
        .fetch_all(executor)
        .await
        .map_err(|e| AppError::database("Failed to list genres", e))?;

    rows.into_iter().map(row_to_genre).collect()
}

/// Gets the genres attached to a book
pub async fn get_book_genres<'e, E>(executor: E, book_id: BookId) -> Result<Vec<Genre>, AppError>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query(
        r#"
        SELECT g.id, g.name, g.slug, g.image, g.created_at
        FROM genres g
        JOIN book_genres bg ON bg.genre_id = g.id
        WHERE bg.book_id = ?
        ORDER BY g.name
        "#,
    )
    .bind(book_id.as_string())
    .fetch_all(executor)
    .await
    .map_err(|e| AppError::database("Failed to get book genres", e))?;

    rows.into_iter().map(row_to_genre).collect()
}

pub(crate) fn row_to_genre(row: sqlx::sqlite::SqliteRow) -> Result<Genre, AppError> {
    use sqlx::Row;

    let id_str: String = row
        .try_get("id")
        .map_err(|e| AppError::database("Missing genre ID", e))?;
    let created_at: i64 = row
        .try_get("created_at")
        .map_err(|e| AppError::database("Missing created_at", e))?;

    Ok(Genre {
        id: GenreId::from_string(&id_str).map_err(|e| AppError::database("Invalid genre ID", e))?,
        name: row
            .try_get("name")
            .map_err(|e| AppError::database("Missing genre name", e))?,
        slug: row
            .try_get("slug")
            .map_err(|e| AppError::database("Missing genre slug", e))?,
        image: row
            .try_get("image")
            .map_err(|e| AppError::database("Invalid genre image", e))?,
        created_at: Timestamp::from_millis(created_at),
    })
}
