//! Series database operations

use audioshelf_core::{AppError, Series, SeriesId, Timestamp};
use sqlx::SqliteExecutor;

const SERIES_COLUMNS: &str = "id, title, slug, image, created_at";

/// Inserts a new series
pub async fn create_series<'e, E>(executor: E, series: &Series) -> Result<(), AppError>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("INSERT INTO series (id, title, slug, image, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(series.id.as_string())
        .bind(&series.title)
        .bind(&series.slug)
        .bind(&series.image)
        .bind(series.created_at.as_millis())
        .execute(executor)
        .await
        .map_err(|e| AppError::database("Failed to create series", e))?;

    Ok(())
}

/// Gets a series by ID
pub async fn get_series<'e, E>(executor: E, id: SeriesId) -> Result<Series, AppError>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(&format!("SELECT {} FROM series WHERE id = ?", SERIES_COLUMNS))
        .bind(id.as_string())
        .fetch_optional(executor)
        .await
        .map_err(|e| AppError::database("Failed to fetch series", e))?
        .ok_or_else(|| AppError::not_found("Series", id))?;

    row_to_series(row)
}

/// Finds a series by slug
pub async fn find_series_by_slug<'e, E>(executor: E, slug: &str) -> Result<Option<Series>, AppError>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(&format!("SELECT {} FROM series WHERE slug = ?", SERIES_COLUMNS))
        .bind(slug)
        .fetch_optional(executor)
        .await
        .map_err(|e| AppError::database("Failed to fetch series by slug", e))?
        .map(row_to_series)
        .transpose()
}

/// Updates a series' title, slug and image
pub async fn update_series<'e, E>(executor: E, series: &Series) -> Result<(), AppError>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("UPDATE series SET title = ?, slug = ?, image = ? WHERE id = ?")
        .bind(&series.title)
        .bind(&series.slug)
        .bind(&series.image)
        .bind(series.id.as_string())
        .execute(executor)
        .await
        .map_err(|e| AppError::database("Failed to update series", e))?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Series", series.id));
    }
    Ok(())
}

/// Deletes a series; member books keep existing with no series
pub async fn delete_series<'e, E>(executor: E, id: SeriesId) -> Result<(), AppError>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("DELETE FROM series WHERE id = ?")
        .bind(id.as_string())
        .execute(executor)
        .await
        .map_err(|e| AppError::database("Failed to delete series", e))?;

    Ok(())
}

/// Lists all series by title
pub async fn list_series<'e, E>(executor: E) -> Result<Vec<Series>, AppError>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query(&format!("SELECT {} FROM series ORDER BY title", SERIES_COLUMNS))
        .fetch_all(executor)
        .await
        .map_err(|e| AppError::database("Failed to list series", e))?;

    rows.into_iter().map(row_to_series).collect()
}

pub(crate) fn row_to_series(row: sqlx::sqlite::SqliteRow) -> Result<Series, AppError> {
    use sqlx::Row;

    let id_str: String = row
        .try_get("id")
        .map_err(|e| AppError::database("Missing series ID", e))?;
    let created_at: i64 = row
        .try_get("created_at")
        .map_err(|e| AppError::database("Missing created_at", e))?;

    Ok(Series {
        id: SeriesId::from_string(&id_str)
            .map_err(|e| AppError::database("Invalid series ID", e))?,
        title: row
            .try_get("title")
            .map_err(|e| AppError::database("Missing series title", e))?,
        slug: row
            .try_get("slug")
            .map_err(|e| AppError::database("Missing series slug", e))?,
        image: row
            .try_get("image")
            .map_err(|e| AppError::database("Invalid series image", e))?,
        created_at: Timestamp::from_millis(created_at),
    })
}
