//! Catalog-wide counters

use audioshelf_core::AppError;
use sqlx::SqliteExecutor;

/// Totals across the whole catalog
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogStats {
    pub genres: i64,
    pub authors: i64,
    pub series: i64,
    pub books: i64,
    pub read_books: i64,
    pub audio_files: i64,
    pub audio_bytes: i64,
}

/// Gathers every counter in one round trip
pub async fn catalog_stats<'e, E>(executor: E) -> Result<CatalogStats, AppError>
where
    E: SqliteExecutor<'e>,
{
    let (genres, authors, series, books, read_books, audio_files, audio_bytes): (
        i64,
        i64,
        i64,
        i64,
        i64,
        i64,
        i64,
    ) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM genres),
            (SELECT COUNT(*) FROM authors),
            (SELECT COUNT(*) FROM series),
            (SELECT COUNT(*) FROM books),
            (SELECT COUNT(*) FROM books WHERE is_read = 1),
            (SELECT COUNT(*) FROM audio_files),
            (SELECT COALESCE(SUM(size_bytes), 0) FROM audio_files)
        "#,
    )
    .fetch_one(executor)
    .await
    .map_err(|e| AppError::database("Failed to gather catalog stats", e))?;

    Ok(CatalogStats {
        genres,
        authors,
        series,
        books,
        read_books,
        audio_files,
        audio_bytes,
    })
}
