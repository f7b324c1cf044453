//! Audio file database operations

use audioshelf_core::{AppError, AudioFile, AudioFileId, BookId, Timestamp};
use sqlx::SqliteExecutor;

const AUDIO_COLUMNS: &str = "id, book_id, path, filename, size_bytes, uploaded_at";

/// Records an uploaded audio file
pub async fn create_audio_file<'e, E>(executor: E, file: &AudioFile) -> Result<(), AppError>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO audio_files (id, book_id, path, filename, size_bytes, uploaded_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(file.id.as_string())
    .bind(file.book_id.as_string())
    .bind(&file.path)
    .bind(&file.filename)
    .bind(file.size_bytes as i64)
    .bind(file.uploaded_at.as_millis())
    .execute(executor)
    .await
    .map_err(|e| AppError::database("Failed to create audio file", e))?;

    Ok(())
}

/// Gets an audio file by ID
pub async fn get_audio_file<'e, E>(executor: E, id: AudioFileId) -> Result<AudioFile, AppError>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(&format!("SELECT {} FROM audio_files WHERE id = ?", AUDIO_COLUMNS))
        .bind(id.as_string())
        .fetch_optional(executor)
        .await
        .map_err(|e| AppError::database("Failed to fetch audio file", e))?
        .ok_or_else(|| AppError::not_found("AudioFile", id))?;

    row_to_audio_file(row)
}

/// Finds the audio file a book holds under a given basename
pub async fn find_book_audio_file<'e, E>(
    executor: E,
    book_id: BookId,
    filename: &str,
) -> Result<Option<AudioFile>, AppError>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(&format!(
        "SELECT {} FROM audio_files WHERE book_id = ? AND filename = ?",
        AUDIO_COLUMNS
    ))
    .bind(book_id.as_string())
    .bind(filename)
    .fetch_optional(executor)
    .await
    .map_err(|e| AppError::database("Failed to find audio file", e))?
    .map(row_to_audio_file)
    .transpose()
}

/// Lists a book's audio files in upload order
pub async fn get_book_audio_files<'e, E>(
    executor: E,
    book_id: BookId,
) -> Result<Vec<AudioFile>, AppError>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query(&format!(
        "SELECT {} FROM audio_files WHERE book_id = ? ORDER BY uploaded_at, rowid",
        AUDIO_COLUMNS
    ))
    .bind(book_id.as_string())
    .fetch_all(executor)
    .await
    .map_err(|e| AppError::database("Failed to get book audio files", e))?;

    rows.into_iter().map(row_to_audio_file).collect()
}

/// Points an audio file record at a new relative path
pub async fn update_audio_file_path<'e, E>(
    executor: E,
    id: AudioFileId,
    path: &str,
) -> Result<(), AppError>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("UPDATE audio_files SET path = ? WHERE id = ?")
        .bind(path)
        .bind(id.as_string())
        .execute(executor)
        .await
        .map_err(|e| AppError::database("Failed to update audio file path", e))?;

    Ok(())
}

/// Refreshes size and upload time after a re-upload under the same name
pub async fn update_audio_file_upload<'e, E>(executor: E, file: &AudioFile) -> Result<(), AppError>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("UPDATE audio_files SET path = ?, size_bytes = ?, uploaded_at = ? WHERE id = ?")
        .bind(&file.path)
        .bind(file.size_bytes as i64)
        .bind(file.uploaded_at.as_millis())
        .bind(file.id.as_string())
        .execute(executor)
        .await
        .map_err(|e| AppError::database("Failed to update audio file", e))?;

    Ok(())
}

/// Deletes an audio file record
pub async fn delete_audio_file<'e, E>(executor: E, id: AudioFileId) -> Result<(), AppError>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("DELETE FROM audio_files WHERE id = ?")
        .bind(id.as_string())
        .execute(executor)
        .await
        .map_err(|e| AppError::database("Failed to delete audio file", e))?;

    Ok(())
}

/// Counts a book's audio files
pub async fn count_book_audio_files<'e, E>(executor: E, book_id: BookId) -> Result<i64, AppError>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_scalar("SELECT COUNT(*) FROM audio_files WHERE book_id = ?")
        .bind(book_id.as_string())
        .fetch_one(executor)
        .await
        .map_err(|e| AppError::database("Failed to count audio files", e))
}

pub(crate) fn row_to_audio_file(row: sqlx::sqlite::SqliteRow) -> Result<AudioFile, AppError> {
    use sqlx::Row;

    let id_str: String = row
        .try_get("id")
        .map_err(|e| AppError::database("Missing audio file ID", e))?;
    let book_id_str: String = row
        .try_get("book_id")
        .map_err(|e| AppError::database("Missing book ID", e))?;
    let size_bytes: i64 = row
        .try_get("size_bytes")
        .map_err(|e| AppError::database("Missing size", e))?;
    let uploaded_at: i64 = row
        .try_get("uploaded_at")
        .map_err(|e| AppError::database("Missing uploaded_at", e))?;

    Ok(AudioFile {
        id: AudioFileId::from_string(&id_str)
            .map_err(|e| AppError::database("Invalid audio file ID", e))?,
        book_id: BookId::from_string(&book_id_str)
            .map_err(|e| AppError::database("Invalid book ID", e))?,
        path: row
            .try_get("path")
            .map_err(|e| AppError::database("Missing path", e))?,
        filename: row
            .try_get("filename")
            .map_err(|e| AppError::database("Missing filename", e))?,
        size_bytes: size_bytes.max(0) as u64,
        uploaded_at: Timestamp::from_millis(uploaded_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::create_test_db;
    use crate::queries::books::{create_book, delete_book};
    use audioshelf_core::Book;

    async fn book_with_slug(pool: &crate::DbPool, slug: &str) -> Book {
        let mut book = Book::new("Dune");
        book.slug = slug.to_string();
        create_book(pool, &book).await.expect("Failed to create book");
        book
    }

    #[tokio::test]
    async fn test_create_and_list_audio_files() -> Result<(), AppError> {
        let pool = create_test_db().await?;
        let book = book_with_slug(&pool, "dune").await;

        let first = AudioFile::new(book.id, "audio/no_author/no_series/dune/01.mp3", "01.mp3", 10);
        let second = AudioFile::new(book.id, "audio/no_author/no_series/dune/02.mp3", "02.mp3", 20);
        create_audio_file(&pool, &first).await?;
        create_audio_file(&pool, &second).await?;

        let files = get_book_audio_files(&pool, book.id).await?;
        assert_eq!(files, vec![first.clone(), second]);
        assert_eq!(count_book_audio_files(&pool, book.id).await?, 2);

        let found = find_book_audio_file(&pool, book.id, "01.mp3").await?;
        assert_eq!(found, Some(first));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_audio_file_path() -> Result<(), AppError> {
        let pool = create_test_db().await?;
        let book = book_with_slug(&pool, "dune").await;
        let file = AudioFile::new(book.id, "audio/a/b/dune/01.mp3", "01.mp3", 10);
        create_audio_file(&pool, &file).await?;

        update_audio_file_path(&pool, file.id, "audio/c/d/dune/01.mp3").await?;

        assert_eq!(get_audio_file(&pool, file.id).await?.path, "audio/c/d/dune/01.mp3");
        Ok(())
    }

    #[tokio::test]
    async fn test_audio_files_removed_with_book() -> Result<(), AppError> {
        let pool = create_test_db().await?;
        let book = book_with_slug(&pool, "dune").await;
        let file = AudioFile::new(book.id, "audio/a/b/dune/01.mp3", "01.mp3", 10);
        create_audio_file(&pool, &file).await?;

        delete_book(&pool, book.id).await?;

        assert!(get_audio_file(&pool, file.id).await.unwrap_err().is_not_found());
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_audio_file() -> Result<(), AppError> {
        let pool = create_test_db().await?;
        let book = book_with_slug(&pool, "dune").await;
        let file = AudioFile::new(book.id, "audio/a/b/dune/01.mp3", "01.mp3", 10);
        create_audio_file(&pool, &file).await?;

        delete_audio_file(&pool, file.id).await?;

        assert_eq!(count_book_audio_files(&pool, book.id).await?, 0);
        Ok(())
    }
}
