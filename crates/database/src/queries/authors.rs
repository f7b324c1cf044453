//! Author database operations

use audioshelf_core::{AppError, Author, AuthorId, BookId, Timestamp};
use sqlx::SqliteExecutor;

const AUTHOR_COLUMNS: &str = "id, first_name, last_name, description, slug, image, created_at";

/// Inserts a new author
pub async fn create_author<'e, E>(executor: E, author: &Author) -> Result<(), AppError>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO authors (id, first_name, last_name, description, slug, image, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(author.id.as_string())
    .bind(&author.first_name)
    .bind(&author.last_name)
    .bind(&author.description)
    .bind(&author.slug)
    .bind(&author.image)
    .bind(author.created_at.as_millis())
    .execute(executor)
    .await
    .map_err(|e| AppError::database("Failed to create author", e))?;

    Ok(())
}

/// Gets an author by ID
pub async fn get_author<'e, E>(executor: E, id: AuthorId) -> Result<Author, AppError>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(&format!("SELECT {} FROM authors WHERE id = ?", AUTHOR_COLUMNS))
        .bind(id.as_string())
        .fetch_optional(executor)
        .await
        .map_err(|e| AppError::database("Failed to fetch author", e))?
        .ok_or_else(|| AppError::not_found("Author", id))?;

    row_to_author(row)
}

/// Finds an author by slug
pub async fn find_author_by_slug<'e, E>(executor: E, slug: &str) -> Result<Option<Author>, AppError>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(&format!("SELECT {} FROM authors WHERE slug = ?", AUTHOR_COLUMNS))
        .bind(slug)
        .fetch_optional(executor)
        .await
        .map_err(|e| AppError::database("Failed to fetch author by slug", e))?
        .map(row_to_author)
        .transpose()
}

/// Updates an author's names, description, slug and image
pub async fn update_author<'e, E>(executor: E, author: &Author) -> Result<(), AppError>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE authors
        SET first_name = ?, last_name = ?, description = ?, slug = ?, image = ?
        WHERE id = ?
        "#,
    )
    .bind(&author.first_name)
    .bind(&author.last_name)
    .bind(&author.description)
    .bind(&author.slug)
    .bind(&author.image)
    .bind(author.id.as_string())
    .execute(executor)
    .await
    .map_err(|e| AppError::database("Failed to update author", e))?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Author", author.id));
    }
    Ok(())
}

/// Deletes an author; book associations are removed by cascade
pub async fn delete_author<'e, E>(executor: E, id: AuthorId) -> Result<(), AppError>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("DELETE FROM authors WHERE id = ?")
        .bind(id.as_string())
        .execute(executor)
        .await
        .map_err(|e| AppError::database("Failed to delete author", e))?;

    Ok(())
}

/// Lists all authors by last name, then first name
pub async fn list_authors<'e, E>(executor: E) -> Result<Vec<Author>, AppError>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query(&format!(
        "SELECT {} FROM authors ORDER BY last_name, first_name",
        AUTHOR_COLUMNS
    ))
    .fetch_all(executor)
    .await
    .map_err(|e| AppError::database("Failed to list authors", e))?;

    rows.into_iter().map(row_to_author).collect()
}

/// Gets the authors of a book, ordered by slug
pub async fn get_book_authors<'e, E>(executor: E, book_id: BookId) -> Result<Vec<Author>, AppError>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query(
        r#"
        SELECT a.id, a.first_name, a.last_name, a.description, a.slug, a.image, a.created_at
        FROM authors a
        JOIN book_authors ba ON ba.author_id = a.id
        WHERE ba.book_id = ?
        ORDER BY a.slug
        "#,
    )
    .bind(book_id.as_string())
    .fetch_all(executor)
    .await
    .map_err(|e| AppError::database("Failed to get book authors", e))?;

    rows.into_iter().map(row_to_author).collect()
}

pub(crate) fn row_to_author(row: sqlx::sqlite::SqliteRow) -> Result<Author, AppError> {
    use sqlx::Row;

    let id_str: String = row
        .try_get("id")
        .map_err(|e| AppError::database("Missing author ID", e))?;
    let created_at: i64 = row
        .try_get("created_at")
        .map_err(|e| AppError::database("Missing created_at", e))?;

    Ok(Author {
        id: AuthorId::from_string(&id_str)
            .map_err(|e| AppError::database("Invalid author ID", e))?,
        first_name: row
            .try_get("first_name")
            .map_err(|e| AppError::database("Missing first name", e))?,
        last_name: row
            .try_get("last_name")
            .map_err(|e| AppError::database("Missing last name", e))?,
        description: row
            .try_get("description")
            .map_err(|e| AppError::database("Missing description", e))?,
        slug: row
            .try_get("slug")
            .map_err(|e| AppError::database("Missing author slug", e))?,
        image: row
            .try_get("image")
            .map_err(|e| AppError::database("Invalid author image", e))?,
        created_at: Timestamp::from_millis(created_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::create_test_db;
    use audioshelf_core::Sluggable;

    fn author(first: &str, last: &str) -> Author {
        let mut author = Author::new(first, last);
        author.slug = author.compute_slug();
        author
    }

    #[tokio::test]
    async fn test_create_and_get_author() -> Result<(), AppError> {
        let pool = create_test_db().await?;
        let mut herbert = author("Frank", "Herbert");
        herbert.description = "Wrote Dune".to_string();

        create_author(&pool, &herbert).await?;

        let retrieved = get_author(&pool, herbert.id).await?;
        assert_eq!(retrieved, herbert);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_author_slug() -> Result<(), AppError> {
        let pool = create_test_db().await?;
        let mut herbert = author("Frank", "Herbert");
        create_author(&pool, &herbert).await?;

        herbert.first_name = "Franklin".to_string();
        herbert.slug = herbert.compute_slug();
        update_author(&pool, &herbert).await?;

        assert!(find_author_by_slug(&pool, "herbert_frank").await?.is_none());
        let found = find_author_by_slug(&pool, "herbert_franklin").await?;
        assert_eq!(found.map(|a| a.id), Some(herbert.id));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_authors_sorted() -> Result<(), AppError> {
        let pool = create_test_db().await?;
        create_author(&pool, &author("Terry", "Pratchett")).await?;
        create_author(&pool, &author("Neil", "Gaiman")).await?;

        let slugs: Vec<String> = list_authors(&pool).await?.into_iter().map(|a| a.slug).collect();
        assert_eq!(slugs, vec!["gaiman_neil", "pratchett_terry"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_get_missing_author() -> Result<(), AppError> {
        let pool = create_test_db().await?;
        let err = get_author(&pool, AuthorId::new()).await.unwrap_err();
        assert!(err.is_not_found());
        Ok(())
    }
}
