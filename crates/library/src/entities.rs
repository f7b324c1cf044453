//! Genre, author and series lifecycle
//!
//! Slugs are recomputed on every save. Author and series slugs are part of
//! every related book's slug, so changing or deleting one rewrites those books
//! and moves their audio files in the same transaction.

use crate::cascade::CascadeReport;
use crate::error::{LibraryError, Result};
use crate::manager::{LibraryManager, Updated};
use audioshelf_core::{
    AppError, Author, AuthorId, BookId, Genre, GenreId, Series, SeriesId, Sluggable, Validator,
};
use audioshelf_database::queries::{authors, books, genres, series};
use std::io::Read;

/// Fields to change on an author; `None` keeps the current value
#[derive(Debug, Clone, Default)]
pub struct AuthorChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub description: Option<String>,
}

impl AuthorChanges {
    pub fn rename(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: Some(first_name.into()),
            last_name: Some(last_name.into()),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn apply(self, author: &mut Author) {
        if let Some(first) = self.first_name {
            author.first_name = first.trim().to_string();
        }
        if let Some(last) = self.last_name {
            author.last_name = last.trim().to_string();
        }
        if let Some(description) = self.description {
            author.description = description;
        }
    }
}

/// Recomputes the slug, refusing an empty one
fn derive_slug<T: Sluggable + Validator>(entity: &T) -> Result<String> {
    let slug = entity.compute_slug();
    if slug.is_empty() {
        return Err(LibraryError::EmptyIdentity { entity: T::ENTITY });
    }
    entity
        .validate()
        .map_err(|errors| AppError::invalid_argument(T::ENTITY, errors.join("; ")))?;
    Ok(slug)
}

fn collision<T: Sluggable>(slug: &str) -> LibraryError {
    LibraryError::SlugCollision {
        entity: T::ENTITY,
        slug: slug.to_string(),
    }
}

impl LibraryManager {
    // Genres

    pub async fn create_genre(&self, name: &str) -> Result<Genre> {
        let mut genre = Genre::new(name.trim());
        genre.slug = derive_slug(&genre)?;
        if genres::find_genre_by_slug(&self.pool, &genre.slug).await?.is_some() {
            return Err(collision::<Genre>(&genre.slug));
        }
        genres::create_genre(&self.pool, &genre).await?;

        log::info!("Created genre {}", genre.slug);
        Ok(genre)
    }

    pub async fn rename_genre(&self, id: GenreId, name: &str) -> Result<Genre> {
        let mut genre = genres::get_genre(&self.pool, id).await?;
        let previous_slug = genre.slug.clone();
        genre.name = name.trim().to_string();
        genre.slug = derive_slug(&genre)?;

        if let Some(other) = genres::find_genre_by_slug(&self.pool, &genre.slug).await? {
            if other.id != id {
                return Err(collision::<Genre>(&genre.slug));
            }
        }
        genres::update_genre(&self.pool, &genre).await?;

        if genre.slug != previous_slug {
            if let Some(moved) = self
                .follow_image(Genre::IMAGE_CATEGORY, &genre.slug, genre.image.as_deref())
                .await
            {
                genre.image = Some(moved);
                genres::update_genre(&self.pool, &genre).await?;
            }
        }
        Ok(genre)
    }

    pub async fn set_genre_image(
        &self,
        id: GenreId,
        filename: &str,
        reader: Box<dyn Read + Send>,
    ) -> Result<Genre> {
        let mut genre = genres::get_genre(&self.pool, id).await?;
        let path = self
            .store_image(
                Genre::IMAGE_CATEGORY,
                &genre.slug,
                genre.image.as_deref(),
                filename,
                reader,
            )
            .await?;
        genre.image = Some(path);
        genres::update_genre(&self.pool, &genre).await?;
        Ok(genre)
    }

    /// Deletes a genre and its image; books only lose the association
    pub async fn delete_genre(&self, id: GenreId) -> Result<()> {
        let genre = genres::get_genre(&self.pool, id).await?;
        genres::delete_genre(&self.pool, id).await?;
        if let Some(image) = &genre.image {
            let _ = self.remove_blob(image).await;
        }
        log::info!("Deleted genre {}", genre.slug);
        Ok(())
    }

    pub async fn genre_by_slug(&self, slug: &str) -> Result<Genre> {
        genres::find_genre_by_slug(&self.pool, slug)
            .await?
            .ok_or_else(|| LibraryError::not_found("Genre", slug))
    }

    pub async fn list_genres(&self) -> Result<Vec<Genre>> {
        Ok(genres::list_genres(&self.pool).await?)
    }

    // Authors

    pub async fn create_author(
        &self,
        first_name: &str,
        last_name: &str,
        description: &str,
    ) -> Result<Author> {
        let mut author = Author::new(first_name.trim(), last_name.trim());
        author.description = description.to_string();
        author.slug = derive_slug(&author)?;
        if authors::find_author_by_slug(&self.pool, &author.slug).await?.is_some() {
            return Err(collision::<Author>(&author.slug));
        }
        authors::create_author(&self.pool, &author).await?;

        log::info!("Created author {}", author.slug);
        Ok(author)
    }

    /// Updates an author and re-slugs every book they wrote
    pub async fn update_author(&self, id: AuthorId, changes: AuthorChanges) -> Result<Updated<Author>> {
        let affected = self.author_book_ids(id).await?;
        let _guards = self.locks.lock_many(&affected).await;

        let mut tx = self.begin().await?;
        let mut author = authors::get_author(&mut *tx, id).await?;
        let previous_slug = author.slug.clone();
        changes.apply(&mut author);
        author.slug = derive_slug(&author)?;

        if let Some(other) = authors::find_author_by_slug(&mut *tx, &author.slug).await? {
            if other.id != id {
                return Err(collision::<Author>(&author.slug));
            }
        }

        let snapshots = Self::snapshot(&mut tx, &affected).await?;
        authors::update_author(&mut *tx, &author).await?;
        let rewritten = self.rewrite_books(&mut tx, snapshots).await?;
        let (cascade, _) = self.commit_rewrites(tx, rewritten).await?;

        if author.slug != previous_slug {
            log::info!("Author slug {} -> {}", previous_slug, author.slug);
            if let Some(moved) = self
                .follow_image(Author::IMAGE_CATEGORY, &author.slug, author.image.as_deref())
                .await
            {
                author.image = Some(moved);
                authors::update_author(&self.pool, &author).await?;
            }
        }
        Ok(Updated {
            entity: author,
            cascade,
        })
    }

    pub async fn set_author_image(
        &self,
        id: AuthorId,
        filename: &str,
        reader: Box<dyn Read + Send>,
    ) -> Result<Author> {
        let mut author = authors::get_author(&self.pool, id).await?;
        let path = self
            .store_image(
                Author::IMAGE_CATEGORY,
                &author.slug,
                author.image.as_deref(),
                filename,
                reader,
            )
            .await?;
        author.image = Some(path);
        authors::update_author(&self.pool, &author).await?;
        Ok(author)
    }

    /// Deletes an author; their books are re-slugged without them
    pub async fn delete_author(&self, id: AuthorId) -> Result<CascadeReport> {
        let affected = self.author_book_ids(id).await?;
        let _guards = self.locks.lock_many(&affected).await;

        let mut tx = self.begin().await?;
        let author = authors::get_author(&mut *tx, id).await?;
        let snapshots = Self::snapshot(&mut tx, &affected).await?;
        authors::delete_author(&mut *tx, id).await?;
        let rewritten = self.rewrite_books(&mut tx, snapshots).await?;
        let (report, _) = self.commit_rewrites(tx, rewritten).await?;

        if let Some(image) = &author.image {
            let _ = self.remove_blob(image).await;
        }
        log::info!("Deleted author {}", author.slug);
        Ok(report)
    }

    pub async fn author_by_slug(&self, slug: &str) -> Result<Author> {
        authors::find_author_by_slug(&self.pool, slug)
            .await?
            .ok_or_else(|| LibraryError::not_found("Author", slug))
    }

    pub async fn list_authors(&self) -> Result<Vec<Author>> {
        Ok(authors::list_authors(&self.pool).await?)
    }

    async fn author_book_ids(&self, id: AuthorId) -> Result<Vec<BookId>> {
        let related = books::get_books_by_author(&self.pool, id).await?;
        Ok(related.into_iter().map(|b| b.id).collect())
    }

    // Series

    pub async fn create_series(&self, title: &str) -> Result<Series> {
        let mut entry = Series::new(title.trim());
        entry.slug = derive_slug(&entry)?;
        if series::find_series_by_slug(&self.pool, &entry.slug).await?.is_some() {
            return Err(collision::<Series>(&entry.slug));
        }
        series::create_series(&self.pool, &entry).await?;

        log::info!("Created series {}", entry.slug);
        Ok(entry)
    }

    /// Renames a series and moves the files of every book in it
    pub async fn rename_series(&self, id: SeriesId, title: &str) -> Result<Updated<Series>> {
        let affected = self.series_book_ids(id).await?;
        let _guards = self.locks.lock_many(&affected).await;

        let mut tx = self.begin().await?;
        let mut entry = series::get_series(&mut *tx, id).await?;
        let previous_slug = entry.slug.clone();
        entry.title = title.trim().to_string();
        entry.slug = derive_slug(&entry)?;

        if let Some(other) = series::find_series_by_slug(&mut *tx, &entry.slug).await? {
            if other.id != id {
                return Err(collision::<Series>(&entry.slug));
            }
        }

        let snapshots = Self::snapshot(&mut tx, &affected).await?;
        series::update_series(&mut *tx, &entry).await?;
        let rewritten = self.rewrite_books(&mut tx, snapshots).await?;
        let (cascade, _) = self.commit_rewrites(tx, rewritten).await?;

        if entry.slug != previous_slug {
            log::info!("Series slug {} -> {}", previous_slug, entry.slug);
            if let Some(moved) = self
                .follow_image(Series::IMAGE_CATEGORY, &entry.slug, entry.image.as_deref())
                .await
            {
                entry.image = Some(moved);
                series::update_series(&self.pool, &entry).await?;
            }
        }
        Ok(Updated {
            entity: entry,
            cascade,
        })
    }

    pub async fn set_series_image(
        &self,
        id: SeriesId,
        filename: &str,
        reader: Box<dyn Read + Send>,
    ) -> Result<Series> {
        let mut entry = series::get_series(&self.pool, id).await?;
        let path = self
            .store_image(
                Series::IMAGE_CATEGORY,
                &entry.slug,
                entry.image.as_deref(),
                filename,
                reader,
            )
            .await?;
        entry.image = Some(path);
        series::update_series(&self.pool, &entry).await?;
        Ok(entry)
    }

    /// Deletes a series; its books fall back to `no_series`
    pub async fn delete_series(&self, id: SeriesId) -> Result<CascadeReport> {
        let affected = self.series_book_ids(id).await?;
        let _guards = self.locks.lock_many(&affected).await;

        let mut tx = self.begin().await?;
        let entry = series::get_series(&mut *tx, id).await?;
        let snapshots = Self::snapshot(&mut tx, &affected).await?;
        series::delete_series(&mut *tx, id).await?;
        let rewritten = self.rewrite_books(&mut tx, snapshots).await?;
        let (report, _) = self.commit_rewrites(tx, rewritten).await?;

        if let Some(image) = &entry.image {
            let _ = self.remove_blob(image).await;
        }
        log::info!("Deleted series {}", entry.slug);
        Ok(report)
    }

    pub async fn series_by_slug(&self, slug: &str) -> Result<Series> {
        series::find_series_by_slug(&self.pool, slug)
            .await?
            .ok_or_else(|| LibraryError::not_found("Series", slug))
    }

    pub async fn list_series(&self) -> Result<Vec<Series>> {
        Ok(series::list_series(&self.pool).await?)
    }

    async fn series_book_ids(&self, id: SeriesId) -> Result<Vec<BookId>> {
        let related = books::get_books_by_series(&self.pool, id).await?;
        Ok(related.into_iter().map(|b| b.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, Storage};
    use crate::LibraryConfig;
    use audioshelf_database::create_test_db;
    use std::sync::Arc;

    async fn manager() -> (LibraryManager, Arc<MemoryStorage>) {
        let pool = create_test_db().await.expect("db");
        let storage = Arc::new(MemoryStorage::new());
        let manager = LibraryManager::with_parts(pool, storage.clone(), LibraryConfig::default());
        (manager, storage)
    }

    #[tokio::test]
    async fn test_genre_slug_and_collision() {
        let (manager, _) = manager().await;

        let genre = manager.create_genre("Science Fiction").await.unwrap();
        assert_eq!(genre.slug, "science_fiction");

        let err = manager.create_genre("science   fiction!").await.unwrap_err();
        assert!(matches!(err, LibraryError::SlugCollision { entity: "Genre", .. }));
    }

    #[tokio::test]
    async fn test_empty_identity_is_refused() {
        let (manager, _) = manager().await;

        let err = manager.create_genre("!!!").await.unwrap_err();
        assert!(matches!(err, LibraryError::EmptyIdentity { entity: "Genre" }));

        let err = manager.create_author("Frank", "", "").await.unwrap_err();
        assert!(matches!(err, LibraryError::EmptyIdentity { entity: "Author" }));

        let genre = manager.create_genre("Fantasy").await.unwrap();
        assert!(manager.rename_genre(genre.id, "  ").await.is_err());
        assert_eq!(manager.genre_by_slug("fantasy").await.unwrap().name, "Fantasy");
    }

    #[tokio::test]
    async fn test_author_slug_is_last_name_first() {
        let (manager, _) = manager().await;
        let author = manager.create_author("Frank", "Herbert", "").await.unwrap();
        assert_eq!(author.slug, "herbert_frank");
        assert_eq!(manager.author_by_slug("herbert_frank").await.unwrap().id, author.id);
    }

    #[tokio::test]
    async fn test_rename_genre_moves_image() {
        let (manager, storage) = manager().await;
        let genre = manager.create_genre("Horror").await.unwrap();
        manager
            .set_genre_image(genre.id, "cover.png", Box::new(&b"img"[..]))
            .await
            .unwrap();

        let renamed = manager.rename_genre(genre.id, "Gothic Horror").await.unwrap();

        assert_eq!(renamed.slug, "gothic_horror");
        assert_eq!(renamed.image.as_deref(), Some("genres/gothic_horror.png"));
        assert_eq!(storage.files().unwrap(), vec!["genres/gothic_horror.png"]);
    }

    #[tokio::test]
    async fn test_delete_genre_removes_image() {
        let (manager, storage) = manager().await;
        let genre = manager.create_genre("Poetry").await.unwrap();
        manager
            .set_genre_image(genre.id, "p.jpg", Box::new(&b"img"[..]))
            .await
            .unwrap();

        manager.delete_genre(genre.id).await.unwrap();

        assert!(storage.files().unwrap().is_empty());
        assert!(manager.genre_by_slug("poetry").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_author_description_change_keeps_slug() {
        let (manager, _) = manager().await;
        let author = manager.create_author("Ursula", "Le Guin", "").await.unwrap();

        let updated = manager
            .update_author(
                author.id,
                AuthorChanges {
                    description: Some("Earthsea".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.entity.slug, "le_guin_ursula");
        assert_eq!(updated.entity.description, "Earthsea");
        assert!(updated.cascade.is_noop());
    }

    #[tokio::test]
    async fn test_series_rename_collision() {
        let (manager, _) = manager().await;
        manager.create_series("Dune Saga").await.unwrap();
        let other = manager.create_series("Foundation").await.unwrap();

        let err = manager.rename_series(other.id, "Dune  Saga").await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(manager.list_series().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_author_image_replaced() {
        let (manager, storage) = manager().await;
        let author = manager.create_author("Frank", "Herbert", "").await.unwrap();
        manager
            .set_author_image(author.id, "a.png", Box::new(&b"1"[..]))
            .await
            .unwrap();
        let author = manager
            .set_author_image(author.id, "b.jpeg", Box::new(&b"2"[..]))
            .await
            .unwrap();

        assert_eq!(author.image.as_deref(), Some("authors/herbert_frank.jpeg"));
        assert_eq!(storage.read_to_vec("authors/herbert_frank.jpeg").unwrap(), b"2");
        assert!(!storage.exists("authors/herbert_frank.png").unwrap());
    }
}
