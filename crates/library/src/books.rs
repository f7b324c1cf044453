//! Books, their audio files, archives and exports

use crate::archive::{ArchivePlan, BookArchive};
use crate::cascade::{parent_dirs, CascadeReport};
use crate::error::{LibraryError, Result};
use crate::export::{self, BookRow, ExportSummary};
use crate::manager::{LibraryManager, Updated};
use audioshelf_core::paths::basename;
use audioshelf_core::{
    audio_path, slugify, AppError, AudioFile, AudioFileId, Author, AuthorId, Book, BookId, Genre,
    GenreId, ImageCategory, Series, SeriesId, Timestamp, Validator,
};
use audioshelf_database::queries::{
    audio_files, authors, books, catalog_stats, genres, series, CatalogStats,
};
use sqlx::SqliteConnection;
use std::io::{self, Read};
use std::sync::Arc;

/// Everything needed to create a book
#[derive(Debug, Clone, Default)]
pub struct NewBook {
    pub title: String,
    pub author_ids: Vec<AuthorId>,
    pub genre_ids: Vec<GenreId>,
    pub series_id: Option<SeriesId>,
    pub is_read: bool,
}

impl NewBook {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_author(mut self, id: AuthorId) -> Self {
        self.author_ids.push(id);
        self
    }

    pub fn with_genre(mut self, id: GenreId) -> Self {
        self.genre_ids.push(id);
        self
    }

    pub fn in_series(mut self, id: SeriesId) -> Self {
        self.series_id = Some(id);
        self
    }
}

/// Fields to change on a book; `None` keeps the current value
#[derive(Debug, Clone, Default)]
pub struct BookChanges {
    pub title: Option<String>,
    pub author_ids: Option<Vec<AuthorId>>,
    pub genre_ids: Option<Vec<GenreId>>,
    /// `Some(None)` detaches the book from its series
    pub series_id: Option<Option<SeriesId>>,
    pub is_read: Option<bool>,
}

impl BookChanges {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }
}

/// A book with its associations resolved
#[derive(Debug, Clone)]
pub struct BookDetails {
    pub book: Book,
    pub authors: Vec<Author>,
    pub genres: Vec<Genre>,
    pub series: Option<Series>,
    pub audio_files: Vec<AudioFile>,
}

impl BookDetails {
    pub fn total_bytes(&self) -> u64 {
        self.audio_files.iter().map(|f| f.size_bytes).sum()
    }
}

fn check_title(book: &Book) -> Result<()> {
    if slugify(&book.title).is_empty() {
        return Err(LibraryError::EmptyIdentity { entity: "Book" });
    }
    book.validate()
        .map_err(|errors| AppError::invalid_argument("Book", errors.join("; ")))?;
    Ok(())
}

/// Fails with `NotFound` unless every referenced record exists
async fn check_references(
    conn: &mut SqliteConnection,
    author_ids: &[AuthorId],
    genre_ids: &[GenreId],
    series_id: Option<SeriesId>,
) -> Result<()> {
    for id in author_ids {
        authors::get_author(&mut *conn, *id).await?;
    }
    for id in genre_ids {
        genres::get_genre(&mut *conn, *id).await?;
    }
    if let Some(id) = series_id {
        series::get_series(&mut *conn, id).await?;
    }
    Ok(())
}

impl LibraryManager {
    /// Creates a book and assigns its slug once the associations are in place.
    ///
    /// The book is first inserted under a placeholder slug; everything happens
    /// in one transaction, so a collision leaves nothing behind.
    pub async fn create_book(&self, new: NewBook) -> Result<Book> {
        let mut book = Book::new(new.title.trim());
        book.series_id = new.series_id;
        book.is_read = new.is_read;
        check_title(&book)?;

        let mut tx = self.begin().await?;
        check_references(&mut tx, &new.author_ids, &new.genre_ids, new.series_id).await?;

        books::create_book(&mut *tx, &book).await?;
        books::set_book_authors(&mut tx, book.id, &new.author_ids).await?;
        books::set_book_genres(&mut tx, book.id, &new.genre_ids).await?;

        let identity = Self::load_identity(&mut tx, &book).await?;
        let slug = identity.slug();
        Self::ensure_book_slug_free(&mut tx, &slug, book.id).await?;
        book.slug = slug;
        books::update_book(&mut *tx, &book).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::database("Failed to commit book", e))?;

        log::info!("Created book {}", book.slug);
        Ok(book)
    }

    /// Applies `changes` and moves the book's files if its slug changed
    pub async fn update_book(&self, id: BookId, changes: BookChanges) -> Result<Updated<Book>> {
        let _guard = self.locks.lock(id).await;
        let mut tx = self.begin().await?;

        let snapshots = Self::snapshot(&mut tx, &[id]).await?;
        let mut book = books::get_book(&mut *tx, id).await?;

        if let Some(title) = changes.title {
            book.title = title.trim().to_string();
        }
        if let Some(series_id) = changes.series_id {
            book.series_id = series_id;
        }
        if let Some(is_read) = changes.is_read {
            book.is_read = is_read;
        }
        check_title(&book)?;
        check_references(
            &mut tx,
            changes.author_ids.as_deref().unwrap_or_default(),
            changes.genre_ids.as_deref().unwrap_or_default(),
            book.series_id,
        )
        .await?;

        book.touch();
        books::update_book(&mut *tx, &book).await?;
        if let Some(author_ids) = &changes.author_ids {
            books::set_book_authors(&mut tx, id, author_ids).await?;
        }
        if let Some(genre_ids) = &changes.genre_ids {
            books::set_book_genres(&mut tx, id, genre_ids).await?;
        }

        let rewritten = self.rewrite_books(&mut tx, snapshots).await?;
        let (cascade, mut updated) = self.commit_rewrites(tx, rewritten).await?;
        let book = updated
            .pop()
            .ok_or_else(|| LibraryError::not_found("Book", id))?;

        Ok(Updated {
            entity: book,
            cascade,
        })
    }

    pub async fn rename_book(&self, id: BookId, title: &str) -> Result<Updated<Book>> {
        self.update_book(id, BookChanges::title(title)).await
    }

    pub async fn set_book_read(&self, id: BookId, is_read: bool) -> Result<Book> {
        books::set_book_read(&self.pool, id, is_read).await?;
        Ok(books::get_book(&self.pool, id).await?)
    }

    pub async fn set_book_image(
        &self,
        id: BookId,
        filename: &str,
        reader: Box<dyn Read + Send>,
    ) -> Result<Book> {
        let _guard = self.locks.lock(id).await;
        let mut book = books::get_book(&self.pool, id).await?;
        let path = self
            .store_image(
                ImageCategory::Book,
                &book.slug,
                book.image.as_deref(),
                filename,
                reader,
            )
            .await?;
        book.image = Some(path);
        book.touch();
        books::update_book(&self.pool, &book).await?;
        Ok(book)
    }

    /// Deletes a book with its cover, audio blobs and emptied directories
    pub async fn delete_book(&self, id: BookId) -> Result<CascadeReport> {
        let _guard = self.locks.lock(id).await;

        let mut conn = self.acquire().await?;
        let book = books::get_book(&mut *conn, id).await?;
        let location = Self::load_identity(&mut conn, &book)
            .await?
            .location(&book.slug);
        let files = audio_files::get_book_audio_files(&mut *conn, id).await?;
        books::delete_book(&mut *conn, id).await?;
        drop(conn);

        let mut report = CascadeReport::default();
        for file in &files {
            if let Some(warning) = self.remove_blob(&file.path).await {
                report.warnings.push(warning);
            }
        }
        if let Some(image) = &book.image {
            let _ = self.remove_blob(image).await;
        }

        let mut dirs = Vec::from(location.ancestors());
        dirs.extend(files.iter().flat_map(|f| parent_dirs(&f.path)));
        let (pruned, warnings) = self.cascade.prune(dirs).await;
        report.pruned_dirs = pruned;
        report.warnings.extend(warnings);

        log::info!("Deleted book {} with {} audio file(s)", book.slug, files.len());
        Ok(report)
    }

    pub async fn get_book(&self, id: BookId) -> Result<Book> {
        Ok(books::get_book(&self.pool, id).await?)
    }

    pub async fn book_by_slug(&self, slug: &str) -> Result<Book> {
        books::find_book_by_slug(&self.pool, slug)
            .await?
            .ok_or_else(|| LibraryError::not_found("Book", slug))
    }

    pub async fn book_details(&self, slug: &str) -> Result<BookDetails> {
        let mut conn = self.acquire().await?;
        let book = books::find_book_by_slug(&mut *conn, slug)
            .await?
            .ok_or_else(|| LibraryError::not_found("Book", slug))?;

        let book_series = match book.series_id {
            Some(id) => Some(series::get_series(&mut *conn, id).await?),
            None => None,
        };
        Ok(BookDetails {
            authors: authors::get_book_authors(&mut *conn, book.id).await?,
            genres: genres::get_book_genres(&mut *conn, book.id).await?,
            audio_files: audio_files::get_book_audio_files(&mut *conn, book.id).await?,
            series: book_series,
            book,
        })
    }

    pub async fn list_books(&self) -> Result<Vec<Book>> {
        Ok(books::list_books(&self.pool).await?)
    }

    pub async fn books_by_author(&self, author_slug: &str) -> Result<Vec<Book>> {
        let author = self.author_by_slug(author_slug).await?;
        Ok(books::get_books_by_author(&self.pool, author.id).await?)
    }

    pub async fn books_by_series(&self, series_slug: &str) -> Result<Vec<Book>> {
        let entry = self.series_by_slug(series_slug).await?;
        Ok(books::get_books_by_series(&self.pool, entry.id).await?)
    }

    pub async fn books_by_genre(&self, genre_slug: &str) -> Result<Vec<Book>> {
        let genre = self.genre_by_slug(genre_slug).await?;
        Ok(books::get_books_by_genre(&self.pool, genre.id).await?)
    }

    pub async fn search_books(&self, query: &str, limit: usize) -> Result<Vec<Book>> {
        Ok(books::search_books(&self.pool, query, limit as i64).await?)
    }

    pub async fn stats(&self) -> Result<CatalogStats> {
        Ok(catalog_stats(&self.pool).await?)
    }

    // Audio files

    /// Stores an uploaded audio file under the book's current location.
    ///
    /// Uploading a filename the book already has replaces that file.
    pub async fn upload_audio(
        &self,
        book_id: BookId,
        filename: &str,
        reader: Box<dyn Read + Send>,
    ) -> Result<AudioFile> {
        let name = basename(filename)?.to_string();
        if !self.config.storage.is_supported_audio(&name) {
            return Err(AppError::invalid_argument(
                "filename",
                format!("'{}' is not a supported audio format", name),
            )
            .into());
        }

        let _guard = self.locks.lock(book_id).await;
        let mut conn = self.acquire().await?;
        let book = books::get_book(&mut *conn, book_id).await?;
        let identity = Self::load_identity(&mut conn, &book).await?;
        let path = audio_path(&identity.location(&book.slug), &name)?;
        let existing = audio_files::find_book_audio_file(&mut *conn, book_id, &name).await?;

        let size = self.write_blob(&path, reader).await?;

        let file = match existing {
            Some(mut file) => {
                if file.path != path {
                    let _ = self.remove_blob(&file.path).await;
                }
                file.path = path;
                file.size_bytes = size;
                file.uploaded_at = Timestamp::now();
                audio_files::update_audio_file_upload(&mut *conn, &file).await?;
                file
            }
            None => {
                let file = AudioFile::new(book_id, path, name, size);
                if let Err(e) = audio_files::create_audio_file(&mut *conn, &file).await {
                    let _ = self.remove_blob(&file.path).await;
                    return Err(e.into());
                }
                file
            }
        };

        log::info!("Uploaded {} ({} bytes)", file.path, file.size_bytes);
        Ok(file)
    }

    pub async fn book_audio_files(&self, book_id: BookId) -> Result<Vec<AudioFile>> {
        Ok(audio_files::get_book_audio_files(&self.pool, book_id).await?)
    }

    /// Removes an audio file and prunes the directories it leaves empty
    pub async fn delete_audio_file(&self, id: AudioFileId) -> Result<CascadeReport> {
        let file = audio_files::get_audio_file(&self.pool, id).await?;
        let _guard = self.locks.lock(file.book_id).await;

        audio_files::delete_audio_file(&self.pool, id).await?;

        let mut report = CascadeReport::default();
        if let Some(warning) = self.remove_blob(&file.path).await {
            report.warnings.push(warning);
        }
        let (pruned, warnings) = self.cascade.prune(parent_dirs(&file.path)).await;
        report.pruned_dirs = pruned;
        report.warnings.extend(warnings);

        log::info!("Deleted audio file {}", file.path);
        Ok(report)
    }

    /// Zips every audio file of the book with the given slug
    pub async fn book_archive(&self, slug: &str) -> Result<BookArchive> {
        let book = self.book_by_slug(slug).await?;
        let files = audio_files::get_book_audio_files(&self.pool, book.id).await?;
        let plan = ArchivePlan::from_files(&files);

        let storage = Arc::clone(&self.storage);
        tokio::task::spawn_blocking(move || BookArchive::build(storage.as_ref(), &book.slug, &plan))
            .await
            .map_err(io::Error::other)?
    }

    // Exports

    pub async fn export_authors(&self) -> Result<ExportSummary> {
        let rows = authors::list_authors(&self.pool).await?;
        let dir = self.config.storage.export_dir.clone();
        tokio::task::spawn_blocking(move || export::export_authors(&dir, &rows))
            .await
            .map_err(io::Error::other)?
    }

    pub async fn export_books(&self) -> Result<ExportSummary> {
        let rows = self.book_rows().await?;
        let dir = self.config.storage.export_dir.clone();
        tokio::task::spawn_blocking(move || export::export_books(&dir, &rows))
            .await
            .map_err(io::Error::other)?
    }

    async fn book_rows(&self) -> Result<Vec<BookRow>> {
        let mut conn = self.acquire().await?;
        let all = books::list_books(&mut *conn).await?;

        let mut rows = Vec::with_capacity(all.len());
        for book in all {
            let book_authors = authors::get_book_authors(&mut *conn, book.id).await?;
            let book_genres = genres::get_book_genres(&mut *conn, book.id).await?;
            let series_title = match book.series_id {
                Some(id) => Some(series::get_series(&mut *conn, id).await?.title),
                None => None,
            };
            rows.push(BookRow {
                authors: book_authors.iter().map(Author::full_name).collect(),
                author_slugs: book_authors.into_iter().map(|a| a.slug).collect(),
                series: series_title,
                genres: book_genres.into_iter().map(|g| g.name).collect(),
                audio_files_count: audio_files::count_book_audio_files(&mut *conn, book.id).await?,
                is_read: book.is_read,
                title: book.title,
                book_slug: book.slug,
            });
        }
        Ok(rows)
    }
}
