//! High-level catalog management
//!
//! `LibraryManager` owns the database pool, the media storage and the rename
//! cascade. Entity operations live in `entities.rs` and `books.rs`; this file
//! holds construction and the plumbing they share.

use crate::cascade::{CascadeReport, CascadeWarning, Relocation, RenameCascade};
use crate::error::{LibraryError, Result};
use crate::locks::BookLocks;
use crate::storage::{LocalStorage, Storage};
use crate::LibraryConfig;
use audioshelf_core::paths::basename;
use audioshelf_core::{
    image_path, AppError, AudioLocation, Book, BookId, BookIdentity, ImageCategory,
};
use audioshelf_database::queries::{authors, books, series};
use audioshelf_database::{open_catalog, DatabaseConfig, DbPool};
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, Transaction};
use std::collections::HashSet;
use std::io::{self, Read};
use std::sync::Arc;

/// An updated entity together with the files its update moved
#[derive(Debug, Clone)]
pub struct Updated<T> {
    pub entity: T,
    pub cascade: CascadeReport,
}

/// A book's stored location, captured before its identity changes
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    pub id: BookId,
    pub old: AudioLocation,
}

/// A book whose slug was rewritten in an open transaction
pub(crate) struct Rewritten {
    pub book: Book,
    pub previous_slug: String,
    pub relocation: Relocation,
}

/// High-level library management
pub struct LibraryManager {
    pub(crate) pool: DbPool,
    pub(crate) storage: Arc<dyn Storage>,
    pub(crate) cascade: RenameCascade,
    pub(crate) locks: BookLocks,
    pub(crate) config: LibraryConfig,
}

impl LibraryManager {
    /// Opens the catalog database and the on-disk media root
    pub async fn new(config: LibraryConfig) -> Result<Self> {
        log::info!(
            "Initializing library with database: {}",
            config.database_path.display()
        );

        let db_config = DatabaseConfig::new(config.database_path.to_string_lossy());
        let pool = open_catalog(db_config).await?;
        let storage = Arc::new(LocalStorage::new(config.storage.media_root.clone()));

        Ok(Self::with_parts(pool, storage, config))
    }

    /// Builds a manager from an existing pool and storage backend
    pub fn with_parts(pool: DbPool, storage: Arc<dyn Storage>, config: LibraryConfig) -> Self {
        let cascade = RenameCascade::new(Arc::clone(&storage), config.move_timeout());
        Self {
            pool,
            storage,
            cascade,
            locks: BookLocks::new(),
            config,
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    pub(crate) async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database("Failed to begin transaction", e))?)
    }

    pub(crate) async fn acquire(&self) -> Result<PoolConnection<Sqlite>> {
        Ok(self
            .pool
            .acquire()
            .await
            .map_err(|e| AppError::database("Failed to acquire connection", e))?)
    }

    /// Runs a blocking storage call on the blocking pool
    pub(crate) async fn with_storage<T, F>(&self, path: &str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Storage, &str) -> io::Result<T> + Send + 'static,
    {
        let storage = Arc::clone(&self.storage);
        let target = path.to_string();
        let result = tokio::task::spawn_blocking(move || op(storage.as_ref(), &target))
            .await
            .map_err(io::Error::other)?;
        result.map_err(|e| LibraryError::storage(path, e))
    }

    pub(crate) async fn write_blob(&self, path: &str, mut reader: Box<dyn Read + Send>) -> Result<u64> {
        self.with_storage(path, move |storage, target| storage.write(target, &mut *reader))
            .await
    }

    /// Removes a blob, reporting a missing one as a warning
    pub(crate) async fn remove_blob(&self, path: &str) -> Option<CascadeWarning> {
        match self
            .with_storage(path, |storage, target| storage.remove_file(target))
            .await
        {
            Ok(()) => None,
            Err(LibraryError::Storage { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                log::warn!("File already gone: {}", path);
                Some(CascadeWarning::FileMissing {
                    path: path.to_string(),
                })
            }
            Err(e) => {
                log::warn!("Could not remove {}: {}", path, e);
                None
            }
        }
    }

    /// Writes a new image at its canonical path and drops the previous one
    pub(crate) async fn store_image(
        &self,
        category: ImageCategory,
        slug: &str,
        previous: Option<&str>,
        filename: &str,
        reader: Box<dyn Read + Send>,
    ) -> Result<String> {
        let path = image_path(category, slug, filename)?;
        self.write_blob(&path, reader).await?;

        if let Some(old) = previous.filter(|old| *old != path) {
            let _ = self.remove_blob(old).await;
        }
        log::info!("Stored {} image {}", category, path);
        Ok(path)
    }

    /// Moves an image to the canonical path for `slug`.
    ///
    /// Returns the new path when the image moved; failures are logged and the
    /// image stays where it was.
    pub(crate) async fn follow_image(
        &self,
        category: ImageCategory,
        slug: &str,
        current: Option<&str>,
    ) -> Option<String> {
        let current = current?;
        let name = basename(current).ok()?;
        let target = image_path(category, slug, name).ok()?;
        if target == current {
            return None;
        }

        let destination = target.clone();
        match self
            .with_storage(current, move |storage, from| storage.rename(from, &destination))
            .await
        {
            Ok(()) => {
                log::info!("Moved image {} -> {}", current, target);
                Some(target)
            }
            Err(e) => {
                log::warn!("Could not move image {} to {}: {}", current, target, e);
                None
            }
        }
    }

    /// Derives a book's identity from its current associations
    pub(crate) async fn load_identity(
        conn: &mut SqliteConnection,
        book: &Book,
    ) -> Result<BookIdentity> {
        let book_authors = authors::get_book_authors(&mut *conn, book.id).await?;
        let book_series = match book.series_id {
            Some(id) => Some(series::get_series(&mut *conn, id).await?),
            None => None,
        };
        Ok(BookIdentity::new(&book.title, &book_authors, book_series.as_ref()))
    }

    /// Captures where each book's files live now
    pub(crate) async fn snapshot(conn: &mut SqliteConnection, ids: &[BookId]) -> Result<Vec<Snapshot>> {
        let mut snapshots = Vec::with_capacity(ids.len());
        for id in ids {
            let book = books::get_book(&mut *conn, *id).await?;
            let identity = Self::load_identity(conn, &book).await?;
            snapshots.push(Snapshot {
                id: book.id,
                old: identity.location(&book.slug),
            });
        }
        Ok(snapshots)
    }

    /// Fails if another book already holds `slug`
    pub(crate) async fn ensure_book_slug_free(
        conn: &mut SqliteConnection,
        slug: &str,
        id: BookId,
    ) -> Result<()> {
        match books::find_book_by_slug(&mut *conn, slug).await? {
            Some(other) if other.id != id => Err(LibraryError::SlugCollision {
                entity: "Book",
                slug: slug.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Recomputes each book's slug and moves its files.
    ///
    /// Every new slug is checked before any file is touched. On failure the
    /// relocations already made are undone and the caller drops `conn`'s
    /// transaction.
    ///
    /// A new slug must be free in the catalog as it stands, even when the
    /// book holding it is part of the same rewrite and about to give it up.
    /// Books are updated one at a time and `books.slug` is unique, so such a
    /// hand-over would fail halfway.
    pub(crate) async fn rewrite_books(
        &self,
        conn: &mut SqliteConnection,
        snapshots: Vec<Snapshot>,
    ) -> Result<Vec<Rewritten>> {
        let mut planned = Vec::with_capacity(snapshots.len());
        let mut claimed = HashSet::new();

        for snapshot in snapshots {
            let book = books::get_book(&mut *conn, snapshot.id).await?;
            let identity = Self::load_identity(conn, &book).await?;
            let slug = identity.slug();
            if slug.is_empty() {
                return Err(LibraryError::EmptyIdentity { entity: "Book" });
            }
            Self::ensure_book_slug_free(conn, &slug, book.id).await?;
            if !claimed.insert(slug.clone()) {
                return Err(LibraryError::SlugCollision {
                    entity: "Book",
                    slug,
                });
            }
            let new = identity.location(&slug);
            planned.push((book, slug, snapshot.old, new));
        }

        let mut rewritten: Vec<Rewritten> = Vec::with_capacity(planned.len());
        for (book, slug, old, new) in planned {
            match self.rewrite_one(conn, book, slug, &old, &new).await {
                Ok(done) => rewritten.push(done),
                Err(e) => {
                    self.undo(rewritten).await;
                    return Err(e);
                }
            }
        }
        Ok(rewritten)
    }

    async fn rewrite_one(
        &self,
        conn: &mut SqliteConnection,
        mut book: Book,
        slug: String,
        old: &AudioLocation,
        new: &AudioLocation,
    ) -> Result<Rewritten> {
        let previous_slug = book.slug.clone();
        if book.slug != slug {
            log::info!("Book slug {} -> {}", book.slug, slug);
            book.slug = slug;
            book.touch();
            books::update_book(&mut *conn, &book).await?;
        }
        let relocation = self.cascade.relocate(conn, book.id, old, new).await?;
        Ok(Rewritten {
            book,
            previous_slug,
            relocation,
        })
    }

    pub(crate) async fn undo(&self, rewritten: Vec<Rewritten>) {
        for done in rewritten.into_iter().rev() {
            self.cascade.rollback(done.relocation).await;
        }
    }

    /// Commits `tx`, then prunes and moves cover images for each rewritten
    /// book. A failed commit puts every moved file back.
    pub(crate) async fn commit_rewrites(
        &self,
        tx: Transaction<'static, Sqlite>,
        rewritten: Vec<Rewritten>,
    ) -> Result<(CascadeReport, Vec<Book>)> {
        if let Err(e) = tx.commit().await {
            self.undo(rewritten).await;
            return Err(AppError::database("Failed to commit transaction", e).into());
        }

        let mut report = CascadeReport::default();
        let mut updated = Vec::with_capacity(rewritten.len());
        for done in rewritten {
            report.absorb(self.cascade.finish(done.relocation).await);

            let mut book = done.book;
            if book.slug != done.previous_slug {
                self.follow_book_cover(&mut book).await;
            }
            updated.push(book);
        }
        Ok((report, updated))
    }

    async fn follow_book_cover(&self, book: &mut Book) {
        let Some(moved) = self
            .follow_image(ImageCategory::Book, &book.slug, book.image.as_deref())
            .await
        else {
            return;
        };
        book.image = Some(moved);
        if let Err(e) = books::update_book(&self.pool, book).await {
            log::warn!("Could not record new cover path for {}: {}", book.slug, e);
        }
    }
}
