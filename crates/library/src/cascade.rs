//! Rename cascade: keeps audio files where a book's slug says they live
//!
//! When a book's identity changes, [`RenameCascade::relocate`] moves every
//! audio file of the book to its new canonical path and rewrites the stored
//! references inside the caller's transaction. The caller commits, then calls
//! [`RenameCascade::finish`] to prune the directories left behind. If the
//! commit fails the caller hands the relocation to [`RenameCascade::rollback`].
//!
//! A failed move rolls back the moves already made for that book before the
//! error is returned, so files and references stay consistent.

use crate::error::{LibraryError, Result};
use crate::storage::Storage;
use audioshelf_core::{audio_path, AudioFileId, AudioLocation, BookId};
use audioshelf_database::queries::audio_files;
use sqlx::SqliteConnection;
use std::collections::BTreeSet;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

/// A non-fatal problem met during a cascade
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeWarning {
    /// The stored path had no file behind it; the reference was still updated
    FileMissing { path: String },
    /// An emptied directory could not be removed
    DirectoryPrune { path: String, reason: String },
}

impl fmt::Display for CascadeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileMissing { path } => write!(f, "audio file missing: {}", path),
            Self::DirectoryPrune { path, reason } => {
                write!(f, "could not remove directory {}: {}", path, reason)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovedFile {
    pub id: AudioFileId,
    pub from: String,
    pub to: String,
}

/// Outcome of a completed cascade
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeReport {
    pub moved: Vec<MovedFile>,
    pub already_in_place: usize,
    pub warnings: Vec<CascadeWarning>,
    pub pruned_dirs: Vec<String>,
}

impl CascadeReport {
    pub fn is_noop(&self) -> bool {
        self.moved.is_empty() && self.warnings.is_empty() && self.pruned_dirs.is_empty()
    }

    /// Folds another book's report into this one
    pub fn absorb(&mut self, other: CascadeReport) {
        self.moved.extend(other.moved);
        self.already_in_place += other.already_in_place;
        self.warnings.extend(other.warnings);
        self.pruned_dirs.extend(other.pruned_dirs);
    }
}

/// Files moved for one book whose transaction has not committed yet
#[derive(Debug)]
#[must_use = "a relocation must be finished after commit or rolled back"]
pub struct Relocation {
    book_id: BookId,
    old: AudioLocation,
    moved: Vec<MovedFile>,
    already_in_place: usize,
    warnings: Vec<CascadeWarning>,
    vacated: BTreeSet<String>,
    changed: bool,
}

impl Relocation {
    fn unchanged(book_id: BookId, old: &AudioLocation) -> Self {
        Self {
            book_id,
            old: old.clone(),
            moved: Vec::new(),
            already_in_place: 0,
            warnings: Vec::new(),
            vacated: BTreeSet::new(),
            changed: false,
        }
    }

    pub fn book_id(&self) -> BookId {
        self.book_id
    }

    pub fn moved(&self) -> &[MovedFile] {
        &self.moved
    }
}

/// Moves a book's audio files to follow its slug
#[derive(Debug, Clone)]
pub struct RenameCascade {
    storage: Arc<dyn Storage>,
    move_timeout: Duration,
}

impl RenameCascade {
    pub fn new(storage: Arc<dyn Storage>, move_timeout: Duration) -> Self {
        Self {
            storage,
            move_timeout,
        }
    }

    /// Moves files and updates references inside `conn`'s transaction.
    ///
    /// Does nothing when the two locations are equal. On a failed move the
    /// files already moved are put back and the `FileMove` error is returned;
    /// the caller must then drop its transaction.
    pub async fn relocate(
        &self,
        conn: &mut SqliteConnection,
        book_id: BookId,
        old: &AudioLocation,
        new: &AudioLocation,
    ) -> Result<Relocation> {
        let mut relocation = Relocation::unchanged(book_id, old);
        if old == new {
            return Ok(relocation);
        }
        relocation.changed = true;

        let files = audio_files::get_book_audio_files(&mut *conn, book_id).await?;
        log::info!(
            "Relocating {} audio file(s) of book {} from {} to {}",
            files.len(),
            book_id,
            old,
            new
        );

        for file in files {
            let destination = audio_path(new, &file.filename)?;
            if file.path == destination {
                relocation.already_in_place += 1;
                continue;
            }

            let source_exists = self.blocking_exists(&file.path).await;
            let destination_exists = self.blocking_exists(&destination).await;

            match (source_exists, destination_exists) {
                (Ok(true), _) => {
                    if let Err(failure) = self.move_file(&file.path, &destination).await {
                        log::error!(
                            "Moving {} to {} failed: {}; rolling back book {}",
                            file.path,
                            destination,
                            failure.error,
                            book_id
                        );
                        if failure.landed {
                            relocation.moved.push(MovedFile {
                                id: file.id,
                                from: file.path.clone(),
                                to: destination.clone(),
                            });
                        }
                        self.undo_moves(&relocation.moved).await;
                        return Err(LibraryError::FileMove {
                            from: file.path,
                            to: destination,
                            source: failure.error,
                        });
                    }
                    log::debug!("Moved {} -> {}", file.path, destination);
                    relocation.moved.push(MovedFile {
                        id: file.id,
                        from: file.path.clone(),
                        to: destination.clone(),
                    });
                }
                (Ok(false), Ok(true)) => {
                    // An interrupted earlier run already moved the blob.
                    relocation.already_in_place += 1;
                }
                (Ok(false), Ok(false)) => {
                    log::warn!("Audio file missing, updating reference only: {}", file.path);
                    relocation.warnings.push(CascadeWarning::FileMissing {
                        path: file.path.clone(),
                    });
                }
                (Err(e), _) | (_, Err(e)) => {
                    self.undo_moves(&relocation.moved).await;
                    return Err(LibraryError::storage(file.path, e));
                }
            }

            relocation.vacated.extend(parent_dirs(&file.path));

            if let Err(e) =
                audio_files::update_audio_file_path(&mut *conn, file.id, &destination).await
            {
                self.undo_moves(&relocation.moved).await;
                return Err(e.into());
            }
        }

        Ok(relocation)
    }

    /// Prunes vacated directories once the transaction has committed
    pub async fn finish(&self, relocation: Relocation) -> CascadeReport {
        let mut report = CascadeReport {
            moved: relocation.moved,
            already_in_place: relocation.already_in_place,
            warnings: relocation.warnings,
            pruned_dirs: Vec::new(),
        };

        if !relocation.changed {
            return report;
        }

        let mut candidates = relocation.vacated;
        candidates.extend(relocation.old.ancestors());
        let (pruned, warnings) = self.prune(candidates).await;
        report.pruned_dirs = pruned;
        report.warnings.extend(warnings);

        log::info!(
            "Cascade for book {} finished: {} moved, {} in place, {} warning(s)",
            relocation.book_id,
            report.moved.len(),
            report.already_in_place,
            report.warnings.len()
        );
        report
    }

    /// Puts files back after the surrounding transaction failed to commit
    pub async fn rollback(&self, relocation: Relocation) {
        if !relocation.moved.is_empty() {
            log::warn!(
                "Rolling back {} move(s) for book {}",
                relocation.moved.len(),
                relocation.book_id
            );
        }
        self.undo_moves(&relocation.moved).await;
    }

    /// Removes each directory if it is empty, deepest first
    pub async fn prune<I>(&self, dirs: I) -> (Vec<String>, Vec<CascadeWarning>)
    where
        I: IntoIterator<Item = String>,
    {
        let mut ordered: Vec<String> = dirs
            .into_iter()
            .filter(|d| d.contains('/'))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        ordered.sort_by(|a, b| depth(b).cmp(&depth(a)).then_with(|| a.cmp(b)));

        let mut pruned = Vec::new();
        let mut warnings = Vec::new();
        for dir in ordered {
            let storage = Arc::clone(&self.storage);
            let target = dir.clone();
            let result = tokio::task::spawn_blocking(move || storage.remove_dir_if_empty(&target))
                .await
                .unwrap_or_else(|e| Err(io::Error::other(e)));

            match result {
                Ok(true) => {
                    log::debug!("Removed empty directory {}", dir);
                    pruned.push(dir);
                }
                Ok(false) => {}
                Err(e) => {
                    log::warn!("Could not remove directory {}: {}", dir, e);
                    warnings.push(CascadeWarning::DirectoryPrune {
                        path: dir,
                        reason: e.to_string(),
                    });
                }
            }
        }
        (pruned, warnings)
    }

    async fn blocking_exists(&self, path: &str) -> io::Result<bool> {
        let storage = Arc::clone(&self.storage);
        let path = path.to_string();
        tokio::task::spawn_blocking(move || storage.exists(&path))
            .await
            .unwrap_or_else(|e| Err(io::Error::other(e)))
    }

    /// Renames on the blocking pool, bounded by the move timeout.
    ///
    /// A rename cannot be cancelled once started, so after a timeout the task
    /// is still awaited and the failure records where the blob ended up.
    async fn move_file(&self, from: &str, to: &str) -> std::result::Result<(), MoveFailure> {
        let storage = Arc::clone(&self.storage);
        let (source, target) = (from.to_string(), to.to_string());
        let mut task = tokio::task::spawn_blocking(move || storage.rename(&source, &target));

        match tokio::time::timeout(self.move_timeout, &mut task).await {
            Ok(joined) => flatten(joined).map_err(|error| MoveFailure {
                error,
                landed: false,
            }),
            Err(_) => {
                log::warn!(
                    "Move {} -> {} exceeded {:?}, waiting for it to settle",
                    from,
                    to,
                    self.move_timeout
                );
                let landed = flatten(task.await).is_ok();
                Err(MoveFailure {
                    error: io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("move exceeded {:?}", self.move_timeout),
                    ),
                    landed,
                })
            }
        }
    }

    async fn undo_moves(&self, moved: &[MovedFile]) {
        for file in moved.iter().rev() {
            match self.move_file(&file.to, &file.from).await {
                Ok(()) => {}
                Err(failure) if failure.landed => {
                    log::warn!("Moved {} back to {} late: {}", file.to, file.from, failure.error);
                }
                Err(failure) => {
                    log::error!(
                        "Could not move {} back to {}: {}",
                        file.to,
                        file.from,
                        failure.error
                    );
                }
            }
        }
        let vacated: BTreeSet<String> = moved.iter().flat_map(|f| parent_dirs(&f.to)).collect();
        let _ = self.prune(vacated).await;
    }
}

/// A rename that failed or missed its deadline
struct MoveFailure {
    error: io::Error,
    /// The rename completed after the deadline, so the blob is at the destination
    landed: bool,
}

fn flatten(joined: std::result::Result<io::Result<()>, tokio::task::JoinError>) -> io::Result<()> {
    joined.unwrap_or_else(|e| Err(io::Error::other(e)))
}

fn depth(dir: &str) -> usize {
    dir.matches('/').count()
}

/// Ancestor directories of a stored path, excluding the top-level `audio`
pub(crate) fn parent_dirs(path: &str) -> Vec<String> {
    let mut dirs = Vec::new();
    let mut current = path;
    while let Some((parent, _)) = current.rsplit_once('/') {
        if !parent.contains('/') {
            break;
        }
        dirs.push(parent.to_string());
        current = parent;
    }
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use audioshelf_core::{AudioFile, Book};
    use audioshelf_database::queries::{audio_files, books};
    use audioshelf_database::{create_test_db, DbPool};

    struct Fixture {
        pool: DbPool,
        storage: Arc<MemoryStorage>,
        cascade: RenameCascade,
        book: Book,
    }

    fn location(author: &str, series: Option<&str>, slug: &str) -> AudioLocation {
        AudioLocation::new(&[author], series, slug)
    }

    async fn fixture(old: &AudioLocation, filenames: &[&str]) -> Fixture {
        let pool = create_test_db().await.expect("db");
        let storage = Arc::new(MemoryStorage::new());
        let cascade = RenameCascade::new(storage.clone(), Duration::from_secs(5));

        let mut book = Book::new("Dune");
        book.slug = old.book_slug.clone();
        books::create_book(&pool, &book).await.expect("book");

        for name in filenames {
            let path = audio_path(old, name).expect("path");
            storage
                .write(&path, &mut name.as_bytes())
                .expect("write");
            let file = AudioFile::new(book.id, path, *name, name.len() as u64);
            audio_files::create_audio_file(&pool, &file).await.expect("file");
        }

        Fixture {
            pool,
            storage,
            cascade,
            book,
        }
    }

    async fn run(fx: &Fixture, old: &AudioLocation, new: &AudioLocation) -> Result<CascadeReport> {
        let mut tx = fx.pool.begin().await.expect("begin");
        let relocation = fx.cascade.relocate(&mut tx, fx.book.id, old, new).await?;
        tx.commit().await.expect("commit");
        Ok(fx.cascade.finish(relocation).await)
    }

    async fn stored_paths(fx: &Fixture) -> Vec<String> {
        audio_files::get_book_audio_files(&fx.pool, fx.book.id)
            .await
            .expect("files")
            .into_iter()
            .map(|f| f.path)
            .collect()
    }

    #[tokio::test]
    async fn test_same_location_is_noop() {
        let old = location("herbert_frank", None, "herbert_frank_no_series_dune");
        let fx = fixture(&old, &["01.mp3"]).await;

        let report = run(&fx, &old, &old.clone()).await.expect("cascade");

        assert!(report.is_noop());
        assert_eq!(report.already_in_place, 0);
        assert_eq!(
            fx.storage.files().unwrap(),
            vec!["audio/herbert_frank/no_series/herbert_frank_no_series_dune/01.mp3"]
        );
    }

    #[tokio::test]
    async fn test_moves_files_updates_references_and_prunes() {
        let old = location("herbert_frank", Some("dune_saga"), "herbert_frank_dune_saga_dune");
        let new = location(
            "herbert_frank",
            Some("dune_chronicles"),
            "herbert_frank_dune_chronicles_dune",
        );
        let fx = fixture(&old, &["01.mp3", "02.mp3"]).await;

        let report = run(&fx, &old, &new).await.expect("cascade");

        assert_eq!(report.moved.len(), 2);
        assert!(report.warnings.is_empty());
        let expected = vec![
            "audio/herbert_frank/dune_chronicles/herbert_frank_dune_chronicles_dune/01.mp3",
            "audio/herbert_frank/dune_chronicles/herbert_frank_dune_chronicles_dune/02.mp3",
        ];
        assert_eq!(fx.storage.files().unwrap(), expected);
        assert_eq!(stored_paths(&fx).await, expected);

        assert_eq!(
            report.pruned_dirs,
            vec![
                "audio/herbert_frank/dune_saga/herbert_frank_dune_saga_dune",
                "audio/herbert_frank/dune_saga",
            ]
        );
        assert!(fx.storage.dir_exists("audio/herbert_frank").unwrap());
    }

    #[tokio::test]
    async fn test_second_run_is_noop() {
        let old = location("a_b", None, "a_b_no_series_x");
        let new = location("a_b", None, "a_b_no_series_y");
        let fx = fixture(&old, &["01.mp3"]).await;

        run(&fx, &old, &new).await.expect("first");
        let second = run(&fx, &new, &new.clone()).await.expect("second");
        assert!(second.is_noop());

        // Even with stale locations, files already in place are not touched.
        let third = run(&fx, &old, &new).await.expect("third");
        assert!(third.moved.is_empty());
        assert_eq!(third.already_in_place, 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_warning_and_reference_updated() {
        let old = location("a_b", None, "a_b_no_series_x");
        let new = location("a_b", None, "a_b_no_series_y");
        let fx = fixture(&old, &["01.mp3", "02.mp3"]).await;
        fx.storage
            .remove_file("audio/a_b/no_series/a_b_no_series_x/02.mp3")
            .unwrap();

        let report = run(&fx, &old, &new).await.expect("cascade");

        assert_eq!(report.moved.len(), 1);
        assert_eq!(
            report.warnings,
            vec![CascadeWarning::FileMissing {
                path: "audio/a_b/no_series/a_b_no_series_x/02.mp3".to_string()
            }]
        );
        assert_eq!(
            stored_paths(&fx).await,
            vec![
                "audio/a_b/no_series/a_b_no_series_y/01.mp3",
                "audio/a_b/no_series/a_b_no_series_y/02.mp3",
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_move_rolls_back() {
        let old = location("a_b", None, "a_b_no_series_x");
        let new = location("c_d", None, "c_d_no_series_x");
        let fx = fixture(&old, &["01.mp3", "02.mp3", "03.mp3"]).await;
        fx.storage.fail_moves_matching("02.mp3").unwrap();

        let mut tx = fx.pool.begin().await.expect("begin");
        let err = fx
            .cascade
            .relocate(&mut tx, fx.book.id, &old, &new)
            .await
            .unwrap_err();
        drop(tx);

        assert!(matches!(err, LibraryError::FileMove { .. }));
        let original = vec![
            "audio/a_b/no_series/a_b_no_series_x/01.mp3",
            "audio/a_b/no_series/a_b_no_series_x/02.mp3",
            "audio/a_b/no_series/a_b_no_series_x/03.mp3",
        ];
        assert_eq!(fx.storage.files().unwrap(), original);
        assert_eq!(stored_paths(&fx).await, original);
        assert!(!fx.storage.dir_exists("audio/c_d").unwrap());
    }

    /// Renames that take longer than any sensible move timeout
    #[derive(Debug)]
    struct SlowRenames {
        inner: Arc<MemoryStorage>,
        delay: Duration,
    }

    impl Storage for SlowRenames {
        fn exists(&self, path: &str) -> io::Result<bool> {
            self.inner.exists(path)
        }

        fn write(&self, path: &str, reader: &mut dyn std::io::Read) -> io::Result<u64> {
            self.inner.write(path, reader)
        }

        fn open(&self, path: &str) -> io::Result<Box<dyn std::io::Read + Send>> {
            self.inner.open(path)
        }

        fn rename(&self, from: &str, to: &str) -> io::Result<()> {
            std::thread::sleep(self.delay);
            self.inner.rename(from, to)
        }

        fn remove_file(&self, path: &str) -> io::Result<()> {
            self.inner.remove_file(path)
        }

        fn remove_dir_if_empty(&self, path: &str) -> io::Result<bool> {
            self.inner.remove_dir_if_empty(path)
        }
    }

    #[tokio::test]
    async fn test_timed_out_move_is_put_back() {
        let old = location("a_b", None, "a_b_no_series_x");
        let new = location("a_b", None, "a_b_no_series_y");
        let fx = fixture(&old, &["01.mp3"]).await;
        let slow = Arc::new(SlowRenames {
            inner: fx.storage.clone(),
            delay: Duration::from_millis(300),
        });
        let cascade = RenameCascade::new(slow, Duration::from_millis(50));

        let mut tx = fx.pool.begin().await.expect("begin");
        let err = cascade
            .relocate(&mut tx, fx.book.id, &old, &new)
            .await
            .unwrap_err();
        drop(tx);

        match err {
            LibraryError::FileMove { source, .. } => {
                assert_eq!(source.kind(), io::ErrorKind::TimedOut)
            }
            other => panic!("expected FileMove, got {:?}", other),
        }

        tokio::time::sleep(Duration::from_millis(400)).await;
        let original = vec!["audio/a_b/no_series/a_b_no_series_x/01.mp3"];
        assert_eq!(stored_paths(&fx).await, original);
        assert_eq!(fx.storage.files().unwrap(), original);
        assert!(!fx.storage.dir_exists("audio/a_b/no_series/a_b_no_series_y").unwrap());
    }

    #[tokio::test]
    async fn test_rollback_after_failed_commit() {
        let old = location("a_b", None, "a_b_no_series_x");
        let new = location("a_b", None, "a_b_no_series_y");
        let fx = fixture(&old, &["01.mp3"]).await;

        let mut tx = fx.pool.begin().await.expect("begin");
        let relocation = fx
            .cascade
            .relocate(&mut tx, fx.book.id, &old, &new)
            .await
            .expect("relocate");
        drop(tx);
        fx.cascade.rollback(relocation).await;

        assert_eq!(
            fx.storage.files().unwrap(),
            vec!["audio/a_b/no_series/a_b_no_series_x/01.mp3"]
        );
        assert_eq!(stored_paths(&fx).await, fx.storage.files().unwrap());
    }

    #[tokio::test]
    async fn test_prune_failure_is_warning() {
        let old = location("a_b", None, "a_b_no_series_x");
        let new = location("a_b", None, "a_b_no_series_y");
        let fx = fixture(&old, &["01.mp3"]).await;
        fx.storage
            .fail_dir_removal("audio/a_b/no_series/a_b_no_series_x")
            .unwrap();

        let report = run(&fx, &old, &new).await.expect("cascade");

        assert_eq!(report.moved.len(), 1);
        assert!(matches!(
            report.warnings.as_slice(),
            [CascadeWarning::DirectoryPrune { path, .. }] if path == "audio/a_b/no_series/a_b_no_series_x"
        ));
    }

    #[tokio::test]
    async fn test_prune_keeps_non_empty_dirs() {
        let fx = fixture(&location("a_b", None, "keep"), &["01.mp3"]).await;
        let (pruned, warnings) = fx
            .cascade
            .prune(vec![
                "audio/a_b/no_series/keep".to_string(),
                "audio/a_b/no_series".to_string(),
                "audio".to_string(),
            ])
            .await;
        assert!(pruned.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_parent_dirs() {
        assert_eq!(
            parent_dirs("audio/a/s/b/f.mp3"),
            vec!["audio/a/s/b", "audio/a/s", "audio/a"]
        );
        assert!(parent_dirs("f.mp3").is_empty());
    }

    #[test]
    fn test_warning_display() {
        let warning = CascadeWarning::FileMissing {
            path: "audio/x.mp3".to_string(),
        };
        assert_eq!(warning.to_string(), "audio file missing: audio/x.mp3");
    }
}
