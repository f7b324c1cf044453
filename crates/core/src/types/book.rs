//! Book and audio file domain models

use crate::paths::{AudioLocation, NO_AUTHOR, NO_SERIES};
use crate::slug::slugify;
use crate::types::common::check_max_len;
use crate::types::{AudioFileId, Author, BookId, Series, SeriesId, Timestamp, Validator};
use serde::{Deserialize, Serialize};

/// Prefix of the slug a book carries between its first insert and the moment
/// its associations are attached
pub const PLACEHOLDER_SLUG_PREFIX: &str = "pending_";

/// Represents an audiobook in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub slug: String,
    pub series_id: Option<SeriesId>,
    pub is_read: bool,
    pub image: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Book {
    /// Creates an unsaved book carrying a unique placeholder slug
    pub fn new(title: impl Into<String>) -> Self {
        let id = BookId::new();
        let now = Timestamp::now();
        Self {
            id,
            title: title.into(),
            slug: format!("{}{}", PLACEHOLDER_SLUG_PREFIX, id.as_string().replace('-', "")),
            series_id: None,
            is_read: false,
            image: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true while the book still carries its placeholder slug
    pub fn has_placeholder_slug(&self) -> bool {
        self.slug.starts_with(PLACEHOLDER_SLUG_PREFIX)
    }

    /// Marks the book as modified now
    pub fn touch(&mut self) {
        self.updated_at = Timestamp::now();
    }
}

impl Validator for Book {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.title.trim().is_empty() {
            errors.push("Title cannot be empty".to_string());
        }
        check_max_len(&mut errors, "Title", &self.title, 200);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// The attributes a book slug is derived from.
///
/// Author slugs are kept in ascending order so the same set of authors always
/// produces the same slug and directory, regardless of association order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookIdentity {
    title: String,
    author_slugs: Vec<String>,
    series_slug: Option<String>,
}

impl BookIdentity {
    pub fn new(title: impl Into<String>, authors: &[Author], series: Option<&Series>) -> Self {
        Self::from_slugs(
            title,
            authors.iter().map(|a| a.slug.clone()).collect(),
            series.map(|s| s.slug.clone()),
        )
    }

    pub fn from_slugs(
        title: impl Into<String>,
        mut author_slugs: Vec<String>,
        series_slug: Option<String>,
    ) -> Self {
        author_slugs.sort();
        author_slugs.dedup();
        Self {
            title: title.into(),
            author_slugs,
            series_slug,
        }
    }

    pub fn author_slugs(&self) -> &[String] {
        &self.author_slugs
    }

    pub fn series_slug(&self) -> Option<&str> {
        self.series_slug.as_deref()
    }

    /// `{authors}_{series}_{title}` before slugification
    pub fn canonical(&self) -> String {
        let authors = if self.author_slugs.is_empty() {
            NO_AUTHOR.to_string()
        } else {
            self.author_slugs.join("_")
        };
        let series = self.series_slug.as_deref().unwrap_or(NO_SERIES);
        format!("{}_{}_{}", authors, series, self.title)
    }

    /// The book slug, or an empty string when the title carries no identity
    pub fn slug(&self) -> String {
        if slugify(&self.title).is_empty() {
            return String::new();
        }
        slugify(&self.canonical())
    }

    /// Directory triple for a book with this identity and the given slug
    pub fn location(&self, book_slug: &str) -> AudioLocation {
        AudioLocation::new(self.author_slugs.as_slice(), self.series_slug.as_deref(), book_slug)
    }
}

/// An uploaded audio file owned by a book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFile {
    pub id: AudioFileId,
    pub book_id: BookId,
    /// Path relative to the media root
    pub path: String,
    /// Original basename
    pub filename: String,
    pub size_bytes: u64,
    pub uploaded_at: Timestamp,
}

impl AudioFile {
    pub fn new(book_id: BookId, path: impl Into<String>, filename: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            id: AudioFileId::new(),
            book_id,
            path: path.into(),
            filename: filename.into(),
            size_bytes,
            uploaded_at: Timestamp::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sluggable;

    fn saved_author(first: &str, last: &str) -> Author {
        let mut author = Author::new(first, last);
        author.slug = author.compute_slug();
        author
    }

    fn saved_series(title: &str) -> Series {
        let mut series = Series::new(title);
        series.slug = series.compute_slug();
        series
    }

    #[test]
    fn test_new_book_has_placeholder_slug() {
        let book = Book::new("Dune");
        assert!(book.has_placeholder_slug());
        assert!(!book.is_read);
        assert_eq!(book.created_at, book.updated_at);
    }

    #[test]
    fn test_placeholder_slugs_are_unique() {
        assert_ne!(Book::new("Dune").slug, Book::new("Dune").slug);
    }

    #[test]
    fn test_dune_identity() {
        let herbert = saved_author("Frank", "Herbert");
        let saga = saved_series("Dune Saga");
        let identity = BookIdentity::new("Dune", &[herbert], Some(&saga));

        assert_eq!(identity.canonical(), "herbert_frank_dune_saga_Dune");
        assert_eq!(identity.slug(), "herbert_frank_dune_saga_dune");

        let location = identity.location(&identity.slug());
        assert_eq!(
            location.book_dir(),
            "audio/herbert_frank/dune_saga/herbert_frank_dune_saga_dune"
        );
    }

    #[test]
    fn test_identity_without_authors_or_series() {
        let identity = BookIdentity::new("Beowulf", &[], None);
        assert_eq!(identity.slug(), "no_author_no_series_beowulf");
        assert_eq!(
            identity.location("no_author_no_series_beowulf").book_dir(),
            "audio/no_author/no_series/no_author_no_series_beowulf"
        );
    }

    #[test]
    fn test_author_order_does_not_matter() {
        let pratchett = saved_author("Terry", "Pratchett");
        let gaiman = saved_author("Neil", "Gaiman");

        let a = BookIdentity::new("Good Omens", &[pratchett.clone(), gaiman.clone()], None);
        let b = BookIdentity::new("Good Omens", &[gaiman, pratchett], None);

        assert_eq!(a.slug(), b.slug());
        assert_eq!(a.slug(), "gaiman_neil_pratchett_terry_no_series_good_omens");
        assert_eq!(a.location(&a.slug()), b.location(&b.slug()));
    }

    #[test]
    fn test_empty_title_has_no_slug() {
        let identity = BookIdentity::new("  ", &[saved_author("Frank", "Herbert")], None);
        assert_eq!(identity.slug(), "");
    }

    #[test]
    fn test_slug_matches_slugified_canonical() {
        let identity = BookIdentity::new(
            "Children of Dune!",
            &[saved_author("Frank", "Herbert")],
            Some(&saved_series("Dune Saga")),
        );
        assert_eq!(identity.slug(), slugify(&identity.canonical()));
    }

    #[test]
    fn test_book_validation() {
        assert!(Book::new("Dune").is_valid());
        assert!(!Book::new(" ").is_valid());
        assert!(!Book::new("z".repeat(201)).is_valid());
    }

    #[test]
    fn test_audio_file_new() {
        let book_id = BookId::new();
        let file = AudioFile::new(book_id, "audio/a/b/c/track.mp3", "track.mp3", 42);
        assert_eq!(file.book_id, book_id);
        assert_eq!(file.size_bytes, 42);
    }
}
