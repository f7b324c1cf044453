//! Canonical storage paths
//!
//! All paths are relative to the media root and always use `/` as separator,
//! so the same string can be stored in the database and handed to any storage
//! backend.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Author segment used when a book has no authors
pub const NO_AUTHOR: &str = "no_author";

/// Series segment used when a book is not part of a series
pub const NO_SERIES: &str = "no_series";

/// Top-level directory holding every audio file
pub const AUDIO_ROOT: &str = "audio";

/// Entity kinds that carry an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageCategory {
    Genre,
    Author,
    Series,
    Book,
}

impl ImageCategory {
    /// Directory under the media root holding images of this kind
    pub fn directory(&self) -> &'static str {
        match self {
            Self::Genre => "genres",
            Self::Author => "authors",
            Self::Series => "series",
            Self::Book => "books",
        }
    }
}

impl fmt::Display for ImageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.directory())
    }
}

/// Returns the final component of a client-supplied filename.
///
/// Both `/` and `\` are treated as separators so uploads from any platform
/// cannot escape their directory.
pub fn basename(filename: &str) -> Result<&str> {
    let name = filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(filename)
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        return Err(AppError::invalid_argument(
            "filename",
            format!("'{}' has no usable file name", filename),
        ));
    }
    Ok(name)
}

/// Returns the extension of `filename` including the leading dot, or an empty
/// string when there is none.
pub fn extension(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(0) | None => "",
        Some(idx) => &filename[idx..],
    }
}

/// Builds `{category}/{slug}{ext}` for an entity image.
pub fn image_path(category: ImageCategory, slug: &str, original_filename: &str) -> Result<String> {
    if slug.is_empty() {
        return Err(AppError::invalid_argument("slug", "must not be empty"));
    }
    let name = basename(original_filename)?;
    Ok(format!("{}/{}{}", category.directory(), slug, extension(name)))
}

/// The author/series/book directory triple an audio file lives under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioLocation {
    pub author_part: String,
    pub series_part: String,
    pub book_slug: String,
}

impl AudioLocation {
    /// Builds a location from an explicitly ordered list of author slugs.
    ///
    /// The caller owns the ordering; `Book` always passes slugs in ascending
    /// order so that recomputation is stable.
    pub fn new<S: AsRef<str>>(author_slugs: &[S], series_slug: Option<&str>, book_slug: &str) -> Self {
        let author_part = if author_slugs.is_empty() {
            NO_AUTHOR.to_string()
        } else {
            author_slugs
                .iter()
                .map(|s| s.as_ref())
                .collect::<Vec<_>>()
                .join("_")
        };

        Self {
            author_part,
            series_part: series_slug.unwrap_or(NO_SERIES).to_string(),
            book_slug: book_slug.to_string(),
        }
    }

    /// `audio/{authors}`
    pub fn author_dir(&self) -> String {
        format!("{}/{}", AUDIO_ROOT, self.author_part)
    }

    /// `audio/{authors}/{series}`
    pub fn series_dir(&self) -> String {
        format!("{}/{}", self.author_dir(), self.series_part)
    }

    /// `audio/{authors}/{series}/{book}`
    pub fn book_dir(&self) -> String {
        format!("{}/{}", self.series_dir(), self.book_slug)
    }

    /// Ancestor directories from the deepest up, in pruning order
    pub fn ancestors(&self) -> [String; 3] {
        [self.book_dir(), self.series_dir(), self.author_dir()]
    }
}

impl fmt::Display for AudioLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.book_dir())
    }
}

/// Builds `audio/{authors}/{series}/{book}/{filename}`.
pub fn audio_path(location: &AudioLocation, filename: &str) -> Result<String> {
    let name = basename(filename)?;
    Ok(format!("{}/{}", location.book_dir(), name))
}
