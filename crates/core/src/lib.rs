//! Audioshelf core
//!
//! Domain types, slug generation and canonical storage paths shared by the
//! database, library and CLI crates.

pub mod error;
pub mod paths;
pub mod slug;
pub mod types;

pub use error::{AppError, ErrorSeverity, RecoveryAction, Result};
pub use paths::{audio_path, image_path, AudioLocation, ImageCategory};
pub use slug::slugify;
pub use types::{
    AudioFile, AudioFileId, Author, AuthorId, Book, BookId, BookIdentity, Genre, GenreId, Series,
    SeriesId, Sluggable, Timestamp, Validator,
};
