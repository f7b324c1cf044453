//! Domain types for Audioshelf
//!
//! - `ids`: identifier newtypes
//! - `catalog`: genres, authors and series
//! - `book`: books, their slug identity and audio files
//! - `common`: shared traits and utilities

mod book;
mod catalog;
mod common;
mod ids;

pub use book::{AudioFile, Book, BookIdentity, PLACEHOLDER_SLUG_PREFIX};
pub use catalog::{Author, Genre, Series, Sluggable};
pub use common::{Timestamp, Validator};
pub use ids::{AudioFileId, AuthorId, BookId, GenreId, SeriesId};
