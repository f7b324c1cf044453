//! Genre, author and series models
//!
//! These entities own a single identifying text from which their slug is
//! derived. An empty derived slug means the entity cannot be saved yet.

use crate::paths::ImageCategory;
use crate::slug::slugify;
use crate::types::common::check_max_len;
use crate::types::{AuthorId, GenreId, SeriesId, Timestamp, Validator};
use serde::{Deserialize, Serialize};

/// Behaviour shared by entities whose slug is derived from their own fields
pub trait Sluggable {
    /// Entity name used in errors and logs
    const ENTITY: &'static str;

    /// Which image directory this entity uses
    const IMAGE_CATEGORY: ImageCategory;

    /// Recomputes the slug from the current identifying fields
    fn compute_slug(&self) -> String;
}

/// A book genre
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: GenreId,
    pub name: String,
    pub slug: String,
    pub image: Option<String>,
    pub created_at: Timestamp,
}

impl Genre {
    /// Creates an unsaved genre; its slug is assigned on save
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: GenreId::new(),
            name: name.into(),
            slug: String::new(),
            image: None,
            created_at: Timestamp::now(),
        }
    }
}

impl Sluggable for Genre {
    const ENTITY: &'static str = "Genre";
    const IMAGE_CATEGORY: ImageCategory = ImageCategory::Genre;

    fn compute_slug(&self) -> String {
        slugify(&self.name)
    }
}

impl Validator for Genre {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push("Genre name cannot be empty".to_string());
        }
        check_max_len(&mut errors, "Genre name", &self.name, 100);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// A book author
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: AuthorId,
    pub first_name: String,
    pub last_name: String,
    pub description: String,
    pub slug: String,
    pub image: Option<String>,
    pub created_at: Timestamp,
}

impl Author {
    /// Creates an unsaved author; its slug is assigned on save
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id: AuthorId::new(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            description: String::new(),
            slug: String::new(),
            image: None,
            created_at: Timestamp::now(),
        }
    }

    /// "First Last", as shown to readers
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl Sluggable for Author {
    const ENTITY: &'static str = "Author";
    const IMAGE_CATEGORY: ImageCategory = ImageCategory::Author;

    /// Last name first. Both names are required.
    fn compute_slug(&self) -> String {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return String::new();
        }
        slugify(&format!("{} {}", self.last_name, self.first_name))
    }
}

impl Validator for Author {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.first_name.trim().is_empty() {
            errors.push("First name cannot be empty".to_string());
        }
        if self.last_name.trim().is_empty() {
            errors.push("Last name cannot be empty".to_string());
        }
        check_max_len(&mut errors, "First name", &self.first_name, 100);
        check_max_len(&mut errors, "Last name", &self.last_name, 100);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// A named series of books
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    pub id: SeriesId,
    pub title: String,
    pub slug: String,
    pub image: Option<String>,
    pub created_at: Timestamp,
}

impl Series {
    /// Creates an unsaved series; its slug is assigned on save
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: SeriesId::new(),
            title: title.into(),
            slug: String::new(),
            image: None,
            created_at: Timestamp::now(),
        }
    }
}

impl Sluggable for Series {
    const ENTITY: &'static str = "Series";
    const IMAGE_CATEGORY: ImageCategory = ImageCategory::Series;

    fn compute_slug(&self) -> String {
        slugify(&self.title)
    }
}

impl Validator for Series {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.title.trim().is_empty() {
            errors.push("Series title cannot be empty".to_string());
        }
        check_max_len(&mut errors, "Series title", &self.title, 200);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
