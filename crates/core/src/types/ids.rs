//! Identifier newtypes for catalog entities

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parses an identifier from its UUID string form
            pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
                Ok(Self(Uuid::parse_str(s)?))
            }

            /// Returns the identifier as a string
            pub fn as_string(&self) -> String {
                self.0.to_string()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Unique identifier for a genre
    GenreId
);
entity_id!(
    /// Unique identifier for an author
    AuthorId
);
entity_id!(
    /// Unique identifier for a series
    SeriesId
);
entity_id!(
    /// Unique identifier for a book
    BookId
);
entity_id!(
    /// Unique identifier for an uploaded audio file
    AudioFileId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(BookId::new(), BookId::new());
        assert_ne!(AuthorId::new(), AuthorId::new());
    }

    #[test]
    fn test_id_string_roundtrip() {
        let id = GenreId::new();
        let parsed = GenreId::from_string(&id.as_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_invalid_id_string() {
        assert!(SeriesId::from_string("not-a-uuid").is_err());
    }

    #[test]
    fn test_display_matches_as_string() {
        let id = AudioFileId::new();
        assert_eq!(id.to_string(), id.as_string());
    }
}
