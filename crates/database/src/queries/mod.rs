//! Database query operations organized by entity

pub mod audio_files;
pub mod authors;
pub mod books;
pub mod genres;
pub mod series;
pub mod stats;

pub use audio_files::{
    count_book_audio_files, create_audio_file, delete_audio_file, find_book_audio_file,
    get_audio_file, get_book_audio_files, update_audio_file_path, update_audio_file_upload,
};
pub use authors::{
    create_author, delete_author, find_author_by_slug, get_author, get_book_authors, list_authors,
    update_author,
};
pub use books::{
    create_book, delete_book, find_book_by_slug, get_book, get_books_by_author,
    get_books_by_genre, get_books_by_series, list_books, search_books, set_book_authors,
    set_book_genres, set_book_read, update_book,
};
pub use genres::{
    create_genre, delete_genre, find_genre_by_slug, get_book_genres, get_genre, list_genres,
    update_genre,
};
pub use series::{
    create_series, delete_series, find_series_by_slug, get_series, list_series, update_series,
};
pub use stats::{catalog_stats, CatalogStats};
