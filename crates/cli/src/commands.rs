use anyhow::{anyhow, bail, Context, Result};
use audioshelf_core::{AudioFileId, Book};
use audioshelf_library::{AuthorChanges, CascadeReport, LibraryManager, NewBook};
use clap::ArgMatches;
use console::style;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

#[cfg(test)]
mod tests;

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(|s| s.as_str())
        .ok_or_else(|| anyhow!("Missing argument: {}", name))
}

/// Opens a local file for upload and returns its name with a reader
fn open_upload(path: &Path) -> Result<(String, Box<dyn Read + Send>)> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Not a file path: {}", path.display()))?
        .to_string();
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    log::debug!("Uploading {} as {}", path.display(), name);
    Ok((name, Box::new(BufReader::new(file))))
}

fn ok(message: impl std::fmt::Display) {
    println!("{} {}", style("✓").green().bold(), message);
}

fn print_cascade(report: &CascadeReport) {
    for moved in &report.moved {
        println!("  moved {} -> {}", moved.from, style(&moved.to).dim());
    }
    for dir in &report.pruned_dirs {
        println!("  removed empty {}", dir);
    }
    for warning in &report.warnings {
        println!("  {} {}", style("!").yellow().bold(), warning);
    }
}

/// Prepares an empty catalog
pub async fn init(library: &LibraryManager) -> Result<()> {
    let config = library.config();
    std::fs::create_dir_all(&config.storage.media_root).with_context(|| {
        format!(
            "Failed to create media root {}",
            config.storage.media_root.display()
        )
    })?;

    ok("Catalog ready");
    println!("  Database:   {}", config.database_path.display());
    println!("  Media root: {}", config.storage.media_root.display());
    println!("  Exports:    {}", config.storage.export_dir.display());
    Ok(())
}

pub async fn genre(library: &LibraryManager, matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("add", sub)) => {
            let mut genre = library
                .create_genre(required(sub, "name")?)
                .await
                .context("Failed to add genre")?;
            if let Some(image) = sub.get_one::<String>("image") {
                let (name, reader) = open_upload(Path::new(image))?;
                genre = library
                    .set_genre_image(genre.id, &name, reader)
                    .await
                    .context("Failed to store genre image")?;
            }
            ok(format!("Genre added: {} ({})", genre.name, genre.slug));
        }
        Some(("list", _)) => {
            let genres = library.list_genres().await.context("Failed to list genres")?;
            if genres.is_empty() {
                println!("No genres yet.");
            }
            for genre in genres {
                println!("{:<30} {}", style(&genre.slug).cyan(), genre.name);
            }
        }
        Some(("rename", sub)) => {
            let genre = library.genre_by_slug(required(sub, "slug")?).await?;
            let renamed = library
                .rename_genre(genre.id, required(sub, "name")?)
                .await
                .context("Failed to rename genre")?;
            ok(format!("Genre renamed: {} -> {}", genre.slug, renamed.slug));
        }
        Some(("delete", sub)) => {
            let genre = library.genre_by_slug(required(sub, "slug")?).await?;
            library
                .delete_genre(genre.id)
                .await
                .context("Failed to delete genre")?;
            ok(format!("Genre deleted: {}", genre.name));
        }
        _ => bail!("Unknown genre command"),
    }
    Ok(())
}

pub async fn author(library: &LibraryManager, matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("add", sub)) => {
            let mut author = library
                .create_author(
                    required(sub, "first")?,
                    required(sub, "last")?,
                    sub.get_one::<String>("description")
                        .map(|s| s.as_str())
                        .unwrap_or_default(),
                )
                .await
                .context("Failed to add author")?;
            if let Some(image) = sub.get_one::<String>("image") {
                let (name, reader) = open_upload(Path::new(image))?;
                author = library
                    .set_author_image(author.id, &name, reader)
                    .await
                    .context("Failed to store author image")?;
            }
            ok(format!("Author added: {} ({})", author.full_name(), author.slug));
        }
        Some(("list", _)) => {
            let authors = library.list_authors().await.context("Failed to list authors")?;
            if authors.is_empty() {
                println!("No authors yet.");
            }
            for author in authors {
                println!("{:<30} {}", style(&author.slug).cyan(), author.full_name());
            }
        }
        Some(("rename", sub)) => {
            let author = library.author_by_slug(required(sub, "slug")?).await?;
            let updated = library
                .update_author(
                    author.id,
                    AuthorChanges::rename(required(sub, "first")?, required(sub, "last")?),
                )
                .await
                .context("Failed to rename author")?;
            ok(format!("Author renamed: {} -> {}", author.slug, updated.entity.slug));
            print_cascade(&updated.cascade);
        }
        Some(("delete", sub)) => {
            let author = library.author_by_slug(required(sub, "slug")?).await?;
            let report = library
                .delete_author(author.id)
                .await
                .context("Failed to delete author")?;
            ok(format!("Author deleted: {}", author.full_name()));
            print_cascade(&report);
        }
        _ => bail!("Unknown author command"),
    }
    Ok(())
}

pub async fn series(library: &LibraryManager, matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("add", sub)) => {
            let mut entry = library
                .create_series(required(sub, "title")?)
                .await
                .context("Failed to add series")?;
            if let Some(image) = sub.get_one::<String>("image") {
                let (name, reader) = open_upload(Path::new(image))?;
                entry = library
                    .set_series_image(entry.id, &name, reader)
                    .await
                    .context("Failed to store series image")?;
            }
            ok(format!("Series added: {} ({})", entry.title, entry.slug));
        }
        Some(("list", _)) => {
            let all = library.list_series().await.context("Failed to list series")?;
            if all.is_empty() {
                println!("No series yet.");
            }
            for entry in all {
                println!("{:<30} {}", style(&entry.slug).cyan(), entry.title);
            }
        }
        Some(("rename", sub)) => {
            let entry = library.series_by_slug(required(sub, "slug")?).await?;
            let updated = library
                .rename_series(entry.id, required(sub, "title")?)
                .await
                .context("Failed to rename series")?;
            ok(format!("Series renamed: {} -> {}", entry.slug, updated.entity.slug));
            print_cascade(&updated.cascade);
        }
        Some(("delete", sub)) => {
            let entry = library.series_by_slug(required(sub, "slug")?).await?;
            let report = library
                .delete_series(entry.id)
                .await
                .context("Failed to delete series")?;
            ok(format!("Series deleted: {}", entry.title));
            print_cascade(&report);
        }
        _ => bail!("Unknown series command"),
    }
    Ok(())
}

pub async fn book(library: &LibraryManager, matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("add", sub)) => add_book(library, sub).await,
        Some(("list", sub)) => list_books(library, sub).await,
        Some(("info", sub)) => show_book_info(library, required(sub, "slug")?).await,
        Some(("rename", sub)) => {
            let book = library.book_by_slug(required(sub, "slug")?).await?;
            let updated = library
                .rename_book(book.id, required(sub, "title")?)
                .await
                .context("Failed to rename book")?;
            ok(format!("Book renamed: {} -> {}", book.slug, updated.entity.slug));
            print_cascade(&updated.cascade);
            Ok(())
        }
        Some(("read", sub)) => {
            let book = library.book_by_slug(required(sub, "slug")?).await?;
            let is_read = !sub.get_flag("unread");
            library
                .set_book_read(book.id, is_read)
                .await
                .context("Failed to update book")?;
            let state = if is_read { "read" } else { "unread" };
            ok(format!("Marked '{}' as {}", book.title, state));
            Ok(())
        }
        Some(("delete", sub)) => delete_book(library, sub).await,
        Some(("search", sub)) => {
            let query = required(sub, "query")?;
            let limit = sub.get_one::<usize>("limit").copied().unwrap_or(50);
            let results = library
                .search_books(query, limit)
                .await
                .context("Failed to search books")?;
            if results.is_empty() {
                println!("No books found matching '{}'", query);
                return Ok(());
            }
            println!("\n{} Search Results for '{}'", style(results.len()).bold().cyan(), query);
            println!("{}", "=".repeat(80));
            for book in &results {
                print_book_summary(book);
            }
            Ok(())
        }
        _ => bail!("Unknown book command"),
    }
}

async fn add_book(library: &LibraryManager, matches: &ArgMatches) -> Result<()> {
    let mut new = NewBook::new(required(matches, "title")?);

    for slug in matches.get_many::<String>("author").into_iter().flatten() {
        let author = library
            .author_by_slug(slug)
            .await
            .with_context(|| format!("Unknown author '{}'", slug))?;
        new = new.with_author(author.id);
    }
    for slug in matches.get_many::<String>("genre").into_iter().flatten() {
        let genre = library
            .genre_by_slug(slug)
            .await
            .with_context(|| format!("Unknown genre '{}'", slug))?;
        new = new.with_genre(genre.id);
    }
    if let Some(slug) = matches.get_one::<String>("series") {
        let entry = library
            .series_by_slug(slug)
            .await
            .with_context(|| format!("Unknown series '{}'", slug))?;
        new = new.in_series(entry.id);
    }

    let mut book = library
        .create_book(new)
        .await
        .context("Failed to add book")?;
    if let Some(image) = matches.get_one::<String>("image") {
        let (name, reader) = open_upload(Path::new(image))?;
        book = library
            .set_book_image(book.id, &name, reader)
            .await
            .context("Failed to store cover")?;
    }

    ok("Book added successfully!");
    println!("  Title: {}", book.title);
    println!("  Slug:  {}", book.slug);
    Ok(())
}

async fn list_books(library: &LibraryManager, matches: &ArgMatches) -> Result<()> {
    let books = if let Some(slug) = matches.get_one::<String>("author") {
        library.books_by_author(slug).await
    } else if let Some(slug) = matches.get_one::<String>("series") {
        library.books_by_series(slug).await
    } else if let Some(slug) = matches.get_one::<String>("genre") {
        library.books_by_genre(slug).await
    } else {
        library.list_books().await
    }
    .context("Failed to list books")?;

    if books.is_empty() {
        println!("No books found. Use 'book add' to create one.");
        return Ok(());
    }

    println!("\n{} Books in Library", style(books.len()).bold().cyan());
    println!("{}", "=".repeat(80));
    for book in &books {
        print_book_summary(book);
    }
    Ok(())
}

async fn show_book_info(library: &LibraryManager, slug: &str) -> Result<()> {
    let details = library
        .book_details(slug)
        .await
        .context("Failed to get book")?;
    let book = &details.book;

    println!("\n{}", style("Book Information").bold().cyan());
    println!("{}", "=".repeat(80));
    println!("Title: {}", style(&book.title).bold());
    println!("Slug: {}", book.slug);
    if !details.authors.is_empty() {
        let names: Vec<String> = details.authors.iter().map(|a| a.full_name()).collect();
        println!("Authors: {}", names.join(", "));
    }
    if let Some(series) = &details.series {
        println!("Series: {}", series.title);
    }
    if !details.genres.is_empty() {
        let names: Vec<&str> = details.genres.iter().map(|g| g.name.as_str()).collect();
        println!("Genres: {}", names.join(", "));
    }
    println!("Read: {}", if book.is_read { "Yes" } else { "No" });
    if let Some(image) = &book.image {
        println!("Cover: {}", image);
    }

    println!(
        "\nAudio Files ({}, {}):",
        details.audio_files.len(),
        format_size(details.total_bytes())
    );
    for file in &details.audio_files {
        println!(
            "  {}  {:<40} {}",
            style(file.id.as_string()).dim(),
            file.filename,
            format_size(file.size_bytes)
        );
    }
    Ok(())
}

async fn delete_book(library: &LibraryManager, matches: &ArgMatches) -> Result<()> {
    let book = library.book_by_slug(required(matches, "slug")?).await?;

    if !matches.get_flag("force") {
        println!("Are you sure you want to delete '{}'? (y/N)", book.title);
        let mut input = String::new();
        std::io::stdin()
            .read_line(&mut input)
            .context("Failed to read input")?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Deletion cancelled.");
            return Ok(());
        }
    }

    log::info!("Deleting book {}", book.slug);
    let report = library
        .delete_book(book.id)
        .await
        .context("Failed to delete book")?;
    ok(format!("Book deleted: {}", book.title));
    print_cascade(&report);
    Ok(())
}

pub async fn audio(library: &LibraryManager, matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("upload", sub)) => {
            let book = library.book_by_slug(required(sub, "book")?).await?;
            for path in sub.get_many::<String>("files").into_iter().flatten() {
                let (name, reader) = open_upload(Path::new(path))?;
                let file = library
                    .upload_audio(book.id, &name, reader)
                    .await
                    .with_context(|| format!("Failed to upload {}", path))?;
                ok(format!("{} ({})", file.path, format_size(file.size_bytes)));
            }
        }
        Some(("delete", sub)) => {
            let id = AudioFileId::from_string(required(sub, "id")?)
                .context("Invalid audio file ID format")?;
            let report = library
                .delete_audio_file(id)
                .await
                .context("Failed to delete audio file")?;
            ok("Audio file deleted");
            print_cascade(&report);
        }
        _ => bail!("Unknown audio command"),
    }
    Ok(())
}

pub async fn archive(library: &LibraryManager, matches: &ArgMatches) -> Result<()> {
    let slug = required(matches, "book")?;
    let archive = library
        .book_archive(slug)
        .await
        .context("Failed to build archive")?;

    let output = matches
        .get_one::<String>("output")
        .cloned()
        .unwrap_or_else(|| archive.download_name.clone());
    archive
        .save_to(Path::new(&output))
        .with_context(|| format!("Failed to write {}", output))?;

    ok(format!(
        "Wrote {} with {} file(s), {}",
        output,
        archive.summary.entries,
        format_size(archive.summary.bytes)
    ));
    for path in archive.summary.missing.iter().chain(&archive.summary.dropped) {
        println!("  {} skipped {}", style("!").yellow().bold(), path);
    }
    Ok(())
}

pub async fn export(library: &LibraryManager, matches: &ArgMatches) -> Result<()> {
    let summary = match required(matches, "kind")? {
        "authors" => library.export_authors().await,
        "books" => library.export_books().await,
        other => bail!("Unsupported export: {}", other),
    }
    .context("Failed to export")?;

    ok(format!(
        "Exported {} row(s) to {}",
        summary.rows,
        summary.path.display()
    ));
    Ok(())
}

/// Show catalog statistics
pub async fn show_stats(library: &LibraryManager) -> Result<()> {
    let stats = library.stats().await.context("Failed to gather statistics")?;

    println!("\n{}", style("Catalog Statistics").bold().cyan());
    println!("{}", "=".repeat(80));
    println!("Books: {} ({} read)", style(stats.books).bold(), stats.read_books);
    println!("Authors: {}", style(stats.authors).bold());
    println!("Series: {}", style(stats.series).bold());
    println!("Genres: {}", style(stats.genres).bold());
    println!("Audio Files: {}", style(stats.audio_files).bold());
    println!("Total Size: {}", format_size(stats.audio_bytes.max(0) as u64));
    Ok(())
}

fn print_book_summary(book: &Book) {
    println!("\n{}", style(&book.title).bold());
    print!("  {}", book.slug);
    if book.is_read {
        print!("  {}", style("read").green());
    }
    println!();
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
