use anyhow::{Context, Result};
use audioshelf_config::{Config, ConfigManager};
use audioshelf_library::{LibraryConfig, LibraryManager};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

mod commands;

fn slug_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).required(true).value_name("SLUG").help(help)
}

fn build_cli() -> Command {
    Command::new("audioshelf")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Audiobook catalog with slug-based media storage")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to the config file")
                .global(true),
        )
        .arg(
            Arg::new("database")
                .short('d')
                .long("database")
                .value_name("PATH")
                .help("Path to the database file (overrides config)")
                .global(true),
        )
        .arg(
            Arg::new("media-root")
                .short('m')
                .long("media-root")
                .value_name("DIR")
                .help("Media root directory (overrides config)")
                .global(true),
        )
        .subcommand(Command::new("init").about("Create the config file, database and media root"))
        .subcommand(
            Command::new("genre")
                .about("Manage genres")
                .subcommand_required(true)
                .subcommand(
                    Command::new("add")
                        .about("Add a genre")
                        .arg(Arg::new("name").required(true).value_name("NAME"))
                        .arg(image_arg()),
                )
                .subcommand(Command::new("list").about("List genres"))
                .subcommand(
                    Command::new("rename")
                        .about("Rename a genre")
                        .arg(slug_arg("slug", "Current genre slug"))
                        .arg(Arg::new("name").required(true).value_name("NAME")),
                )
                .subcommand(
                    Command::new("delete")
                        .about("Delete a genre and its image")
                        .arg(slug_arg("slug", "Genre slug")),
                ),
        )
        .subcommand(
            Command::new("author")
                .about("Manage authors")
                .subcommand_required(true)
                .subcommand(
                    Command::new("add")
                        .about("Add an author")
                        .arg(Arg::new("first").required(true).value_name("FIRST_NAME"))
                        .arg(Arg::new("last").required(true).value_name("LAST_NAME"))
                        .arg(
                            Arg::new("description")
                                .long("description")
                                .value_name("TEXT")
                                .default_value(""),
                        )
                        .arg(image_arg()),
                )
                .subcommand(Command::new("list").about("List authors"))
                .subcommand(
                    Command::new("rename")
                        .about("Rename an author and move their books' files")
                        .arg(slug_arg("slug", "Current author slug"))
                        .arg(Arg::new("first").required(true).value_name("FIRST_NAME"))
                        .arg(Arg::new("last").required(true).value_name("LAST_NAME")),
                )
                .subcommand(
                    Command::new("delete")
                        .about("Delete an author; their books are re-filed")
                        .arg(slug_arg("slug", "Author slug")),
                ),
        )
        .subcommand(
            Command::new("series")
                .about("Manage series")
                .subcommand_required(true)
                .subcommand(
                    Command::new("add")
                        .about("Add a series")
                        .arg(Arg::new("title").required(true).value_name("TITLE"))
                        .arg(image_arg()),
                )
                .subcommand(Command::new("list").about("List series"))
                .subcommand(
                    Command::new("rename")
                        .about("Rename a series and move its books' files")
                        .arg(slug_arg("slug", "Current series slug"))
                        .arg(Arg::new("title").required(true).value_name("TITLE")),
                )
                .subcommand(
                    Command::new("delete")
                        .about("Delete a series; its books become standalone")
                        .arg(slug_arg("slug", "Series slug")),
                ),
        )
        .subcommand(
            Command::new("book")
                .about("Manage books")
                .subcommand_required(true)
                .subcommand(
                    Command::new("add")
                        .about("Add a book")
                        .arg(Arg::new("title").required(true).value_name("TITLE"))
                        .arg(
                            Arg::new("author")
                                .short('a')
                                .long("author")
                                .value_name("SLUG")
                                .action(ArgAction::Append)
                                .help("Author slug (repeatable)"),
                        )
                        .arg(
                            Arg::new("genre")
                                .short('g')
                                .long("genre")
                                .value_name("SLUG")
                                .action(ArgAction::Append)
                                .help("Genre slug (repeatable)"),
                        )
                        .arg(
                            Arg::new("series")
                                .short('s')
                                .long("series")
                                .value_name("SLUG")
                                .help("Series slug"),
                        )
                        .arg(image_arg()),
                )
                .subcommand(
                    Command::new("list")
                        .about("List books")
                        .arg(Arg::new("author").long("author").value_name("SLUG"))
                        .arg(Arg::new("series").long("series").value_name("SLUG"))
                        .arg(Arg::new("genre").long("genre").value_name("SLUG")),
                )
                .subcommand(
                    Command::new("info")
                        .about("Show a book with its authors, genres and audio files")
                        .arg(slug_arg("slug", "Book slug")),
                )
                .subcommand(
                    Command::new("rename")
                        .about("Change a book's title and move its files")
                        .arg(slug_arg("slug", "Current book slug"))
                        .arg(Arg::new("title").required(true).value_name("TITLE")),
                )
                .subcommand(
                    Command::new("read")
                        .about("Mark a book as read")
                        .arg(slug_arg("slug", "Book slug"))
                        .arg(
                            Arg::new("unread")
                                .long("unread")
                                .help("Mark as unread instead")
                                .action(ArgAction::SetTrue),
                        ),
                )
                .subcommand(
                    Command::new("delete")
                        .about("Delete a book with its audio files and cover")
                        .arg(slug_arg("slug", "Book slug"))
                        .arg(
                            Arg::new("force")
                                .short('f')
                                .long("force")
                                .help("Skip confirmation prompt")
                                .action(ArgAction::SetTrue),
                        ),
                )
                .subcommand(
                    Command::new("search")
                        .about("Search book titles")
                        .arg(Arg::new("query").required(true).value_name("QUERY"))
                        .arg(
                            Arg::new("limit")
                                .long("limit")
                                .value_name("N")
                                .value_parser(clap::value_parser!(usize))
                                .default_value("50"),
                        ),
                ),
        )
        .subcommand(
            Command::new("audio")
                .about("Manage audio files")
                .subcommand_required(true)
                .subcommand(
                    Command::new("upload")
                        .about("Upload audio files to a book")
                        .arg(slug_arg("book", "Book slug"))
                        .arg(
                            Arg::new("files")
                                .required(true)
                                .num_args(1..)
                                .value_name("FILE"),
                        ),
                )
                .subcommand(
                    Command::new("delete")
                        .about("Delete one audio file")
                        .arg(Arg::new("id").required(true).value_name("AUDIO_ID")),
                ),
        )
        .subcommand(
            Command::new("archive")
                .about("Write a zip of a book's audio files")
                .arg(slug_arg("book", "Book slug"))
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .help("Output path (defaults to <book_slug>.zip)"),
                ),
        )
        .subcommand(
            Command::new("export")
                .about("Export a CSV listing to the export directory")
                .arg(
                    Arg::new("kind")
                        .required(true)
                        .value_parser(["authors", "books"]),
                ),
        )
        .subcommand(Command::new("stats").about("Show catalog statistics"))
}

fn image_arg() -> Arg {
    Arg::new("image")
        .long("image")
        .value_name("FILE")
        .help("Image file to attach")
}

/// Loads the config file, then applies environment and command-line overrides
fn load_config(matches: &ArgMatches) -> Result<(ConfigManager, Config)> {
    let manager = match matches.get_one::<String>("config") {
        Some(path) => ConfigManager::with_file(&PathBuf::from(path)),
        None => ConfigManager::new(),
    }
    .context("Failed to locate config directory")?;

    let mut config = manager
        .load_with_env_overrides()
        .context("Failed to load configuration")?;

    config.app.database_path = manager.resolve_path(&config.app.database_path);
    config.storage.media_root = manager.resolve_path(&config.storage.media_root);
    config.storage.export_dir = manager.resolve_path(&config.storage.export_dir);

    if let Some(path) = matches.get_one::<String>("database") {
        config.app.database_path = PathBuf::from(path);
    }
    if let Some(dir) = matches.get_one::<String>("media-root") {
        config.storage.media_root = PathBuf::from(dir);
    }

    if let Err(errors) = config.validate() {
        let details: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        anyhow::bail!("Invalid configuration: {}", details.join("; "));
    }
    Ok((manager, config))
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();
    let (config_manager, config) = load_config(&matches)?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.app.log_level.to_string()),
    )
    .init();

    if matches.subcommand_name().is_none() {
        build_cli().print_help()?;
        return Ok(());
    }

    if let Some(("init", _)) = matches.subcommand() {
        if config_manager
            .initialize()
            .context("Failed to write default config")?
        {
            println!("Config written to {}", config_manager.config_path().display());
        }
    }

    let library = LibraryManager::new(LibraryConfig::from_config(&config))
        .await
        .context("Failed to open catalog")?;

    match matches.subcommand() {
        Some(("init", _)) => commands::init(&library).await,
        Some(("genre", sub)) => commands::genre(&library, sub).await,
        Some(("author", sub)) => commands::author(&library, sub).await,
        Some(("series", sub)) => commands::series(&library, sub).await,
        Some(("book", sub)) => commands::book(&library, sub).await,
        Some(("audio", sub)) => commands::audio(&library, sub).await,
        Some(("archive", sub)) => commands::archive(&library, sub).await,
        Some(("export", sub)) => commands::export(&library, sub).await,
        Some(("stats", _)) => commands::show_stats(&library).await,
        _ => {
            build_cli().print_help()?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_book_add_collects_repeated_authors() {
        let matches = build_cli()
            .try_get_matches_from([
                "audioshelf",
                "book",
                "add",
                "Good Omens",
                "-a",
                "pratchett_terry",
                "--author",
                "gaiman_neil",
            ])
            .unwrap();
        let (_, book) = matches.subcommand().unwrap();
        let (_, add) = book.subcommand().unwrap();
        let authors: Vec<&String> = add.get_many::<String>("author").unwrap().collect();
        assert_eq!(authors, vec!["pratchett_terry", "gaiman_neil"]);
    }

    #[test]
    fn test_global_overrides() {
        let dir = tempfile::TempDir::new().unwrap();
        let config_file = dir.path().join("config.toml");
        let matches = build_cli()
            .try_get_matches_from([
                "audioshelf",
                "stats",
                "--config",
                config_file.to_str().unwrap(),
                "--media-root",
                "/srv/media",
            ])
            .unwrap();

        let (_, config) = load_config(&matches).unwrap();

        assert_eq!(config.storage.media_root, PathBuf::from("/srv/media"));
        assert_eq!(config.app.database_path, dir.path().join("audioshelf.db"));
    }

    #[test]
    fn test_export_kind_is_checked() {
        assert!(build_cli()
            .try_get_matches_from(["audioshelf", "export", "genres"])
            .is_err());
    }
}
