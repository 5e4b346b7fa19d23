//! Command-line interface for bookshelf.
//!
//! Each invocation opens the current library (from `--library` or the one
//! remembered by `create`/`use`), runs one store operation and exits.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use tokio::fs;

use crate::adapters::FileGateway;
use crate::config;
use crate::core::interchange::export_file_name;
use crate::core::LibraryStore;
use crate::domain::{BookId, BookSummary, DetailPatch, SummaryPatch};

/// Listing descriptions are cut to this many characters
const DESCRIPTION_PREVIEW_CHARS: usize = 100;

/// bookshelf - Personal book library catalog
#[derive(Parser, Debug)]
#[command(name = "bookshelf")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Library to operate on (defaults to the one selected with `use`)
    #[arg(short, long, global = true, env = "BOOKSHELF_LIBRARY")]
    pub library: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List stored libraries
    Libraries,

    /// Create an empty library and select it
    Create {
        /// Library name
        name: String,
    },

    /// Select a library (migrating it if it uses the old format)
    Use {
        /// Library name
        name: String,
    },

    /// Forget the selected library
    Close,

    /// Rename the selected library
    Rename {
        /// New name
        new_name: String,
    },

    /// Delete the selected library from disk
    Drop {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },

    /// List entries, optionally filtered
    List {
        /// Case-insensitive search over author, title and description
        #[arg(short, long)]
        query: Option<String>,
    },

    /// Show one entry with its details
    Show {
        /// Entry number
        id: BookId,
    },

    /// Add a blank entry at the top of the list
    Add,

    /// Edit an entry
    Edit {
        /// Entry number
        id: BookId,

        #[command(flatten)]
        fields: EditFields,
    },

    /// Remove an entry
    Remove {
        /// Entry number
        id: BookId,
    },

    /// Attach images (data URIs, or files containing one) to an entry
    Attach {
        /// Entry number
        id: BookId,

        /// Data URIs or paths to files holding a data URI
        #[arg(required = true)]
        sources: Vec<String>,
    },

    /// Remove an image from an entry's gallery
    Detach {
        /// Entry number
        id: BookId,

        /// Image position (1-based, as shown by `show`)
        position: usize,
    },

    /// Export the selected library as JSON
    Export {
        /// Output directory (defaults to the configured export directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print to stdout instead of writing a file
        #[arg(long)]
        stdout: bool,
    },

    /// Replace the selected library's contents with a JSON file
    Import {
        /// JSON file (old array format or summary/details format)
        file: PathBuf,
    },

    /// Show resolved configuration (debug)
    Config,
}

/// Field flags for `edit`
#[derive(Args, Debug, Default)]
pub struct EditFields {
    #[arg(long)]
    pub author: Option<String>,

    #[arg(long)]
    pub title: Option<String>,

    /// Short description shown in listings
    #[arg(long)]
    pub description: Option<String>,

    /// Extended description
    #[arg(long)]
    pub extended: Option<String>,

    #[arg(long)]
    pub publisher: Option<String>,

    #[arg(long)]
    pub year: Option<String>,

    #[arg(long)]
    pub isbn: Option<String>,

    #[arg(long)]
    pub pages: Option<String>,

    #[arg(long)]
    pub comments: Option<String>,
}

impl EditFields {
    fn into_patches(self) -> (SummaryPatch, DetailPatch) {
        (
            SummaryPatch {
                author: self.author,
                title: self.title,
                description: self.description,
            },
            DetailPatch {
                extended_description: self.extended,
                publisher: self.publisher,
                year: self.year,
                isbn: self.isbn,
                pages: self.pages,
                comments: self.comments,
            },
        )
    }
}

type Store = LibraryStore<FileGateway>;

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let mut store = open_store()?;
        let selected = self.library;

        match self.command {
            Commands::Libraries => list_libraries(&store, selected).await,
            Commands::Create { name } => create_library(&mut store, &name).await,
            Commands::Use { name } => use_library(&mut store, &name).await,
            Commands::Close => close_library().await,
            Commands::Config => show_config(),
            command => {
                select(&mut store, selected).await?;
                run_on_library(&mut store, command).await
            }
        }
    }
}

/// Commands that need a selected library
async fn run_on_library(store: &mut Store, command: Commands) -> Result<()> {
    match command {
        Commands::Rename { new_name } => rename_library(store, &new_name).await,
        Commands::Drop { yes } => drop_library(store, yes).await,
        Commands::List { query } => list_entries(store, query.as_deref()),
        Commands::Show { id } => show_entry(store, id),
        Commands::Add => add_entry(store).await,
        Commands::Edit { id, fields } => edit_entry(store, id, fields).await,
        Commands::Remove { id } => remove_entry(store, id).await,
        Commands::Attach { id, sources } => attach_images(store, id, &sources).await,
        Commands::Detach { id, position } => detach_image(store, id, position).await,
        Commands::Export { output, stdout } => export_library(store, output, stdout).await,
        Commands::Import { file } => import_library(store, &file).await,
        Commands::Libraries
        | Commands::Create { .. }
        | Commands::Use { .. }
        | Commands::Close
        | Commands::Config => Ok(()),
    }
}

fn open_store() -> Result<Store> {
    let gateway = FileGateway::from_config()?;
    Ok(LibraryStore::new(gateway).with_limits(config::image_limits()?))
}

/// Load the library named on the command line, or the remembered one
async fn select(store: &mut Store, selected: Option<String>) -> Result<()> {
    let name = match selected {
        Some(name) => name,
        None => read_current().await?.context(
            "No library selected. Use 'bookshelf use <name>', 'bookshelf create <name>' or --library",
        )?,
    };

    store
        .load_library(&name)
        .await
        .with_context(|| format!("Failed to open library '{}'", name))
}

async fn read_current() -> Result<Option<String>> {
    let path = config::config()?.current_library_file();

    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let name = content.trim();

    Ok((!name.is_empty()).then(|| name.to_string()))
}

async fn write_current(name: &str) -> Result<()> {
    let path = config::config()?.current_library_file();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    fs::write(&path, format!("{}\n", name))
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

async fn clear_current() -> Result<()> {
    let path = config::config()?.current_library_file();

    match fs::remove_file(&path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}

/// List stored libraries, marking the selected one
async fn list_libraries(store: &Store, selected: Option<String>) -> Result<()> {
    let names = store.list_libraries().await?;

    if names.is_empty() {
        println!("No libraries yet. Use 'bookshelf create <name>' to start one.");
        return Ok(());
    }

    let current = match selected {
        Some(name) => Some(name),
        None => read_current().await?,
    };

    for name in names {
        let marker = if current.as_deref() == Some(name.as_str()) { "*" } else { " " };
        println!("{} {}", marker, name);
    }

    Ok(())
}

async fn create_library(store: &mut Store, name: &str) -> Result<()> {
    store.create_library(name).await?;

    let name = store.current_name().unwrap_or(name).to_string();
    write_current(&name).await?;

    eprintln!("Library \"{}\" created", name);
    Ok(())
}

async fn use_library(store: &mut Store, name: &str) -> Result<()> {
    store
        .load_library(name)
        .await
        .with_context(|| format!("Failed to open library '{}'", name))?;

    let name = store.current_name().unwrap_or(name).to_string();
    write_current(&name).await?;

    let entries = store.library()?.len();
    eprintln!("Library \"{}\" selected ({} entries)", name, entries);
    Ok(())
}

async fn close_library() -> Result<()> {
    clear_current().await?;
    eprintln!("No library selected");
    Ok(())
}

async fn rename_library(store: &mut Store, new_name: &str) -> Result<()> {
    let old_name = store.current_name().unwrap_or_default().to_string();
    store.rename_library(new_name).await?;

    let new_name = store.current_name().unwrap_or(new_name).to_string();
    if read_current().await?.as_deref() == Some(old_name.as_str()) {
        write_current(&new_name).await?;
    }

    eprintln!("Library renamed to \"{}\"", new_name);
    Ok(())
}

async fn drop_library(store: &mut Store, confirmed: bool) -> Result<()> {
    let name = store.current_name().unwrap_or_default().to_string();

    if !confirmed {
        anyhow::bail!(
            "Refusing to delete library \"{}\" without --yes",
            name
        );
    }

    store.delete_library().await?;
    if read_current().await?.as_deref() == Some(name.as_str()) {
        clear_current().await?;
    }

    eprintln!("Library \"{}\" deleted", name);
    Ok(())
}

/// List entries of the selected library
fn list_entries(store: &Store, query: Option<&str>) -> Result<()> {
    let library = store.library()?;
    let name = store.current_name().unwrap_or_default();

    if library.is_empty() {
        println!("No books in \"{}\". Use 'bookshelf add' to start.", name);
        return Ok(());
    }

    let entries = store.search(query.unwrap_or(""))?;

    if entries.is_empty() {
        println!("No results found for: {}", query.unwrap_or_default());
        return Ok(());
    }

    println!(
        "{:<5} {:<25} {:<30} {:<8} {}",
        "NO", "AUTHOR", "TITLE", "PHOTO", "DESCRIPTION"
    );
    println!("{}", "-".repeat(100));

    for entry in &entries {
        let images = library.detail_or_default(entry.id).images.len();
        println!(
            "{:<5} {:<25} {:<30} {:<8} {}",
            entry.id,
            truncate(&entry.author, 25),
            truncate(&entry.title, 30),
            photo_label(entry, images),
            truncate(&entry.description, DESCRIPTION_PREVIEW_CHARS)
        );
    }

    println!("\nTotal: {} of {} entries", entries.len(), library.len());
    Ok(())
}

/// Show one entry
fn show_entry(store: &Store, id: BookId) -> Result<()> {
    let (summary, detail) = store.entry(id)?;
    let title = if summary.title.is_empty() {
        "New book".to_string()
    } else {
        summary.title.clone()
    };

    println!("#{} {}", summary.id, title);
    println!("  Author:      {}", summary.author);
    println!("  Summary:     {}", summary.description);
    println!("  Publisher:   {}", detail.additional_info.publisher);
    println!("  Year:        {}", detail.additional_info.year);
    println!("  ISBN:        {}", detail.additional_info.isbn);
    println!("  Pages:       {}", detail.additional_info.pages);
    println!("  Comments:    {}", detail.comments);
    if !detail.extended_description.is_empty() {
        println!("\n{}\n", detail.extended_description);
    }

    if detail.images.is_empty() {
        println!("  Images:      none");
    } else {
        println!("  Images:");
        for (index, image) in detail.images.iter().enumerate() {
            let marker = if *image == summary.main_image { " (main)" } else { "" };
            println!("    {}. {}{}", index + 1, truncate(image, 48), marker);
        }
    }

    Ok(())
}

async fn add_entry(store: &mut Store) -> Result<()> {
    let id = store.add_entry().await?;
    eprintln!("New entry added as #{}", id);
    println!("{}", id);
    Ok(())
}

async fn edit_entry(store: &mut Store, id: BookId, fields: EditFields) -> Result<()> {
    let (summary_patch, detail_patch) = fields.into_patches();

    if summary_patch.is_empty() && detail_patch.is_empty() {
        anyhow::bail!("Nothing to change. Pass at least one field, e.g. --title");
    }

    store.update_entry(id, summary_patch, detail_patch).await?;
    eprintln!("Entry #{} saved", id);
    Ok(())
}

async fn remove_entry(store: &mut Store, id: BookId) -> Result<()> {
    let removed = store.delete_entry(id).await?;
    eprintln!("Entry #{} removed ({})", id, display_title(&removed));
    Ok(())
}

async fn attach_images(store: &mut Store, id: BookId, sources: &[String]) -> Result<()> {
    let mut images = Vec::with_capacity(sources.len());

    for source in sources {
        if source.starts_with("data:") {
            images.push(source.clone());
        } else {
            let content = fs::read_to_string(source)
                .await
                .with_context(|| format!("Failed to read image source: {}", source))?;
            images.push(content.trim().to_string());
        }
    }

    let added = store.add_images(id, images).await?;
    eprintln!("{} image(s) added to entry #{}", added, id);
    Ok(())
}

async fn detach_image(store: &mut Store, id: BookId, position: usize) -> Result<()> {
    let index = position
        .checked_sub(1)
        .context("Image positions start at 1")?;

    store.remove_image(id, index).await?;
    eprintln!("Image {} removed from entry #{}", position, id);
    Ok(())
}

async fn export_library(store: &Store, output: Option<PathBuf>, stdout: bool) -> Result<()> {
    let json = store.export_json()?;

    if stdout {
        println!("{}", json);
        return Ok(());
    }

    let name = store.current_name().unwrap_or_default();
    let dir = match output {
        Some(dir) => dir,
        None => config::exports_dir()?,
    };
    let path = dir.join(export_file_name(name, Local::now().date_naive()));

    write_export(&dir, &path, &json).await?;
    eprintln!("Library \"{}\" exported to {}", name, path.display());
    Ok(())
}

async fn write_export(dir: &Path, path: &Path, json: &str) -> Result<()> {
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create export directory: {}", dir.display()))?;
    fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write export: {}", path.display()))
}

async fn import_library(store: &mut Store, file: &Path) -> Result<()> {
    let content = fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read import file: {}", file.display()))?;

    let entries = store.import_json(&content).await?;
    eprintln!("Imported {} entries", entries);
    Ok(())
}

/// Show the resolved configuration (for debugging)
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("Bookshelf Configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:      {}", cfg.home.display());
    println!("  Libraries: {}", cfg.libraries.display());
    println!("  Exports:   {}", cfg.exports.display());
    println!("  Current:   {}", cfg.current_library_file().display());
    println!();
    println!("Images:");
    println!("  Max size:  {} bytes", cfg.images.max_image_bytes);

    Ok(())
}

fn display_title(summary: &BookSummary) -> &str {
    if summary.title.is_empty() {
        "untitled"
    } else {
        &summary.title
    }
}

fn photo_label(summary: &BookSummary, images: usize) -> String {
    match (summary.has_main_image() || images > 0, images) {
        (false, _) => "none".to_string(),
        (true, n) if n > 1 => format!("yes ({})", n),
        (true, _) => "yes".to_string(),
    }
}

/// Cut `text` to `max` characters, marking the cut with "..."
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}
