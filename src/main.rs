use clap::{Parser, Subcommand};
use photo_feed::blob::BlobStore;
use photo_feed::composer::Composer;
use photo_feed::config::{self, AppConfig};
use photo_feed::import::{FileItem, PickedItem};
use photo_feed::render;
use photo_feed::store::PostStore;
use photo_feed::types::PostId;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "photo-feed")]
#[command(about = "Caption photos with hashtags and keep them in a local feed")]
#[command(long_about = "\
Caption photos with hashtags and keep them in a local feed

Hashtags in a caption become the post's tags and are removed from the
caption text:

  photo-feed post --image dawn.jpg --caption \"Sunset #vibes #ocean\"
    → caption \"Sunset\", tags #vibes #ocean

Data directory layout:

  .photo-feed/
  ├── config.toml     # Optional settings (see gen-config)
  ├── feed.db         # Posts and tags
  └── blobs/          # Image payloads, keyed by SHA-256

Set RUST_LOG (e.g. RUST_LOG=photo_feed=debug) for diagnostics on stderr.")]
#[command(version)]
struct Cli {
    /// Directory holding the database, image blobs and config.toml
    #[arg(long, default_value = ".photo-feed", global = true)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Save a new post from a caption and an optional photo
    Post {
        /// Caption text; hashtags become tags
        #[arg(long, default_value = "")]
        caption: String,
        /// Photo to attach
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Show every saved post, oldest first
    Feed {
        /// Print posts as JSON instead of a grid
        #[arg(long)]
        json: bool,
        /// Grid columns (overrides feed.columns)
        #[arg(long)]
        columns: Option<usize>,
    },
    /// Write the feed as a static HTML page with its images
    ExportHtml {
        /// Output directory
        out_dir: PathBuf,
    },
    /// Delete a post and its tags
    Delete {
        /// Post id as shown by `feed --json`
        id: i64,
    },
    /// Remove image payloads no post references
    Gc,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "photo_feed=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Post { caption, image } => {
            let (config, store) = open_store(&cli.data_dir)?;
            let mut composer = Composer::new(config.import.importer());
            let items: Vec<Box<dyn PickedItem>> = image
                .into_iter()
                .map(|path| Box::new(FileItem::new(path)) as Box<dyn PickedItem>)
                .collect();
            let had_image = !items.is_empty();
            composer.select(items).await;
            if let Some(message) = composer.error_message() {
                return Err(message.into());
            }
            if had_image && composer.image_bytes().is_none() {
                return Err("the selected photo had no image data".into());
            }
            composer.set_caption(caption);
            let post = composer.save(&store)?;
            render::print_saved_post(&post);
        }
        Command::Feed { json, columns } => {
            let (config, store) = open_store(&cli.data_dir)?;
            let mut feed = store.subscribe();
            let posts = feed.current();
            if json {
                println!("{}", serde_json::to_string_pretty(&*posts)?);
            } else {
                render::print_feed(&posts, columns.unwrap_or(config.feed.columns));
            }
        }
        Command::ExportHtml { out_dir } => {
            let (config, store) = open_store(&cli.data_dir)?;
            let summary = render::export_feed_html(&store, &out_dir, config.feed.columns)?;
            println!(
                "Exported {} posts, {} images → {}",
                summary.posts,
                summary.images,
                out_dir.join("index.html").display()
            );
        }
        Command::Delete { id } => {
            let (_, store) = open_store(&cli.data_dir)?;
            if store.delete(PostId(id))? {
                println!("Deleted post {}", id);
            } else {
                return Err(format!("no post with id {}", id).into());
            }
        }
        Command::Gc => {
            let (_, store) = open_store(&cli.data_dir)?;
            let removed = store.collect_garbage()?;
            println!("Removed {} orphaned images", removed.len());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load the data directory's config, then open the blob directory and
/// database it names.
fn open_store(data_dir: &Path) -> Result<(AppConfig, PostStore), Box<dyn std::error::Error>> {
    let config = config::load_config(data_dir)?;
    let blobs = BlobStore::open(config.storage.blobs_path(data_dir))?;
    let store = PostStore::open(&config.storage.database_path(data_dir), blobs)?;
    Ok((config, store))
}
