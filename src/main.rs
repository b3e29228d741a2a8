use clap::{Parser, Subcommand};
use media_ingest::config::{self, CONFIG_FILENAME, UploadConfig};
use media_ingest::imaging::RustBackend;
use media_ingest::ingest::{self, IngestOptions};
use media_ingest::library;
use media_ingest::output;
use media_ingest::store::{AssetStore, FsStore};
use media_ingest::types::{AssetId, MetadataUpdate};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Shared flags for commands that ingest files.
#[derive(clap::Args, Clone)]
struct UploadArgs {
    /// Folder to file the new assets under
    #[arg(long)]
    folder: Option<String>,

    /// Alt text for the new assets
    #[arg(long)]
    alt: Option<String>,

    /// Override images.max_width for this upload
    #[arg(long)]
    max_width: Option<u32>,

    /// Override images.max_height for this upload
    #[arg(long)]
    max_height: Option<u32>,

    /// Override images.quality for this upload (1-100)
    #[arg(long)]
    quality: Option<u32>,

    /// Store even if identical content already exists
    #[arg(long)]
    force: bool,
}

impl From<UploadArgs> for IngestOptions {
    fn from(args: UploadArgs) -> Self {
        IngestOptions {
            folder: args.folder,
            alt_text: args.alt,
            max_width: args.max_width,
            max_height: args.max_height,
            quality: args.quality,
            force_upload: args.force,
        }
    }
}

#[derive(Parser)]
#[command(name = "media-ingest")]
#[command(about = "Upload, optimize and deduplicate media files")]
#[command(long_about = "\
Upload, optimize and deduplicate media files

Every upload is fingerprinted with SHA-256. Identical content is never stored
twice: uploading the same bytes again returns the existing asset.

JPEG, PNG and WebP images are auto-rotated from EXIF, scaled down to fit the
configured box and re-encoded. Other allowed files (GIF, SVG, PDF, DOC) are
stored as-is.

Store layout:

  media-library/
  ├── media.toml          # Config (optional, see gen-config)
  ├── media-index.json    # Asset records
  └── media/              # Stored files, opaque names

Run 'media-ingest gen-config' to generate a documented media.toml.")]
#[command(version)]
struct Cli {
    /// Store root directory
    #[arg(long, default_value = "media-library", global = true)]
    store: PathBuf,

    /// Config file (default: <store>/media.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest files or directories (walked recursively)
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[command(flatten)]
        args: UploadArgs,
    },
    /// Download a URL and ingest it
    Fetch {
        url: String,
        #[command(flatten)]
        args: UploadArgs,
    },
    /// List assets, newest first
    List {
        #[arg(long)]
        folder: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 20)]
        per_page: usize,
    },
    /// Show one asset in detail
    Show { id: u64 },
    /// Edit an asset's title, alt text or description (empty string clears)
    Edit {
        id: u64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        alt: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete an asset and its stored file
    Delete { id: u64 },
    /// Recompute stored file hashes and report drift
    Verify,
    /// Print a stock media.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Upload { paths, args } => {
            let (config, store) = open_store(&cli.store, cli.config.as_deref())?;
            init_thread_pool(&config.processing);
            upload(&store, &config, &paths, args.into())?;
        }
        Command::Fetch { url, args } => {
            let (config, store) = open_store(&cli.store, cli.config.as_deref())?;
            let outcome = ingest::ingest_remote(&store, &config, &url, args.into())?;
            output::print_ingest_outcome(&url, &outcome);
        }
        Command::List {
            folder,
            page,
            per_page,
        } => {
            let (_, store) = open_store(&cli.store, cli.config.as_deref())?;
            let page = library::list_assets(&store, folder.as_deref(), page, per_page)?;
            output::print_asset_page(&page);
        }
        Command::Show { id } => {
            let (_, store) = open_store(&cli.store, cli.config.as_deref())?;
            let asset = library::get_asset(&store, AssetId(id))?;
            output::print_asset_detail(&asset);
        }
        Command::Edit {
            id,
            title,
            alt,
            description,
        } => {
            let update = MetadataUpdate {
                title,
                alt_text: alt,
                description,
            };
            if update.is_empty() {
                return Err("nothing to edit: pass --title, --alt or --description".into());
            }
            let (_, store) = open_store(&cli.store, cli.config.as_deref())?;
            let asset = library::update_metadata(&store, AssetId(id), &update)?;
            output::print_asset_detail(&asset);
        }
        Command::Delete { id } => {
            let (_, store) = open_store(&cli.store, cli.config.as_deref())?;
            let removed = library::delete_asset(&store, AssetId(id))?;
            println!("Deleted #{} {}", removed.id, removed.title);
        }
        Command::Verify => {
            let (_, store) = open_store(&cli.store, cli.config.as_deref())?;
            let checked = store.list()?.len();
            let issues = library::verify(&store)?;
            output::print_verify(&issues, checked);
            if !issues.is_empty() {
                return Err(format!("{} assets failed verification", issues.len()).into());
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load config (`--config`, else `<store>/media.toml`) and open the store.
fn open_store(
    root: &Path,
    config_path: Option<&Path>,
) -> Result<(UploadConfig, FsStore), Box<dyn std::error::Error>> {
    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.join(CONFIG_FILENAME));
    let config = config::load_config(&config_path)?;
    let store = FsStore::open(root)?.with_unique_hashes(config.store.unique_hashes);
    Ok((config, store))
}

/// Ingest every file under `paths`, printing progress as files finish.
fn upload(
    store: &FsStore,
    config: &UploadConfig,
    paths: &[PathBuf],
    options: IngestOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let files = collect_files(paths)?;
    if files.is_empty() {
        return Err("no files to upload".into());
    }

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_ingest_event(&event) {
                println!("{}", line);
            }
        }
    });
    let items = ingest::ingest_batch(
        store,
        &RustBackend::new(),
        config,
        &files,
        &options,
        Some(tx),
    );
    printer
        .join()
        .map_err(|_| "output thread panicked")?;

    println!();
    println!("{}", output::format_batch_summary(&items));
    let failed = items.iter().filter(|i| i.result.is_err()).count();
    if failed > 0 {
        return Err(format!("{failed} of {} uploads failed", items.len()).into());
    }
    Ok(())
}

/// Expand directories into the files under them, skipping hidden entries.
fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>, walkdir::Error> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }
        let walker = WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()));
        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
    }
    Ok(files)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
