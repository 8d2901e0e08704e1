use std::path::{Path, PathBuf};

use anyhow::{ensure, Context};
use clap::{Parser, Subcommand};
use png_text_catalog::config::Config;
use png_text_catalog::display::{blob_lines, entry_line};
use png_text_catalog::png::TextDecoder;
use png_text_catalog::{
    export_images, extract_file, scan_directory, vocabulary, ImageQuery, ScanOptions,
    SqliteCatalog, WordIndex,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Settings file [default: ./pngcat.toml]
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Catalog database, overriding the configured path
    #[arg(long, global = true, value_name = "FILE")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register every image under a folder and extract its PNG text
    Scan {
        #[arg(value_name = "DIR")]
        root: PathBuf,

        /// Files per database write
        #[arg(long)]
        batch_size: Option<usize>,

        /// Worker threads for reading and decoding
        #[arg(long)]
        workers: Option<usize>,

        /// Do not draw a progress bar on stderr
        #[arg(long)]
        no_progress: bool,
    },
    /// List catalogued images
    List {
        /// Only images directly in this folder
        #[arg(long)]
        folder: Option<String>,

        /// Substring of file name, memo or PNG text
        #[arg(long)]
        term: Option<String>,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Show one catalogued image
    Info {
        id: i64,

        /// Print PNG text without shortening it
        #[arg(long)]
        full: bool,
    },
    /// Extract PNG text from a file without touching the catalog
    Inspect {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(long)]
        full: bool,
    },
    /// List the folders that contain catalogued images
    Folders,
    /// Set the memo of one or more images
    Memo {
        #[arg(required = true)]
        ids: Vec<i64>,

        #[arg(long)]
        text: String,
    },
    /// Remove images from the catalog (files stay on disk)
    Delete {
        #[arg(required = true)]
        ids: Vec<i64>,

        /// Actually delete; without it only the affected rows are shown
        #[arg(long)]
        yes: bool,
    },
    /// Copy images into a folder, keeping their timestamps
    Export {
        #[arg(required = true)]
        ids: Vec<i64>,

        #[arg(long, value_name = "DIR")]
        dest: PathBuf,
    },
    /// Print the word filter vocabulary
    Words,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref()).context("failed to load settings")?;
    if let Some(database) = cli.database {
        config.database = database;
    }
    run(cli.command, &config)
}

fn open_catalog(config: &Config) -> anyhow::Result<SqliteCatalog> {
    SqliteCatalog::open(&config.database)
        .with_context(|| format!("failed to open {}", config.database.display()))
}

fn run(command: Command, config: &Config) -> anyhow::Result<()> {
    let text_limit = config.display.text_limit;

    match command {
        Command::Scan {
            root,
            batch_size,
            workers,
            no_progress,
        } => {
            let mut options = ScanOptions::from(&config.scan);
            if let Some(n) = batch_size {
                ensure!(n > 0, "--batch-size must be at least 1");
                options.batch_size = n;
            }
            if let Some(n) = workers {
                ensure!(n > 0, "--workers must be at least 1");
                options.workers = Some(n);
            }
            options.progress = !no_progress;

            let mut catalog = open_catalog(config)?;
            let summary = scan_directory(&root, &mut catalog, &options)?;
            println!("found:              {}", summary.found);
            println!("registered:         {}", summary.registered);
            println!("skipped:            {}", summary.skipped);
            println!("metadata updated:   {}", summary.metadata_updated);
            println!("metadata errors:    {}", summary.metadata_errors);
            println!("png info extracted: {}", summary.png_info_extracted);
            println!("png info errors:    {}", summary.png_info_errors);
        }
        Command::List {
            folder,
            term,
            limit,
            offset,
        } => {
            let page = open_catalog(config)?.list(&ImageQuery {
                term,
                folder,
                limit: limit.unwrap_or(config.display.page_size),
                offset,
            })?;
            for image in &page.images {
                let size = match (image.width, image.height) {
                    (Some(w), Some(h)) => format!("{w}x{h}"),
                    _ => "-".to_string(),
                };
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    image.id,
                    size,
                    image.format.as_deref().unwrap_or("-"),
                    image.original_path,
                    image.memo.as_deref().unwrap_or("")
                );
            }
            if page.images.is_empty() {
                println!("{} images", page.total);
            } else {
                println!(
                    "showing {}-{} of {}",
                    offset + 1,
                    offset + page.images.len(),
                    page.total
                );
            }
        }
        Command::Info { id, full } => {
            let record = open_catalog(config)?.get(id)?;
            println!("id:         {}", record.id);
            println!("path:       {}", record.original_path);
            println!("folder:     {}", record.folder_path);
            if let Some(size) = record.file_size {
                println!("size:       {size} bytes");
            }
            if let (Some(w), Some(h)) = (record.width, record.height) {
                println!("dimensions: {w}x{h}");
            }
            if let Some(format) = &record.format {
                println!("format:     {format}");
            }
            if let Some(at) = &record.registered_at {
                println!("registered: {at}");
            }
            if let Some(memo) = &record.memo {
                println!("memo:       {memo}");
            }
            match &record.png_info {
                Some(blob) if full => println!("png info:\n{blob}"),
                Some(blob) => println!("png info:\n{}", blob_lines(blob, text_limit)),
                None => println!("png info:   none"),
            }
        }
        Command::Inspect { file, full } => inspect(&file, full, config)?,
        Command::Folders => {
            for folder in open_catalog(config)?.distinct_folders()? {
                println!("{folder}");
            }
        }
        Command::Memo { ids, text } => {
            let changed = open_catalog(config)?.update_memos(&ids, &text)?;
            println!("updated {changed} of {} images", ids.len());
        }
        Command::Delete { ids, yes } => {
            let mut catalog = open_catalog(config)?;
            let rows = catalog.paths_for(&ids)?;
            if !yes {
                for (id, path) in &rows {
                    println!("would remove {id}\t{}", path.display());
                }
                println!("{} rows; pass --yes to delete", rows.len());
                return Ok(());
            }
            let deleted = catalog.delete(&ids)?;
            println!("deleted {deleted} rows");
        }
        Command::Export { ids, dest } => {
            let sources = open_catalog(config)?.paths_for(&ids)?;
            if sources.len() < ids.len() {
                warn!(
                    requested = ids.len(),
                    found = sources.len(),
                    "some ids are not in the catalog"
                );
            }
            let report = export_images(&sources, &dest)?;
            for (path, reason) in &report.errors {
                println!("failed {}: {reason}", path.display());
            }
            println!("copied {} files to {}", report.copied, dest.display());
        }
        Command::Words => {
            let index = WordIndex::with_policy(config.index.policy()?);
            for word in vocabulary(&open_catalog(config)?, &index)? {
                println!("{word}");
            }
        }
    }
    Ok(())
}

fn inspect(file: &Path, full: bool, config: &Config) -> anyhow::Result<()> {
    let decoder = TextDecoder::new(config.scan.max_inflated_bytes);
    let extraction = extract_file(file, &decoder)
        .with_context(|| format!("failed to read text from {}", file.display()))?;
    let limit = if full { usize::MAX } else { config.display.text_limit };

    if extraction.entries.is_empty() {
        println!("no text chunks");
    }
    for entry in &extraction.entries {
        println!("{}", entry_line(entry, limit));
    }
    for failure in &extraction.failures {
        println!(
            "skipped chunk #{} ({}): {}",
            failure.chunk_index, failure.chunk_type, failure.error
        );
    }
    Ok(())
}
