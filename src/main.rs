use anyhow::Context;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use storage_adapters::config::Config;
use storage_adapters::model::collect_stream;
use storage_adapters::path::is_root_path;
use storage_adapters::{ErrorKind, StorageAdapter, StorageError};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

/// Storage Adapters - one file and directory interface over blob storage, local disk and memory
#[derive(Parser, Debug)]
#[command(name = "storage-adapters")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Override the adapter's default timeout
    #[arg(long)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the directories and files directly inside a directory
    Ls {
        #[arg(default_value = "")]
        path: String,
    },
    /// List every directory and file below a directory
    Tree {
        #[arg(default_value = "")]
        path: String,
    },
    /// Show file metadata
    Stat { path: String },
    /// Create a directory, with missing parents unless --no-parents
    Mkdir {
        path: String,
        #[arg(long)]
        no_parents: bool,
    },
    /// Delete a directory
    Rmdir {
        path: String,
        #[arg(long)]
        recursive: bool,
    },
    /// Upload a local file
    Put { local: PathBuf, remote: String },
    /// Download a file to a local path, or to stdout
    Get { remote: String, local: Option<PathBuf> },
    /// Delete a file
    Rm { path: String },
    /// Report whether a path is a file, a directory or missing
    Exists { path: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    // Load configuration from file
    let config = Config::from_file(&args.config).map_err(anyhow::Error::msg)?;

    // Initialize logging subsystem
    storage_adapters::logging::init_subscriber(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging subsystem: {}", e))?;

    tracing::info!(
        config_file = %args.config.display(),
        backend = ?config.backend,
        "Configuration loaded successfully"
    );

    let mut adapter = StorageAdapter::from_config(&config)?;
    if let Some(seconds) = args.timeout_secs {
        adapter.set_default_timeout(Duration::from_secs(seconds));
    }

    run(&adapter, args.command, args.json).await
}

async fn run(adapter: &StorageAdapter, command: Command, json: bool) -> anyhow::Result<()> {
    let separator = adapter.separator();
    match command {
        Command::Ls { path } => {
            let directories = adapter.list_directories(&path).await?;
            let files = adapter.list_files(&path).await?;
            if json {
                print_json(&serde_json::json!({ "directories": directories, "files": files }))?;
            } else {
                for directory in &directories {
                    println!("{}{}", directory.name, separator);
                }
                for file in &files {
                    println!("{:>12}  {}", file.size, file.name);
                }
            }
        }
        Command::Tree { path } => {
            let directories = adapter.list_directories_recursive(&path).await?;
            let files = adapter.list_files_recursive(&path).await?;
            if json {
                print_json(&serde_json::json!({ "directories": directories, "files": files }))?;
            } else {
                for directory in &directories {
                    println!("{}{}", directory.path, separator);
                }
                for file in &files {
                    println!("{}", file.path);
                }
            }
        }
        Command::Stat { path } => {
            let info = adapter.get_file(&path).await?;
            if json {
                print_json(&info)?;
            } else {
                println!("name:          {}", info.name);
                println!("path:          {}", info.path);
                println!("size:          {}", info.size);
                println!("last modified: {}", info.last_modified.to_rfc2822());
            }
        }
        Command::Mkdir { path, no_parents } => {
            adapter.create_directory(&path, !no_parents).await?;
        }
        Command::Rmdir { path, recursive } => {
            adapter.delete_directory(&path, recursive).await?;
        }
        Command::Put { local, remote } => {
            let file = tokio::fs::File::open(&local)
                .await
                .with_context(|| format!("Failed to open {}", local.display()))?;
            let stream = ReaderStream::new(file)
                .map(|chunk| chunk.map_err(StorageError::from))
                .boxed();
            adapter.save_file(&remote, stream).await?;
            tracing::info!(local = %local.display(), remote = %remote, "Uploaded file");
        }
        Command::Get { remote, local } => {
            let data = collect_stream(adapter.read_file(&remote).await?).await?;
            match local {
                Some(local) => {
                    tokio::fs::write(&local, &data)
                        .await
                        .with_context(|| format!("Failed to write {}", local.display()))?;
                }
                None => {
                    let mut stdout = tokio::io::stdout();
                    stdout.write_all(&data).await?;
                    stdout.flush().await?;
                }
            }
        }
        Command::Rm { path } => {
            adapter.delete_file(&path).await?;
        }
        Command::Exists { path } => {
            let kind = entry_kind(adapter, &path).await?;
            if json {
                print_json(&serde_json::json!({ "path": path, "kind": kind }))?;
            } else {
                println!("{}", kind);
            }
        }
    }
    Ok(())
}

/// Classifies `path` as a file, a directory or missing
///
/// A path the backend cannot address as a file (a blob container, say) is
/// not a file, so it falls through to the directory check.
async fn entry_kind(adapter: &StorageAdapter, path: &str) -> storage_adapters::Result<&'static str> {
    let is_file = if is_root_path(path) {
        false
    } else {
        match adapter.file_exist(path).await {
            Ok(exists) => exists,
            Err(e) if e.kind() == ErrorKind::InvalidPath => false,
            Err(e) => return Err(e),
        }
    };

    if is_file {
        Ok("file")
    } else if adapter.directory_exist(path).await? {
        Ok("directory")
    } else {
        Ok("missing")
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
