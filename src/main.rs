//! Photoframe - image cache maintenance for the photo slideshow
#![allow(clippy::uninlined_format_args)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use photoframe::cache::{CacheSettings, ImageCache};
use photoframe::fetch::HttpDownloader;
use photoframe::logging::{self, TracingLogger};
use photoframe::{Config, ImageDescriptor};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (RUST_LOG=debug for verbose output)
    logging::init_tracing();

    // Parse CLI arguments
    let command = parse_args()?;
    match command {
        Command::Help => {
            print_help();
            return Ok(());
        }
        Command::Version => {
            print_version();
            return Ok(());
        }
        _ => {}
    }

    let config = Config::load()?;
    let logger = TracingLogger::shared();
    let settings = config.cache_settings(logger.as_ref());

    if let Command::Config = command {
        return show_config(&config, &settings);
    }

    let cache = ImageCache::new(settings.clone(), logger);
    if !cache.initialize().await {
        println!("Image cache is disabled or unavailable ({})", settings.cache_dir.display());
        return Ok(());
    }

    match command {
        Command::Stats { json } => stats_cli(&cache, json).await,
        Command::List => list_cli(&cache).await,
        Command::Get {
            identifier,
            out,
            data_uri,
        } => get_cli(&cache, &identifier, out, data_uri).await,
        Command::Put { identifier, file } => put_cli(&cache, &identifier, &file).await,
        Command::Clear => clear_cli(&cache).await,
        Command::Preload { list } => preload_cli(&cache, &config, &settings, &list).await,
        Command::Help | Command::Version | Command::Config => Ok(()),
    }
}

/// CLI commands
enum Command {
    Stats {
        json: bool,
    },
    List,
    Get {
        identifier: String,
        out: Option<PathBuf>,
        data_uri: bool,
    },
    Put {
        identifier: String,
        file: PathBuf,
    },
    Clear,
    Preload {
        list: PathBuf,
    },
    Config,
    Help,
    Version,
}

fn parse_args() -> Result<Command> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() == 1 {
        return Ok(Command::Help);
    }

    let flag = |names: &[&str]| args.iter().any(|a| names.contains(&a.as_str()));
    let option = |names: &[&str]| {
        args.iter()
            .position(|a| names.contains(&a.as_str()))
            .and_then(|i| args.get(i + 1))
            .cloned()
    };

    match args[1].as_str() {
        "-h" | "--help" | "help" => Ok(Command::Help),
        "-v" | "--version" | "version" => Ok(Command::Version),

        "stats" => Ok(Command::Stats {
            json: flag(&["--json", "-j"]),
        }),

        "list" | "ls" => Ok(Command::List),

        "get" => {
            let identifier = args
                .get(2)
                .ok_or_else(|| anyhow::anyhow!("Missing image identifier (URL or path)"))?
                .clone();
            Ok(Command::Get {
                identifier,
                out: option(&["--out", "-o"]).map(PathBuf::from),
                data_uri: flag(&["--data-uri"]),
            })
        }

        "put" => {
            let identifier = args
                .get(2)
                .ok_or_else(|| anyhow::anyhow!("Missing image identifier (URL or path)"))?
                .clone();
            let file = args
                .get(3)
                .ok_or_else(|| anyhow::anyhow!("Missing file to store"))?
                .into();
            Ok(Command::Put { identifier, file })
        }

        "clear" => Ok(Command::Clear),

        "preload" => {
            let list = args
                .get(2)
                .ok_or_else(|| anyhow::anyhow!("Missing image list (JSON file)"))?
                .into();
            Ok(Command::Preload { list })
        }

        "config" => Ok(Command::Config),

        other => Err(anyhow::anyhow!(
            "Unknown command: {other}\nRun 'photoframe --help' for usage"
        )),
    }
}

fn print_help() {
    let config_path = Config::default_path()
        .map_or_else(|_| "Unknown".to_string(), |p| p.display().to_string());

    println!(
        r#"Photoframe - slideshow image cache

USAGE:
    photoframe [COMMAND]

COMMANDS:
    stats [--json]                     Show cache limits and usage
    list                               List cached files, oldest first
    get <identifier> [OPTIONS]         Read a cached image
      Options:
        -o, --out <file>               Write the payload to a file
        --data-uri                     Print as a base64 data URI
    put <identifier> <file>            Store a file under an identifier
    clear                              Remove every cached image
    preload <images.json>              Download the next images into the cache
      The list is a JSON array of {{"identifier": "...", "source": "remote"}}
    config                             Show the effective configuration

OPTIONS:
    -h, --help                         Show this help message
    -v, --version                      Show version information

CONFIG:
    {}
"#,
        config_path
    );
}

fn print_version() {
    println!("photoframe {}", photoframe::VERSION);
}

fn show_config(config: &Config, settings: &CacheSettings) -> Result<()> {
    let path = Config::default_path()?;
    if !path.exists() {
        config.save_to(&path)?;
        println!("✓ Wrote default config");
    }
    println!("Config file: {}", path.display());
    println!("Cache dir:   {}\n", settings.cache_dir.display());
    print!("{}", toml::to_string_pretty(config).context("Failed to serialize config")?);
    Ok(())
}

async fn stats_cli(cache: &ImageCache, json: bool) -> Result<()> {
    let Some(stats) = cache.get_stats().await else {
        println!("Image cache is not initialized");
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Enabled:       {}", stats.enabled);
    println!(
        "Used:          {} / {} ({:.1}%)",
        format_bytes(stats.used_bytes),
        format_bytes(stats.max_size_bytes),
        stats.used_bytes as f64 * 100.0 / stats.max_size_bytes.max(1) as f64
    );
    println!("Preload count: {}", stats.preload_count);
    Ok(())
}

async fn list_cli(cache: &ImageCache) -> Result<()> {
    let entries = cache.entries().await;
    if entries.is_empty() {
        println!("Image cache is empty.");
        return Ok(());
    }

    for entry in &entries {
        println!(
            "{}  {:>10}  {}",
            entry.last_modified.format("%Y-%m-%d %H:%M:%S"),
            format_bytes(entry.size_bytes),
            entry.key
        );
    }
    println!("\n{} files", entries.len());
    Ok(())
}

async fn get_cli(
    cache: &ImageCache,
    identifier: &str,
    out: Option<PathBuf>,
    data_uri: bool,
) -> Result<()> {
    let Some(bytes) = cache.get(identifier).await else {
        return Err(anyhow::anyhow!("Not cached: {}", identifier));
    };

    if data_uri {
        println!("{}", photoframe::cache::encoding::to_data_uri(&bytes));
    } else if let Some(path) = out {
        std::fs::write(&path, &bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("✓ Wrote {} to {}", format_bytes(bytes.len() as u64), path.display());
    } else {
        println!(
            "✓ Cached: {} ({})",
            format_bytes(bytes.len() as u64),
            photoframe::cache::encoding::sniff_mime(&bytes)
        );
    }
    Ok(())
}

async fn put_cli(cache: &ImageCache, identifier: &str, file: &PathBuf) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    if !cache.set(identifier, &bytes).await {
        return Err(anyhow::anyhow!("Failed to cache {}", identifier));
    }
    println!("✓ Cached {} as {}", format_bytes(bytes.len() as u64), identifier);
    Ok(())
}

async fn clear_cli(cache: &ImageCache) -> Result<()> {
    if !cache.clear().await {
        return Err(anyhow::anyhow!("Failed to clear image cache"));
    }
    println!("✓ Image cache cleared");
    Ok(())
}

async fn preload_cli(
    cache: &ImageCache,
    config: &Config,
    settings: &CacheSettings,
    list: &PathBuf,
) -> Result<()> {
    let json = std::fs::read_to_string(list)
        .with_context(|| format!("Failed to read {}", list.display()))?;
    let images = ImageDescriptor::list_from_json(&json).context("Failed to parse image list")?;
    let before = cache.entries().await.len();

    println!(
        "Preloading up to {} of {} images...",
        settings.preload_count,
        images.len()
    );

    // The scheduler enforces its own per-item timeout; give HTTP a little more.
    let downloader = HttpDownloader::new(
        settings.preload_timeout + Duration::from_secs(5),
        config.remote_api_key.clone(),
    );
    cache.preload_images(images, downloader.shared());
    cache.wait_for_preload().await;

    let after = cache.entries().await.len();
    println!("✓ Done ({} new files in cache)", after.saturating_sub(before));
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
