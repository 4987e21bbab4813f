use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use photoline::config::Config;
use photoline::db::{Database, IndexStore};
use photoline::filestore::{file_id_for_path, MediaFile};
use photoline::index::TimelineIndex;
use photoline::logging;
use photoline::metadata::build_extractor;
use photoline::preview::ImagePreview;
use photoline::scanner::{ScanOptions, Scanner};

enum Command {
    Index { force: bool, cleanup: bool, paths: Vec<PathBuf> },
    File { force: bool, paths: Vec<PathBuf> },
    Remove { paths: Vec<PathBuf> },
    Status { paths: Vec<PathBuf> },
    Clear { confirmed: bool },
    Days,
    Day { day_id: i64 },
}

struct Cli {
    config_path: Option<PathBuf>,
    command: Command,
}

fn usage_error(message: &str) -> ! {
    eprintln!("Error: {}", message);
    print_help();
    std::process::exit(1);
}

fn parse_args() -> Cli {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;
    let mut force = false;
    let mut cleanup = true;
    let mut confirmed = false;
    let mut positional = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("photoline {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    usage_error("--config requires a path argument");
                }
            }
            "--force" | "-f" => force = true,
            "--no-cleanup" => cleanup = false,
            "--yes" | "-y" => confirmed = true,
            arg if arg.starts_with('-') => usage_error(&format!("Unknown argument: {}", arg)),
            arg => positional.push(arg.to_string()),
        }
        i += 1;
    }

    let mut positional = positional.into_iter();
    let Some(name) = positional.next() else {
        usage_error("no command given");
    };
    let rest: Vec<String> = positional.collect();
    let paths = || rest.iter().map(PathBuf::from).collect::<Vec<_>>();

    let command = match name.as_str() {
        "index" => Command::Index { force, cleanup, paths: paths() },
        "file" if !rest.is_empty() => Command::File { force, paths: paths() },
        "remove" if !rest.is_empty() => Command::Remove { paths: paths() },
        "status" if !rest.is_empty() => Command::Status { paths: paths() },
        "file" | "remove" | "status" => usage_error(&format!("{} requires at least one path", name)),
        "clear" => Command::Clear { confirmed },
        "days" => Command::Days,
        "day" => match rest.first().map(|s| s.parse::<i64>()) {
            Some(Ok(day_id)) => Command::Day { day_id },
            _ => usage_error("day requires a numeric day id"),
        },
        other => usage_error(&format!("Unknown command: {}", other)),
    };

    Cli { config_path, command }
}

fn print_help() {
    println!(
        r#"photoline - photo and video timeline indexer

USAGE:
    photoline [OPTIONS] <COMMAND>

COMMANDS:
    index [--force] [--no-cleanup] [PATH...]
                        Scan PATHs (default: configured roots). A scan of the
                        configured roots also drops rows for vanished files
    file [--force] PATH...
                        Index individual files
    remove PATH...      Remove files from the index
    status PATH...      Show whether files are active, orphaned or absent
    clear --yes         Empty the index
    days                List days with item counts, newest first
    day ID              List the items of one day

OPTIONS:
    --config, -c PATH   Path to config file
    --force, -f         Re-extract files even if unchanged
    --no-cleanup        Keep rows for files not seen during the scan
    --yes, -y           Confirm destructive commands
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    PHOTOLINE_CONFIG    Path to config file (overrides default location)
    PHOTOLINE_LOG       Log filter (trace, debug, info, warn, error);
                        warnings are always printed to stderr

Config file location: $XDG_CONFIG_HOME/photoline/config.toml"#
    );
}

fn main() -> Result<()> {
    let cli = parse_args();

    let config = match cli.config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("Warning: logging disabled: {:#}", e);
    }

    let db = Database::open(&config.database)?;
    db.initialize()?;
    tracing::debug!(backend = db.backend_name(), "Database opened");

    let index = Arc::new(TimelineIndex::new(
        Arc::new(db),
        build_extractor(&config.metadata),
        Arc::new(ImagePreview::new(&config.preview)),
        &config.index,
    ));

    match cli.command {
        Command::Index { force, cleanup, paths } => {
            // Orphan cleanup is only sound when every library root is walked
            let (roots, cleanup) = if paths.is_empty() {
                (config.scanner.roots.clone(), cleanup)
            } else {
                (paths, false)
            };
            if roots.is_empty() {
                anyhow::bail!("No library roots configured; pass a PATH or set scanner.roots");
            }

            let scanner = Scanner::new(index, config.scanner.clone());
            let result = scanner.scan(&roots, ScanOptions { force, cleanup }, None)?;
            println!(
                "found {}, processed {}, skipped {}, not indexable {}, failed {}, orphans removed {}",
                result.found,
                result.processed,
                result.skipped,
                result.not_indexable,
                result.failed,
                result.orphans_removed
            );
        }
        Command::File { force, paths } => {
            for path in paths {
                let file = MediaFile::from_path(&path)?;
                let outcome = index.process_file(&file, force)?;
                println!("{}\t{}", outcome.as_str(), path.display());
            }
        }
        Command::Remove { paths } => {
            for path in paths {
                let removed = index.delete_file(&MediaFile::detached(&path))?;
                println!("{}\t{}", removed, path.display());
            }
        }
        Command::Status { paths } => {
            for path in paths {
                let state = index.state_of(file_id_for_path(&path))?;
                println!("{}\t{}", state.as_str(), path.display());
            }
        }
        Command::Clear { confirmed } => {
            if !confirmed {
                anyhow::bail!("Refusing to clear the index without --yes");
            }
            index.clear()?;
            println!("Index cleared");
        }
        Command::Days => {
            for day in index.days()? {
                println!("{}\t{}", day.day_id, day.count);
            }
        }
        Command::Day { day_id } => {
            for record in index.day(day_id)? {
                let kind = if record.is_video { "video" } else { "photo" };
                let live = match index.live_video_for(&record.live_id)? {
                    Some(part) => format!("\tlive:{}", part.file_id),
                    None => String::new(),
                };
                println!(
                    "{}\t{}\t{}\t{}x{}{}",
                    record.file_id, record.date_taken, kind, record.width, record.height, live
                );
            }
        }
    }

    Ok(())
}
