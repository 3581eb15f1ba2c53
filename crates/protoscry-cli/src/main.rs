//! protoscry - Recover Protocol Buffer definitions from compiled .NET assemblies
//!
//! This tool reads metadata dumps of compiled modules and reconstructs the
//! protobuf schema their generated code was built from, as a `.proto` file.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, ValueEnum};
use protoscry_core::proto::{render_file, render_merged, write_to_path};
use protoscry_core::{
    Extractor, ExtractorConfig, MergedFile, Module, ProtoFile, StatsWriter, Strategy,
};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Recover Protocol Buffer definitions from compiled .NET assemblies
#[derive(Parser, Debug)]
#[command(name = "protoscry")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    source: InputMode,

    /// Output .proto file (single input) or directory (directory input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Code-generation convention the module was built with
    #[arg(short, long, value_enum)]
    mode: Mode,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Dry run - don't write files, just show what would be written
    #[arg(long)]
    dry_run: bool,

    /// Overwrite existing files
    #[arg(long)]
    force: bool,

    /// Print counts of recovered messages, fields, oneofs and enums
    #[arg(long)]
    stats: bool,

    /// Don't require the module to reference the convention's runtime
    #[arg(long)]
    no_capability_check: bool,

    /// Combine every module of the directory into one .proto file
    #[arg(long, value_name = "FILE", requires = "directory", conflicts_with = "output")]
    merge: Option<PathBuf>,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a single module metadata dump (.json)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Path to a directory of module metadata dumps
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

/// Code-generation convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Google.Protobuf generated classes
    Google,
    /// protobuf-net contract types
    ProtobufNet,
}

impl From<Mode> for Strategy {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Google => Strategy::Descriptor,
            Mode::ProtobufNet => Strategy::Contract,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    let extractor = build_extractor(&cli);

    // Dispatch based on input mode
    if let Some(ref file) = cli.source.input {
        process_single_file(&cli, &extractor, file)
    } else if let Some(ref directory) = cli.source.directory {
        process_directory(&cli, &extractor, directory)
    } else {
        bail!("Either --input or --directory must be specified")
    }
}

fn build_extractor(cli: &Cli) -> Extractor {
    let config = ExtractorConfig::new().check_capabilities(!cli.no_capability_check);
    Extractor::with_config(cli.mode.into(), config)
}

/// Process a single metadata dump
fn process_single_file(cli: &Cli, extractor: &Extractor, file: &Path) -> Result<()> {
    if !file.exists() {
        bail!("Input file does not exist: {}", file.display());
    }
    if !file.is_file() {
        bail!("Input path is not a file: {}", file.display());
    }

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(file));
    process_module(cli, extractor, file, &output)
}

/// Process every metadata dump below a directory
fn process_directory(cli: &Cli, extractor: &Extractor, directory: &Path) -> Result<()> {
    if !directory.exists() {
        bail!("Directory does not exist: {}", directory.display());
    }
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());

    let output_dir = cli.output.clone().unwrap_or_else(|| PathBuf::from("."));
    let mut merged = cli.merge.as_ref().map(|_| MergedFile::new());
    let mut processed = 0;
    let mut failed = 0;

    for entry in WalkDir::new(directory)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if !path.is_file() || is_hidden(path) {
            continue;
        }

        if !is_metadata_dump(path) {
            trace!("Skipping non-dump: {}", path.display());
            continue;
        }

        let relative = path.strip_prefix(directory).unwrap_or(path);
        debug!("Processing module dump: {}", path.display());
        processed += 1;

        let result = match merged.as_mut() {
            Some(merged) => extract_module(cli, extractor, path).map(|file| {
                let dropped = merged.push(relative.display().to_string(), file);
                if dropped > 0 {
                    debug!("Dropped {} duplicate entries from {}", dropped, path.display());
                }
            }),
            None => {
                let output = default_output_path(&output_dir.join(relative));
                process_module(cli, extractor, path, &output)
            }
        };

        if let Err(e) = result {
            // Log error but continue with other modules
            let recoverable = e
                .downcast_ref::<protoscry_core::Error>()
                .is_some_and(protoscry_core::Error::is_recoverable);
            if recoverable {
                warn!("Skipping {}: {:#}", path.display(), e);
            } else {
                error!("Error processing {}: {:#}", path.display(), e);
            }
            failed += 1;
        }
    }

    info!(
        "Summary: {} module(s) processed, {} failed",
        processed, failed
    );

    if let (Some(merged), Some(merge_path)) = (merged, cli.merge.as_deref()) {
        info!(
            "Merged {} entries from {} module(s)",
            merged.entry_count(),
            merged.sections.len()
        );
        let content = render_merged(&merged, &extractor.emitter_config());
        emit(cli, merge_path, &content)?;
    }

    Ok(())
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

fn is_metadata_dump(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// `<dir>/<stem>.proto` next to the input
fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("proto")
}

/// Compute a short hash of the content (first 8 chars of blake3)
fn content_hash(content: &str) -> String {
    let hash = blake3::hash(content.as_bytes());
    hash.to_hex()[..8].to_string()
}

/// Load, extract and write one module
fn process_module(cli: &Cli, extractor: &Extractor, input: &Path, output: &Path) -> Result<()> {
    let file = extract_module(cli, extractor, input)?;
    let content = render_file(&file, &extractor.emitter_config());
    emit(cli, output, &content)
}

/// Load and extract one module, printing statistics when asked
fn extract_module(cli: &Cli, extractor: &Extractor, input: &Path) -> Result<ProtoFile> {
    trace!("Reading {}", input.display());
    let module = Module::from_file(input)?;

    let file = extractor.extract(&module)?;

    if cli.stats {
        let mut stats = StatsWriter::default();
        file.visit(&mut stats)
            .context("Failed to collect statistics")?;
        println!(
            "{}: {} messages, {} fields, {} oneofs, {} enums ({} values), {} unresolved",
            module.name,
            stats.message_count,
            stats.field_count,
            stats.oneof_count,
            stats.enum_count,
            stats.enum_value_count,
            stats.unresolved_count
        );
    }

    Ok(file)
}

/// Write rendered output, or describe it in a dry run
fn emit(cli: &Cli, output: &Path, content: &str) -> Result<()> {
    if cli.dry_run {
        println!(
            "Would write: {} ({})",
            output.display(),
            content_hash(content)
        );
        if cli.verbose > 0 {
            println!("---");
            println!("{}", content);
            println!("---");
        }
        return Ok(());
    }

    write_proto_file(output, content, cli.force)?;
    println!("Generated: {}", output.display());
    Ok(())
}

/// Write a proto file to disk, refusing to clobber without `force`
fn write_proto_file(output_path: &Path, content: &str, force: bool) -> Result<()> {
    if output_path.exists() && !force {
        bail!(
            "File already exists: {} (use --force to overwrite)",
            output_path.display()
        );
    }

    write_to_path(output_path, content)
        .with_context(|| format!("Failed to write file: {}", output_path.display()))
}
