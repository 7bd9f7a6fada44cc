//! binseek inspector
//!
//! Prints the group tree of a container or decodes its structural log.

use anyhow::{Context, Result};
use binseek::{AttrValue, Container, ContainerBuilder, Group, LogReader, LogRecord, Mode};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "binseek-inspect")]
#[command(about = "Inspect binseek containers")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the group tree recorded in the metadata snapshot
    Tree {
        /// Path to the metadata snapshot
        path: PathBuf,

        /// Data file (defaults to the snapshot path with .hdat)
        #[arg(long)]
        data: Option<PathBuf>,

        /// Log file (defaults to the snapshot path with .hlog)
        #[arg(long)]
        log: Option<PathBuf>,
    },

    /// Decode the structural log record by record
    Log {
        /// Path to the structural log
        path: PathBuf,

        /// Fail on a truncated trailing record instead of stopping quietly
        #[arg(long)]
        strict: bool,
    },
}

fn format_attr(value: &AttrValue) -> String {
    match value {
        AttrValue::Text(text) => format!("{:?}", text),
        AttrValue::Bytes(bytes) => format!("bytes[{}]", bytes.len()),
        AttrValue::Double(d) => format!("{:?}", d),
        AttrValue::Long(l) => l.to_string(),
    }
}

fn print_group(container: &Container, group: &Group, depth: usize) -> Result<()> {
    let indent = "  ".repeat(depth);
    println!("{}{}", indent, group.path());

    for (name, value) in group.attrs() {
        println!("{}  @{} = {}", indent, name, format_attr(value));
    }
    for handle in group.arrays() {
        println!(
            "{}  {} {} {:?} order={} bytes={} offset={}",
            indent,
            handle.name(),
            handle.dtype(),
            handle.shape(),
            handle.order(),
            handle.bytes_len(),
            handle.data_offset()
        );
    }
    for child in group.child_paths() {
        print_group(container, container.group(child)?, depth + 1)?;
    }
    Ok(())
}

fn tree(path: PathBuf, data: Option<PathBuf>, log: Option<PathBuf>) -> Result<()> {
    let mut builder = ContainerBuilder::new().mode(Mode::Read);
    if let Some(data) = data {
        builder = builder.data_path(data);
    }
    if let Some(log) = log {
        builder = builder.log_path(log);
    }

    let container = builder
        .open(&path)
        .with_context(|| format!("Failed to open container {:?}", path))?;

    print_group(&container, container.root()?, 0)?;
    println!("{} groups", container.len()?);
    Ok(())
}

fn log(path: PathBuf, strict: bool) -> Result<()> {
    let mut reader =
        LogReader::open(&path).with_context(|| format!("Failed to read log {:?}", path))?;
    if strict {
        reader = reader.strict();
    }

    let mut count = 0usize;
    for record in reader {
        match record.context("Failed to decode log record")? {
            LogRecord::Array {
                group,
                name,
                bytes_len,
                dtype,
                shape,
                order,
                record_offset,
            } => println!(
                "ARR  {} {} {} {:?} order={} bytes={} record_offset={}",
                group, name, dtype, shape, order, bytes_len, record_offset
            ),
            LogRecord::Attr { group, name, value } => {
                println!("ATTR {} {} = {}", group, name, format_attr(&value))
            }
        }
        count += 1;
    }
    println!("{} records", count);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Command::Tree { path, data, log: log_path } => tree(path, data, log_path),
        Command::Log { path, strict } => log(path, strict),
    }
}
