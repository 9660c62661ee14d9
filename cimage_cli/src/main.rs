use std::ops::Range;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use cimage_codecs::Codec;
use cimage_core::{
    Channel, ChannelOptions, ChannelSelection, Chunk, ElementType, Image, RawPlanarLayout,
    RawPlanarOpener, DEFAULT_BLOCK_SIZE, DEFAULT_LEVEL,
};

mod logger;

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "cimage",
    about = "Ingest raw planar images into chunked compressed storage, inspect them and read chunks back",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a raw planar file and print image statistics
    Inspect {
        #[command(flatten)]
        source: SourceArgs,
        /// Print a per-chunk table for every channel
        #[arg(long)]
        chunks: bool,
    },
    /// Ingest a raw planar file and write one channel back out as raw bytes
    Extract {
        #[command(flatten)]
        source: SourceArgs,
        /// Channel to extract
        #[arg(long)]
        channel: String,
        /// Destination file for the raw, row-major channel data
        #[arg(short, long)]
        output: PathBuf,
        /// Only extract rows `start..end`
        #[arg(long, value_parser = parse_rows)]
        rows: Option<Range<usize>>,
    },
    /// Benchmark random chunk reads across all channels
    Bench {
        #[command(flatten)]
        source: SourceArgs,
        /// Number of random chunks to read
        #[arg(short = 'n', long, default_value_t = 1000)]
        count: usize,
        /// Fixed random seed for reproducibility
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

/// Where the raw planar file is and how to compress it.
#[derive(Args)]
struct SourceArgs {
    /// Headerless planar file: every channel back to back, native endian
    file: PathBuf,
    #[arg(long)]
    width: usize,
    #[arg(long)]
    height: usize,
    /// Element type stored in the file
    #[arg(long, default_value = "uint8")]
    dtype: ElementType,
    /// Channel names in file order, e.g. R,G,B
    #[arg(long, value_delimiter = ',', required = true)]
    channels: Vec<String>,
    /// Element type to store the channels as (defaults to --dtype)
    #[arg(long)]
    read_as: Option<ElementType>,
    /// blosclz | lz4 | lz4hc | zstd
    #[arg(short, long, default_value = "lz4")]
    codec: Codec,
    /// Compression level, 0-9
    #[arg(short, long, default_value_t = DEFAULT_LEVEL)]
    level: u8,
    /// Bytes per chunk; must be a multiple of the row size (default: 4 MB aligned to rows)
    #[arg(long)]
    chunk_size: Option<usize>,
    /// Raw bytes per compressed block inside a chunk
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: usize,
    /// Extra metadata entries, `key=value`
    #[arg(long = "meta", value_parser = parse_key_value)]
    meta: Vec<(String, String)>,
}

impl SourceArgs {
    fn options(&self) -> ChannelOptions {
        let builder = ChannelOptions::builder()
            .codec(self.codec)
            .level(self.level)
            .block_size(self.block_size);
        match self.chunk_size {
            Some(size) => builder.chunk_size(size).build(),
            None => builder.build(),
        }
    }

    fn opener(&self) -> RawPlanarOpener {
        RawPlanarOpener::new(RawPlanarLayout {
            width: self.width,
            height: self.height,
            stored: self.dtype,
            channel_names: self.channels.clone(),
        })
    }

    /// Read `selection` into an image, timing the ingestion.
    fn ingest(&self, selection: &ChannelSelection) -> anyhow::Result<Image> {
        let dtype = self.read_as.unwrap_or(self.dtype);
        let t0 = Instant::now();
        let mut image = Image::read(
            &self.opener(),
            &self.file,
            0,
            dtype,
            selection,
            &self.options(),
        )
        .with_context(|| format!("ingesting {:?}", self.file))?;

        let mut metadata = image.metadata().clone();
        metadata.extend(self.meta.iter().cloned());
        image.set_metadata(metadata);

        let elapsed = t0.elapsed();
        info!(
            channels = image.len(),
            codec = %self.codec,
            level = self.level,
            elapsed_ms = elapsed.as_millis() as u64,
            "ingested image"
        );
        eprintln!(
            "  ingest      : {} in {:.3}s ({}/s)",
            human_bytes(image.uncompressed_size() as u64),
            elapsed.as_secs_f64(),
            human_bytes((image.uncompressed_size() as f64 / elapsed.as_secs_f64()) as u64)
        );
        Ok(image)
    }
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    Ok((key.to_string(), value.to_string()))
}

fn parse_rows(raw: &str) -> Result<Range<usize>, String> {
    let (start, end) = raw
        .split_once("..")
        .ok_or_else(|| format!("expected start..end, got '{}'", raw))?;
    let start = start.parse::<usize>().map_err(|e| format!("row start: {}", e))?;
    let end = end.parse::<usize>().map_err(|e| format!("row end: {}", e))?;
    if start > end {
        return Err(format!("row range {}..{} is reversed", start, end));
    }
    Ok(start..end)
}

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

fn describe_chunk(chunk: &Chunk) -> String {
    match chunk {
        Chunk::Dense(dense) => format!("{} L{}", dense.codec(), dense.level()),
        Chunk::Lazy(_) => match chunk.fill_value() {
            Some(fill) => format!("lazy {}", fill),
            None => "lazy".to_string(),
        },
    }
}

fn print_chunk_table(name: &str, channel: &Channel) -> anyhow::Result<()> {
    println!();
    println!(
        "  channel '{}': {} {}x{}, {} chunks of {} rows, ratio {:.2}x",
        name,
        channel.dtype(),
        channel.width(),
        channel.height(),
        channel.num_chunks(),
        channel.rows_per_chunk(),
        channel.compression_ratio()
    );
    println!(
        "  {:>8}  {:>14}  {:>12}  {:>12}  {:>20}",
        "chunk", "rows", "compressed", "raw", "storage"
    );
    println!("  {}", "-".repeat(74));
    for (index, chunk) in channel.chunks().iter().enumerate() {
        let rows = channel.chunk_row_range(index)?;
        println!(
            "  {:>8}  {:>14}  {:>12}  {:>12}  {:>20}",
            index,
            format!("{}..{}", rows.start, rows.end),
            human_bytes(chunk.compressed_size() as u64),
            human_bytes(chunk.byte_size() as u64),
            describe_chunk(chunk)
        );
    }
    Ok(())
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_inspect(source: SourceArgs, show_chunks: bool) -> anyhow::Result<()> {
    let image = source.ingest(&ChannelSelection::All)?;

    println!("=== {:?} ===", source.file);
    println!();
    print!("{}", image.statistics());
    println!("  chunk size  : {}", human_bytes(image.chunk_size() as u64));
    println!("  block size  : {}", human_bytes(image.block_size() as u64));

    if show_chunks {
        for (name, handle) in image.iter() {
            print_chunk_table(name, &handle.read())?;
        }
    }
    Ok(())
}

fn run_extract(
    source: SourceArgs,
    channel: &str,
    output: PathBuf,
    rows: Option<Range<usize>>,
) -> anyhow::Result<()> {
    let image = source.ingest(&ChannelSelection::names(&[channel]))?;
    let handle = image.channel(channel)?;
    let channel = handle.read();

    let t0 = Instant::now();
    let raw = match rows {
        Some(range) => channel
            .get_rows_bytes(range.clone())
            .with_context(|| format!("reading rows {}..{}", range.start, range.end))?,
        None => channel.get_decompressed_bytes()?,
    };
    let elapsed = t0.elapsed();

    std::fs::write(&output, &raw).with_context(|| format!("writing {:?}", output))?;
    eprintln!(
        "  decoded {} in {:.3}ms",
        human_bytes(raw.len() as u64),
        elapsed.as_secs_f64() * 1000.0
    );
    eprintln!("  written to {:?}", output);
    Ok(())
}

fn run_bench(source: SourceArgs, count: usize, seed: u64) -> anyhow::Result<()> {
    let image = source.ingest(&ChannelSelection::All)?;
    let channels = image.all_channels();
    let targets: Vec<(usize, usize)> = channels
        .iter()
        .enumerate()
        .flat_map(|(c, handle)| (0..handle.num_chunks()).map(move |i| (c, i)))
        .collect();

    if targets.is_empty() || count == 0 {
        anyhow::bail!("nothing to benchmark");
    }

    // Simple LCG for reproducible random chunk picks
    let picks: Vec<(usize, usize)> = {
        let mut rng = seed;
        (0..count)
            .map(|_| {
                rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                targets[((rng >> 33) % targets.len() as u64) as usize]
            })
            .collect()
    };

    eprintln!(
        "benchmarking {} random chunk reads across {} chunks in {} channels...",
        count,
        targets.len(),
        channels.len()
    );

    let t0 = Instant::now();
    let mut total_raw = 0u64;
    let mut latencies_us: Vec<u64> = Vec::with_capacity(count);

    for &(c, index) in &picks {
        let channel = channels[c].read();
        let t = Instant::now();
        let raw = channel.get_chunk_bytes(index)?;
        latencies_us.push(t.elapsed().as_micros() as u64);
        total_raw += raw.len() as u64;
    }

    let elapsed = t0.elapsed();
    latencies_us.sort_unstable();

    let percentile = |p: f64| latencies_us[((latencies_us.len() as f64 * p) as usize).min(latencies_us.len() - 1)];

    println!();
    println!("=== Random Chunk Access Benchmark ===");
    println!("  chunks read : {}", count);
    println!("  total raw   : {}", human_bytes(total_raw));
    println!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    println!(
        "  throughput  : {}/s",
        human_bytes((total_raw as f64 / elapsed.as_secs_f64()) as u64)
    );
    println!("  latency:");
    println!("    min  : {} µs", percentile(0.0));
    println!("    p50  : {} µs", percentile(0.5));
    println!("    p95  : {} µs", percentile(0.95));
    println!("    p99  : {} µs", percentile(0.99));
    println!("    max  : {} µs", percentile(1.0));

    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Inspect { source, chunks } => run_inspect(source, chunks),
        Commands::Extract {
            source,
            channel,
            output,
            rows,
        } => run_extract(source, &channel, output, rows),
        Commands::Bench {
            source,
            count,
            seed,
        } => run_bench(source, count, seed),
    }
}
