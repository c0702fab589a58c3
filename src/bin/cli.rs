//! globalsort CLI
//!
//! Sorts a TSV file into local storage and inspects the files it produced.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use globalsort::kv::{decode_multi_props, KvReader};
use globalsort::membuf::Pool;
use globalsort::overlap::needs_merge_sort;
use globalsort::storage::{ExternalStorage, LocalStorage};
use globalsort::{
    get_max_overlapping_total, Context, MergeSortConfig, Result, SortError, WriterBuilder,
    WriterSummary,
};
use parking_lot::Mutex;
use tracing_subscriber::{fmt, EnvFilter};

/// globalsort CLI
#[derive(Parser, Debug)]
#[command(name = "globalsort-cli")]
#[command(about = "External sorted KV writer")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sort `key<TAB>value` lines into data and statistics files
    Write {
        /// Input file, `-` for stdin
        #[arg(short, long, default_value = "-")]
        input: String,

        /// Storage root directory
        #[arg(short, long, default_value = "./globalsort_data")]
        output_dir: PathBuf,

        /// Object prefix under the storage root
        #[arg(short, long, default_value = "sorted")]
        prefix: String,

        /// Writer id; with several writers a `-N` suffix is added
        #[arg(short, long, default_value = "writer")]
        writer_id: String,

        /// Number of writers sharing one flush mutex
        #[arg(short = 'n', long, default_value = "1")]
        writers: usize,

        /// Memory limit per writer in KB before flush
        #[arg(short = 'm', long, default_value = "262144")]
        mem_limit_kb: u64,

        /// Buffer block size in KB
        #[arg(short, long, default_value = "16384")]
        block_size_kb: usize,

        /// Keep duplicate keys apart using the line number as row id
        #[arg(long)]
        dup_encoding: bool,

        /// Write the bincode-encoded summaries to this file
        #[arg(long)]
        summary_out: Option<PathBuf>,
    },

    /// Print the content of a data or statistics file
    Inspect {
        /// Storage root directory
        #[arg(short, long, default_value = "./globalsort_data")]
        dir: PathBuf,

        /// Object path relative to the root
        path: String,

        /// File kind
        #[arg(short, long, value_enum, default_value = "data")]
        kind: FileKind,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FileKind {
    Data,
    Stat,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,globalsort=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();
    tracing::info!("globalsort v{}", globalsort::VERSION);

    let result = match args.command {
        Commands::Write {
            input,
            output_dir,
            prefix,
            writer_id,
            writers,
            mem_limit_kb,
            block_size_kb,
            dup_encoding,
            summary_out,
        } => {
            let builder = WriterBuilder::new()
                .memory_size_limit(mem_limit_kb * 1024)
                .block_size(block_size_kb * 1024)
                .key_duplication_encoding(dup_encoding);
            run_write(WriteJob {
                input,
                output_dir,
                prefix,
                writer_id,
                writers: writers.max(1),
                dup_encoding,
                summary_out,
                builder,
            })
        }
        Commands::Inspect { dir, path, kind } => run_inspect(&dir, &path, kind),
    };

    if let Err(e) = result {
        tracing::error!("globalsort failed: {}", e);
        std::process::exit(1);
    }
}

struct WriteJob {
    input: String,
    output_dir: PathBuf,
    prefix: String,
    writer_id: String,
    writers: usize,
    dup_encoding: bool,
    summary_out: Option<PathBuf>,
    builder: WriterBuilder,
}

fn run_write(job: WriteJob) -> Result<()> {
    let text = if job.input == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        fs::read_to_string(&job.input)?
    };
    let rows: Vec<(u64, &str, &str)> = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.is_empty())
        .map(|(no, line)| {
            let (key, value) = line.split_once('\t').unwrap_or((line, ""));
            (no as u64, key, value)
        })
        .collect();

    let store: Arc<dyn ExternalStorage> = Arc::new(LocalStorage::open(&job.output_dir)?);
    let (tx, rx) = crossbeam::channel::unbounded::<WriterSummary>();

    let mut builder = job
        .builder
        .buffer_pool(Arc::new(Pool::new()))
        .on_close_sender(tx);
    if job.writers > 1 {
        builder = builder.mutex(Arc::new(Mutex::new(())));
    }

    let mut writers = Vec::with_capacity(job.writers);
    for n in 0..job.writers {
        let id = if job.writers == 1 {
            job.writer_id.clone()
        } else {
            format!("{}-{}", job.writer_id, n)
        };
        writers.push(builder.build(Arc::clone(&store), &job.prefix, &id)?);
    }
    drop(builder);

    let ctx = Context::new();
    let worker_count = job.writers;
    let dup_encoding = job.dup_encoding;
    let outcomes = crossbeam::scope(|s| {
        let handles: Vec<_> = writers
            .into_iter()
            .enumerate()
            .map(|(n, mut writer)| {
                let rows = &rows;
                let ctx = &ctx;
                s.spawn(move |_| -> Result<()> {
                    for (no, key, value) in rows.iter().skip(n).step_by(worker_count) {
                        let row_id = no.to_be_bytes();
                        let row_id = dup_encoding.then_some(&row_id[..]);
                        writer.write_row(ctx, key.as_bytes(), value.as_bytes(), row_id)?;
                    }
                    writer.close(ctx)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .unwrap_or_else(|_| Err(SortError::Storage("writer thread panicked".to_string())))
            })
            .collect::<Vec<_>>()
    })
    .map_err(|_| SortError::Storage("writer scope panicked".to_string()))?;
    for outcome in outcomes {
        outcome?;
    }

    let summaries: Vec<WriterSummary> = rx.try_iter().collect();
    let merge_cfg = MergeSortConfig::default();
    for summary in &summaries {
        let files: usize = summary
            .multiple_files_stats
            .iter()
            .map(|stat| stat.filenames.len())
            .sum();
        println!(
            "{}: {} files, {} bytes, min={} max={}, overlap={}",
            summary.writer_id,
            files,
            summary.total_size,
            String::from_utf8_lossy(&summary.min),
            String::from_utf8_lossy(&summary.max),
            get_max_overlapping_total(&summary.multiple_files_stats),
        );
    }
    let all_stats: Vec<_> = summaries
        .iter()
        .flat_map(|summary| summary.multiple_files_stats.iter().cloned())
        .collect();
    println!(
        "total overlap {}, merge sort needed: {}",
        get_max_overlapping_total(&all_stats),
        needs_merge_sort(&all_stats, &merge_cfg)
    );

    if let Some(path) = job.summary_out {
        let encoded = bincode::serialize(&summaries)?;
        fs::write(&path, encoded)?;
        tracing::info!(path = %path.display(), "wrote writer summaries");
    }
    Ok(())
}

fn run_inspect(dir: &Path, path: &str, kind: FileKind) -> Result<()> {
    let store = LocalStorage::open(dir)?;
    let data = store.read_all(&Context::new(), path)?;
    match kind {
        FileKind::Data => {
            for kv in KvReader::new(&data) {
                let (key, value) = kv?;
                println!(
                    "{}\t{}",
                    String::from_utf8_lossy(key),
                    String::from_utf8_lossy(value)
                );
            }
        }
        FileKind::Stat => {
            for prop in decode_multi_props(&data)? {
                println!(
                    "key={} offset={} size={} keys={}",
                    String::from_utf8_lossy(&prop.key),
                    prop.offset,
                    prop.size,
                    prop.keys
                );
            }
        }
    }
    Ok(())
}
