use std::fs::File;
use std::io::{self, BufWriter, SeekFrom, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

use ts_config::TimeshiftConfig;
use ts_core::{RetryPolicy, SegmentSet, Target};
use ts_runtime::StreamHandle;
use ts_runtime::tracing_init::init_tracing;

#[derive(Parser)]
#[command(name = "tshift", about = "Read live timeshift buffers and recordings")]
struct Cli {
    /// Path to timeshift.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy a recording or live buffer to stdout or a file
    Cat {
        /// Recording, `.tsbuffer` index file, or segment directory
        path: PathBuf,
        /// Write here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Logical offset to start from
        #[arg(long, default_value_t = 0)]
        offset: u64,
        /// Stop after this many bytes
        #[arg(long)]
        limit: Option<u64>,
        /// Stop a live copy after this many consecutive empty reads
        #[arg(long, default_value_t = 3)]
        idle_giveups: u32,
        /// Segment session name for a directory target
        #[arg(long)]
        session: Option<String>,
    },
    /// Show the current segment window of a buffer
    Info {
        path: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
        /// Segment session name for a directory target
        #[arg(long)]
        session: Option<String>,
    },
}

fn load_config(path: Option<&Path>) -> Result<(TimeshiftConfig, PathBuf)> {
    match path {
        Some(path) => {
            let config_path = path
                .canonicalize()
                .map_err(|e| anyhow::anyhow!("config path '{}': {e}", path.display()))?;
            let config = TimeshiftConfig::load(&config_path)?;
            let base_dir = config_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            Ok((config, base_dir))
        }
        None => Ok((TimeshiftConfig::default(), std::env::current_dir()?)),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, base_dir) = load_config(cli.config.as_deref())?;
    let _guard = init_tracing(&config.logging, &base_dir)?;

    match cli.command {
        Commands::Cat {
            path,
            output,
            offset,
            limit,
            idle_giveups,
            session,
        } => {
            let target = Target::resolve_with_session(&path, &config.reader, session.as_deref());
            let out: Box<dyn Write> = match &output {
                Some(file) => Box::new(File::create(file)?),
                None => Box::new(io::stdout().lock()),
            };
            let copied = cat(
                &target,
                &config,
                BufWriter::new(out),
                offset,
                limit,
                idle_giveups,
            )?;
            tracing::info!(domain = "io", bytes = copied, path = %path.display(), "copy finished");
        }
        Commands::Info {
            path,
            json,
            session,
        } => {
            let target = Target::resolve_with_session(&path, &config.reader, session.as_deref());
            info(&target, json)?;
        }
    }

    Ok(())
}

fn cat(
    target: &Target,
    config: &TimeshiftConfig,
    mut out: impl Write,
    offset: u64,
    limit: Option<u64>,
    idle_giveups: u32,
) -> Result<u64> {
    let handle = StreamHandle::new(RetryPolicy::from(&config.live));
    handle.open(target).map_err(|e| anyhow::anyhow!("{e}"))?;
    if offset > 0 {
        let at = handle
            .seek(SeekFrom::Start(offset))
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        if at != offset {
            tracing::warn!(domain = "io", requested = offset, start = at, "offset rotated out, starting at window");
        }
    }

    let mut buf = vec![0u8; 64 * 1024];
    let mut copied = 0u64;
    let mut idle = 0u32;
    loop {
        let want = match limit {
            Some(limit) if copied >= limit => break,
            Some(limit) => buf.len().min((limit - copied) as usize),
            None => buf.len(),
        };
        let n = handle
            .read(&mut buf[..want])
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        if n == 0 {
            if !handle.is_realtime() {
                break;
            }
            idle += 1;
            if idle >= idle_giveups {
                tracing::info!(domain = "live", idle, "no new data, stopping");
                break;
            }
            continue;
        }
        idle = 0;
        match out.write_all(&buf[..n]) {
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => break,
            other => other?,
        }
        copied += n as u64;
    }
    match out.flush() {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
        other => other?,
    }
    handle.close();
    Ok(copied)
}

fn info(target: &Target, json: bool) -> Result<()> {
    let Target::Buffer {
        catalog,
        segment_size,
    } = target
    else {
        let len = std::fs::metadata(target.location())?.len();
        if json {
            let value = serde_json::json!({
                "location": target.location(),
                "kind": target.kind(),
                "length": len,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        } else {
            println!("static file {} ({len} bytes)", target.location().display());
        }
        return Ok(());
    };

    let mut set = SegmentSet::new(catalog.clone(), *segment_size);
    set.refresh().map_err(|e| anyhow::anyhow!("{e}"))?;

    if json {
        let value = serde_json::json!({
            "location": target.location(),
            "kind": target.kind(),
            "window_start": set.window_start(),
            "logical_end": set.logical_end(),
            "total_length": set.total_logical_length(),
            "segments": set.segments(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("rotating buffer {}", target.location().display());
    println!(
        "window [{}, {})  {} bytes in {} segments",
        set.window_start(),
        set.logical_end(),
        set.total_logical_length(),
        set.len()
    );
    for seg in set.segments() {
        println!(
            "  {:>6}  {:>12}  {:>10}  {}",
            seg.index,
            seg.start,
            seg.length,
            seg.path.display()
        );
    }
    Ok(())
}
