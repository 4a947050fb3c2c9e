//! Stand-in fuzzer for exercising fuzzbatch end to end.
//!
//! Writes an AFL-style `fuzzer_stats` file into its output directory whose
//! counters are derived from the `output_<i>` suffix, keeps running for
//! `--runtime-secs`, then marks the file `finished`.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Parser, Debug)]
#[command(name = "fuzzbatch-mock-fuzzer")]
struct Args {
    /// Output directory
    #[arg(short = 'o')]
    output: PathBuf,

    /// Seed directory
    #[arg(short = 'i')]
    input: Option<PathBuf>,

    /// Seconds to run before finishing
    #[arg(long, default_value_t = 0)]
    runtime_secs: u64,

    /// Exit without writing a stats file
    #[arg(long)]
    no_stats: bool,

    /// Ignore SIGTERM, so only SIGKILL ends the run
    #[arg(long)]
    ignore_term: bool,

    /// Target command line
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    target: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.ignore_term {
        // SAFETY: installs a disposition before any other thread exists.
        unsafe {
            libc::signal(libc::SIGTERM, libc::SIG_IGN);
        }
    }

    std::fs::create_dir_all(&args.output)?;
    if args.no_stats {
        std::thread::sleep(Duration::from_secs(args.runtime_secs));
        return Ok(());
    }

    let index = run_index(&args.output);
    let stats_path = args.output.join("fuzzer_stats");
    let started = unix_now();
    let command_line = command_line(&args);

    std::fs::write(
        &stats_path,
        render_stats(index, started, "running", &command_line),
    )?;
    std::thread::sleep(Duration::from_secs(args.runtime_secs));
    std::fs::write(
        &stats_path,
        render_stats(index, started, "finished", &command_line),
    )?;
    Ok(())
}

fn run_index(dir: &Path) -> u64 {
    dir.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_prefix("output_"))
        .and_then(|i| i.parse().ok())
        .unwrap_or(0)
}

fn command_line(args: &Args) -> String {
    let mut parts = vec![
        "fuzzbatch-mock-fuzzer".to_string(),
        "-o".to_string(),
        args.output.display().to_string(),
    ];
    if let Some(input) = &args.input {
        parts.push("-i".to_string());
        parts.push(input.display().to_string());
    }
    parts.extend(args.target.iter().cloned());
    parts.join(" ")
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn render_stats(i: u64, started: u64, status: &str, command_line: &str) -> String {
    format!(
        "start_time        : {started}\n\
         last_update       : {now}\n\
         fuzzer_pid        : {pid}\n\
         execs_done        : {execs_done}\n\
         execs_per_sec     : {execs_per_sec}\n\
         paths_total       : {paths_total}\n\
         paths_favored     : {paths_favored}\n\
         unique_crashes    : {i}\n\
         unique_hangs      : 0\n\
         bitmap_cvg        : {i}.50%\n\
         status            : {status}\n\
         command_line      : {command_line}\n",
        now = unix_now(),
        pid = std::process::id(),
        execs_done = 1000 * i,
        execs_per_sec = 100 * i,
        paths_total = 100 * i,
        paths_favored = 10 * i,
    )
}
